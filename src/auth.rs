//! Magic-code sign-in over the local account database.
//!
//! Codes are handed to a [`CodeMailer`]; the default mailer writes them to the
//! log, standing in for email delivery. The signed-in session is kept in a
//! storage entry so it survives restarts.

use crate::clock::Clock;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::migration::migration_done_key;
use crate::remote::AuthService;
use crate::storage::KeyValueStorage;
use crate::subscriptions::{ChangeEvent, ChangeFeed};
use crate::types::{AuthState, User};
use async_trait::async_trait;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::{error, info, warn};

/// Default storage entry name for the signed-in session.
pub const DEFAULT_SESSION_KEY: &str = "todo-sync-session";

/// Default lifetime of a magic code.
pub const DEFAULT_CODE_TTL_SECS: u64 = 600;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// Trim and lowercase an email, rejecting anything that is not shaped like one.
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if EMAIL_RE.is_match(&email) {
        Ok(email)
    } else {
        Err(Error::auth(format!("not a valid email address: {email:?}")))
    }
}

/// Delivery channel for magic codes.
pub trait CodeMailer: Send + Sync {
    fn deliver(&self, email: &str, code: &str) -> Result<()>;
}

/// Mailer that logs the code instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl CodeMailer for LogMailer {
    fn deliver(&self, email: &str, code: &str) -> Result<()> {
        info!(email = %email, code = %code, "Magic code issued");
        Ok(())
    }
}

/// Six-digit one-time code.
fn generate_code() -> String {
    let n = uuid::Uuid::new_v4().as_u128() % 1_000_000;
    format!("{n:06}")
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    user_id: String,
    email: String,
}

/// Auth service backed by [`Database`] with the session kept in local storage.
pub struct LocalAuth {
    db: Database,
    storage: Arc<dyn KeyValueStorage>,
    session_key: String,
    code_ttl_ms: i64,
    mailer: Arc<dyn CodeMailer>,
    clock: Arc<dyn Clock>,
    feed: ChangeFeed,
}

impl LocalAuth {
    pub fn new(db: Database, storage: Arc<dyn KeyValueStorage>, clock: Arc<dyn Clock>) -> Self {
        let feed = db.feed().clone();
        Self {
            db,
            storage,
            session_key: DEFAULT_SESSION_KEY.to_string(),
            code_ttl_ms: (DEFAULT_CODE_TTL_SECS * 1000) as i64,
            mailer: Arc::new(LogMailer),
            clock,
            feed,
        }
    }

    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = key.into();
        self
    }

    pub fn with_code_ttl_secs(mut self, secs: u64) -> Self {
        self.code_ttl_ms = (secs.saturating_mul(1000)).min(i64::MAX as u64) as i64;
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn CodeMailer>) -> Self {
        self.mailer = mailer;
        self
    }

    fn read_session(&self) -> Option<Session> {
        let raw = match self.storage.get(&self.session_key) {
            Ok(raw) => raw?,
            Err(e) => {
                error!(error = %e, "Error reading session");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(error = %e, "Malformed session entry, treating as signed out");
                None
            }
        }
    }
}

#[async_trait]
impl AuthService for LocalAuth {
    async fn send_magic_code(&self, email: &str) -> Result<()> {
        let email = normalize_email(email)?;
        let code = generate_code();
        let expires_at = self.clock.now_ms().saturating_add(self.code_ttl_ms);
        self.db.store_magic_code(&email, &code, expires_at)?;
        self.mailer.deliver(&email, &code)
    }

    async fn verify_magic_code(&self, email: &str, code: &str) -> Result<User> {
        let email = normalize_email(email)?;
        let code = code.trim();
        if !self.db.take_magic_code(&email, code, self.clock.now_ms())? {
            return Err(Error::auth("invalid or expired code"));
        }

        let user = self.db.get_or_create_user(&email)?;
        // A fresh sign-in gets a fresh migration attempt
        self.storage.remove(&migration_done_key(&user.id))?;
        let session = Session {
            user_id: user.id.clone(),
            email: user.email.clone(),
        };
        self.storage
            .set(&self.session_key, &serde_json::to_string(&session)?)?;

        info!(user_id = %user.id, "Signed in");
        self.feed.publish(ChangeEvent::auth(Some(user.id.clone())));
        Ok(user)
    }

    fn current_user(&self) -> AuthState {
        let Some(session) = self.read_session() else {
            return AuthState::Anonymous;
        };
        match self.db.get_user(&session.user_id) {
            Ok(Some(user)) => AuthState::Authenticated(user),
            Ok(None) => {
                warn!(user_id = %session.user_id, "Session refers to unknown user");
                AuthState::Anonymous
            }
            Err(e) => {
                error!(error = %e, "Error resolving session user");
                AuthState::Anonymous
            }
        }
    }

    async fn sign_out(&self) -> Result<()> {
        if let Some(session) = self.read_session() {
            self.storage
                .remove(&migration_done_key(&session.user_id))?;
        }
        self.storage.remove(&self.session_key)?;
        info!("Signed out");
        self.feed.publish(ChangeEvent::auth(None));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStorage;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingMailer(Mutex<Vec<(String, String)>>);

    impl CodeMailer for CapturingMailer {
        fn deliver(&self, email: &str, code: &str) -> Result<()> {
            self.0.lock().unwrap().push((email.into(), code.into()));
            Ok(())
        }
    }

    impl CapturingMailer {
        fn last_code(&self) -> String {
            self.0.lock().unwrap().last().unwrap().1.clone()
        }
    }

    fn setup() -> (LocalAuth, Arc<CapturingMailer>, Arc<ManualClock>) {
        let db = Database::open_in_memory().unwrap();
        let clock = Arc::new(ManualClock::new(1_000));
        let mailer = Arc::new(CapturingMailer::default());
        let auth = LocalAuth::new(db, Arc::new(MemoryStorage::new()), clock.clone())
            .with_mailer(mailer.clone());
        (auth, mailer, clock)
    }

    #[test]
    fn normalize_email_validates_shape() {
        assert_eq!(normalize_email("  A@Example.COM ").unwrap(), "a@example.com");
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("a@b").is_err());
    }

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..20 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn sign_in_round_trip() {
        let (auth, mailer, _) = setup();
        assert_eq!(auth.current_user(), AuthState::Anonymous);

        auth.send_magic_code("me@example.com").await.unwrap();
        let code = mailer.last_code();
        let user = auth.verify_magic_code("me@example.com", &code).await.unwrap();

        assert_eq!(auth.current_user(), AuthState::Authenticated(user));

        auth.sign_out().await.unwrap();
        assert_eq!(auth.current_user(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn wrong_or_expired_code_fails() {
        let (auth, mailer, clock) = setup();
        auth.send_magic_code("me@example.com").await.unwrap();
        let code = mailer.last_code();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let err = auth.verify_magic_code("me@example.com", wrong).await.unwrap_err();
        assert!(matches!(err, Error::AuthFailed(_)));

        clock.advance((DEFAULT_CODE_TTL_SECS * 1000) as i64 + 1);
        let err = auth.verify_magic_code("me@example.com", &code).await.unwrap_err();
        assert!(matches!(err, Error::AuthFailed(_)));
        assert_eq!(auth.current_user(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn bad_email_is_rejected_before_issuing() {
        let (auth, mailer, _) = setup();
        assert!(auth.send_magic_code("nope").await.is_err());
        assert!(mailer.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sign_out_forgets_the_migration_flag() {
        let (auth, mailer, _) = setup();
        auth.send_magic_code("me@example.com").await.unwrap();
        let code = mailer.last_code();
        let user = auth.verify_magic_code("me@example.com", &code).await.unwrap();

        let key = migration_done_key(&user.id);
        auth.storage.set(&key, "true").unwrap();
        auth.sign_out().await.unwrap();
        assert!(!auth.storage.contains(&key).unwrap());
    }
}
