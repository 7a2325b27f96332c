//! User accounts and one-time sign-in codes.

use super::{Database, now_ms};
use crate::types::User;
use anyhow::Result;
use rusqlite::{OptionalExtension, params};

impl Database {
    /// Insert a user with a known id.
    pub fn insert_user(&self, id: &str, email: &str) -> Result<User> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, created_at) VALUES (?1, ?2, ?3)",
                params![id, email, now_ms()],
            )?;
            Ok(User {
                id: id.to_string(),
                email: email.to_string(),
            })
        })
    }

    /// Look up a user by id.
    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    "SELECT id, email FROM users WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok(User {
                            id: row.get(0)?,
                            email: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(user)
        })
    }

    /// Return the user for `email`, creating it on first sign-in.
    pub fn get_or_create_user(&self, email: &str) -> Result<User> {
        self.with_conn(|conn| {
            let existing = conn
                .query_row(
                    "SELECT id FROM users WHERE email = ?1",
                    params![email],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;

            let id = match existing {
                Some(id) => id,
                None => {
                    let id = uuid::Uuid::now_v7().to_string();
                    conn.execute(
                        "INSERT INTO users (id, email, created_at) VALUES (?1, ?2, ?3)",
                        params![&id, email, now_ms()],
                    )?;
                    id
                }
            };

            Ok(User {
                id,
                email: email.to_string(),
            })
        })
    }

    /// Store the outstanding code for `email`, replacing any earlier one.
    pub fn store_magic_code(&self, email: &str, code: &str, expires_at: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO magic_codes (email, code, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(email) DO UPDATE SET code = ?2, expires_at = ?3",
                params![email, code, expires_at],
            )?;
            Ok(())
        })
    }

    /// Consume the code for `email`. Returns `true` only if it matched and had
    /// not expired at `now`. A matching code is deleted either way.
    pub fn take_magic_code(&self, email: &str, code: &str, now: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let expires_at = tx
                .query_row(
                    "SELECT expires_at FROM magic_codes WHERE email = ?1 AND code = ?2",
                    params![email, code],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?;

            let Some(expires_at) = expires_at else {
                return Ok(false);
            };

            tx.execute("DELETE FROM magic_codes WHERE email = ?1", params![email])?;
            tx.commit()?;
            Ok(expires_at > now)
        })
    }
}
