//! todo-sync command line
//!
//! Each invocation runs one cycle: resolve the session, move guest tasks
//! into the account if the user just signed in, run the command, and print
//! the list.

use clap::Parser;
use serde_json::json;
use std::process::ExitCode;
use todo_sync::app::App;
use todo_sync::cli::{Cli, Command, join_words, resolve_task_ref, target_index};
use todo_sync::config::{ConfigLoader, ConfigPaths};
use todo_sync::error::{Error, ErrorBody, Result};
use todo_sync::format::{OutputFormat, format_auth, format_view};
use todo_sync::logging::{self, LogTarget};
use todo_sync::migration::MigrationOutcome;
use todo_sync::remote::AuthService;
use tracing::debug;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = OutputFormat::from(cli.format);

    match run(cli, format).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e, format);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, format: OutputFormat) -> Result<()> {
    let mut loader = ConfigLoader::load_with(ConfigPaths::discover(), cli.config.as_deref())?;

    // CLI flags override every config tier
    let config = loader.config_mut();
    if let Some(data_dir) = &cli.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    if let Some(db_path) = &cli.database {
        config.remote.db_path = Some(db_path.clone());
    }

    logging::init(
        &LogTarget::parse(&cli.log),
        &loader.config().logging.level,
        cli.verbose,
    )?;
    for source in loader.sources() {
        debug!(path = %source.display(), "Using config file");
    }

    let mut app = App::open(loader.into_config())?;
    let command = cli.command.unwrap_or(Command::List);

    match command {
        Command::Login { email } => {
            app.auth().send_magic_code(&email).await?;
            match format {
                OutputFormat::Text => println!(
                    "A sign-in code for {} was issued. Run `todo-sync verify {} <code>`.",
                    email.trim(),
                    email.trim()
                ),
                OutputFormat::Json => println!("{}", json!({"sent": email.trim()})),
            }
            Ok(())
        }
        Command::Verify { email, code } => {
            app.auth().verify_magic_code(&email, &code).await?;
            println!("{}", format_auth(&app.auth().current_user(), format));
            show(&mut app, format).await
        }
        Command::Logout => {
            app.auth().sign_out().await?;
            println!("{}", format_auth(&app.auth().current_user(), format));
            show(&mut app, format).await
        }
        Command::Whoami => {
            println!("{}", format_auth(&app.auth().current_user(), format));
            Ok(())
        }
        Command::List => show(&mut app, format).await,
        command => {
            execute(&mut app, &command).await?;
            show(&mut app, format).await
        }
    }
}

/// Run a task command against the list as it currently stands.
async fn execute(app: &mut App, command: &Command) -> Result<()> {
    let cycle = app.cycle().await?;
    report_migration(&cycle.migration);

    let auth = cycle.auth;
    let tasks = cycle.view.tasks();
    let accessor = app.accessor();

    match command {
        Command::Add { title } => {
            if accessor.add_task(&auth, &join_words(title)).await.is_none() {
                return Err(Error::invalid("title", "task was not added"));
            }
        }
        Command::Done { task } => {
            let task = resolve_task_ref(tasks, task)?;
            accessor.toggle_task(&auth, &task.id, true).await;
        }
        Command::Undo { task } => {
            let task = resolve_task_ref(tasks, task)?;
            accessor.toggle_task(&auth, &task.id, false).await;
        }
        Command::Rename { task, title } => {
            let task = resolve_task_ref(tasks, task)?;
            let title = join_words(title);
            if title.trim().is_empty() {
                return Err(Error::invalid("title", "must not be blank"));
            }
            accessor.update_task_title(&auth, &task.id, &title).await;
        }
        Command::Rm { task } => {
            let task = resolve_task_ref(tasks, task)?;
            accessor.delete_task(&auth, &task.id).await;
        }
        Command::Move { task, to } => {
            let task = resolve_task_ref(tasks, task)?;
            let index = target_index(*to, tasks.len())?;
            accessor.move_task(&auth, tasks, &task.id, index).await;
        }
        Command::List
        | Command::Login { .. }
        | Command::Verify { .. }
        | Command::Logout
        | Command::Whoami => {}
    }
    Ok(())
}

/// Run a cycle and print the list it produced.
async fn show(app: &mut App, format: OutputFormat) -> Result<()> {
    let cycle = app.cycle().await?;
    report_migration(&cycle.migration);
    print!("{}", format_view(&cycle.view, format));
    if format == OutputFormat::Json {
        println!();
    }
    Ok(())
}

fn report_migration(migration: &Result<MigrationOutcome>) {
    match migration {
        Ok(MigrationOutcome::Migrated(count)) => {
            eprintln!("Moved {} guest task(s) into your account.", count);
        }
        Ok(_) => {}
        Err(e) => {
            eprintln!("Warning: {}. Your guest tasks were kept on this device.", e);
        }
    }
}

fn report_error(err: &Error, format: OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", err),
        OutputFormat::Json => match serde_json::to_string(&ErrorBody::from(err)) {
            Ok(body) => println!("{}", body),
            Err(_) => eprintln!("Error: {}", err),
        },
    }
}
