//! pms - command-line front end for the pastor management system.
//!
//! Signs administrators in, keeps their session in the configured storage and
//! drives the pastor, zone, area and parish endpoints.

mod commands;
mod navigator;

use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use pms_core::{ApiClient, Config, CredentialStore, SessionManager};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::Command;
use navigator::CliNavigator;

/// Log file written into the cache directory
const LOG_FILE: &str = "pms.log";

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes the log file when dropped.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir.filter(|dir| std::fs::create_dir_all(dir).is_ok()) {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, LOG_FILE));
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut config = Config::load()?;
    let _log_guard = init_tracing(config.cache_dir().ok().as_deref());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n\n{}", e, commands::USAGE);
            return Ok(ExitCode::from(2));
        }
    };
    if command == Command::Help {
        println!("{}", commands::USAGE);
        return Ok(ExitCode::SUCCESS);
    }

    let api_base = config.api_base();
    info!(api_base = %api_base, command = ?command, "pms starting");

    let navigator = Arc::new(CliNavigator::new(command.screen()));
    let credentials = CredentialStore::new(config.open_storage()?);
    let session = SessionManager::new(credentials, navigator);
    session.initialize();
    let _watcher = session.watch_external_changes();
    let client = ApiClient::new(&api_base, session)?;

    // Exit codes are returned so `_log_guard` drops and flushes pms.log
    match commands::run(command, &client, &mut config).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
