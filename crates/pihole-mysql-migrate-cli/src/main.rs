//! pihole-mysql-migrate CLI - continuous Pi-hole query log migration into MySQL.

use clap::{Parser, ValueEnum};
use pihole_mysql_migrate::{Config, MigrateError, MigrationSummary, Migrator};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "pihole-mysql-migrate")]
#[command(about = "Continuously migrate the Pi-hole query log into MySQL")]
#[command(version)]
struct Cli {
    /// Path to JSON or YAML configuration file (optional; environment variables override it)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Output JSON run summary to stdout on exit
    #[arg(long)]
    output_json: bool,

    /// Seconds to wait for queued batches to commit after a shutdown signal
    #[arg(long, default_value = "60")]
    shutdown_timeout: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    // Log level comes from the config, so it has to load first
    let config = Config::load(&cli.config)?;
    setup_logging(config.debug, cli.log_format);
    info!("Loaded configuration from {:?}", cli.config);

    // Setup signal handling for graceful shutdown (SIGINT and SIGTERM)
    let cancel_token = setup_signal_handler()?;

    let migrator = Migrator::new(config);
    let migration = migrator.run(cancel_token.clone());
    tokio::pin!(migration);

    let summary = tokio::select! {
        result = &mut migration => result?,
        _ = shutdown_deadline(&cancel_token, cli.shutdown_timeout) => {
            warn!(
                "Queued batches did not commit within {}s of shutdown, exiting",
                cli.shutdown_timeout
            );
            return Err(MigrateError::Cancelled);
        }
    };

    if cli.output_json {
        print_summary(&summary)?;
    }
    Ok(())
}

fn print_summary(summary: &MigrationSummary) -> Result<(), MigrateError> {
    let json = serde_json::to_string_pretty(summary)?;
    println!("{}", json);
    Ok(())
}

/// Resolves `timeout_secs` after `cancel` fires.
async fn shutdown_deadline(cancel: &CancellationToken, timeout_secs: u64) {
    cancel.cancelled().await;
    tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
}

fn setup_logging(debug: bool, format: LogFormat) {
    let level = if debug { Level::DEBUG } else { Level::INFO };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM (container stop).
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = cancel_token.clone();
    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        info!("Received {}. Shutting down gracefully...", name);
        token.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C. Shutting down gracefully...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
