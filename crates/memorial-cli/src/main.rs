//! Memorial CLI - a command-line front end for the memorial family archive.
//!
//! Every command restores the saved session first, then checks its route
//! against the session guards before touching the API.

mod commands;

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use memorial_core::Config;

#[derive(Parser)]
#[command(name = "memorial")]
#[command(version)]
#[command(about = "Memorial family archive CLI")]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Override the API base URL for this run
    #[arg(long, value_name = "URL", global = true)]
    api_url: Option<String>,

    /// Send notifications to the log instead of the terminal
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Initialize the tracing subscriber for logging
///
/// Logs go to stderr, filtered by RUST_LOG (default "warn"). When a log
/// directory is configured, a daily rolling file receives the same events.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "memorial.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
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
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load().context("load config")?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }

    let _log_guard = init_tracing(config.log_dir.as_deref());
    info!(api_url = %config.api_url, "Memorial CLI starting");

    commands::run(cli.command, config, cli.quiet).await
}
