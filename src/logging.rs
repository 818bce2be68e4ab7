// LOADSWEEP LOGGING
// ONE SUBSCRIBER, TWO SINKS: STDERR FOR THE OPERATOR, output_<stamp>.log NEXT TO
// THE RESULTS FOR THE POST-MORTEM. RUST_LOG OVERRIDES THE DEFAULT LEVEL.

use std::fs::OpenOptions;
use std::io::IsTerminal as _;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{fmt, EnvFilter};

fn filter(verbose: bool) -> EnvFilter {
    let directive = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    EnvFilter::builder()
        .with_default_directive(directive.into())
        .from_env_lossy()
}

/// Stderr only. Used by the subcommands that write no sweep artifacts.
pub fn init_console(verbose: bool) -> Result<()> {
    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .try_init()
        .context("failed to install tracing subscriber")
}

/// Stderr plus an append-mode log file.
pub fn init(verbose: bool, log_path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .try_init()
        .context("failed to install tracing subscriber")?;

    tracing::info!(path = %log_path.display(), "logging to file");
    Ok(())
}
