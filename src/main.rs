// LOADSWEEP -- wrk BENCHMARK SWEEP HARNESS
// DRIVES wrk AGAINST HTTP SERVICES ACROSS CPU AFFINITY PAIRS AND CONCURRENCY
// LEVELS, ONE SERVICE INSTANCE PER CONFIGURATION, ONE CSV ROW PER CONFIGURATION
//
// MEASUREMENT HAPPENS IN wrk AND /proc
// RUST HANDLES: PROCESS LIFECYCLE, AFFINITY, PARSING, RETRIES, RESULTS

mod cli;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::{Parser, Subcommand};

use loadsweep::config::SweepConfig;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[derive(Parser)]
#[command(name = "loadsweep")]
#[command(about = "LOADSWEEP -- wrk BENCHMARK SWEEP HARNESS")]
struct Cli {
    // SWEEP CONFIGURATION (TOML). BUILT-IN REFERENCE GRID WHEN OMITTED
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    // DEBUG-LEVEL LOGGING (PER-LINE wrk OUTPUT, SKIPPED CONFIGURATIONS)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full sweep (default)
    Run,
    /// Verify target files and the load generator are present
    Check,
    /// Print the planned grid and its expected duration
    Estimate,
    /// Parse a saved wrk transcript and print the metrics row
    Parse {
        /// File holding wrk stdout
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SweepConfig::load(path)?,
        None => SweepConfig::default(),
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            // FINISH THE IN-FLIGHT CONFIGURATION, THEN STOP
            ctrlc::set_handler(move || {
                SHUTDOWN.store(true, Ordering::Relaxed);
            })?;
            cli::run::run_sweep(&config, cli.verbose, &SHUTDOWN)
        }
        Command::Check => {
            loadsweep::logging::init_console(cli.verbose)?;
            cli::check::run_check(&config)
        }
        Command::Estimate => cli::estimate::run_estimate(&config),
        Command::Parse { file } => {
            loadsweep::logging::init_console(cli.verbose)?;
            cli::parse::run_parse(&file)
        }
    }
}
