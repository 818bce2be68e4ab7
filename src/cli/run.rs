use std::sync::atomic::AtomicBool;

use anyhow::{bail, Context, Result};
use tracing::info;

use loadsweep::config::SweepConfig;
use loadsweep::controller::TestRunController;
use loadsweep::executor::Wrk;
use loadsweep::process::ProcessController;
use loadsweep::record::ResultLog;
use loadsweep::sample::ProcSampler;
use loadsweep::{logging, sweep};

use super::check;

pub fn run_sweep(config: &SweepConfig, verbose: bool, shutdown: &AtomicBool) -> Result<()> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let dir = &config.results_dir;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create results dir {}", dir.display()))?;
    logging::init(verbose, &dir.join(format!("output_{}.log", stamp)))?;

    println!("LOADSWEEP PREREQUISITES");
    if !check::check_prereqs(config) {
        bail!("prerequisite check failed, no tests were run");
    }
    println!();

    let runs = sweep::plan(
        &config.targets(),
        &config.load_cpus,
        &config.service_cpus,
        &config.concurrency,
    );
    let eta = sweep::estimate(&runs, &config.timing);
    let hours = format!("{:.2}", eta.as_secs_f64() / 3600.0);
    info!(
        runs = runs.len(),
        hours = %hours,
        "estimated sweep duration"
    );

    let results = dir.join(format!("results_{}.log", stamp));
    let log = ResultLog::create(&results)
        .with_context(|| format!("failed to create results file {}", results.display()))?;
    info!(path = %log.path().display(), "writing results");

    let timing = config.timing;
    let process = ProcessController::new(
        &config.service.process_pattern,
        timing.startup(),
        timing.after_kill(),
    )
    .context("invalid service.process_pattern")?;
    let mut controller =
        TestRunController::new(process, Wrk::new(&config.generator), ProcSampler::new(), timing);

    let summary = sweep::run(&mut controller, &runs, &log, shutdown)
        .with_context(|| format!("failed to append to {}", log.path().display()))?;

    println!();
    println!("LOADSWEEP SUMMARY");
    println!("  PLANNED:       {}", summary.planned);
    println!("  MEASURED:      {}", summary.measured);
    println!("  FAILED:        {}", summary.failed);
    if summary.interrupted {
        println!("  INTERRUPTED:   {} not run", summary.planned - summary.completed());
    }
    println!("  RESULTS:       {}", log.path().display());
    Ok(())
}
