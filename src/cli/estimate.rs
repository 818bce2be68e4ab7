use anyhow::Result;

use loadsweep::config::SweepConfig;
use loadsweep::sweep;

pub fn run_estimate(config: &SweepConfig) -> Result<()> {
    let targets = config.targets();
    let runs = sweep::plan(
        &targets,
        &config.load_cpus,
        &config.service_cpus,
        &config.concurrency,
    );
    let grid =
        targets.len() * config.load_cpus.len() * config.service_cpus.len() * config.concurrency.len();
    let eta = sweep::estimate(&runs, &config.timing);

    println!("LOADSWEEP ESTIMATE");
    println!("TARGETS:         {}", targets.len());
    println!("LOAD MASKS:      {}", config.load_cpus.len());
    println!("SERVICE MASKS:   {}", config.service_cpus.len());
    println!("CONCURRENCY:     {:?}", config.concurrency);
    println!("RUNS:            {} ({} skipped, concurrency < load cpus)", runs.len(), grid - runs.len());
    println!(
        "PER RUN:         {}s measure + {}s primer + {}s settle + {}s startup",
        config.timing.measure_secs,
        config.timing.primer_secs,
        config.timing.settle_after_primer_secs,
        config.timing.startup_secs
    );
    println!("EXPECTED:        {:.2} hours", eta.as_secs_f64() / 3600.0);
    Ok(())
}
