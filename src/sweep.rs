// LOADSWEEP SWEEP DRIVER
// EXPANDS THE GRID, ESTIMATES ITS WALL CLOCK, AND FEEDS EVERY CONFIGURATION
// THROUGH THE CONTROLLER IN ORDER: TARGET, LOAD MASK, SERVICE MASK, CONCURRENCY.
// EACH ROW IS APPENDED BEFORE THE NEXT CONFIGURATION STARTS.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::affinity::AffinityMask;
use crate::config::Timing;
use crate::controller::TestRunController;
use crate::executor::LoadGenerator;
use crate::process::ProcessControl;
use crate::record::ResultLog;
use crate::run::{RunConfiguration, TestTarget};
use crate::sample::ResourceSampler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepSummary {
    pub planned: usize,
    pub measured: usize,
    pub failed: usize,
    pub interrupted: bool,
}

impl SweepSummary {
    pub fn completed(&self) -> usize {
        self.measured + self.failed
    }
}

/// Cartesian product of the grid, minus combinations where the concurrency is
/// below the load CPU count.
pub fn plan(
    targets: &[TestTarget],
    load_masks: &[AffinityMask],
    service_masks: &[AffinityMask],
    concurrency: &[u32],
) -> Vec<RunConfiguration> {
    let mut runs = Vec::new();
    for target in targets {
        for load in load_masks {
            for service in service_masks {
                for &c in concurrency {
                    match RunConfiguration::new(target.clone(), load.clone(), service.clone(), c) {
                        Some(run) => runs.push(run),
                        None => debug!(
                            description = %target.description,
                            load_cpus = %load,
                            concurrency = c,
                            "skipping, concurrency below load threads"
                        ),
                    }
                }
            }
        }
    }
    runs
}

/// Expected wall clock: every run pays startup, primer, settle and measurement.
/// Retries and kill waits are not counted.
pub fn estimate(runs: &[RunConfiguration], timing: &Timing) -> Duration {
    let per_run =
        timing.measure() + timing.primer() + timing.settle_after_primer() + timing.startup();
    per_run * runs.len() as u32
}

pub fn run<P, G, S>(
    controller: &mut TestRunController<P, G, S>,
    runs: &[RunConfiguration],
    log: &ResultLog,
    shutdown: &AtomicBool,
) -> csv::Result<SweepSummary>
where
    P: ProcessControl,
    G: LoadGenerator,
    S: ResourceSampler,
{
    let mut summary = SweepSummary {
        planned: runs.len(),
        ..SweepSummary::default()
    };

    for (i, run) in runs.iter().enumerate() {
        if shutdown.load(Ordering::Relaxed) {
            warn!(remaining = runs.len() - i, "shutdown requested, stopping sweep");
            summary.interrupted = true;
            break;
        }

        let target = run.target();
        info!(
            run = i + 1,
            of = runs.len(),
            description = %target.description,
            load_cpus = %run.load_mask(),
            service_cpus = %run.service_mask(),
            concurrency = run.concurrency(),
            "processing configuration"
        );

        let record = controller.execute(run);
        if record.is_failed() {
            summary.failed += 1;
        } else {
            summary.measured += 1;
        }
        log.append(&record)?;
    }

    info!(
        measured = summary.measured,
        failed = summary.failed,
        planned = summary.planned,
        "sweep finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(name: &str) -> TestTarget {
        TestTarget {
            path: format!("{name}.jar").into(),
            description: name.to_string(),
            async_service: false,
            async_driver: false,
            command: vec!["true".into()],
        }
    }

    fn mask(s: &str) -> AffinityMask {
        s.parse().unwrap()
    }

    #[test]
    fn plan_order_is_target_load_service_concurrency() {
        let runs = plan(
            &[target("a"), target("b")],
            &[mask("0"), mask("1")],
            &[mask("2")],
            &[1, 2],
        );
        let keys: Vec<(String, String, u32)> = runs
            .iter()
            .map(|r| {
                (
                    r.target().description.clone(),
                    r.load_mask().to_string(),
                    r.concurrency(),
                )
            })
            .collect();
        assert_eq!(
            keys,
            vec![
                ("a".into(), "0".into(), 1),
                ("a".into(), "0".into(), 2),
                ("a".into(), "1".into(), 1),
                ("a".into(), "1".into(), 2),
                ("b".into(), "0".into(), 1),
                ("b".into(), "0".into(), 2),
                ("b".into(), "1".into(), 1),
                ("b".into(), "1".into(), 2),
            ]
        );
    }

    #[test]
    fn plan_skips_concurrency_below_threads() {
        let runs = plan(&[target("a")], &[mask("0-3")], &[mask("4")], &[2, 4, 50]);
        let levels: Vec<u32> = runs.iter().map(|r| r.concurrency()).collect();
        assert_eq!(levels, vec![4, 50]);
    }

    #[test]
    fn reference_grid_estimate() {
        let config = crate::config::SweepConfig::default();
        let runs = plan(
            &config.targets(),
            &config.load_cpus,
            &config.service_cpus,
            &config.concurrency,
        );
        assert_eq!(runs.len(), 64);
        // (60 + 2 + 1 + 10) * 64
        assert_eq!(estimate(&runs, &config.timing), Duration::from_secs(4672));
    }

    #[test]
    fn empty_grid() {
        assert!(plan(&[], &[mask("0")], &[mask("1")], &[4]).is_empty());
        assert_eq!(estimate(&[], &Timing::default()), Duration::ZERO);
    }
}
