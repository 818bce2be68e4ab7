// LOADSWEEP RUN CONFIGURATION
// ONE POINT OF THE SWEEP GRID: TARGET x LOAD MASK x SERVICE MASK x CONCURRENCY.
// wrk RUNS ONE THREAD PER LOAD CPU AND NEEDS AT LEAST ONE CONNECTION PER THREAD,
// SO A CONFIGURATION WITH concurrency < load cpus CANNOT BE BUILT.

use std::path::PathBuf;
use std::time::Duration;

use crate::affinity::AffinityMask;
use crate::config::Timing;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestTarget {
    pub path: PathBuf,
    pub description: String,
    pub async_service: bool,
    pub async_driver: bool,
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Primer,
    Measurement,
}

impl Phase {
    pub fn duration(self, timing: &Timing) -> Duration {
        match self {
            Self::Primer => timing.primer(),
            Self::Measurement => timing.measure(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Primer => "primer",
            Self::Measurement => "measurement",
        }
    }
}

/// Everything one wrk invocation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan<'a> {
    pub phase: Phase,
    pub mask: &'a AffinityMask,
    pub threads: usize,
    pub concurrency: u32,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfiguration {
    target: TestTarget,
    load: AffinityMask,
    service: AffinityMask,
    concurrency: u32,
}

impl RunConfiguration {
    /// None when the concurrency is below the load CPU count.
    pub fn new(
        target: TestTarget,
        load: AffinityMask,
        service: AffinityMask,
        concurrency: u32,
    ) -> Option<Self> {
        if (concurrency as usize) < load.cpu_count() {
            return None;
        }
        Some(Self {
            target,
            load,
            service,
            concurrency,
        })
    }

    pub fn target(&self) -> &TestTarget {
        &self.target
    }

    pub fn load_mask(&self) -> &AffinityMask {
        &self.load
    }

    pub fn service_mask(&self) -> &AffinityMask {
        &self.service
    }

    pub fn concurrency(&self) -> u32 {
        self.concurrency
    }

    pub fn load_plan(&self, phase: Phase, timing: &Timing) -> LoadPlan<'_> {
        LoadPlan {
            phase,
            mask: &self.load,
            threads: self.load.cpu_count(),
            concurrency: self.concurrency,
            duration: phase.duration(timing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> TestTarget {
        TestTarget {
            path: PathBuf::from("app.jar"),
            description: "App".into(),
            async_service: false,
            async_driver: true,
            command: vec!["java".into(), "-jar".into(), "app.jar".into()],
        }
    }

    fn mask(s: &str) -> AffinityMask {
        s.parse().unwrap()
    }

    #[test]
    fn concurrency_below_threads_is_unbuildable() {
        assert!(RunConfiguration::new(target(), mask("3,5,7,9"), mask("2"), 3).is_none());
        assert!(RunConfiguration::new(target(), mask("3,5,7,9"), mask("2"), 4).is_some());
    }

    #[test]
    fn plan_durations_follow_phase() {
        let timing = Timing::default();
        let run = RunConfiguration::new(target(), mask("0-3"), mask("4-7"), 50).unwrap();
        let primer = run.load_plan(Phase::Primer, &timing);
        let measure = run.load_plan(Phase::Measurement, &timing);
        assert_eq!(primer.duration, Duration::from_secs(2));
        assert_eq!(primer.phase.label(), "primer");
        assert_eq!(measure.phase.label(), "measurement");
        assert_eq!(measure.duration, Duration::from_secs(60));
        assert_eq!(measure.threads, 4);
        assert_eq!(measure.concurrency, 50);
        assert_eq!(measure.mask, run.load_mask());
    }
}
