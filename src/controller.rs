// LOADSWEEP TEST-RUN CONTROLLER
// ONE execute() CALL = ONE RUN CONFIGURATION = ONE RESULT ROW:
//
//   1. ACQUIRE      SPAWN THE TARGET, UP TO 2 MORE SPAWNS, THEN ADOPT WHATEVER
//                   DISCOVERY FINDS
//   2. PRIMER       SHORT wrk RUN TO WARM THE TARGET, OUTPUT DISCARDED
//   3. SETTLE
//   4. CPU BEFORE
//   5. MEASURE      FULL-LENGTH wrk RUN
//   6. CPU AFTER
//   7. PARSE        ZERO BYTES READ OR A MISSING FIELD FAILS THE ATTEMPT
//   8. RECORD       CPU DELTAS + FINAL ABSOLUTE MEMORY
//   9. RETRY        ON FAILURE: BACK OFF, REPEAT 2-8 ONCE ON THE SAME HANDLE
//                   (NEVER RESPAWNED), THEN THE FAILED SENTINEL
//  10. TERMINATE    ALWAYS, SUCCESS OR NOT
//
// NO PER-RUN ERROR LEAVES THIS MODULE. A WEDGED TARGET COSTS ONE FAILED ROW,
// NOT THE REST OF THE GRID.

use std::thread;

use tracing::{debug, error, info, warn};

use crate::config::Timing;
use crate::error::RunError;
use crate::executor::LoadGenerator;
use crate::process::{Pid, ProcessControl};
use crate::record::{Measurement, Outcome, ResourceUsage, ResultRecord};
use crate::run::{Phase, RunConfiguration};
use crate::sample::ResourceSampler;
use crate::wrk;

// SPAWNS AFTER THE FIRST ONE CAME BACK WITHOUT A HANDLE
const SPAWN_RETRIES: u32 = 2;

/// Lifecycle of the target process within one run configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    NotStarted,
    Spawning,
    Running(Pid),
    SpawnFailed,
    Terminated,
}

pub struct TestRunController<P, G, S> {
    process: P,
    generator: G,
    sampler: S,
    timing: Timing,
    state: TargetState,
}

impl<P, G, S> TestRunController<P, G, S>
where
    P: ProcessControl,
    G: LoadGenerator,
    S: ResourceSampler,
{
    pub fn new(process: P, generator: G, sampler: S, timing: Timing) -> Self {
        Self {
            process,
            generator,
            sampler,
            timing,
            state: TargetState::NotStarted,
        }
    }

    pub fn state(&self) -> TargetState {
        self.state
    }

    pub fn process(&self) -> &P {
        &self.process
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    fn transition(&mut self, next: TargetState) {
        debug!(from = ?self.state, to = ?next, "target state");
        self.state = next;
    }

    pub fn execute(&mut self, run: &RunConfiguration) -> ResultRecord {
        self.transition(TargetState::NotStarted);
        let mut pid = self.acquire(run);

        let outcome = match self.attempt(run, pid) {
            Ok(measurement) => Outcome::Measured(measurement),
            Err(first) => {
                warn!(error = %first, "executing retry");
                thread::sleep(self.timing.retry_backoff());
                if pid.is_none() {
                    pid = self.adopt();
                }
                match self.attempt(run, pid) {
                    Ok(measurement) => Outcome::Measured(measurement),
                    Err(second) => {
                        warn!("giving up, test failed, writing FAILED to results file");
                        error!(error = %second, "retry failed");
                        Outcome::Failed
                    }
                }
            }
        };

        if let Some(pid) = pid {
            self.process.terminate(pid);
            self.transition(TargetState::Terminated);
        }
        ResultRecord::new(run, outcome, self.timing.measure())
    }

    fn acquire(&mut self, run: &RunConfiguration) -> Option<Pid> {
        let command = &run.target().command;
        for attempt in 0..=SPAWN_RETRIES {
            self.transition(TargetState::Spawning);
            match self.process.spawn(command, run.service_mask()) {
                Ok(Some(pid)) => {
                    info!(%pid, attempt, "target process pid");
                    self.transition(TargetState::Running(pid));
                    return Some(pid);
                }
                Ok(None) => warn!(attempt, "target process not found after startup"),
                Err(e) => warn!(attempt, error = %e, "target launch failed"),
            }
        }
        self.adopt()
    }

    // LAST RESORT: TAKE WHATEVER MATCHES THE PATTERN NOW
    fn adopt(&mut self) -> Option<Pid> {
        match self.process.discover() {
            Some(pid) => {
                info!(%pid, "setting target pid from discovery");
                self.transition(TargetState::Running(pid));
                Some(pid)
            }
            None => {
                self.transition(TargetState::SpawnFailed);
                None
            }
        }
    }

    fn attempt(&self, run: &RunConfiguration, pid: Option<Pid>) -> Result<Measurement, RunError> {
        let pid = pid.ok_or(RunError::NoProcess)?;

        self.generator.run(&run.load_plan(Phase::Primer, &self.timing))?;
        thread::sleep(self.timing.settle_after_primer());

        let before = self.sampler.cpu(pid);
        let output = self
            .generator
            .run(&run.load_plan(Phase::Measurement, &self.timing))?;
        let after = self.sampler.cpu(pid);

        let metrics = wrk::parse(&output);
        debug!(?metrics, "parsed wrk output");
        if metrics.nothing_read() {
            return Err(RunError::NoBytesRead);
        }
        if let Some(field) = metrics.first_missing() {
            return Err(RunError::MissingMetric(field));
        }

        let cpu = after.since(&before);
        if cpu.user.is_none() || cpu.kernel.is_none() {
            warn!(%pid, "cpu sample missing, delta left blank");
        }
        let memory = self.sampler.memory(pid);
        info!(
            user_cpu = ?cpu.user,
            kern_cpu = ?cpu.kernel,
            uss_kb = ?memory.uss_kb,
            pss_kb = ?memory.pss_kb,
            rss_kb = ?memory.rss_kb,
            "cpu and memory"
        );

        Ok(Measurement {
            metrics,
            resources: ResourceUsage { cpu, memory },
        })
    }
}
