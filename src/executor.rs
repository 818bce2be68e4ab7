// LOADSWEEP RUN EXECUTOR
// RUNS wrk PINNED TO THE LOAD MASK AND BLOCKS UNTIL IT EXITS. THE --timeout
// FLAG IS wrk'S PER-REQUEST TIMEOUT, NOT THE TEST DURATION.

use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::GeneratorConfig;
use crate::error::RunError;
use crate::run::LoadPlan;

// KEEP THE ERROR LOG LINE READABLE
const STDERR_TAIL: usize = 512;

pub trait LoadGenerator {
    /// Raw stdout of one generator run. Non-zero exit is an error.
    fn run(&self, plan: &LoadPlan<'_>) -> Result<String, RunError>;
}

pub struct Wrk {
    binary: String,
    url: String,
    timeout: Duration,
}

impl Wrk {
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            url: config.url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn args(&self, plan: &LoadPlan<'_>) -> Vec<String> {
        vec![
            "--timeout".to_string(),
            format!("{}s", self.timeout.as_secs()),
            format!("-d{}s", plan.duration.as_secs()),
            format!("-c{}", plan.concurrency),
            format!("-t{}", plan.threads),
            self.url.clone(),
        ]
    }
}

impl LoadGenerator for Wrk {
    fn run(&self, plan: &LoadPlan<'_>) -> Result<String, RunError> {
        info!(
            phase = plan.phase.label(),
            concurrency = plan.concurrency,
            duration_s = plan.duration.as_secs(),
            threads = plan.threads,
            "executing test"
        );
        let args = self.args(plan);
        debug!(cpus = %plan.mask, "executing test command {} {}", self.binary, args.join(" "));

        let mut cmd = Command::new(&self.binary);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        plan.mask.pin(&mut cmd);

        let output = cmd.output().map_err(|source| RunError::GeneratorIo {
            program: self.binary.clone(),
            source,
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let start = stderr.len().saturating_sub(STDERR_TAIL);
            let start = (start..=stderr.len())
                .find(|&i| stderr.is_char_boundary(i))
                .unwrap_or(stderr.len());
            return Err(RunError::Generator {
                status: output.status,
                stderr: stderr[start..].to_string(),
            });
        }
        info!(phase = plan.phase.label(), "executing test done");
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
