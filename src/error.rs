// LOADSWEEP ERROR TYPES
// RunError IS PER-ATTEMPT AND NEVER LEAVES THE TEST-RUN CONTROLLER.
// AffinityError SURFACES AT CONFIG LOAD, BEFORE ANY TEST RUNS.

use std::process::ExitStatus;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("no target process handle")]
    NoProcess,

    #[error("target command is empty")]
    EmptyCommand,

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run load generator {program}: {source}")]
    GeneratorIo {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("load generator exited with {status}: {stderr}")]
    Generator { status: ExitStatus, stderr: String },

    #[error("no bytes read, target never served traffic")]
    NoBytesRead,

    #[error("load generator output has no {0} field")]
    MissingMetric(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AffinityError {
    #[error("empty cpu list")]
    Empty,

    #[error("invalid cpu identifier {0:?}")]
    InvalidCpu(String),

    #[error("reversed cpu range {0}-{1}")]
    ReversedRange(usize, usize),

    #[error("cpu {0} exceeds the affinity set size")]
    OutOfRange(usize),
}
