// LOADSWEEP RESOURCE SAMPLER
// READS PER-PROCESS ACCOUNTING FROM /proc:
//   /proc/<pid>/stat   FIELD 14 utime, FIELD 15 stime (CLOCK TICKS)
//   /proc/<pid>/smaps  PER-MAPPING MEMORY, SUMMED: Private_* (USS), Pss, Rss (kB)
//
// EVERY FIGURE IS ITS OWN QUERY. A PROCESS THAT ALREADY EXITED YIELDS None,
// WHICH MEANS "NO DATA" AND IS NEVER TREATED AS ZERO.

use std::fs;
use std::path::PathBuf;

use crate::process::Pid;

// stat FIELDS COUNTED AFTER THE ")" THAT CLOSES comm. FIELD 3 (state) IS INDEX 0.
const STAT_UTIME: usize = 14 - 3;
const STAT_STIME: usize = 15 - 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuSample {
    pub user: Option<u64>,
    pub kernel: Option<u64>,
}

impl CpuSample {
    /// Ticks consumed since `earlier`. A side without data on either end stays None.
    pub fn since(&self, earlier: &CpuSample) -> CpuDelta {
        fn diff(post: Option<u64>, pre: Option<u64>) -> Option<i64> {
            Some(post? as i64 - pre? as i64)
        }
        CpuDelta {
            user: diff(self.user, earlier.user),
            kernel: diff(self.kernel, earlier.kernel),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuDelta {
    pub user: Option<i64>,
    pub kernel: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemorySample {
    pub uss_kb: Option<u64>,
    pub pss_kb: Option<u64>,
    pub rss_kb: Option<u64>,
}

pub trait ResourceSampler {
    fn cpu_user_ticks(&self, pid: Pid) -> Option<u64>;
    fn cpu_kernel_ticks(&self, pid: Pid) -> Option<u64>;
    fn mem_uss_kb(&self, pid: Pid) -> Option<u64>;
    fn mem_pss_kb(&self, pid: Pid) -> Option<u64>;
    fn mem_rss_kb(&self, pid: Pid) -> Option<u64>;

    fn cpu(&self, pid: Pid) -> CpuSample {
        CpuSample {
            user: self.cpu_user_ticks(pid),
            kernel: self.cpu_kernel_ticks(pid),
        }
    }

    fn memory(&self, pid: Pid) -> MemorySample {
        MemorySample {
            uss_kb: self.mem_uss_kb(pid),
            pss_kb: self.mem_pss_kb(pid),
            rss_kb: self.mem_rss_kb(pid),
        }
    }
}

pub struct ProcSampler {
    root: PathBuf,
}

impl ProcSampler {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, pid: Pid, file: &str) -> Option<String> {
        fs::read_to_string(self.root.join(pid.to_string()).join(file)).ok()
    }

    fn stat_field(&self, pid: Pid, index: usize) -> Option<u64> {
        let raw = self.read(pid, "stat")?;
        // comm MAY CONTAIN SPACES AND PARENTHESES: SPLIT AFTER THE LAST ")"
        let (_, rest) = raw.rsplit_once(')')?;
        rest.split_whitespace().nth(index)?.parse().ok()
    }

    fn smaps_sum(&self, pid: Pid, wanted: fn(&str) -> bool) -> Option<u64> {
        let raw = self.read(pid, "smaps")?;
        let total = raw
            .lines()
            .filter_map(|line| line.split_once(':'))
            .filter(|(key, _)| wanted(key.trim()))
            .filter_map(|(_, value)| value.split_whitespace().next()?.parse::<u64>().ok())
            .sum();
        Some(total)
    }
}

impl Default for ProcSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for ProcSampler {
    fn cpu_user_ticks(&self, pid: Pid) -> Option<u64> {
        self.stat_field(pid, STAT_UTIME)
    }

    fn cpu_kernel_ticks(&self, pid: Pid) -> Option<u64> {
        self.stat_field(pid, STAT_STIME)
    }

    fn mem_uss_kb(&self, pid: Pid) -> Option<u64> {
        self.smaps_sum(pid, |key| key.starts_with("Private_"))
    }

    fn mem_pss_kb(&self, pid: Pid) -> Option<u64> {
        self.smaps_sum(pid, |key| key == "Pss")
    }

    fn mem_rss_kb(&self, pid: Pid) -> Option<u64> {
        self.smaps_sum(pid, |key| key == "Rss")
    }
}
