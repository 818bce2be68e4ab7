// LOADSWEEP RESULT RECORDS
// ONE CSV ROW PER RUN CONFIGURATION. A RUN THAT FAILED BOTH ATTEMPTS KEEPS ITS
// IDENTITY COLUMNS AND GETS "FAILED" IN EVERY METRICS COLUMN, SO THE GRID STAYS
// COMPLETE FOR LATER ANALYSIS.
//
// THE LOG IS OPENED, APPENDED AND CLOSED PER ROW. A KILLED SWEEP LOSES NOTHING
// ALREADY MEASURED.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

use csv::WriterBuilder;

use crate::run::RunConfiguration;
use crate::sample::{CpuDelta, MemorySample};
use crate::wrk::WrkMetrics;

pub const FAILED: &str = "FAILED";

pub const HEADER: [&str; 27] = [
    "description",
    "asyncservice",
    "asyncdriver",
    "cpus_load",
    "cpus_service",
    "concurrency",
    "lat_avg",
    "lat_stdev",
    "lat_max",
    "req_avg",
    "req_stdev",
    "req_max",
    "tot_requests",
    "tot_duration",
    "read",
    "err_connect",
    "err_read",
    "err_write",
    "err_timeout",
    "req_sec_tot",
    "read_tot",
    "user_cpu",
    "kern_cpu",
    "mem_kb_uss",
    "mem_kb_pss",
    "mem_kb_rss",
    "duration",
];

const IDENTITY_COLUMNS: usize = 6;
const METRIC_COLUMNS: usize = HEADER.len() - IDENTITY_COLUMNS - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceUsage {
    pub cpu: CpuDelta,
    pub memory: MemorySample,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub metrics: WrkMetrics,
    pub resources: ResourceUsage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Measured(Measurement),
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub description: String,
    pub async_service: bool,
    pub async_driver: bool,
    pub cpus_load: usize,
    pub cpus_service: usize,
    pub concurrency: u32,
    pub outcome: Outcome,
    pub duration: Duration,
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

fn blank_or<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

impl ResultRecord {
    pub fn new(run: &RunConfiguration, outcome: Outcome, duration: Duration) -> Self {
        let target = run.target();
        Self {
            description: target.description.clone(),
            async_service: target.async_service,
            async_driver: target.async_driver,
            cpus_load: run.load_mask().cpu_count(),
            cpus_service: run.service_mask().cpu_count(),
            concurrency: run.concurrency(),
            outcome,
            duration,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed)
    }

    /// Row values in HEADER order.
    pub fn fields(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(HEADER.len());
        row.push(self.description.clone());
        row.push(yes_no(self.async_service).to_string());
        row.push(yes_no(self.async_driver).to_string());
        row.push(self.cpus_load.to_string());
        row.push(self.cpus_service.to_string());
        row.push(self.concurrency.to_string());
        match &self.outcome {
            Outcome::Measured(m) => {
                row.extend(m.metrics.fields());
                let (cpu, mem) = (m.resources.cpu, m.resources.memory);
                row.push(blank_or(cpu.user));
                row.push(blank_or(cpu.kernel));
                row.push(blank_or(mem.uss_kb));
                row.push(blank_or(mem.pss_kb));
                row.push(blank_or(mem.rss_kb));
            }
            Outcome::Failed => row.extend((0..METRIC_COLUMNS).map(|_| FAILED.to_string())),
        }
        row.push(self.duration.as_secs().to_string());
        row
    }
}

pub struct ResultLog {
    path: PathBuf,
}

impl ResultLog {
    /// Create the log and write the header row.
    pub fn create(path: impl Into<PathBuf>) -> csv::Result<Self> {
        let log = Self { path: path.into() };
        log.write_row(&HEADER)?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &ResultRecord) -> csv::Result<()> {
        self.write_row(&record.fields())
    }

    fn write_row<I, T>(&self, row: I) -> csv::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        let mut wtr = WriterBuilder::new().has_headers(false).from_writer(file);
        wtr.write_record(row)?;
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affinity::AffinityMask;
    use crate::run::TestTarget;
    use crate::wrk;

    fn run() -> RunConfiguration {
        let target = TestTarget {
            path: "app.jar".into(),
            description: "WebFlux R2DBC".into(),
            async_service: true,
            async_driver: false,
            command: vec![],
        };
        let load: AffinityMask = "3,5,7,9".parse().unwrap();
        let service: AffinityMask = "2,4".parse().unwrap();
        RunConfiguration::new(target, load, service, 50).unwrap()
    }

    #[test]
    fn failed_row_has_sentinel_in_every_metric_column() {
        let record = ResultRecord::new(&run(), Outcome::Failed, Duration::from_secs(60));
        let fields = record.fields();
        assert_eq!(fields.len(), HEADER.len());
        assert_eq!(&fields[..6], &["WebFlux R2DBC", "yes", "no", "4", "2", "50"]);
        assert!(fields[6..26].iter().all(|f| f == FAILED));
        assert_eq!(fields[26], "60");
    }

    #[test]
    fn measured_row() {
        let metrics = wrk::parse(
            "    Latency    10.00ms   2.00ms  20.00ms   70.00%\n\
             Transfer/sec:    1.50MB\n",
        );
        let resources = ResourceUsage {
            cpu: CpuDelta { user: Some(1500), kernel: None },
            memory: MemorySample { uss_kb: Some(1), pss_kb: Some(2), rss_kb: Some(3) },
        };
        let record = ResultRecord::new(
            &run(),
            Outcome::Measured(Measurement { metrics, resources }),
            Duration::from_secs(60),
        );
        let fields = record.fields();
        assert_eq!(fields.len(), HEADER.len());
        assert_eq!(&fields[6..9], &["10.0", "2.0", "20.0"]);
        assert_eq!(fields[20], "1572864.0");
        assert_eq!(&fields[21..26], &["1500", "", "1", "2", "3"]);
        assert!(!record.is_failed());
    }

    #[test]
    fn log_appends_after_header() {
        let dir = tempfile::tempdir().unwrap();
        let log = ResultLog::create(dir.path().join("results.log")).unwrap();
        let record = ResultRecord::new(&run(), Outcome::Failed, Duration::from_secs(60));
        log.append(&record).unwrap();
        log.append(&record).unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER.join(","));
        assert!(lines[1].starts_with("WebFlux R2DBC,yes,no,4,2,50,FAILED,"));
        assert!(lines[1].ends_with(",FAILED,60"));
        assert_eq!(lines[1], lines[2]);
    }
}
