// LOADSWEEP wrk OUTPUT PARSER
// A TABLE OF LINE SHAPES OVER wrk'S TEXT REPORT. EACH RULE OWNS ONE SHAPE AND THE
// FIELDS IT FILLS. LINES MATCHING NO RULE ARE IGNORED.
//
//   Thread Stats   Avg      Stdev     Max   +/- Stdev
//     Latency    58.53ms    6.42ms  69.83ms   62.50%
//     Req/Sec    16.00      5.16    20.00     60.00%
//   16 requests in 1.00s, 766.79KB read
//   Socket errors: connect 3076, read 0, write 0, timeout 0
// Requests/sec:    135.86
// Transfer/sec:    422.62KB
//
// wrk OMITS THE SOCKET ERRORS LINE WHEN THERE WERE NONE, SO THE FOUR ERROR
// COUNTERS DEFAULT TO ZERO. EVERY OTHER FIELD STAYS ABSENT WHEN ITS LINE IS.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::units::{self, Quantity};

/// Column names, in results-log order.
pub const FIELD_NAMES: [&str; 15] = [
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
];

/// Metrics extracted from one wrk run. Latencies and durations are in
/// milliseconds, rates and counts are raw numbers, sizes are bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WrkMetrics {
    pub lat_avg: Option<Quantity>,
    pub lat_stdev: Option<Quantity>,
    pub lat_max: Option<Quantity>,
    pub req_avg: Option<Quantity>,
    pub req_stdev: Option<Quantity>,
    pub req_max: Option<Quantity>,
    pub tot_requests: Option<Quantity>,
    pub tot_duration: Option<Quantity>,
    pub read: Option<Quantity>,
    pub err_connect: Quantity,
    pub err_read: Quantity,
    pub err_write: Quantity,
    pub err_timeout: Quantity,
    /// False when the report had no "Socket errors" line and the counters are defaults.
    pub errors_reported: bool,
    pub req_sec_tot: Option<Quantity>,
    pub read_tot: Option<Quantity>,
}

impl WrkMetrics {
    /// True when either byte total reads exactly zero.
    pub fn nothing_read(&self) -> bool {
        [&self.read, &self.read_tot]
            .into_iter()
            .any(|q| q.as_ref().is_some_and(Quantity::is_zero))
    }

    /// Name of the first required field the report did not contain.
    pub fn first_missing(&self) -> Option<&'static str> {
        let required = [
            ("lat_avg", &self.lat_avg),
            ("lat_stdev", &self.lat_stdev),
            ("lat_max", &self.lat_max),
            ("req_avg", &self.req_avg),
            ("req_stdev", &self.req_stdev),
            ("req_max", &self.req_max),
            ("tot_requests", &self.tot_requests),
            ("tot_duration", &self.tot_duration),
            ("read", &self.read),
            ("req_sec_tot", &self.req_sec_tot),
            ("read_tot", &self.read_tot),
        ];
        required
            .into_iter()
            .find(|(_, q)| q.is_none())
            .map(|(name, _)| name)
    }

    /// Values in FIELD_NAMES order. Absent fields render empty.
    pub fn fields(&self) -> [String; 15] {
        fn opt(q: &Option<Quantity>) -> String {
            q.as_ref().map(ToString::to_string).unwrap_or_default()
        }
        // DEFAULTED COUNTERS RENDER AS INTEGER 0, MATCHING EXISTING RESULT LOGS
        let err = |q: &Quantity| {
            if self.errors_reported {
                q.to_string()
            } else {
                "0".to_string()
            }
        };
        [
            opt(&self.lat_avg),
            opt(&self.lat_stdev),
            opt(&self.lat_max),
            opt(&self.req_avg),
            opt(&self.req_stdev),
            opt(&self.req_max),
            opt(&self.tot_requests),
            opt(&self.tot_duration),
            opt(&self.read),
            err(&self.err_connect),
            err(&self.err_read),
            err(&self.err_write),
            err(&self.err_timeout),
            opt(&self.req_sec_tot),
            opt(&self.read_tot),
        ]
    }
}

// ACCUMULATES WHILE SCANNING. ONLY finish() HANDS OUT A WrkMetrics.
#[derive(Default)]
struct MetricsBuilder {
    metrics: WrkMetrics,
    err_connect: Option<Quantity>,
    err_read: Option<Quantity>,
    err_write: Option<Quantity>,
    err_timeout: Option<Quantity>,
}

impl MetricsBuilder {
    fn finish(self) -> WrkMetrics {
        let errors_reported = [
            &self.err_connect,
            &self.err_read,
            &self.err_write,
            &self.err_timeout,
        ]
        .iter()
        .any(|q| q.is_some());
        WrkMetrics {
            errors_reported,
            err_connect: self.err_connect.unwrap_or_default(),
            err_read: self.err_read.unwrap_or_default(),
            err_write: self.err_write.unwrap_or_default(),
            err_timeout: self.err_timeout.unwrap_or_default(),
            ..self.metrics
        }
    }
}

struct LineRule {
    name: &'static str,
    shape: Regex,
    apply: fn(&Captures<'_>, &mut MetricsBuilder),
}

impl LineRule {
    fn new(
        name: &'static str,
        shape: &str,
        apply: fn(&Captures<'_>, &mut MetricsBuilder),
    ) -> Self {
        Self {
            name,
            shape: Regex::new(shape).expect("static regex"),
            apply,
        }
    }
}

static RULES: LazyLock<Vec<LineRule>> = LazyLock::new(|| {
    vec![
        LineRule::new(
            "latency",
            r"^\s+Latency\s+(\d+\.\d+\w*)\s+(\d+\.\d+\w*)\s+(\d+\.\d+\w*)",
            |c, b| {
                b.metrics.lat_avg = Some(units::millis(&c[1]));
                b.metrics.lat_stdev = Some(units::millis(&c[2]));
                b.metrics.lat_max = Some(units::millis(&c[3]));
            },
        ),
        LineRule::new(
            "req/sec",
            r"^\s+Req/Sec\s+(\d+\.\d+\w*)\s+(\d+\.\d+\w*)\s+(\d+\.\d+\w*)",
            |c, b| {
                b.metrics.req_avg = Some(units::count(&c[1]));
                b.metrics.req_stdev = Some(units::count(&c[2]));
                b.metrics.req_max = Some(units::count(&c[3]));
            },
        ),
        LineRule::new(
            "totals",
            r"^\s+(\d+) requests in (\d+\.\d+\w*), (\d+\.\d+\w*) read",
            |c, b| {
                b.metrics.tot_requests = Some(units::count(&c[1]));
                b.metrics.tot_duration = Some(units::millis(&c[2]));
                b.metrics.read = Some(units::bytes(&c[3]));
            },
        ),
        LineRule::new("requests/sec", r"^Requests/sec:\s+(\d+\.*\d*)", |c, b| {
            b.metrics.req_sec_tot = Some(units::count(&c[1]));
        }),
        LineRule::new("transfer/sec", r"^Transfer/sec:\s+(\d+\.*\d*\w+)", |c, b| {
            b.metrics.read_tot = Some(units::bytes(&c[1]));
        }),
        LineRule::new(
            "socket errors",
            r"^\s+Socket errors: connect (\d+\w*), read (\d+\w*), write (\d+\w*), timeout (\d+\w*)",
            |c, b| {
                b.err_connect = Some(units::count(&c[1]));
                b.err_read = Some(units::count(&c[2]));
                b.err_write = Some(units::count(&c[3]));
                b.err_timeout = Some(units::count(&c[4]));
            },
        ),
    ]
});

/// Parse the full stdout of one wrk invocation.
pub fn parse(output: &str) -> WrkMetrics {
    let mut builder = MetricsBuilder::default();
    for line in output.lines() {
        debug!("wrk output: {}", line);
        for rule in RULES.iter() {
            if let Some(caps) = rule.shape.captures(line) {
                debug!(rule = rule.name, "matched");
                (rule.apply)(&caps, &mut builder);
            }
        }
    }
    builder.finish()
}
