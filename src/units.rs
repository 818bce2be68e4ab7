// LOADSWEEP UNIT NORMALIZER
// CONVERTS SUFFIXED wrk TOKENS ("766.79KB", "1.20k", "58.53ms") INTO BASE UNITS:
// BYTES, RAW COUNTS, MILLISECONDS. SUFFIXES ARE CASE-INSENSITIVE.
//
// A TOKEN WITHOUT A NUMERIC PREFIX COMES BACK UNCHANGED AS Quantity::Raw, SO A
// PARSE MISS SHOWS UP IN THE RESULTS INSTEAD OF ABORTING THE PARSE.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

const KIB: f64 = 1024.0;
const MIB: f64 = KIB * 1024.0;
const GIB: f64 = MIB * 1024.0;

// KNOWN DEFECT, KEPT FOR COMPATIBILITY WITH EXISTING RESULT LOGS:
// TB/TIB AND PB/PIB SCALE AS GIB INSTEAD OF 2^40 / 2^50.
const TIB_LEGACY: f64 = GIB;
const PIB_LEGACY: f64 = GIB;

// BYTE TOKENS MUST CARRY A SUFFIX, COUNT AND TIME TOKENS MAY OMIT IT
static SUFFIX_REQUIRED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+\.*\d*)(\w+)$").expect("static regex"));
static SUFFIX_OPTIONAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+\.*\d*)(\w*)$").expect("static regex"));

/// A normalized value, or the source token when it could not be read as a number.
#[derive(Debug, Clone, PartialEq)]
pub enum Quantity {
    Value(f64),
    Raw(String),
}

impl Quantity {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            Self::Raw(_) => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Self::Value(v) if *v == 0.0)
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::Value(0.0)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // DEBUG FORMAT KEEPS THE DECIMAL POINT ON WHOLE VALUES (10.0, NOT 10)
            Self::Value(v) => write!(f, "{:?}", v),
            Self::Raw(s) => f.write_str(s),
        }
    }
}

fn split(token: &str, shape: &Regex) -> Option<(f64, String)> {
    let caps = shape.captures(token)?;
    let number = caps[1].parse::<f64>().ok()?;
    Some((number, caps[2].to_ascii_lowercase()))
}

/// Byte sizes: b, kb/kib, mb/mib, gb/gib, tb/tib, pb/pib.
pub fn bytes(token: &str) -> Quantity {
    let Some((n, suffix)) = split(token, &SUFFIX_REQUIRED) else {
        return Quantity::Raw(token.to_string());
    };
    let scale = match suffix.as_str() {
        "b" => 1.0,
        "kb" | "kib" => KIB,
        "mb" | "mib" => MIB,
        "gb" | "gib" => GIB,
        "tb" | "tib" => TIB_LEGACY,
        "pb" | "pib" => PIB_LEGACY,
        _ => return Quantity::Raw(token.to_string()),
    };
    Quantity::Value(n * scale)
}

/// SI-scaled counts: k, m, g, t, p. Anything else is taken as a plain number.
pub fn count(token: &str) -> Quantity {
    let Some((n, suffix)) = split(token, &SUFFIX_OPTIONAL) else {
        return Quantity::Raw(token.to_string());
    };
    let scale = match suffix.as_str() {
        "k" => 1e3,
        "m" => 1e6,
        "g" => 1e9,
        "t" => 1e12,
        "p" => 1e15,
        _ => 1.0,
    };
    Quantity::Value(n * scale)
}

/// Durations in milliseconds: us, ms, s, m, h. Anything else is taken as milliseconds.
pub fn millis(token: &str) -> Quantity {
    let Some((n, suffix)) = split(token, &SUFFIX_OPTIONAL) else {
        return Quantity::Raw(token.to_string());
    };
    let ms = match suffix.as_str() {
        "us" => n / 1000.0,
        "ms" => n,
        "s" => n * 1000.0,
        "m" => n * 60_000.0,
        "h" => n * 3_600_000.0,
        _ => n,
    };
    Quantity::Value(ms)
}
