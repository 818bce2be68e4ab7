pub mod affinity;
pub mod config;
pub mod controller;
pub mod error;
pub mod executor;
pub mod logging;
pub mod process;
pub mod record;
pub mod run;
pub mod sample;
pub mod sweep;
pub mod units;
pub mod wrk;
