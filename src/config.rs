// LOADSWEEP SWEEP CONFIGURATION
// ONE EXPLICIT STRUCT, LOADED FROM TOML. EVERY FIELD HAS A DEFAULT AND THE
// DEFAULTS ARE THE REFERENCE GRID: FOUR SPRING BOOT JARS, ONE LOAD MASK,
// ONE SERVICE MASK, SIXTEEN CONCURRENCY LEVELS, 60S MEASUREMENTS.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::affinity::AffinityMask;
use crate::run::TestTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub measure_secs: u64,
    pub primer_secs: u64,
    pub settle_after_primer_secs: u64,
    pub startup_secs: u64,
    pub after_kill_secs: u64,
    pub retry_backoff_secs: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            measure_secs: 60,
            primer_secs: 2,
            settle_after_primer_secs: 1,
            startup_secs: 10,
            after_kill_secs: 2,
            retry_backoff_secs: 10,
        }
    }
}

impl Timing {
    pub fn measure(&self) -> Duration {
        Duration::from_secs(self.measure_secs)
    }

    pub fn primer(&self) -> Duration {
        Duration::from_secs(self.primer_secs)
    }

    pub fn settle_after_primer(&self) -> Duration {
        Duration::from_secs(self.settle_after_primer_secs)
    }

    pub fn startup(&self) -> Duration {
        Duration::from_secs(self.startup_secs)
    }

    pub fn after_kill(&self) -> Duration {
        Duration::from_secs(self.after_kill_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub binary: String,
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            binary: "wrk".to_string(),
            url: "http://localhost:8080/people".to_string(),
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub launcher: Vec<String>,
    pub process_pattern: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            launcher: ["java", "-Xmx2g", "-Xms2g", "-jar"]
                .map(String::from)
                .to_vec(),
            process_pattern: r"(^|/)java\b.*-SNAPSHOT.*\.jar".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TargetConfig {
    pub path: PathBuf,
    pub description: String,
    #[serde(default)]
    pub async_service: bool,
    #[serde(default)]
    pub async_driver: bool,
    #[serde(default)]
    pub command: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub results_dir: PathBuf,
    pub timing: Timing,
    pub generator: GeneratorConfig,
    pub service: ServiceConfig,
    pub load_cpus: Vec<AffinityMask>,
    pub service_cpus: Vec<AffinityMask>,
    pub concurrency: Vec<u32>,
    pub targets: Vec<TargetConfig>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        let mask = |s: &str| s.parse::<AffinityMask>().expect("static cpu list");
        let jar = |name: &str, description: &str, async_service, async_driver| TargetConfig {
            path: PathBuf::from(format!("../test_apps/{}-0.0.1-SNAPSHOT.jar", name)),
            description: description.to_string(),
            async_service,
            async_driver,
            command: None,
        };
        Self {
            results_dir: PathBuf::from("."),
            timing: Timing::default(),
            generator: GeneratorConfig::default(),
            service: ServiceConfig::default(),
            load_cpus: vec![mask("3,5,7,9")],
            service_cpus: vec![mask("2,4,6,8")],
            concurrency: vec![
                4, 50, 100, 150, 200, 250, 300, 350, 400, 450, 500, 600, 700, 800, 900, 1000,
            ],
            targets: vec![
                jar("sb_jpa_hikari_jdbc", "Web MVC JDBC", false, false),
                jar("sb_webflux_r2dbcpool_r2dbc", "WebFlux R2DBC", true, true),
                jar("sb_jpa_r2dbcpool_r2dbc", "Web MVC R2DBC", false, true),
                jar("sb_webflux_jpa_hikari_jdbc", "WebFlux JDBC", true, false),
            ],
        }
    }
}

impl SweepConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("failed to parse {} as TOML", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        anyhow::ensure!(!config.service.process_pattern.is_empty(), "service.process_pattern is empty");
        Ok(config)
    }

    /// Resolved targets: the per-target command, or launcher + path.
    pub fn targets(&self) -> Vec<TestTarget> {
        self.targets
            .iter()
            .map(|t| {
                let command = t.command.clone().unwrap_or_else(|| {
                    let mut argv = self.service.launcher.clone();
                    argv.push(t.path.display().to_string());
                    argv
                });
                TestTarget {
                    path: t.path.clone(),
                    description: t.description.clone(),
                    async_service: t.async_service,
                    async_driver: t.async_driver,
                    command,
                }
            })
            .collect()
    }

    /// Target paths that do not exist on disk.
    pub fn missing_targets(&self) -> Vec<&Path> {
        self.targets
            .iter()
            .map(|t| t.path.as_path())
            .filter(|p| !p.is_file())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_reference_grid() {
        let c = SweepConfig::default();
        assert_eq!(c.timing.measure(), Duration::from_secs(60));
        assert_eq!(c.timing.primer(), Duration::from_secs(2));
        assert_eq!(c.concurrency.len(), 16);
        assert_eq!(c.targets.len(), 4);
        assert_eq!(c.load_cpus[0].cpu_count(), 4);
        assert_eq!(c.generator.timeout_secs, 20);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let c = SweepConfig::from_toml(
            r#"
            concurrency = [8, 16]
            load_cpus = ["0-1"]

            [timing]
            measure_secs = 5

            [[targets]]
            path = "/opt/app.jar"
            description = "App"
            async_service = true
            "#,
        )
        .unwrap();
        assert_eq!(c.concurrency, vec![8, 16]);
        assert_eq!(c.load_cpus[0].cpus(), &[0, 1]);
        assert_eq!(c.service_cpus, SweepConfig::default().service_cpus);
        assert_eq!(c.timing.measure_secs, 5);
        assert_eq!(c.timing.primer_secs, 2);
        assert_eq!(c.generator, GeneratorConfig::default());
        assert!(c.targets[0].async_service);
        assert!(!c.targets[0].async_driver);
    }

    #[test]
    fn shipped_sweep_file_is_reference_grid() {
        let c = SweepConfig::load(concat!(env!("CARGO_MANIFEST_DIR"), "/sweep.toml")).unwrap();
        assert_eq!(c, SweepConfig::default());
    }

    #[test]
    fn missing_file_names_path() {
        let err = SweepConfig::load("/nonexistent/sweep.toml").unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/sweep.toml"));
    }

    #[test]
    fn bad_mask_is_rejected() {
        let err = SweepConfig::from_toml(r#"load_cpus = ["3-1"]"#).unwrap_err();
        assert!(format!("{:#}", err).contains("reversed cpu range"));
    }

    #[test]
    fn oversized_range_is_an_error() {
        let err = SweepConfig::from_toml(r#"load_cpus = ["0-18446744073709551615"]"#).unwrap_err();
        assert!(format!("{:#}", err).contains("exceeds the affinity set size"));
    }

    #[test]
    fn target_command_resolution() {
        let c = SweepConfig::from_toml(
            r#"
            [[targets]]
            path = "a.jar"
            description = "A"

            [[targets]]
            path = "b"
            description = "B"
            command = ["./b", "--port", "8080"]
            "#,
        )
        .unwrap();
        let targets = c.targets();
        assert_eq!(targets[0].command, vec!["java", "-Xmx2g", "-Xms2g", "-jar", "a.jar"]);
        assert_eq!(targets[1].command, vec!["./b", "--port", "8080"]);
    }

    #[test]
    fn missing_targets_reported() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.jar");
        std::fs::write(&present, b"").unwrap();
        let mut c = SweepConfig::default();
        c.targets.truncate(1);
        c.targets[0].path = present;
        c.targets.push(TargetConfig {
            path: dir.path().join("absent.jar"),
            description: "Absent".into(),
            async_service: false,
            async_driver: false,
            command: None,
        });
        let missing = c.missing_targets();
        assert_eq!(missing, vec![dir.path().join("absent.jar").as_path()]);
    }
}
