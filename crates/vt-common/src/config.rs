//! ---
//! vt_section: "01-core-functionality"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Shared primitives and utilities for the twin runtime."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

/// Shortest tick a twin session runs with; smaller requests are raised to it.
pub const MIN_DT_S: f64 = 0.05;

fn default_dt_s() -> f64 {
    0.2
}

fn default_persist_seconds() -> f64 {
    5.0
}

fn default_duration_s() -> f64 {
    60.0
}

fn default_steps_per_refresh() -> usize {
    5
}

fn default_report_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_ards_severity() -> f64 {
    0.6
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object for a twin session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub patient: PatientConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub controls: ControlsConfig,
    #[serde(default)]
    pub events: Vec<ControlEventConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "VT_CONFIG";

    /// Load configuration from disk, respecting the `VT_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.simulation.validate()?;
        self.patient.validate()?;
        self.thresholds.validate()?;
        for (index, event) in self.events.iter().enumerate() {
            if !event.at_s.is_finite() || event.at_s < 0.0 {
                return Err(anyhow!(
                    "event #{} has invalid start time {}",
                    index,
                    event.at_s
                ));
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_dt_s")]
    pub dt_s: f64,
    #[serde(default = "default_persist_seconds")]
    pub persist_seconds: f64,
    #[serde(default = "default_duration_s")]
    pub duration_s: f64,
    #[serde(default = "default_steps_per_refresh")]
    pub steps_per_refresh: usize,
    #[serde(default)]
    pub realtime: bool,
    #[serde(default = "default_report_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub report_interval: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt_s: default_dt_s(),
            persist_seconds: default_persist_seconds(),
            duration_s: default_duration_s(),
            steps_per_refresh: default_steps_per_refresh(),
            realtime: false,
            report_interval: default_report_interval(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.dt_s.is_finite() || self.dt_s <= 0.0 {
            return Err(anyhow!("simulation.dt_s must be positive, got {}", self.dt_s));
        }
        let effective_dt = self.dt_s.max(MIN_DT_S);
        if !self.persist_seconds.is_finite() || self.persist_seconds < effective_dt {
            return Err(anyhow!(
                "simulation.persist_seconds ({}) must cover at least one tick ({})",
                self.persist_seconds,
                effective_dt
            ));
        }
        if !self.duration_s.is_finite() || self.duration_s < 0.0 {
            return Err(anyhow!(
                "simulation.duration_s must be non-negative, got {}",
                self.duration_s
            ));
        }
        if self.steps_per_refresh == 0 {
            return Err(anyhow!("simulation.steps_per_refresh must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientConfig {
    #[serde(default = "default_ards_severity")]
    pub ards_severity: f64,
}

impl Default for PatientConfig {
    fn default() -> Self {
        Self {
            ards_severity: default_ards_severity(),
        }
    }
}

impl PatientConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.ards_severity) {
            return Err(anyhow!(
                "patient.ards_severity must lie in [0, 1], got {}",
                self.ards_severity
            ));
        }
        Ok(())
    }
}

/// Static alarm limits, immutable for the lifetime of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub pip_high_cmh2o: f64,
    pub plateau_high_cmh2o: f64,
    pub spo2_low_pct: f64,
    pub etco2_low_mmhg: f64,
    pub etco2_high_mmhg: f64,
    pub leak_high_pct: f64,
    pub battery_low_pct: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            pip_high_cmh2o: 40.0,
            plateau_high_cmh2o: 30.0,
            spo2_low_pct: 90.0,
            etco2_low_mmhg: 25.0,
            etco2_high_mmhg: 55.0,
            leak_high_pct: 20.0,
            battery_low_pct: 20.0,
        }
    }
}

impl ThresholdConfig {
    pub fn validate(&self) -> Result<()> {
        let limits = [
            ("pip_high_cmh2o", self.pip_high_cmh2o),
            ("plateau_high_cmh2o", self.plateau_high_cmh2o),
            ("spo2_low_pct", self.spo2_low_pct),
            ("etco2_low_mmhg", self.etco2_low_mmhg),
            ("etco2_high_mmhg", self.etco2_high_mmhg),
            ("leak_high_pct", self.leak_high_pct),
            ("battery_low_pct", self.battery_low_pct),
        ];
        if let Some((name, value)) = limits.iter().find(|(_, v)| !v.is_finite()) {
            return Err(anyhow!("thresholds.{} must be finite, got {}", name, value));
        }
        if self.etco2_low_mmhg >= self.etco2_high_mmhg {
            return Err(anyhow!(
                "thresholds.etco2_low_mmhg ({}) must be below etco2_high_mmhg ({})",
                self.etco2_low_mmhg,
                self.etco2_high_mmhg
            ));
        }
        Ok(())
    }
}

/// Initial operator controls for a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub fio2: f64,
    pub inspiratory_flow_lps: f64,
    pub pressure_target_cmh2o: f64,
    pub leak_pct: f64,
    pub compliance_l_per_cmh2o: f64,
    pub sensor_drift_pct: f64,
    pub respiratory_rate_bpm: f64,
    pub blower_speed_pct: f64,
    pub valve_delay_s: f64,
    pub oxygen_supply_ok: bool,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            fio2: 0.5,
            inspiratory_flow_lps: 0.5,
            pressure_target_cmh2o: 20.0,
            leak_pct: 0.0,
            compliance_l_per_cmh2o: 0.05,
            sensor_drift_pct: 0.0,
            respiratory_rate_bpm: 16.0,
            blower_speed_pct: 55.0,
            valve_delay_s: 0.0,
            oxygen_supply_ok: true,
        }
    }
}

/// Timed control override. Unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlEventConfig {
    pub at_s: f64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub fio2: Option<f64>,
    #[serde(default)]
    pub inspiratory_flow_lps: Option<f64>,
    #[serde(default)]
    pub pressure_target_cmh2o: Option<f64>,
    #[serde(default)]
    pub leak_pct: Option<f64>,
    #[serde(default)]
    pub compliance_l_per_cmh2o: Option<f64>,
    #[serde(default)]
    pub sensor_drift_pct: Option<f64>,
    #[serde(default)]
    pub respiratory_rate_bpm: Option<f64>,
    #[serde(default)]
    pub blower_speed_pct: Option<f64>,
    #[serde(default)]
    pub valve_delay_s: Option<f64>,
    #[serde(default)]
    pub oxygen_supply_ok: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: AppConfig = "".parse().unwrap();
        assert_eq!(config.simulation.dt_s, 0.2);
        assert_eq!(config.simulation.persist_seconds, 5.0);
        assert_eq!(config.patient.ards_severity, 0.6);
        assert_eq!(config.thresholds, ThresholdConfig::default());
        assert_eq!(config.controls, ControlsConfig::default());
        assert!(config.events.is_empty());
        assert_eq!(config.logging.format, LogFormat::StructuredJson);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config: AppConfig = r#"
            [thresholds]
            pip_high_cmh2o = 35.0

            [controls]
            leak_pct = 12.5
        "#
        .parse()
        .unwrap();
        assert_eq!(config.thresholds.pip_high_cmh2o, 35.0);
        assert_eq!(config.thresholds.plateau_high_cmh2o, 30.0);
        assert_eq!(config.controls.leak_pct, 12.5);
        assert!(config.controls.oxygen_supply_ok);
    }

    #[test]
    fn events_parse_with_sparse_overrides() {
        let config: AppConfig = r#"
            [[events]]
            at_s = 30.0
            label = "circuit leak"
            leak_pct = 40.0
            oxygen_supply_ok = false
        "#
        .parse()
        .unwrap();
        let event = &config.events[0];
        assert_eq!(event.at_s, 30.0);
        assert_eq!(event.leak_pct, Some(40.0));
        assert_eq!(event.oxygen_supply_ok, Some(false));
        assert_eq!(event.fio2, None);
    }

    #[test]
    fn report_interval_reads_whole_seconds() {
        let config: AppConfig = "[simulation]\nreport_interval = 2\n".parse().unwrap();
        assert_eq!(config.simulation.report_interval, Duration::from_secs(2));
    }

    #[test]
    fn rejects_inverted_etco2_band() {
        let err = "[thresholds]\netco2_low_mmhg = 60.0\n"
            .parse::<AppConfig>()
            .unwrap_err();
        assert!(err.to_string().contains("etco2_low_mmhg"));
    }

    #[test]
    fn rejects_out_of_range_patient() {
        assert!("[patient]\nards_severity = 1.5\n"
            .parse::<AppConfig>()
            .is_err());
    }

    #[test]
    fn rejects_window_shorter_than_tick() {
        assert!("[simulation]\ndt_s = 0.5\npersist_seconds = 0.1\n"
            .parse::<AppConfig>()
            .is_err());
    }

    #[test]
    fn window_is_checked_against_the_raised_tick() {
        assert!("[simulation]\ndt_s = 0.01\npersist_seconds = 0.03\n"
            .parse::<AppConfig>()
            .is_err());
        assert!("[simulation]\ndt_s = 0.01\npersist_seconds = 0.05\n"
            .parse::<AppConfig>()
            .is_ok());
    }

    #[test]
    fn rejects_negative_event_time() {
        assert!("[[events]]\nat_s = -1.0\n".parse::<AppConfig>().is_err());
    }
}
