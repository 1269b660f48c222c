//! ---
//! vt_section: "02-simulation"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Fault injection, gas exchange, alarms, and causal reasoning."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
//! The fault engine is a pipeline of pure stages. Each stage takes the
//! telemetry produced by the previous one and returns a new value; the
//! engine itself only carries static thresholds and the persistence window.

use serde::{Deserialize, Serialize};
use vt_common::{clamp, ticks_for, ThresholdConfig};

mod alarms;
mod explain;
mod gases;
mod persistence;
mod reasoning;
mod sensor;
mod severity;

pub use alarms::{Alarm, AlarmFlags, AlarmKind, AlarmSeverity};
pub use explain::{Explanation, Urgency};
pub use persistence::{PersistenceMap, PERSISTENCE_FRACTION};
pub use reasoning::{FaultClass, FaultDiagnosis, FaultRule, FaultSignals, FAULT_RULES};
pub use severity::{SeverityAssessment, SeverityLevel};

/// Static alarm limits. Immutable for the lifetime of an engine.
pub type AlarmThresholds = ThresholdConfig;

/// Externally injected fault magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaultControls {
    pub leak_pct: f64,
    pub sensor_drift_pct: f64,
    pub valve_delay_s: f64,
    pub oxygen_supply_ok: bool,
}

impl Default for FaultControls {
    fn default() -> Self {
        Self {
            leak_pct: 0.0,
            sensor_drift_pct: 0.0,
            valve_delay_s: 0.0,
            oxygen_supply_ok: true,
        }
    }
}

/// Patient-specific severity context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatientRiskFactors {
    /// 0 is a healthy lung, 1 the most severe ARDS.
    pub ards_severity: f64,
}

impl Default for PatientRiskFactors {
    fn default() -> Self {
        Self { ards_severity: 0.6 }
    }
}

impl PatientRiskFactors {
    pub(crate) fn severity(&self) -> f64 {
        clamp(self.ards_severity, 0.0, 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct FaultEngine {
    thresholds: AlarmThresholds,
    dt_s: f64,
    persist_seconds: f64,
    window_len: usize,
}

impl FaultEngine {
    /// Build an engine for a fixed tick length and persistence window.
    ///
    /// The window is floored at one tick.
    pub fn new(thresholds: AlarmThresholds, dt_s: f64, persist_seconds: f64) -> Self {
        let dt_s = dt_s.max(1e-3);
        let persist_seconds = persist_seconds.max(dt_s);
        Self {
            thresholds,
            dt_s,
            persist_seconds,
            window_len: ticks_for(persist_seconds, dt_s),
        }
    }

    pub fn thresholds(&self) -> &AlarmThresholds {
        &self.thresholds
    }

    pub fn dt_s(&self) -> f64 {
        self.dt_s
    }

    pub fn persist_seconds(&self) -> f64 {
        self.persist_seconds
    }

    /// Number of trailing history records inspected by temporal validation.
    pub fn window_len(&self) -> usize {
        self.window_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_covers_persistence_seconds() {
        let engine = FaultEngine::new(AlarmThresholds::default(), 0.2, 5.0);
        assert_eq!(engine.window_len(), 25);
        let engine = FaultEngine::new(AlarmThresholds::default(), 0.5, 5.0);
        assert_eq!(engine.window_len(), 10);
    }

    #[test]
    fn window_is_at_least_one_tick() {
        let engine = FaultEngine::new(AlarmThresholds::default(), 0.2, 0.0);
        assert_eq!(engine.window_len(), 1);
        assert_eq!(engine.persist_seconds(), 0.2);
    }
}
