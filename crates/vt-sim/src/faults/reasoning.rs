//! ---
//! vt_section: "02-simulation"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Ordered rule list classifying the fault root cause."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::EnumIter;

use super::{AlarmKind, FaultEngine, PersistenceMap};
use crate::telemetry::Telemetry;

/// Peak pressure below this reads as a depressurised circuit (cmH2O).
pub const LOW_PRESSURE_CMH2O: f64 = 5.0;
/// Absolute flow below this reads as no flow (L/s).
pub const NEAR_ZERO_FLOW_LPS: f64 = 0.05;
/// Tidal volume below this reads as an undelivered breath (L).
pub const LOW_TIDAL_VOLUME_L: f64 = 0.25;
/// Delivered FiO2 below this reads as a failing oxygen source.
pub const LOW_FIO2: f64 = 0.3;

/// Root-cause classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum FaultClass {
    Obstruction,
    Disconnect,
    OxygenSupplyFailure,
    SensorFault,
    Normal,
}

impl FaultClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultClass::Obstruction => "obstruction",
            FaultClass::Disconnect => "disconnect",
            FaultClass::OxygenSupplyFailure => "oxygen_supply_failure",
            FaultClass::SensorFault => "sensor_fault",
            FaultClass::Normal => "normal",
        }
    }

    pub fn root_cause(&self) -> &'static str {
        match self {
            FaultClass::Obstruction => "Airway obstruction or kinked circuit",
            FaultClass::Disconnect => "Circuit disconnect / major leak",
            FaultClass::OxygenSupplyFailure => "Oxygen supply failure or low O2 source",
            FaultClass::SensorFault => "Pressure sensor drift/fault (flow appears normal)",
            FaultClass::Normal => "none",
        }
    }

    pub fn recommended_action(&self) -> &'static str {
        match self {
            FaultClass::Obstruction => {
                "Check tubing/circuit for kinks, suction if needed, assess secretions."
            }
            FaultClass::Disconnect => {
                "Inspect patient circuit connections, check cuff seal, and verify leak source."
            }
            FaultClass::OxygenSupplyFailure => {
                "Verify wall O2 / cylinder pressure, check blender, and confirm FiO2 delivery."
            }
            FaultClass::SensorFault => {
                "Cross-check with backup sensor, recalibrate/replace pressure sensor."
            }
            FaultClass::Normal => {
                "Continue monitoring; adjust ventilator settings per protocol if needed."
            }
        }
    }
}

impl fmt::Display for FaultClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean signal patterns the rules are written against.
///
/// `high_pressure`, `high_leak` and `low_spo2` are already gated by the
/// persistence of their alarm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FaultSignals {
    pub high_pressure: bool,
    pub low_pressure: bool,
    pub low_flow: bool,
    pub low_tidal_volume: bool,
    pub high_leak: bool,
    pub low_spo2: bool,
    pub low_fio2: bool,
}

/// One entry of the classification list.
#[derive(Debug, Clone, Copy)]
pub struct FaultRule {
    pub class: FaultClass,
    pub matches: fn(&FaultSignals) -> bool,
}

/// Rules in priority order. The first match wins; no match is `normal`.
pub const FAULT_RULES: [FaultRule; 4] = [
    FaultRule {
        class: FaultClass::Obstruction,
        matches: |s| s.high_pressure && s.low_flow,
    },
    FaultRule {
        class: FaultClass::Disconnect,
        matches: |s| s.low_pressure && s.low_tidal_volume && s.high_leak,
    },
    FaultRule {
        class: FaultClass::OxygenSupplyFailure,
        matches: |s| s.low_spo2 && s.low_fio2,
    },
    FaultRule {
        class: FaultClass::SensorFault,
        matches: |s| (s.high_pressure || s.low_pressure) && !s.low_flow,
    },
];

/// Classification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FaultDiagnosis {
    pub class: FaultClass,
    pub root_cause: &'static str,
}

impl FaultDiagnosis {
    pub fn classify(signals: &FaultSignals) -> Self {
        let class = FAULT_RULES
            .iter()
            .find(|rule| (rule.matches)(signals))
            .map(|rule| rule.class)
            .unwrap_or(FaultClass::Normal);
        Self {
            class,
            root_cause: class.root_cause(),
        }
    }
}

impl FaultEngine {
    pub fn fault_signals(&self, telemetry: &Telemetry, persistence: &PersistenceMap) -> FaultSignals {
        let thr = &self.thresholds;
        FaultSignals {
            high_pressure: telemetry.pip_cmh2o > thr.pip_high_cmh2o
                && persistence.is_persistent(AlarmKind::PipHigh),
            low_pressure: telemetry.pip_cmh2o < LOW_PRESSURE_CMH2O,
            low_flow: telemetry.flow_lps.abs() < NEAR_ZERO_FLOW_LPS,
            low_tidal_volume: telemetry.tidal_volume_l < LOW_TIDAL_VOLUME_L,
            high_leak: telemetry.leak_pct > thr.leak_high_pct
                && persistence.is_persistent(AlarmKind::LeakHigh),
            low_spo2: telemetry.spo2_pct < thr.spo2_low_pct
                && persistence.is_persistent(AlarmKind::Spo2Low),
            low_fio2: telemetry.fio2 < LOW_FIO2,
        }
    }

    pub fn reason_fault(&self, telemetry: &Telemetry, persistence: &PersistenceMap) -> FaultDiagnosis {
        FaultDiagnosis::classify(&self.fault_signals(telemetry, persistence))
    }
}
