//! ---
//! vt_section: "02-simulation"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Threshold alarm evaluation."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{EnumCount, EnumIter, IntoEnumIterator};

use super::FaultEngine;
use crate::telemetry::Telemetry;

/// Severity tier attached to an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmSeverity {
    Warning,
    High,
    Critical,
}

impl AlarmSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmSeverity::Warning => "warning",
            AlarmSeverity::High => "high",
            AlarmSeverity::Critical => "critical",
        }
    }

    /// Contribution of the tier to the composite severity score.
    pub fn weight(&self) -> f64 {
        match self {
            AlarmSeverity::Warning => 0.3,
            AlarmSeverity::High => 0.7,
            AlarmSeverity::Critical => 1.0,
        }
    }
}

impl fmt::Display for AlarmSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The seven threshold checks, in evaluation order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumCount,
)]
pub enum AlarmKind {
    PipHigh,
    PlateauHigh,
    Spo2Low,
    Etco2Low,
    Etco2High,
    LeakHigh,
    BatteryLow,
}

impl AlarmKind {
    pub fn name(&self) -> &'static str {
        match self {
            AlarmKind::PipHigh => "PIP High",
            AlarmKind::PlateauHigh => "Plateau High",
            AlarmKind::Spo2Low => "SpO2 Low",
            AlarmKind::Etco2Low => "EtCO2 Low",
            AlarmKind::Etco2High => "EtCO2 High",
            AlarmKind::LeakHigh => "Leak High",
            AlarmKind::BatteryLow => "Battery Low",
        }
    }

    /// Key of the boolean flag stored in history records.
    pub fn flag_key(&self) -> &'static str {
        match self {
            AlarmKind::PipHigh => "alarm_pip_high",
            AlarmKind::PlateauHigh => "alarm_plateau_high",
            AlarmKind::Spo2Low => "alarm_spo2_low",
            AlarmKind::Etco2Low => "alarm_etco2_low",
            AlarmKind::Etco2High => "alarm_etco2_high",
            AlarmKind::LeakHigh => "alarm_leak_high",
            AlarmKind::BatteryLow => "alarm_battery_low",
        }
    }

    pub fn severity(&self) -> AlarmSeverity {
        match self {
            AlarmKind::PipHigh | AlarmKind::Spo2Low => AlarmSeverity::Critical,
            AlarmKind::BatteryLow => AlarmSeverity::Warning,
            _ => AlarmSeverity::High,
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for AlarmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One threshold evaluation result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alarm {
    pub kind: AlarmKind,
    pub active: bool,
    pub value: f64,
    pub threshold: String,
    pub severity: AlarmSeverity,
}

impl Alarm {
    fn evaluate(kind: AlarmKind, active: bool, value: f64, threshold: String) -> Self {
        Self {
            kind,
            active,
            value,
            threshold,
            severity: kind.severity(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Boolean alarm flags stored with each history record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmFlags([bool; AlarmKind::COUNT]);

impl AlarmFlags {
    pub fn from_alarms(alarms: &[Alarm]) -> Self {
        let mut flags = Self::default();
        for alarm in alarms {
            flags.set(alarm.kind, alarm.active);
        }
        flags
    }

    pub fn get(&self, kind: AlarmKind) -> bool {
        self.0[kind.index()]
    }

    pub fn set(&mut self, kind: AlarmKind, active: bool) {
        self.0[kind.index()] = active;
    }

    pub fn active_count(&self) -> usize {
        self.0.iter().filter(|active| **active).count()
    }

    /// `(flag_key, active)` pairs in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, bool)> + '_ {
        AlarmKind::iter().map(move |kind| (kind.flag_key(), self.get(kind)))
    }
}

impl FaultEngine {
    /// Evaluate every threshold check. One alarm per check, active or not.
    pub fn compute_alarms(&self, telemetry: &Telemetry) -> Vec<Alarm> {
        let thr = &self.thresholds;
        let pip = telemetry.pip_cmh2o;
        let plateau = telemetry.plateau_cmh2o;
        let spo2 = telemetry.spo2_pct;
        let etco2 = telemetry.etco2_mmhg;
        let leak = telemetry.leak_pct;
        let battery = telemetry.battery_pct;

        AlarmKind::iter()
            .map(|kind| match kind {
                AlarmKind::PipHigh => Alarm::evaluate(
                    kind,
                    pip > thr.pip_high_cmh2o,
                    pip,
                    format!("> {:.1}", thr.pip_high_cmh2o),
                ),
                AlarmKind::PlateauHigh => Alarm::evaluate(
                    kind,
                    plateau > thr.plateau_high_cmh2o,
                    plateau,
                    format!("> {:.1}", thr.plateau_high_cmh2o),
                ),
                AlarmKind::Spo2Low => Alarm::evaluate(
                    kind,
                    spo2 < thr.spo2_low_pct,
                    spo2,
                    format!("< {:.1}", thr.spo2_low_pct),
                ),
                AlarmKind::Etco2Low => Alarm::evaluate(
                    kind,
                    etco2 < thr.etco2_low_mmhg,
                    etco2,
                    format!("< {:.1}", thr.etco2_low_mmhg),
                ),
                AlarmKind::Etco2High => Alarm::evaluate(
                    kind,
                    etco2 > thr.etco2_high_mmhg,
                    etco2,
                    format!("> {:.1}", thr.etco2_high_mmhg),
                ),
                AlarmKind::LeakHigh => Alarm::evaluate(
                    kind,
                    leak > thr.leak_high_pct,
                    leak,
                    format!("> {:.1}%", thr.leak_high_pct),
                ),
                AlarmKind::BatteryLow => Alarm::evaluate(
                    kind,
                    battery < thr.battery_low_pct,
                    battery,
                    format!("< {:.1}%", thr.battery_low_pct),
                ),
            })
            .collect()
    }
}
