//! ---
//! vt_section: "02-simulation"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Typed telemetry records, history entries, and snapshots."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::control::ControlLawDiagnostics;
use crate::faults::{AlarmFlags, Explanation, FaultClass, SeverityLevel};
use crate::filter::DisplaySignals;
use crate::ventilator::{BreathPhase, VentilatorFrame};

/// Measured and derived signals for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Telemetry {
    pub phase: BreathPhase,
    pub breath_start_s: f64,
    pub paw_cmh2o: f64,
    pub pip_cmh2o: f64,
    pub plateau_cmh2o: f64,
    pub peep_cmh2o: f64,
    pub tidal_volume_l: f64,
    pub volume_l: f64,
    pub flow_lps: f64,
    pub insp_flow_set_lps: f64,
    pub insp_flow_lps: f64,
    pub rr_bpm: f64,
    /// Delivered FiO2 once gases are derived.
    pub fio2: f64,
    /// FiO2 configured on the ventilator.
    pub fio2_set: f64,
    pub blower_speed_pct: f64,
    pub battery_pct: f64,
    pub leak_pct: f64,
    pub sensor_drift_pct: f64,
    pub valve_delay_s: f64,
    pub spo2_pct: f64,
    pub etco2_mmhg: f64,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            phase: BreathPhase::Exp,
            breath_start_s: 0.0,
            paw_cmh2o: 0.0,
            pip_cmh2o: 0.0,
            plateau_cmh2o: 0.0,
            peep_cmh2o: 0.0,
            tidal_volume_l: 0.0,
            volume_l: 0.0,
            flow_lps: 0.0,
            insp_flow_set_lps: 0.0,
            insp_flow_lps: 0.0,
            rr_bpm: 16.0,
            fio2: 0.5,
            fio2_set: 0.5,
            blower_speed_pct: 0.0,
            battery_pct: 100.0,
            leak_pct: 0.0,
            sensor_drift_pct: 0.0,
            valve_delay_s: 0.0,
            spo2_pct: 100.0,
            etco2_mmhg: 40.0,
        }
    }
}

impl Telemetry {
    /// Raw telemetry straight from the ventilator, before any sensor effects.
    pub fn from_frame(frame: &VentilatorFrame, battery_pct: f64) -> Self {
        Self {
            phase: frame.phase,
            breath_start_s: frame.breath_start_s,
            paw_cmh2o: frame.paw_cmh2o,
            pip_cmh2o: frame.pip_cmh2o,
            plateau_cmh2o: frame.plateau_cmh2o,
            peep_cmh2o: frame.peep_cmh2o,
            tidal_volume_l: frame.tidal_volume_l,
            volume_l: frame.volume_l,
            flow_lps: frame.flow_lps,
            insp_flow_set_lps: frame.insp_flow_set_lps,
            insp_flow_lps: frame.insp_flow_lps,
            rr_bpm: frame.rr_bpm,
            fio2: frame.fio2,
            fio2_set: frame.fio2,
            blower_speed_pct: frame.blower_speed_pct,
            battery_pct,
            ..Self::default()
        }
    }

    /// Circuit health estimate in `[0.3, 1]`, degraded by the measured leak.
    pub fn sensor_health(&self) -> f64 {
        1.0 - (self.leak_pct / 100.0).clamp(0.0, 0.7)
    }

    fn write_into(&self, map: &mut IndexMap<String, SignalValue>) {
        map.insert("phase".into(), SignalValue::from(self.phase.as_str()));
        let numbers = [
            ("breath_start_s", self.breath_start_s),
            ("paw_cmh2o", self.paw_cmh2o),
            ("pip_cmh2o", self.pip_cmh2o),
            ("plateau_cmh2o", self.plateau_cmh2o),
            ("peep_cmh2o", self.peep_cmh2o),
            ("tidal_volume_l", self.tidal_volume_l),
            ("volume_l", self.volume_l),
            ("flow_lps", self.flow_lps),
            ("insp_flow_set_lps", self.insp_flow_set_lps),
            ("insp_flow_lps", self.insp_flow_lps),
            ("rr_bpm", self.rr_bpm),
            ("fio2", self.fio2),
            ("fio2_set", self.fio2_set),
            ("blower_speed_pct", self.blower_speed_pct),
            ("battery_pct", self.battery_pct),
            ("leak_pct", self.leak_pct),
            ("sensor_drift_pct", self.sensor_drift_pct),
            ("valve_delay_s", self.valve_delay_s),
            ("spo2_pct", self.spo2_pct),
            ("etco2_mmhg", self.etco2_mmhg),
        ];
        for (key, value) in numbers {
            map.insert(key.into(), SignalValue::Number(value));
        }
    }
}

/// One history entry: measured signals, alarm flags, and the tick time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub time_s: f64,
    pub telemetry: Telemetry,
    pub alarms: AlarmFlags,
}

impl TelemetryRecord {
    pub fn to_flat_map(&self) -> IndexMap<String, SignalValue> {
        let mut map = IndexMap::new();
        map.insert("time_s".into(), SignalValue::Number(self.time_s));
        self.telemetry.write_into(&mut map);
        for (key, active) in self.alarms.iter() {
            map.insert(key.into(), SignalValue::Flag(active));
        }
        map
    }
}

/// Value in the flat key/value view handed to display hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    Number(f64),
    Flag(bool),
    Text(String),
}

impl SignalValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SignalValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SignalValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SignalValue::Flag(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&str> for SignalValue {
    fn from(value: &str) -> Self {
        SignalValue::Text(value.to_owned())
    }
}

/// Latest computed state of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub record: TelemetryRecord,
    pub display: DisplaySignals,
    pub control: ControlLawDiagnostics,
    pub sensor_health: f64,
    pub severity_score: f64,
    pub severity_level: SeverityLevel,
    pub fault_class: FaultClass,
    pub fault_root_cause: String,
    pub explanation: Explanation,
}

impl Snapshot {
    pub fn time_s(&self) -> f64 {
        self.record.time_s
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.record.telemetry
    }

    pub fn alarms(&self) -> &AlarmFlags {
        &self.record.alarms
    }

    /// Flat key/value view of every measured, diagnostic, and explanation field.
    pub fn to_flat_map(&self) -> IndexMap<String, SignalValue> {
        let mut map = self.record.to_flat_map();
        map.insert("tick".into(), SignalValue::Number(self.tick as f64));
        self.display.write_into(&mut map);
        self.control.write_into(&mut map);
        map.insert(
            "sensor_health".into(),
            SignalValue::Number(self.sensor_health),
        );
        map.insert(
            "severity_score".into(),
            SignalValue::Number(self.severity_score),
        );
        map.insert(
            "severity_level".into(),
            SignalValue::from(self.severity_level.as_str()),
        );
        map.insert(
            "fault_class".into(),
            SignalValue::from(self.fault_class.as_str()),
        );
        map.insert(
            "fault_root_cause".into(),
            SignalValue::from(self.fault_root_cause.as_str()),
        );
        self.explanation.write_into(&mut map);
        map
    }
}
