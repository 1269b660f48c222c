//! ---
//! vt_section: "02-simulation"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Timed control scripts, built-in presets, and the chunked runner."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use vt_common::ControlEventConfig;
use vt_logging::{vt_info, LogContext};

use crate::errors::{Result, SimError};
use crate::scenario::{ScenarioControls, ScenarioEngine};
use crate::telemetry::Snapshot;

/// Slack when comparing event times with the tick clock.
const EVENT_TIME_EPSILON_S: f64 = 1e-9;
/// Simulated time at which every built-in preset injects its fault.
pub const PRESET_EVENT_AT_S: f64 = 10.0;

/// Sparse set of control changes. Unset fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlOverrides {
    pub fio2: Option<f64>,
    pub inspiratory_flow_lps: Option<f64>,
    pub pressure_target_cmh2o: Option<f64>,
    pub leak_pct: Option<f64>,
    pub compliance_l_per_cmh2o: Option<f64>,
    pub sensor_drift_pct: Option<f64>,
    pub respiratory_rate_bpm: Option<f64>,
    pub blower_speed_pct: Option<f64>,
    pub valve_delay_s: Option<f64>,
    pub oxygen_supply_ok: Option<bool>,
}

impl ControlOverrides {
    pub fn apply(&self, controls: &ScenarioControls, oxygen_supply_ok: bool) -> (ScenarioControls, bool) {
        let mut next = *controls;
        let fields = [
            (self.fio2, &mut next.fio2),
            (self.inspiratory_flow_lps, &mut next.inspiratory_flow_lps),
            (self.pressure_target_cmh2o, &mut next.pressure_target_cmh2o),
            (self.leak_pct, &mut next.leak_pct),
            (self.compliance_l_per_cmh2o, &mut next.compliance_l_per_cmh2o),
            (self.sensor_drift_pct, &mut next.sensor_drift_pct),
            (self.respiratory_rate_bpm, &mut next.respiratory_rate_bpm),
            (self.blower_speed_pct, &mut next.blower_speed_pct),
            (self.valve_delay_s, &mut next.valve_delay_s),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
        (next, self.oxygen_supply_ok.unwrap_or(oxygen_supply_ok))
    }

    fn numeric_fields(&self) -> [(&'static str, Option<f64>); 9] {
        [
            ("fio2", self.fio2),
            ("inspiratory_flow_lps", self.inspiratory_flow_lps),
            ("pressure_target_cmh2o", self.pressure_target_cmh2o),
            ("leak_pct", self.leak_pct),
            ("compliance_l_per_cmh2o", self.compliance_l_per_cmh2o),
            ("sensor_drift_pct", self.sensor_drift_pct),
            ("respiratory_rate_bpm", self.respiratory_rate_bpm),
            ("blower_speed_pct", self.blower_speed_pct),
            ("valve_delay_s", self.valve_delay_s),
        ]
    }
}

/// Control change applied once simulated time reaches `at_s`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlEvent {
    pub at_s: f64,
    pub label: Option<String>,
    pub overrides: ControlOverrides,
}

impl ControlEvent {
    pub fn new(at_s: f64, label: impl Into<String>, overrides: ControlOverrides) -> Self {
        Self {
            at_s,
            label: Some(label.into()),
            overrides,
        }
    }

    fn validate(&self, index: usize) -> Result<()> {
        let invalid = |reason: String| SimError::InvalidScriptEvent { index, reason };
        if !self.at_s.is_finite() || self.at_s < 0.0 {
            return Err(invalid(format!("start time {} is not a non-negative number", self.at_s)));
        }
        for (name, value) in self.overrides.numeric_fields() {
            if let Some(value) = value {
                if !value.is_finite() {
                    return Err(invalid(format!("{name} is not finite")));
                }
            }
        }
        Ok(())
    }

    fn describe(&self) -> &str {
        self.label.as_deref().unwrap_or("control change")
    }
}

impl From<&ControlEventConfig> for ControlEvent {
    fn from(config: &ControlEventConfig) -> Self {
        Self {
            at_s: config.at_s,
            label: config.label.clone(),
            overrides: ControlOverrides {
                fio2: config.fio2,
                inspiratory_flow_lps: config.inspiratory_flow_lps,
                pressure_target_cmh2o: config.pressure_target_cmh2o,
                leak_pct: config.leak_pct,
                compliance_l_per_cmh2o: config.compliance_l_per_cmh2o,
                sensor_drift_pct: config.sensor_drift_pct,
                respiratory_rate_bpm: config.respiratory_rate_bpm,
                blower_speed_pct: config.blower_speed_pct,
                valve_delay_s: config.valve_delay_s,
                oxygen_supply_ok: config.oxygen_supply_ok,
            },
        }
    }
}

/// Built-in fault scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum ScenarioPreset {
    Baseline,
    LeakOxygenFailure,
    Obstruction,
    SensorDrift,
}

impl ScenarioPreset {
    pub fn parse(name: &str) -> Result<Self> {
        name.parse::<Self>()
            .map_err(|_| SimError::UnknownPreset(name.to_owned()))
    }

    pub fn names() -> Vec<String> {
        Self::iter().map(|preset| preset.to_string()).collect()
    }

    pub fn events(&self) -> Vec<ControlEvent> {
        match self {
            ScenarioPreset::Baseline => Vec::new(),
            ScenarioPreset::LeakOxygenFailure => vec![ControlEvent::new(
                PRESET_EVENT_AT_S,
                "circuit leak with oxygen supply failure",
                ControlOverrides {
                    leak_pct: Some(40.0),
                    oxygen_supply_ok: Some(false),
                    ..ControlOverrides::default()
                },
            )],
            ScenarioPreset::Obstruction => vec![ControlEvent::new(
                PRESET_EVENT_AT_S,
                "kinked circuit against a high pressure target",
                ControlOverrides {
                    compliance_l_per_cmh2o: Some(0.005),
                    pressure_target_cmh2o: Some(50.0),
                    ..ControlOverrides::default()
                },
            )],
            ScenarioPreset::SensorDrift => vec![ControlEvent::new(
                PRESET_EVENT_AT_S,
                "pressure sensor drifting high",
                ControlOverrides {
                    sensor_drift_pct: Some(20.0),
                    pressure_target_cmh2o: Some(45.0),
                    inspiratory_flow_lps: Some(1.0),
                    ..ControlOverrides::default()
                },
            )],
        }
    }
}

/// Named list of control events ordered by start time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioScript {
    pub name: String,
    events: Vec<ControlEvent>,
}

impl ScenarioScript {
    /// Validate and sort `events`. Events sharing a start time keep their order.
    pub fn new(name: impl Into<String>, mut events: Vec<ControlEvent>) -> Result<Self> {
        for (index, event) in events.iter().enumerate() {
            event.validate(index)?;
        }
        events.sort_by(|a, b| a.at_s.total_cmp(&b.at_s));
        Ok(Self {
            name: name.into(),
            events,
        })
    }

    pub fn from_config(name: impl Into<String>, events: &[ControlEventConfig]) -> Result<Self> {
        Self::new(name, events.iter().map(ControlEvent::from).collect())
    }

    pub fn preset(preset: ScenarioPreset) -> Self {
        // Preset events are constants and always valid.
        let mut events = preset.events();
        events.sort_by(|a, b| a.at_s.total_cmp(&b.at_s));
        Self {
            name: preset.to_string(),
            events,
        }
    }

    /// Append the events of `other`, keeping the time ordering.
    pub fn merged(mut self, other: ScenarioScript) -> Self {
        self.events.extend(other.events);
        self.events.sort_by(|a, b| a.at_s.total_cmp(&b.at_s));
        self
    }

    pub fn events(&self) -> &[ControlEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Drives an engine in fixed chunks, applying due script events between chunks.
#[derive(Debug)]
pub struct ScenarioRunner {
    engine: ScenarioEngine,
    script: ScenarioScript,
    next_event: usize,
    steps_per_refresh: usize,
}

impl ScenarioRunner {
    pub fn new(engine: ScenarioEngine, script: ScenarioScript, steps_per_refresh: usize) -> Self {
        Self {
            engine,
            script,
            next_event: 0,
            steps_per_refresh: steps_per_refresh.max(1),
        }
    }

    pub fn engine(&self) -> &ScenarioEngine {
        &self.engine
    }

    pub fn into_engine(self) -> ScenarioEngine {
        self.engine
    }

    pub fn script(&self) -> &ScenarioScript {
        &self.script
    }

    pub fn steps_per_refresh(&self) -> usize {
        self.steps_per_refresh
    }

    /// Events not yet applied.
    pub fn pending_events(&self) -> &[ControlEvent] {
        &self.script.events[self.next_event..]
    }

    /// Apply every event whose start time has been reached. Returns how many.
    pub fn apply_due_events(&mut self) -> usize {
        let now = self.engine.now_s();
        let mut applied = 0;
        while let Some(event) = self.script.events.get(self.next_event) {
            if event.at_s > now + EVENT_TIME_EPSILON_S {
                break;
            }
            let (controls, oxygen_supply_ok) = event
                .overrides
                .apply(self.engine.controls(), self.engine.oxygen_supply_ok());
            self.engine.set_controls(controls, oxygen_supply_ok);
            let session = self.engine.session_id().to_string();
            vt_info!(
                context = LogContext::new()
                    .with_session(&session)
                    .with_tick(self.engine.tick(), now),
                "scenario '{}' applied '{}' scheduled at {}s",
                self.script.name,
                event.describe(),
                event.at_s
            );
            self.next_event += 1;
            applied += 1;
        }
        applied
    }

    /// Apply due events, then advance one chunk.
    pub fn advance(&mut self) -> Option<Snapshot> {
        self.apply_due_events();
        self.engine.step_n(self.steps_per_refresh);
        self.engine.get_latest()
    }

    /// Advance whole chunks until simulated time reaches `duration_s`.
    pub fn run_for(&mut self, duration_s: f64) -> Option<Snapshot> {
        while self.engine.now_s() + EVENT_TIME_EPSILON_S < duration_s {
            self.advance();
        }
        self.engine.get_latest()
    }
}
