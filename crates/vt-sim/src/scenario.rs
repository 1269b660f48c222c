//! ---
//! vt_section: "02-simulation"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Scenario orchestrator tying lung, ventilator, and fault engine together."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
//! One steppable twin session.
//!
//! Per tick: controls go through the pressure-target control law into the
//! ventilator settings, the ventilator steps the lung, the fault engine
//! distorts the readings and derives gases, display channels are filtered,
//! alarms are evaluated and recorded, and the newly appended record feeds
//! persistence, reasoning, scoring, and the explanation.
//!
//! The engine is single-writer: it takes `&mut self` to advance and has no
//! internal locking.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vt_common::{clamp, ticks_for, AppConfig, ControlsConfig};
use vt_logging::{vt_debug, vt_info, vt_warn, LogContext};

use crate::clock::SimClock;
use crate::control::{pressure_target_flow, ControlLawDiagnostics};
use crate::errors::{Result, SimError};
use crate::faults::{
    AlarmFlags, AlarmThresholds, FaultControls, FaultEngine, PatientRiskFactors,
};
use crate::filter::FilterBank;
use crate::lung::{LungModel, LungParameters};
use crate::telemetry::{Snapshot, Telemetry, TelemetryRecord};
use crate::transitions::TransitionTracker;
use crate::ventilator::{VentilatorModel, VentilatorSettings};

/// Shortest tick the integrator is run with.
pub const MIN_DT_S: f64 = vt_common::config::MIN_DT_S;
/// Longest tick the integrator is recommended for.
pub const MAX_RECOMMENDED_DT_S: f64 = 1.0;
/// Span of telemetry history kept, in simulated seconds.
pub const HISTORY_SECONDS: f64 = 600.0;
/// Battery drain per simulated second at zero blower load, in percent.
const BATTERY_DRAIN_PCT_PER_S: f64 = 0.001;

const MIN_COMPLIANCE_L_PER_CMH2O: f64 = 0.005;
const MIN_RESISTANCE_CMH2O_PER_LPS: f64 = 1.0;
const RR_RANGE_BPM: (f64, f64) = (6.0, 40.0);
const PEEP_RANGE_CMH2O: (f64, f64) = (0.0, 20.0);

/// Operator control surface, replaced wholesale on every host update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioControls {
    pub fio2: f64,
    /// Ceiling on the flow the control law may command.
    pub inspiratory_flow_lps: f64,
    pub pressure_target_cmh2o: f64,
    pub leak_pct: f64,
    pub compliance_l_per_cmh2o: f64,
    pub sensor_drift_pct: f64,
    pub respiratory_rate_bpm: f64,
    pub blower_speed_pct: f64,
    pub valve_delay_s: f64,
}

impl Default for ScenarioControls {
    fn default() -> Self {
        Self::from(&ControlsConfig::default())
    }
}

impl From<&ControlsConfig> for ScenarioControls {
    fn from(config: &ControlsConfig) -> Self {
        Self {
            fio2: config.fio2,
            inspiratory_flow_lps: config.inspiratory_flow_lps,
            pressure_target_cmh2o: config.pressure_target_cmh2o,
            leak_pct: config.leak_pct,
            compliance_l_per_cmh2o: config.compliance_l_per_cmh2o,
            sensor_drift_pct: config.sensor_drift_pct,
            respiratory_rate_bpm: config.respiratory_rate_bpm,
            blower_speed_pct: config.blower_speed_pct,
            valve_delay_s: config.valve_delay_s,
        }
    }
}

impl ScenarioControls {
    fn fault_controls(&self, oxygen_supply_ok: bool) -> FaultControls {
        FaultControls {
            leak_pct: clamp(self.leak_pct, 0.0, 100.0),
            sensor_drift_pct: clamp(self.sensor_drift_pct, 0.0, 100.0),
            valve_delay_s: self.valve_delay_s.max(0.0),
            oxygen_supply_ok,
        }
    }
}

/// Construction parameters of a session, kept for [`ScenarioEngine::reset`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineOptions {
    pub dt_s: f64,
    pub thresholds: AlarmThresholds,
    pub persist_seconds: f64,
    pub patient: PatientRiskFactors,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            dt_s: 0.2,
            thresholds: AlarmThresholds::default(),
            persist_seconds: 5.0,
            patient: PatientRiskFactors::default(),
        }
    }
}

impl EngineOptions {
    /// Reject options that would otherwise be silently clamped.
    pub fn validate(&self) -> Result<()> {
        if !self.dt_s.is_finite() || self.dt_s <= 0.0 {
            return Err(SimError::InvalidTimestep(self.dt_s));
        }
        self.thresholds
            .validate()
            .map_err(|err| SimError::InvalidThresholds(err.to_string()))?;
        let effective_dt = self.dt_s.max(MIN_DT_S);
        if !self.persist_seconds.is_finite() || self.persist_seconds < effective_dt {
            return Err(SimError::InvalidPersistenceWindow {
                persist_s: self.persist_seconds,
                dt_s: effective_dt,
            });
        }
        let severity = self.patient.ards_severity;
        if !(0.0..=1.0).contains(&severity) {
            return Err(SimError::InvalidPatient(severity));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct ScenarioEngine {
    options: EngineOptions,
    session_id: Uuid,
    session_label: String,
    started_at: DateTime<Utc>,
    clock: SimClock,
    ventilator: VentilatorModel,
    fault_engine: FaultEngine,
    patient: PatientRiskFactors,
    filters: FilterBank,
    history: VecDeque<TelemetryRecord>,
    history_capacity: usize,
    eviction_reported: bool,
    tracker: TransitionTracker,
    latest: Option<Snapshot>,
    battery_pct: f64,
    controls: ScenarioControls,
    oxygen_supply_ok: bool,
}

impl ScenarioEngine {
    /// Session with default persistence window and patient.
    ///
    /// `dt_s` is clamped to at least [`MIN_DT_S`].
    pub fn new(dt_s: f64, thresholds: AlarmThresholds) -> Self {
        Self::with_options(EngineOptions {
            dt_s,
            thresholds,
            ..EngineOptions::default()
        })
    }

    pub fn with_options(options: EngineOptions) -> Self {
        let dt_s = options.dt_s.max(MIN_DT_S);
        let options = EngineOptions { dt_s, ..options };
        let patient = options.patient;

        let lung = LungModel::new(LungParameters::for_ards_severity(patient.ards_severity), 0.0);
        let ventilator = VentilatorModel::new(lung, VentilatorSettings::default());
        let fault_engine = FaultEngine::new(options.thresholds, dt_s, options.persist_seconds);
        let history_capacity = ticks_for(HISTORY_SECONDS, dt_s);
        let session_id = Uuid::new_v4();

        let engine = Self {
            options,
            session_id,
            session_label: session_id.to_string(),
            started_at: Utc::now(),
            clock: SimClock::new(dt_s),
            ventilator,
            fault_engine,
            patient,
            filters: FilterBank::default(),
            history: VecDeque::with_capacity(history_capacity.min(4096)),
            history_capacity,
            eviction_reported: false,
            tracker: TransitionTracker::new(),
            latest: None,
            battery_pct: 100.0,
            controls: ScenarioControls::default(),
            oxygen_supply_ok: true,
        };

        let ctx = LogContext::new().with_session(&engine.session_label);
        vt_info!(
            context = ctx,
            "twin session created: dt={}s window={} ticks history={} ticks ards={}",
            dt_s,
            engine.fault_engine.window_len(),
            history_capacity,
            patient.ards_severity
        );
        if dt_s > MAX_RECOMMENDED_DT_S {
            vt_warn!(
                context = ctx,
                "timestep {}s exceeds the recommended {}s; breath timing will be coarse",
                dt_s,
                MAX_RECOMMENDED_DT_S
            );
        }
        engine
    }

    /// Validating constructor for options coming from outside the process.
    pub fn try_new(options: EngineOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::with_options(options))
    }

    /// Build a session from a loaded configuration, applying its initial controls.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let options = EngineOptions {
            dt_s: config.simulation.dt_s,
            thresholds: config.thresholds,
            persist_seconds: config.simulation.persist_seconds,
            patient: PatientRiskFactors {
                ards_severity: config.patient.ards_severity,
            },
        };
        let mut engine = Self::try_new(options)?;
        engine.set_controls(
            ScenarioControls::from(&config.controls),
            config.controls.oxygen_supply_ok,
        );
        Ok(engine)
    }

    /// Replace the active controls. Clamping happens on the next tick.
    pub fn set_controls(&mut self, controls: ScenarioControls, oxygen_supply_ok: bool) {
        self.controls = controls;
        self.oxygen_supply_ok = oxygen_supply_ok;
    }

    /// Advance `n` ticks. Zero is treated as one.
    pub fn step_n(&mut self, n: usize) {
        for _ in 0..n.max(1) {
            self.step_once();
        }
    }

    /// Copy of the most recent snapshot; `None` before the first tick.
    pub fn get_latest(&self) -> Option<Snapshot> {
        self.latest.clone()
    }

    /// Copy of the bounded history, oldest first.
    pub fn get_history(&self) -> Vec<TelemetryRecord> {
        self.history.iter().copied().collect()
    }

    /// Rebuild the session from its construction parameters.
    ///
    /// Battery, filters, history, clock and breath state start over under a
    /// new session id. The current controls are kept.
    pub fn reset(&mut self) {
        let controls = self.controls;
        let oxygen_supply_ok = self.oxygen_supply_ok;
        let previous = self.session_id;
        *self = Self::with_options(self.options);
        self.set_controls(controls, oxygen_supply_ok);
        vt_info!(
            context = LogContext::new().with_session(&self.session_label),
            "twin session reset, replacing {}",
            previous
        );
    }

    pub fn dt_s(&self) -> f64 {
        self.clock.dt_s()
    }

    pub fn now_s(&self) -> f64 {
        self.clock.now_s()
    }

    pub fn tick(&self) -> u64 {
        self.clock.tick()
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn controls(&self) -> &ScenarioControls {
        &self.controls
    }

    pub fn oxygen_supply_ok(&self) -> bool {
        self.oxygen_supply_ok
    }

    pub fn battery_pct(&self) -> f64 {
        self.battery_pct
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    pub fn fault_engine(&self) -> &FaultEngine {
        &self.fault_engine
    }

    pub fn patient(&self) -> &PatientRiskFactors {
        &self.patient
    }

    fn step_once(&mut self) {
        let dt_s = self.clock.dt_s();
        let control = self.apply_controls();

        let previous_phase = self.ventilator.state().phase;
        let sim_time_s = self.clock.advance();
        let frame = self.ventilator.step(sim_time_s, dt_s);

        let drain = BATTERY_DRAIN_PCT_PER_S * dt_s * (1.0 + frame.blower_speed_pct / 100.0);
        self.battery_pct = (self.battery_pct - drain).max(0.0);

        let faults = self.controls.fault_controls(self.oxygen_supply_ok);
        let raw = Telemetry::from_frame(&frame, self.battery_pct);
        let measured = self.fault_engine.apply_sensor_effects(&raw, &faults);
        let measured = self.fault_engine.derive_gases(&measured, &faults, &self.patient);
        let display = self.filters.apply(&measured, dt_s);

        let alarms = self.fault_engine.compute_alarms(&measured);
        let record = TelemetryRecord {
            time_s: sim_time_s,
            telemetry: measured,
            alarms: AlarmFlags::from_alarms(&alarms),
        };
        let evicted = self.push_history(record);

        let persistence = self.fault_engine.temporal_validate(&self.history, &alarms);
        let diagnosis = self.fault_engine.reason_fault(&measured, &persistence);
        let assessment = self
            .fault_engine
            .severity_score(&measured, &alarms, &self.patient);
        let explanation = self.fault_engine.explain(&alarms, &diagnosis, &assessment);

        let tick = self.clock.tick();
        let ctx = LogContext::new()
            .with_session(&self.session_label)
            .with_tick(tick, sim_time_s)
            .with_phase(frame.phase.as_str());
        if frame.phase != previous_phase {
            vt_debug!(
                context = ctx,
                "breath phase {} -> {} (vt={:.3}L pip={:.1}cmH2O)",
                previous_phase,
                frame.phase,
                frame.tidal_volume_l,
                frame.pip_cmh2o
            );
        }
        if evicted && !self.eviction_reported {
            vt_debug!(
                context = ctx,
                "telemetry history full at {} records; evicting oldest first",
                self.history_capacity
            );
            self.eviction_reported = true;
        }
        self.tracker
            .observe(&ctx, assessment.level, diagnosis.class);

        self.latest = Some(Snapshot {
            tick,
            record,
            display,
            control,
            sensor_health: measured.sensor_health(),
            severity_score: assessment.score,
            severity_level: assessment.level,
            fault_class: diagnosis.class,
            fault_root_cause: diagnosis.root_cause.to_owned(),
            explanation,
        });
    }

    /// Clamp the controls into lung parameters and ventilator settings.
    fn apply_controls(&mut self) -> ControlLawDiagnostics {
        let c = self.controls;
        let current = *self.ventilator.settings();
        let peep = clamp(current.peep_cmh2o, PEEP_RANGE_CMH2O.0, PEEP_RANGE_CMH2O.1);

        let lung = *self.ventilator.lung().params();
        self.ventilator.set_lung_parameters(LungParameters {
            compliance_l_per_cmh2o: c.compliance_l_per_cmh2o.max(MIN_COMPLIANCE_L_PER_CMH2O),
            resistance_cmh2o_per_lps: lung
                .resistance_cmh2o_per_lps
                .max(MIN_RESISTANCE_CMH2O_PER_LPS),
            peep_cmh2o: peep,
        });

        let control = pressure_target_flow(
            self.ventilator.lung(),
            c.pressure_target_cmh2o.max(0.0),
            c.inspiratory_flow_lps,
        );

        self.ventilator.set_settings(VentilatorSettings {
            inspiratory_flow_lps: control.commanded_flow_lps,
            respiratory_rate_bpm: clamp(c.respiratory_rate_bpm, RR_RANGE_BPM.0, RR_RANGE_BPM.1),
            fio2: clamp(c.fio2, 0.21, 1.0),
            peep_cmh2o: peep,
            blower_speed_pct: clamp(c.blower_speed_pct, 0.0, 100.0),
            ..current
        });
        control
    }

    /// Append `record`, dropping the oldest entries past capacity. Returns
    /// whether anything was dropped.
    fn push_history(&mut self, record: TelemetryRecord) -> bool {
        self.history.push_back(record);
        let mut evicted = false;
        while self.history.len() > self.history_capacity {
            self.history.pop_front();
            evicted = true;
        }
        evicted
    }
}
