//! ---
//! vt_section: "02-simulation"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Breath-cycle ventilator state machine driving the lung."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};
use vt_common::clamp;

use crate::lung::{LungModel, LungParameters, MIN_COMPLIANCE};

/// Shortest inspiration the controller will deliver, in seconds.
pub const MIN_INSPIRATION_S: f64 = 0.2;

/// Breath-cycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreathPhase {
    Insp,
    Exp,
}

impl BreathPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreathPhase::Insp => "insp",
            BreathPhase::Exp => "exp",
        }
    }
}

impl fmt::Display for BreathPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commanded ventilator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VentilatorSettings {
    pub inspiratory_flow_lps: f64,
    pub respiratory_rate_bpm: f64,
    pub fio2: f64,
    pub peep_cmh2o: f64,
    pub blower_speed_pct: f64,
    pub ie_ratio_insp: f64,
    pub ie_ratio_exp: f64,
}

impl Default for VentilatorSettings {
    fn default() -> Self {
        Self {
            inspiratory_flow_lps: 0.5,
            respiratory_rate_bpm: 16.0,
            fio2: 0.5,
            peep_cmh2o: 8.0,
            blower_speed_pct: 55.0,
            ie_ratio_insp: 1.0,
            ie_ratio_exp: 2.0,
        }
    }
}

impl VentilatorSettings {
    /// Full cycle and inspiratory durations in seconds.
    pub fn cycle_times(&self) -> (f64, f64) {
        let rr = self.respiratory_rate_bpm.max(1.0);
        let t_cycle = 60.0 / rr;
        let insp_fraction = self.ie_ratio_insp / (self.ie_ratio_insp + self.ie_ratio_exp).max(1e-6);
        let t_insp = (t_cycle * insp_fraction).max(MIN_INSPIRATION_S);
        (t_cycle, t_insp)
    }
}

/// Breath-cycle bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VentilatorInternalState {
    pub phase: BreathPhase,
    pub phase_time_s: f64,
    pub last_breath_start_s: f64,
    pub pip_cmh2o: f64,
    pub plateau_cmh2o: f64,
    pub tidal_volume_l: f64,
}

impl Default for VentilatorInternalState {
    fn default() -> Self {
        Self {
            phase: BreathPhase::Exp,
            phase_time_s: 0.0,
            last_breath_start_s: 0.0,
            pip_cmh2o: 0.0,
            plateau_cmh2o: 0.0,
            tidal_volume_l: 0.0,
        }
    }
}

/// Output of one ventilator step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VentilatorFrame {
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
    pub fio2: f64,
    pub blower_speed_pct: f64,
}

/// Two-phase breath controller. Owns the lung it ventilates.
#[derive(Debug, Clone)]
pub struct VentilatorModel {
    lung: LungModel,
    settings: VentilatorSettings,
    state: VentilatorInternalState,
    volume_at_insp_start_l: f64,
}

impl VentilatorModel {
    pub fn new(lung: LungModel, settings: VentilatorSettings) -> Self {
        let volume_at_insp_start_l = lung.volume_l();
        Self {
            lung,
            settings,
            state: VentilatorInternalState::default(),
            volume_at_insp_start_l,
        }
    }

    pub fn settings(&self) -> &VentilatorSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: VentilatorSettings) {
        self.settings = settings;
    }

    pub fn state(&self) -> &VentilatorInternalState {
        &self.state
    }

    pub fn lung(&self) -> &LungModel {
        &self.lung
    }

    pub fn set_lung_parameters(&mut self, params: LungParameters) {
        self.lung.set_params(params);
    }

    /// Advance the breath cycle by `dt_s` and step the lung once.
    pub fn step(&mut self, sim_time_s: f64, dt_s: f64) -> VentilatorFrame {
        let (t_cycle, t_insp) = self.settings.cycle_times();

        self.state.phase_time_s += dt_s;
        match self.state.phase {
            BreathPhase::Insp if self.state.phase_time_s >= t_insp => {
                self.state.phase = BreathPhase::Exp;
                self.state.phase_time_s = 0.0;
            }
            BreathPhase::Exp if self.state.phase_time_s >= t_cycle - t_insp => {
                self.start_breath(sim_time_s);
            }
            _ => {}
        }

        let peep = self.settings.peep_cmh2o;
        let params = LungParameters {
            peep_cmh2o: peep,
            ..*self.lung.params()
        };
        self.lung.set_params(params);

        let flow = match self.state.phase {
            BreathPhase::Insp => self.settings.inspiratory_flow_lps.max(0.0),
            BreathPhase::Exp => self.passive_exhalation_flow(),
        };
        let out = self.lung.step(flow, dt_s);

        let compliance = self.lung.params().compliance_l_per_cmh2o.max(MIN_COMPLIANCE);
        self.state.pip_cmh2o = self.state.pip_cmh2o.max(out.paw_cmh2o);
        self.state.plateau_cmh2o = self
            .state
            .plateau_cmh2o
            .max(out.volume_l / compliance + peep);
        if self.state.phase == BreathPhase::Insp {
            self.state.tidal_volume_l = (out.volume_l - self.volume_at_insp_start_l).max(0.0);
        }

        VentilatorFrame {
            phase: self.state.phase,
            breath_start_s: self.state.last_breath_start_s,
            paw_cmh2o: out.paw_cmh2o,
            pip_cmh2o: self.state.pip_cmh2o,
            plateau_cmh2o: self.state.plateau_cmh2o,
            peep_cmh2o: peep,
            tidal_volume_l: self.state.tidal_volume_l,
            volume_l: out.volume_l,
            flow_lps: out.flow_lps,
            insp_flow_set_lps: self.settings.inspiratory_flow_lps.max(0.0),
            insp_flow_lps: out.flow_lps.max(0.0),
            rr_bpm: self.settings.respiratory_rate_bpm,
            fio2: clamp(self.settings.fio2, 0.21, 1.0),
            blower_speed_pct: clamp(self.settings.blower_speed_pct, 0.0, 100.0),
        }
    }

    fn start_breath(&mut self, sim_time_s: f64) {
        self.state.phase = BreathPhase::Insp;
        self.state.phase_time_s = 0.0;
        self.state.last_breath_start_s = sim_time_s;
        self.state.pip_cmh2o = 0.0;
        self.state.plateau_cmh2o = 0.0;
        self.state.tidal_volume_l = 0.0;
        self.volume_at_insp_start_l = self.lung.volume_l();
    }

    /// Elastic recoil against airway resistance. PEEP is not part of the
    /// driving pressure.
    fn passive_exhalation_flow(&self) -> f64 {
        let params = self.lung.params();
        let compliance = params.compliance_l_per_cmh2o.max(MIN_COMPLIANCE);
        let resistance = params.resistance_cmh2o_per_lps.max(1e-6);
        let recoil = (self.lung.volume_l().max(0.0) / compliance).max(0.0);
        -recoil / resistance
    }
}
