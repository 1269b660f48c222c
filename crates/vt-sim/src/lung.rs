//! ---
//! vt_section: "02-simulation"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Single-compartment lung mechanics."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
//! Linear single-compartment lung: `P = V / C + R * flow + PEEP`, with lung
//! volume as the only state variable.

use serde::{Deserialize, Serialize};
use vt_common::clamp;

/// Smallest compliance accepted before dividing by it.
pub const MIN_COMPLIANCE: f64 = 1e-6;
/// Integration steps shorter than this are stretched to it.
pub const MIN_STEP_S: f64 = 1e-4;

/// Mechanical properties of the simulated lung.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LungParameters {
    /// L/cmH2O
    pub compliance_l_per_cmh2o: f64,
    /// cmH2O/(L/s)
    pub resistance_cmh2o_per_lps: f64,
    pub peep_cmh2o: f64,
}

impl Default for LungParameters {
    fn default() -> Self {
        Self {
            compliance_l_per_cmh2o: 0.05,
            resistance_cmh2o_per_lps: 8.0,
            peep_cmh2o: 5.0,
        }
    }
}

impl LungParameters {
    /// Parameters for a lung with the given ARDS severity.
    ///
    /// Severity 0 is a healthy adult lung, 1 very severe ARDS. Compliance
    /// falls from 0.05 to 0.005 L/cmH2O, resistance rises from 8 to 20
    /// cmH2O/(L/s) and the PEEP requirement from 5 to 15 cmH2O.
    pub fn for_ards_severity(severity: f64) -> Self {
        let s = clamp(severity, 0.0, 1.0);
        Self {
            compliance_l_per_cmh2o: (1.0 - s) * 0.05 + s * 0.005,
            resistance_cmh2o_per_lps: 8.0 + 12.0 * s,
            peep_cmh2o: 5.0 + 10.0 * s,
        }
    }

    pub(crate) fn compliance(&self) -> f64 {
        self.compliance_l_per_cmh2o.max(MIN_COMPLIANCE)
    }

    pub(crate) fn resistance(&self) -> f64 {
        self.resistance_cmh2o_per_lps.max(0.0)
    }
}

/// Result of one integration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LungStep {
    pub volume_l: f64,
    pub flow_lps: f64,
    pub paw_cmh2o: f64,
}

/// Lung state integrated under a commanded flow.
#[derive(Debug, Clone)]
pub struct LungModel {
    params: LungParameters,
    volume_l: f64,
}

impl LungModel {
    pub fn new(params: LungParameters, initial_volume_l: f64) -> Self {
        Self {
            params,
            volume_l: initial_volume_l.max(0.0),
        }
    }

    pub fn params(&self) -> &LungParameters {
        &self.params
    }

    /// Replace the mechanical parameters. Volume is untouched.
    pub fn set_params(&mut self, params: LungParameters) {
        self.params = params;
    }

    pub fn volume_l(&self) -> f64 {
        self.volume_l
    }

    /// Instantaneous airway pressure for `flow_lps` at the current volume.
    pub fn airway_pressure(&self, flow_lps: f64) -> f64 {
        self.elastic_pressure() + self.params.resistance() * flow_lps + self.params.peep_cmh2o
    }

    /// Pressure implied by volume alone, excluding PEEP and the resistive term.
    pub fn elastic_pressure(&self) -> f64 {
        self.volume_l.max(0.0) / self.params.compliance()
    }

    /// Integrate `dV/dt = flow` over `[0, dt]` and clamp the volume at zero.
    pub fn step(&mut self, flow_lps: f64, dt_s: f64) -> LungStep {
        let dt_s = dt_s.max(MIN_STEP_S);
        let derivative = |_t: f64, _v: f64| flow_lps;
        self.volume_l = rk4(derivative, self.volume_l, dt_s).max(0.0);
        LungStep {
            volume_l: self.volume_l,
            flow_lps,
            paw_cmh2o: self.airway_pressure(flow_lps),
        }
    }
}

/// Classic fourth-order Runge-Kutta step of `y' = f(t, y)` from `t = 0`.
fn rk4<F>(f: F, y0: f64, h: f64) -> f64
where
    F: Fn(f64, f64) -> f64,
{
    let k1 = f(0.0, y0);
    let k2 = f(h / 2.0, y0 + h * k1 / 2.0);
    let k3 = f(h / 2.0, y0 + h * k2 / 2.0);
    let k4 = f(h, y0 + h * k3);
    y0 + h / 6.0 * (k1 + 2.0 * k2 + 2.0 * k3 + k4)
}
