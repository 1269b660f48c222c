//! ---
//! vt_section: "02-simulation"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Pressure-target control law and its diagnostics."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
use indexmap::IndexMap;
use serde::Serialize;
use vt_common::{clamp, safe_div};

use crate::lung::LungModel;
use crate::telemetry::SignalValue;

/// Lowest flow ceiling the control law accepts (L/s).
pub const MIN_FLOW_CEILING_LPS: f64 = 0.05;

/// What the control law saw and decided on one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ControlLawDiagnostics {
    pub target_pressure_cmh2o: f64,
    /// `V / C + PEEP` before the tick.
    pub elastic_pressure_cmh2o: f64,
    pub resistance_cmh2o_per_lps: f64,
    pub unconstrained_flow_lps: f64,
    pub commanded_flow_lps: f64,
    pub flow_ceiling_lps: f64,
    /// True when the commanded flow was clipped to `[0, ceiling]`.
    pub saturated: bool,
}

impl ControlLawDiagnostics {
    pub(crate) fn write_into(&self, map: &mut IndexMap<String, SignalValue>) {
        let numbers = [
            ("control_target_pressure_cmh2o", self.target_pressure_cmh2o),
            ("control_elastic_pressure_cmh2o", self.elastic_pressure_cmh2o),
            ("control_resistance_cmh2o_per_lps", self.resistance_cmh2o_per_lps),
            ("control_unconstrained_flow_lps", self.unconstrained_flow_lps),
            ("control_commanded_flow_lps", self.commanded_flow_lps),
            ("control_flow_ceiling_lps", self.flow_ceiling_lps),
        ];
        for (key, value) in numbers {
            map.insert(key.into(), SignalValue::Number(value));
        }
        map.insert("control_saturated".into(), SignalValue::Flag(self.saturated));
    }
}

/// Invert `P = V / C + R * flow + PEEP` for the flow reaching `target_cmh2o`,
/// clipped to `[0, ceiling]`.
pub fn pressure_target_flow(
    lung: &LungModel,
    target_cmh2o: f64,
    flow_ceiling_lps: f64,
) -> ControlLawDiagnostics {
    let params = lung.params();
    let elastic = lung.elastic_pressure() + params.peep_cmh2o;
    let resistance = params.resistance_cmh2o_per_lps;
    let ceiling = flow_ceiling_lps.max(MIN_FLOW_CEILING_LPS);
    let unconstrained = safe_div(target_cmh2o - elastic, resistance, ceiling);
    let commanded = clamp(unconstrained, 0.0, ceiling);
    ControlLawDiagnostics {
        target_pressure_cmh2o: target_cmh2o,
        elastic_pressure_cmh2o: elastic,
        resistance_cmh2o_per_lps: resistance,
        unconstrained_flow_lps: unconstrained,
        commanded_flow_lps: commanded,
        flow_ceiling_lps: ceiling,
        saturated: commanded != unconstrained,
    }
}
