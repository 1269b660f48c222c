//! ---
//! vt_section: "02-simulation"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "First-order low-pass smoothing of display signals."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
use indexmap::IndexMap;
use serde::Serialize;
use strum::{EnumIter, IntoEnumIterator};

use crate::telemetry::{SignalValue, Telemetry};

/// `y += dt / (tau + dt) * (x - y)`, seeded with the first input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowPassFilter {
    tau_s: f64,
    state: Option<f64>,
}

impl LowPassFilter {
    pub fn new(tau_s: f64) -> Self {
        Self {
            tau_s: tau_s.max(0.0),
            state: None,
        }
    }

    pub fn update(&mut self, input: f64, dt_s: f64) -> f64 {
        let output = match self.state {
            None => input,
            Some(previous) => {
                let alpha = dt_s / (self.tau_s + dt_s).max(1e-9);
                previous + alpha * (input - previous)
            }
        };
        self.state = Some(output);
        output
    }

    pub fn value(&self) -> Option<f64> {
        self.state
    }
}

/// Signals smoothed for display. Alarms and diagnosis never see these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumIter)]
pub enum FilterChannel {
    Pip,
    Plateau,
    Flow,
    InspFlow,
    Etco2,
}

impl FilterChannel {
    pub fn tau_s(&self) -> f64 {
        match self {
            FilterChannel::Pip => 1.2,
            FilterChannel::Plateau => 1.5,
            FilterChannel::Flow => 0.8,
            FilterChannel::InspFlow => 0.8,
            FilterChannel::Etco2 => 3.0,
        }
    }

    fn sample(&self, telemetry: &Telemetry) -> f64 {
        match self {
            FilterChannel::Pip => telemetry.pip_cmh2o,
            FilterChannel::Plateau => telemetry.plateau_cmh2o,
            FilterChannel::Flow => telemetry.flow_lps,
            FilterChannel::InspFlow => telemetry.insp_flow_lps,
            FilterChannel::Etco2 => telemetry.etco2_mmhg,
        }
    }
}

/// Filtered companions of the measured signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DisplaySignals {
    pub pip_cmh2o: f64,
    pub plateau_cmh2o: f64,
    pub flow_lps: f64,
    pub insp_flow_lps: f64,
    pub etco2_mmhg: f64,
}

impl DisplaySignals {
    fn set(&mut self, channel: FilterChannel, value: f64) {
        match channel {
            FilterChannel::Pip => self.pip_cmh2o = value,
            FilterChannel::Plateau => self.plateau_cmh2o = value,
            FilterChannel::Flow => self.flow_lps = value,
            FilterChannel::InspFlow => self.insp_flow_lps = value,
            FilterChannel::Etco2 => self.etco2_mmhg = value,
        }
    }

    pub(crate) fn write_into(&self, map: &mut IndexMap<String, SignalValue>) {
        let fields = [
            ("display_pip_cmh2o", self.pip_cmh2o),
            ("display_plateau_cmh2o", self.plateau_cmh2o),
            ("display_flow_lps", self.flow_lps),
            ("display_insp_flow_lps", self.insp_flow_lps),
            ("display_etco2_mmhg", self.etco2_mmhg),
        ];
        for (key, value) in fields {
            map.insert(key.into(), SignalValue::Number(value));
        }
    }
}

/// One persistent filter per display channel.
#[derive(Debug, Clone)]
pub struct FilterBank {
    filters: IndexMap<FilterChannel, LowPassFilter>,
}

impl Default for FilterBank {
    fn default() -> Self {
        Self {
            filters: FilterChannel::iter()
                .map(|channel| (channel, LowPassFilter::new(channel.tau_s())))
                .collect(),
        }
    }
}

impl FilterBank {
    pub fn apply(&mut self, telemetry: &Telemetry, dt_s: f64) -> DisplaySignals {
        let mut display = DisplaySignals::default();
        for (channel, filter) in self.filters.iter_mut() {
            display.set(*channel, filter.update(channel.sample(telemetry), dt_s));
        }
        display
    }
}
