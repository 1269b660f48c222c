//! ---
//! vt_section: "02-simulation"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Sensor distortion for leak, drift, and valve delay faults."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
use vt_common::clamp;

use super::{FaultControls, FaultEngine};
use crate::telemetry::Telemetry;

pub(crate) const MAX_DRIFT_PCT: f64 = 20.0;

impl FaultEngine {
    /// Distort raw telemetry the way a faulty circuit would read it.
    ///
    /// The leak sits downstream of the pressure sensor, so it attenuates
    /// volume fully but pressure readings only partially.
    pub fn apply_sensor_effects(&self, telemetry: &Telemetry, faults: &FaultControls) -> Telemetry {
        let mut out = *telemetry;
        let leak = clamp(faults.leak_pct, 0.0, 100.0);
        let drift = clamp(faults.sensor_drift_pct, 0.0, MAX_DRIFT_PCT);

        out.leak_pct = leak;
        out.tidal_volume_l = (out.tidal_volume_l * (1.0 - leak / 100.0)).max(0.0);
        out.pip_cmh2o *= 1.0 - 0.3 * leak / 100.0;
        out.plateau_cmh2o *= 1.0 - 0.25 * leak / 100.0;

        let drift_factor = 1.0 + drift / 100.0;
        out.pip_cmh2o *= drift_factor;
        out.plateau_cmh2o *= drift_factor;
        out.flow_lps *= drift_factor;
        out.tidal_volume_l *= drift_factor;
        out.sensor_drift_pct = drift;

        let valve_delay = faults.valve_delay_s.max(0.0);
        out.valve_delay_s = valve_delay;
        if valve_delay > 0.0 {
            out.flow_lps *= clamp(1.0 - valve_delay, 0.5, 1.0);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faults::AlarmThresholds;

    fn raw() -> Telemetry {
        Telemetry {
            pip_cmh2o: 30.0,
            plateau_cmh2o: 20.0,
            tidal_volume_l: 0.5,
            flow_lps: 0.4,
            ..Telemetry::default()
        }
    }

    fn engine() -> FaultEngine {
        FaultEngine::new(AlarmThresholds::default(), 0.2, 5.0)
    }

    #[test]
    fn no_faults_is_identity_on_signals() {
        let input = raw();
        let out = engine().apply_sensor_effects(&input, &FaultControls::default());
        assert_eq!(out, input);
    }

    #[test]
    fn leak_hits_volume_harder_than_pressure() {
        let faults = FaultControls {
            leak_pct: 40.0,
            ..FaultControls::default()
        };
        let out = engine().apply_sensor_effects(&raw(), &faults);
        assert!((out.tidal_volume_l - 0.3).abs() < 1e-12);
        assert!((out.pip_cmh2o - 30.0 * 0.88).abs() < 1e-12);
        assert!((out.plateau_cmh2o - 20.0 * 0.9).abs() < 1e-12);
        assert_eq!(out.flow_lps, 0.4);
        assert_eq!(out.leak_pct, 40.0);
    }

    #[test]
    fn drift_is_clamped_and_uniform() {
        let faults = FaultControls {
            sensor_drift_pct: 55.0,
            ..FaultControls::default()
        };
        let out = engine().apply_sensor_effects(&raw(), &faults);
        assert_eq!(out.sensor_drift_pct, 20.0);
        assert!((out.pip_cmh2o - 36.0).abs() < 1e-12);
        assert!((out.plateau_cmh2o - 24.0).abs() < 1e-12);
        assert!((out.flow_lps - 0.48).abs() < 1e-12);
        assert!((out.tidal_volume_l - 0.6).abs() < 1e-12);
    }

    #[test]
    fn valve_delay_attenuates_flow_within_bounds() {
        let engine = engine();
        let delayed = |delay: f64| {
            let faults = FaultControls {
                valve_delay_s: delay,
                ..FaultControls::default()
            };
            engine.apply_sensor_effects(&raw(), &faults).flow_lps
        };
        assert!((delayed(0.2) - 0.32).abs() < 1e-12);
        assert!((delayed(3.0) - 0.2).abs() < 1e-12);
        assert_eq!(delayed(-1.0), 0.4);
    }

    #[test]
    fn input_is_not_mutated() {
        let input = raw();
        let faults = FaultControls {
            leak_pct: 80.0,
            sensor_drift_pct: 10.0,
            valve_delay_s: 0.4,
            oxygen_supply_ok: false,
        };
        let _ = engine().apply_sensor_effects(&input, &faults);
        assert_eq!(input, raw());
    }
}
