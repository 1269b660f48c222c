//! ---
//! vt_section: "02-simulation"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "SpO2 and EtCO2 derivation from measured ventilation."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
use vt_common::clamp;

use super::{FaultControls, FaultEngine, PatientRiskFactors};
use crate::telemetry::Telemetry;

/// FiO2 delivered when the oxygen source has failed.
pub const ROOM_AIR_FIO2: f64 = 0.21;
/// Minute ventilation (L/min) at which EtCO2 sits at its 40 mmHg midpoint.
pub const MINUTE_VENTILATION_TARGET_LPM: f64 = 7.0;

impl FaultEngine {
    pub fn derive_gases(
        &self,
        telemetry: &Telemetry,
        faults: &FaultControls,
        patient: &PatientRiskFactors,
    ) -> Telemetry {
        let configured_fio2 = clamp(telemetry.fio2_set, ROOM_AIR_FIO2, 1.0);
        let effective_fio2 = if faults.oxygen_supply_ok {
            configured_fio2
        } else {
            ROOM_AIR_FIO2
        };
        let tidal_volume = telemetry.tidal_volume_l.max(0.0);
        let rr = telemetry.rr_bpm.max(1.0);
        let leak = clamp(telemetry.leak_pct, 0.0, 100.0);

        let oxygenation_factor = clamp(1.0 - 0.6 * patient.severity(), 0.3, 1.0);
        let leak_penalty = clamp(1.0 - leak / 100.0, 0.0, 1.0);
        let enrichment = clamp((effective_fio2 - ROOM_AIR_FIO2) / 0.79, 0.0, 1.0);
        let spo2 = 80.0 + 20.0 * enrichment * oxygenation_factor * leak_penalty;

        let minute_ventilation = tidal_volume * rr;
        let ventilation_gap = (MINUTE_VENTILATION_TARGET_LPM - minute_ventilation)
            / MINUTE_VENTILATION_TARGET_LPM;
        let etco2 = 40.0 + 12.0 * clamp(ventilation_gap, -1.0, 1.0);

        let mut out = *telemetry;
        out.fio2_set = configured_fio2;
        out.fio2 = effective_fio2;
        out.spo2_pct = clamp(spo2, 70.0, 100.0);
        out.etco2_mmhg = clamp(etco2, 20.0, 70.0);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faults::AlarmThresholds;

    fn engine() -> FaultEngine {
        FaultEngine::new(AlarmThresholds::default(), 0.2, 5.0)
    }

    fn ventilated(fio2: f64, tidal_volume_l: f64) -> Telemetry {
        Telemetry {
            fio2,
            fio2_set: fio2,
            tidal_volume_l,
            rr_bpm: 16.0,
            ..Telemetry::default()
        }
    }

    #[test]
    fn full_oxygen_healthy_lung_saturates() {
        let patient = PatientRiskFactors { ards_severity: 0.0 };
        let out = engine().derive_gases(&ventilated(1.0, 0.4), &FaultControls::default(), &patient);
        assert!((out.spo2_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn ards_limits_oxygenation() {
        let patient = PatientRiskFactors { ards_severity: 0.6 };
        let out = engine().derive_gases(&ventilated(0.5, 0.5), &FaultControls::default(), &patient);
        let expected = 80.0 + 20.0 * (0.29 / 0.79) * 0.64;
        assert!((out.spo2_pct - expected).abs() < 1e-9);
    }

    #[test]
    fn oxygen_failure_forces_room_air() {
        let faults = FaultControls {
            oxygen_supply_ok: false,
            ..FaultControls::default()
        };
        let out = engine().derive_gases(
            &ventilated(0.9, 0.5),
            &faults,
            &PatientRiskFactors::default(),
        );
        assert_eq!(out.fio2, ROOM_AIR_FIO2);
        assert_eq!(out.fio2_set, 0.9);
        assert!((out.spo2_pct - 80.0).abs() < 1e-9);
    }

    #[test]
    fn etco2_tracks_minute_ventilation() {
        let engine = engine();
        let patient = PatientRiskFactors::default();
        let faults = FaultControls::default();
        let at_target = engine.derive_gases(&ventilated(0.5, 7.0 / 16.0), &faults, &patient);
        assert!((at_target.etco2_mmhg - 40.0).abs() < 1e-9);
        let apnoeic = engine.derive_gases(&ventilated(0.5, 0.0), &faults, &patient);
        assert!((apnoeic.etco2_mmhg - 52.0).abs() < 1e-9);
        let hyperventilated = engine.derive_gases(&ventilated(0.5, 2.0), &faults, &patient);
        assert!((hyperventilated.etco2_mmhg - 28.0).abs() < 1e-9);
    }
}
