//! ---
//! vt_section: "02-simulation"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Composite severity scoring."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use vt_common::{clamp, normalize_deviation};

use super::{Alarm, FaultEngine, PatientRiskFactors};
use crate::telemetry::Telemetry;

/// Active alarm count at which the alarm-burden term saturates.
const ALARM_BURDEN_SATURATION: f64 = 6.0;

/// Operator-facing severity bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SeverityLevel {
    Normal,
    Warning,
    #[serde(rename = "High Risk")]
    HighRisk,
    Critical,
}

impl SeverityLevel {
    pub fn from_score(score: f64) -> Self {
        if score < 0.3 {
            SeverityLevel::Normal
        } else if score < 0.6 {
            SeverityLevel::Warning
        } else if score < 0.8 {
            SeverityLevel::HighRisk
        } else {
            SeverityLevel::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::Normal => "Normal",
            SeverityLevel::Warning => "Warning",
            SeverityLevel::HighRisk => "High Risk",
            SeverityLevel::Critical => "Critical",
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeverityAssessment {
    pub score: f64,
    pub level: SeverityLevel,
}

impl FaultEngine {
    /// Normalised deviations of PIP, plateau, SpO2, EtCO2 and leak, in that order.
    pub fn parameter_deviations(&self, telemetry: &Telemetry) -> [f64; 5] {
        let thr = &self.thresholds;
        [
            normalize_deviation(telemetry.pip_cmh2o, 0.0, thr.pip_high_cmh2o),
            normalize_deviation(telemetry.plateau_cmh2o, 0.0, thr.plateau_high_cmh2o),
            normalize_deviation(telemetry.spo2_pct, thr.spo2_low_pct, 100.0),
            normalize_deviation(telemetry.etco2_mmhg, thr.etco2_low_mmhg, thr.etco2_high_mmhg),
            normalize_deviation(telemetry.leak_pct, 0.0, thr.leak_high_pct),
        ]
    }

    pub fn severity_score(
        &self,
        telemetry: &Telemetry,
        alarms: &[Alarm],
        patient: &PatientRiskFactors,
    ) -> SeverityAssessment {
        let mean_deviation = self.parameter_deviations(telemetry).iter().mean();

        let active = alarms.iter().filter(|alarm| alarm.active);
        let alarm_burden = clamp(
            active.clone().count() as f64 / ALARM_BURDEN_SATURATION,
            0.0,
            1.0,
        );
        let worst_tier = active
            .map(|alarm| alarm.severity.weight())
            .fold(0.0, f64::max);

        let score = 0.4 * mean_deviation
            + 0.3 * alarm_burden
            + 0.2 * worst_tier
            + 0.1 * patient.severity();
        let score = clamp(score, 0.0, 1.0);
        SeverityAssessment {
            score,
            level: SeverityLevel::from_score(score),
        }
    }
}
