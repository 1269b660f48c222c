//! ---
//! vt_section: "02-simulation"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Human-readable explanation bundle for the operator."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{Alarm, FaultDiagnosis, FaultEngine, SeverityAssessment, SeverityLevel};
use crate::telemetry::SignalValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Urgency {
    Immediate,
    Prompt,
    Routine,
}

impl Urgency {
    pub fn for_level(level: SeverityLevel) -> Self {
        match level {
            SeverityLevel::Critical | SeverityLevel::HighRisk => Urgency::Immediate,
            SeverityLevel::Warning => Urgency::Prompt,
            SeverityLevel::Normal => Urgency::Routine,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Immediate => "Immediate",
            Urgency::Prompt => "Prompt",
            Urgency::Routine => "Routine",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub fault_classification: String,
    pub root_cause: String,
    /// Level and score, e.g. `Warning (0.45)`.
    pub severity: String,
    pub recommended_action: String,
    pub urgency: Urgency,
    /// Active alarm names joined by `, `, or `None`.
    pub active_alarms: String,
}

impl Explanation {
    pub(crate) fn write_into(&self, map: &mut IndexMap<String, SignalValue>) {
        let fields = [
            ("explanation_fault_classification", self.fault_classification.as_str()),
            ("explanation_root_cause", self.root_cause.as_str()),
            ("explanation_severity", self.severity.as_str()),
            ("explanation_recommended_action", self.recommended_action.as_str()),
            ("explanation_urgency", self.urgency.as_str()),
            ("explanation_active_alarms", self.active_alarms.as_str()),
        ];
        for (key, value) in fields {
            map.insert(key.into(), SignalValue::from(value));
        }
    }
}

impl FaultEngine {
    pub fn explain(
        &self,
        alarms: &[Alarm],
        diagnosis: &FaultDiagnosis,
        assessment: &SeverityAssessment,
    ) -> Explanation {
        let active: Vec<&str> = alarms
            .iter()
            .filter(|alarm| alarm.active)
            .map(Alarm::name)
            .collect();
        let active_alarms = if active.is_empty() {
            "None".to_owned()
        } else {
            active.join(", ")
        };

        Explanation {
            fault_classification: diagnosis.class.as_str().to_owned(),
            root_cause: diagnosis.root_cause.to_owned(),
            severity: format!("{} ({:.2})", assessment.level, assessment.score),
            recommended_action: diagnosis.class.recommended_action().to_owned(),
            urgency: Urgency::for_level(assessment.level),
            active_alarms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faults::{AlarmThresholds, FaultClass};
    use crate::telemetry::Telemetry;

    fn engine() -> FaultEngine {
        FaultEngine::new(AlarmThresholds::default(), 0.2, 5.0)
    }

    fn diagnosis(class: FaultClass) -> FaultDiagnosis {
        FaultDiagnosis {
            class,
            root_cause: class.root_cause(),
        }
    }

    #[test]
    fn quiet_session_reads_routine() {
        let engine = engine();
        let alarms = engine.compute_alarms(&Telemetry::default());
        let assessment = SeverityAssessment {
            score: 0.06,
            level: SeverityLevel::Normal,
        };
        let explanation = engine.explain(&alarms, &diagnosis(FaultClass::Normal), &assessment);
        assert_eq!(explanation.active_alarms, "None");
        assert_eq!(explanation.urgency, Urgency::Routine);
        assert_eq!(explanation.severity, "Normal (0.06)");
        assert_eq!(explanation.root_cause, "none");
        assert!(explanation.recommended_action.starts_with("Continue monitoring"));
    }

    #[test]
    fn active_alarms_are_joined_in_order() {
        let engine = engine();
        let telemetry = Telemetry {
            spo2_pct: 80.0,
            leak_pct: 40.0,
            ..Telemetry::default()
        };
        let alarms = engine.compute_alarms(&telemetry);
        let assessment = SeverityAssessment {
            score: 0.45,
            level: SeverityLevel::Warning,
        };
        let explanation = engine.explain(
            &alarms,
            &diagnosis(FaultClass::OxygenSupplyFailure),
            &assessment,
        );
        assert_eq!(explanation.active_alarms, "SpO2 Low, Leak High");
        assert_eq!(explanation.urgency, Urgency::Prompt);
        assert_eq!(explanation.fault_classification, "oxygen_supply_failure");
        assert!(explanation.recommended_action.contains("cylinder pressure"));
    }

    #[test]
    fn high_risk_and_critical_are_immediate() {
        assert_eq!(Urgency::for_level(SeverityLevel::HighRisk), Urgency::Immediate);
        assert_eq!(Urgency::for_level(SeverityLevel::Critical), Urgency::Immediate);
    }
}
