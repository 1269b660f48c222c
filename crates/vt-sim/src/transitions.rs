//! ---
//! vt_section: "02-simulation"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Severity and fault-class transition tracking."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
use vt_logging::{log_clinical_event, vt_info, ClinicalOutcome, LogContext};

use crate::faults::{FaultClass, SeverityLevel};

/// Remembers the last reported severity level and fault class and logs
/// every change between ticks.
#[derive(Debug, Clone, Default)]
pub struct TransitionTracker {
    last_level: Option<SeverityLevel>,
    last_fault: Option<FaultClass>,
}

impl TransitionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, ctx: &LogContext, level: SeverityLevel, fault: FaultClass) {
        if self.last_level != Some(level) {
            match self.last_level {
                None => vt_info!(context = ctx, "severity level established at {}", level),
                Some(previous) => {
                    let outcome = if level > previous {
                        ClinicalOutcome::Escalated
                    } else {
                        ClinicalOutcome::Recovered
                    };
                    log_clinical_event(
                        Some(ctx),
                        "severity.transition",
                        &format!("{previous} -> {level}"),
                        outcome,
                    );
                }
            }
            self.last_level = Some(level);
        }

        if self.last_fault != Some(fault) {
            // The first classification is only worth an event when it is a fault.
            if self.last_fault.is_some() || fault != FaultClass::Normal {
                let outcome = if fault == FaultClass::Normal {
                    ClinicalOutcome::Recovered
                } else {
                    ClinicalOutcome::Escalated
                };
                let previous = self.last_fault.unwrap_or(FaultClass::Normal);
                log_clinical_event(
                    Some(ctx),
                    "fault.transition",
                    &format!("{previous} -> {fault}: {}", fault.root_cause()),
                    outcome,
                );
            }
            self.last_fault = Some(fault);
        }
    }

    pub fn current_level(&self) -> Option<SeverityLevel> {
        self.last_level
    }

    pub fn current_fault(&self) -> Option<FaultClass> {
        self.last_fault
    }
}
