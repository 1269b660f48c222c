//! ---
//! vt_section: "02-simulation"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Closed-loop ventilator and ARDS lung digital twin core."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
//! Simulation core of the twin: lung mechanics, the breath-cycle
//! ventilator, the fault engine, and the scenario orchestrator.

pub mod clock;
pub mod control;
pub mod errors;
pub mod faults;
pub mod filter;
pub mod lung;
pub mod scenario;
pub mod script;
pub mod telemetry;
pub mod transitions;
pub mod ventilator;

pub use clock::SimClock;
pub use control::{pressure_target_flow, ControlLawDiagnostics};
pub use errors::{Result, SimError};
pub use faults::{
    Alarm, AlarmFlags, AlarmKind, AlarmSeverity, AlarmThresholds, Explanation, FaultClass,
    FaultControls, FaultDiagnosis, FaultEngine, PatientRiskFactors, PersistenceMap,
    SeverityAssessment, SeverityLevel, Urgency,
};
pub use filter::{DisplaySignals, FilterBank, FilterChannel, LowPassFilter};
pub use lung::{LungModel, LungParameters, LungStep};
pub use scenario::{EngineOptions, ScenarioControls, ScenarioEngine};
pub use script::{ControlEvent, ControlOverrides, ScenarioPreset, ScenarioRunner, ScenarioScript};
pub use telemetry::{SignalValue, Snapshot, Telemetry, TelemetryRecord};
pub use ventilator::{
    BreathPhase, VentilatorFrame, VentilatorInternalState, VentilatorModel, VentilatorSettings,
};
