//! ---
//! vt_section: "02-simulation"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Typed errors raised when building a twin session."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimError>;

/// Failures surfaced at session construction. The tick path never errors.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("timestep must be a positive finite number of seconds, got {0}")]
    InvalidTimestep(f64),
    #[error("invalid alarm thresholds: {0}")]
    InvalidThresholds(String),
    #[error("persistence window of {persist_s}s is shorter than one tick of {dt_s}s")]
    InvalidPersistenceWindow { persist_s: f64, dt_s: f64 },
    #[error("ARDS severity must lie in [0, 1], got {0}")]
    InvalidPatient(f64),
    #[error("scenario event #{index} is invalid: {reason}")]
    InvalidScriptEvent { index: usize, reason: String },
    #[error("unknown scenario preset '{0}'")]
    UnknownPreset(String),
}
