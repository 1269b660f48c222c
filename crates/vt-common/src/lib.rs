//! ---
//! vt_section: "01-core-functionality"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Shared primitives and utilities for the twin runtime."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
//! Core shared primitives for the VentTwin workspace.
//! This crate exposes configuration loading, tracing bootstrap, the numeric
//! helpers used by the physiological models, and loop timing utilities.

pub mod config;
pub mod logging;
pub mod math;
pub mod metrics;

pub use config::{
    AppConfig, ControlEventConfig, ControlsConfig, LoadedAppConfig, LoggingConfig, PatientConfig,
    SimulationConfig, ThresholdConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use math::{clamp, normalize_deviation, safe_div, ticks_for};
pub use metrics::{JitterHistogram, JitterSummary, LoopTimingReporter};
