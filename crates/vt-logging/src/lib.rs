//! ---
//! vt_section: "03-logging"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Structured logging context and clinical event helpers."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Logging context shared by the twin engine and its hosts.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for tests and development.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer())
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Session identifier of the running twin.
    pub session: Option<&'a str>,
    /// Simulation tick counter.
    pub tick: Option<u64>,
    /// Simulation time in seconds.
    pub sim_time_s: Option<f64>,
    /// Breath phase label at the time of the event.
    pub phase: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a session identifier.
    pub fn with_session(mut self, session: &'a str) -> Self {
        self.session = Some(session);
        self
    }

    /// Attach the tick counter and matching simulation time.
    pub fn with_tick(mut self, tick: u64, sim_time_s: f64) -> Self {
        self.tick = Some(tick);
        self.sim_time_s = Some(sim_time_s);
        self
    }

    /// Attach a breath phase label.
    pub fn with_phase(mut self, phase: &'a str) -> Self {
        self.phase = Some(phase);
        self
    }
}

/// Direction of a clinical state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClinicalOutcome {
    /// The patient or circuit state improved or stayed nominal.
    Recovered,
    /// The state worsened and warrants attention.
    Escalated,
}

impl ClinicalOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            ClinicalOutcome::Recovered => "recovered",
            ClinicalOutcome::Escalated => "escalated",
        }
    }

    fn level(&self) -> Level {
        match self {
            ClinicalOutcome::Recovered => Level::INFO,
            ClinicalOutcome::Escalated => Level::WARN,
        }
    }
}

/// Emit a standardized clinical event such as a severity or fault transition.
pub fn log_clinical_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: ClinicalOutcome,
) {
    let default_ctx = LogContext::default();
    let ctx = context.unwrap_or(&default_ctx);
    let session = ctx.session.unwrap_or("");
    let tick = ctx.tick.unwrap_or_default();
    let sim_time_s = ctx.sim_time_s.unwrap_or_default();
    let phase = ctx.phase.unwrap_or("");
    // `tracing::event!` needs a constant level.
    match outcome.level() {
        Level::WARN => tracing::event!(
            Level::WARN,
            event = event,
            outcome = outcome.as_str(),
            session,
            tick,
            sim_time_s,
            phase,
            message = %message
        ),
        _ => tracing::event!(
            Level::INFO,
            event = event,
            outcome = outcome.as_str(),
            session,
            tick,
            sim_time_s,
            phase,
            message = %message
        ),
    }
}
