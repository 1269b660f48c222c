//! ---
//! vt_section: "02-simulation"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Discrete simulation clock advancing in fixed ticks."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---

/// Fixed-step clock. Time is derived from the tick count so it does not
/// accumulate rounding error over long sessions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimClock {
    dt_s: f64,
    tick: u64,
}

impl SimClock {
    pub fn new(dt_s: f64) -> Self {
        Self { dt_s, tick: 0 }
    }

    pub fn dt_s(&self) -> f64 {
        self.dt_s
    }

    /// Ticks completed so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn now_s(&self) -> f64 {
        self.tick as f64 * self.dt_s
    }

    /// Complete one tick and return the time at which it started.
    pub fn advance(&mut self) -> f64 {
        let started = self.now_s();
        self.tick += 1;
        started
    }
}
