//! ---
//! vt_section: "03-logging"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Context-enriched logging macros."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
#[doc(hidden)]
#[macro_export]
macro_rules! __vt_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            session = ctx.session.unwrap_or(""),
            tick = ctx.tick.unwrap_or_default(),
            sim_time_s = ctx.sim_time_s.unwrap_or_default(),
            phase = ctx.phase.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with twin session context.
#[macro_export]
macro_rules! vt_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__vt_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__vt_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with twin session context.
#[macro_export]
macro_rules! vt_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__vt_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__vt_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning log enriched with twin session context.
#[macro_export]
macro_rules! vt_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__vt_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__vt_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with twin session context.
#[macro_export]
macro_rules! vt_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__vt_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__vt_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
