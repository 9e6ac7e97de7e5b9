//! ---
//! bas_section: "03-persistence-logging"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "Structured logging adapters and sinks."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
#[doc(hidden)]
#[macro_export]
macro_rules! __bas_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        $crate::tracing::event!(
            $level,
            component = ctx.component.unwrap_or(""),
            block = ctx.block.unwrap_or(""),
            address = ctx.address.unwrap_or(-1),
            step = ctx.step.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with equipment context.
#[macro_export]
macro_rules! bas_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__bas_event!($crate::tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__bas_event!($crate::tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with equipment context.
#[macro_export]
macro_rules! bas_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__bas_event!($crate::tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__bas_event!($crate::tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with equipment context.
#[macro_export]
macro_rules! bas_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__bas_event!($crate::tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__bas_event!($crate::tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with equipment context.
#[macro_export]
macro_rules! bas_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__bas_event!($crate::tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__bas_event!($crate::tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
