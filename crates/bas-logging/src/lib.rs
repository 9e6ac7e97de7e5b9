//! ---
//! bas_section: "03-persistence-logging"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "Structured logging adapters and sinks."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Context-enriched logging macros and lifecycle event helpers.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

#[doc(hidden)]
pub use tracing;

/// Initialize a baseline tracing subscriber suitable for tests and tools.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer())
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Component emitting the event, usually a node manager name.
    pub component: Option<&'a str>,
    /// Equipment block name.
    pub block: Option<&'a str>,
    /// Physical block address.
    pub address: Option<i32>,
    /// Lifecycle step in progress.
    pub step: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the emitting component.
    pub fn with_component(mut self, component: &'a str) -> Self {
        self.component = Some(component);
        self
    }

    /// Attach a block name and its address.
    pub fn with_block(mut self, block: &'a str, address: i32) -> Self {
        self.block = Some(block);
        self.address = Some(address);
        self
    }

    /// Attach a lifecycle step.
    pub fn with_step(mut self, step: &'a str) -> Self {
        self.step = Some(step);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation completed with recoverable issues.
    Degraded,
    /// The operation failed or was aborted.
    Fault,
}

impl SystemEventOutcome {
    /// Lowercase label recorded in the `outcome` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Degraded => "degraded",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized system event with an outcome.
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let default = LogContext::default();
    let ctx = context.unwrap_or(&default);
    macro_rules! emit {
        ($level:expr) => {
            tracing::event!(
                $level,
                event,
                outcome = outcome.as_str(),
                component = ctx.component.unwrap_or(""),
                block = ctx.block.unwrap_or(""),
                address = ctx.address.unwrap_or(-1),
                step = ctx.step.unwrap_or(""),
                message = %message
            )
        };
    }
    match outcome {
        SystemEventOutcome::Success => emit!(Level::INFO),
        SystemEventOutcome::Degraded => emit!(Level::WARN),
        SystemEventOutcome::Fault => emit!(Level::ERROR),
    }
}
