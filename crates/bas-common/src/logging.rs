//! ---
//! bas_section: "01-core-functionality"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "Shared primitives and utilities for the core runtime."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

pub const LOG_ENV: &str = "BAS_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Output format of the stdout log layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

/// Resolve the filter directive: `BAS_LOG`, then `RUST_LOG`, then `info`.
pub fn resolve_filter(bas_log: Option<&str>, rust_log: Option<&str>) -> EnvFilter {
    if let Some(directive) = bas_log {
        return EnvFilter::try_new(directive).unwrap_or_else(|err| {
            eprintln!("invalid {LOG_ENV} directive ({err}); defaulting to {DEFAULT_DIRECTIVE}");
            EnvFilter::new(DEFAULT_DIRECTIVE)
        });
    }
    rust_log
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

fn stdout_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span> + 'static,
{
    let layer = fmt::layer().with_writer(std::io::stdout);
    match format {
        LogFormat::StructuredJson => layer.with_target(false).json().boxed(),
        LogFormat::Pretty => layer.boxed(),
    }
}

/// Install the global tracing subscriber: stdout in the configured format plus
/// a daily rolling JSON file `<service>.log` under `config.directory`.
///
/// Calling this more than once is harmless; later calls keep the first subscriber.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory)?;
    let file_appender = daily(&config.directory, format!("{service_name}.log"));
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let _ = FILE_GUARD.set(file_guard);

    let filter = resolve_filter(
        std::env::var(LOG_ENV).ok().as_deref(),
        std::env::var("RUST_LOG").ok().as_deref(),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer(config.format))
        .with(fmt::layer().json().with_writer(file_writer))
        .try_init()
        .ok();

    info!(service = %service_name, log_dir = %config.directory.display(), format = ?config.format, "tracing initialised");
    Ok(())
}
