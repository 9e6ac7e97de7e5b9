//! ---
//! bas_section: "03-persistence-logging"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "Metrics collection and export utilities."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, StatusCode};
use axum::routing::get;
use axum::{response::IntoResponse, Router};
use prometheus::{
    GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder, TEXT_FORMAT,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared registry type used across services.
pub type SharedRegistry = Arc<Registry>;

pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Spawn an HTTP server that exposes the registry at `/metrics`.
///
/// Binding to port 0 picks a free port; [`MetricsServer::addr`] reports it.
pub fn spawn_http_server(registry: SharedRegistry, addr: SocketAddr) -> Result<MetricsServer> {
    let app = Router::new().route(
        "/metrics",
        get({
            let registry = registry.clone();
            move || metrics_handler(registry.clone())
        }),
    );

    let std_listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind metrics listener {}", addr))?;
    std_listener
        .set_nonblocking(true)
        .with_context(|| "failed to configure metrics listener as non-blocking")?;
    let bound = std_listener
        .local_addr()
        .with_context(|| "failed to read metrics listener address")?;
    let listener = TcpListener::from_std(std_listener)
        .with_context(|| "failed to convert std listener into tokio listener")?;

    info!(address = %bound, "metrics server starting");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let service = app.into_make_service();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        axum::serve(listener, service)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .context("metrics server encountered an error")?;
        Ok(())
    });

    Ok(MetricsServer {
        addr: bound,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

async fn metrics_handler(registry: SharedRegistry) -> impl IntoResponse {
    let families = registry.gather();
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&families) {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static(TEXT_FORMAT),
            )],
            body,
        ),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"))],
                String::from("metrics encoding error"),
            )
        }
    }
}

/// Handle to the running HTTP exporter.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl MetricsServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal shutdown and await task completion.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err),
            Err(join_err) => Err(anyhow::Error::new(join_err)),
        }
    }
}

/// Metrics recorded by the daemon process itself.
#[derive(Clone)]
pub struct DaemonMetrics {
    registry: SharedRegistry,
    starts_total: IntCounter,
    config_load_seconds: Histogram,
    build_info: GaugeVec,
}

impl DaemonMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let starts_total = IntCounter::with_opts(Opts::new(
            "basd_starts_total",
            "Total number of times the daemon has initialised",
        ))?;
        registry.register(Box::new(starts_total.clone()))?;

        let buckets = prometheus::exponential_buckets(0.001, 2.0, 16)
            .context("failed to construct histogram buckets")?;
        let config_load_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "basd_config_load_seconds",
                "Time spent loading and validating configuration",
            )
            .buckets(buckets),
        )?;
        registry.register(Box::new(config_load_seconds.clone()))?;

        let build_info = GaugeVec::new(
            Opts::new("basd_build_info", "Build metadata for the running daemon binary"),
            &["version", "profile"],
        )?;
        registry.register(Box::new(build_info.clone()))?;

        Ok(Self {
            registry,
            starts_total,
            config_load_seconds,
            build_info,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn inc_start(&self) {
        self.starts_total.inc();
    }

    pub fn observe_config_load(&self, seconds: f64) {
        self.config_load_seconds.observe(seconds);
    }

    pub fn set_build_info(&self, version: &str, profile: &str) {
        self.build_info
            .with_label_values(&[version, profile])
            .set(1.0);
    }
}

/// Per-entry outcome counters for the read, write, and call dispatch paths.
#[derive(Clone, Debug)]
pub struct DispatchMetrics {
    registry: SharedRegistry,
    reads: IntCounterVec,
    writes: IntCounterVec,
    calls: IntCounterVec,
    startup_blocks: IntGauge,
    bound_variables: IntGauge,
}

impl DispatchMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let reads = IntCounterVec::new(
            Opts::new("bas_reads_total", "Value reads dispatched, by result status"),
            &["status"],
        )?;
        registry.register(Box::new(reads.clone()))?;

        let writes = IntCounterVec::new(
            Opts::new("bas_writes_total", "Value writes dispatched, by result status"),
            &["status"],
        )?;
        registry.register(Box::new(writes.clone()))?;

        let calls = IntCounterVec::new(
            Opts::new("bas_calls_total", "Method calls dispatched, by result status"),
            &["status"],
        )?;
        registry.register(Box::new(calls.clone()))?;

        let startup_blocks = IntGauge::with_opts(Opts::new(
            "bas_startup_blocks",
            "Equipment blocks exposed by the last node manager startup",
        ))?;
        registry.register(Box::new(startup_blocks.clone()))?;

        let bound_variables = IntGauge::with_opts(Opts::new(
            "bas_bound_variables",
            "Variable nodes bound to a physical address",
        ))?;
        registry.register(Box::new(bound_variables.clone()))?;

        Ok(Self {
            registry,
            reads,
            writes,
            calls,
            startup_blocks,
            bound_variables,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn record_read(&self, status: &str) {
        self.reads.with_label_values(&[status]).inc();
    }

    pub fn record_write(&self, status: &str) {
        self.writes.with_label_values(&[status]).inc();
    }

    pub fn record_call(&self, status: &str) {
        self.calls.with_label_values(&[status]).inc();
    }

    pub fn set_startup(&self, blocks: usize, variables: usize) {
        self.startup_blocks.set(blocks as i64);
        self.bound_variables.set(variables as i64);
    }

    pub fn reads(&self, status: &str) -> u64 {
        self.reads.with_label_values(&[status]).get()
    }

    pub fn writes(&self, status: &str) -> u64 {
        self.writes.with_label_values(&[status]).get()
    }

    pub fn calls(&self, status: &str) -> u64 {
        self.calls.with_label_values(&[status]).get()
    }

    pub fn startup_blocks(&self) -> i64 {
        self.startup_blocks.get()
    }
}

pub use prometheus;
