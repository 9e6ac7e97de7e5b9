//! ---
//! bas_section: "01-core-functionality"
//! bas_subsection: "binary"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "Binary entrypoint for the building automation server daemon."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use bas_common::config::AppConfig;
use bas_common::logging::init_tracing;
use bas_device::DeviceRegistry;
use bas_metrics::{new_registry, spawn_http_server, DaemonMetrics, DispatchMetrics};
use bas_server::{ControllerNodeManager, StartupReport};
use bas_ua::{AddressSpace, AttributeId, NodeClass, NodeId, ReadValueId, UaServer};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Building automation OPC UA server daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Override the type model file")]
    model: Option<PathBuf>,

    #[arg(long, value_name = "URL", help = "Override the advertised endpoint")]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Start the server and run until ctrl-c")]
    Run,
    #[command(about = "Build the address space, print the equipment tree, and exit")]
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/basd.toml"));

    let load_started = Instant::now();
    let loaded = AppConfig::load_with_source(&candidates)?;
    let mut config = loaded.config;
    let load_duration = load_started.elapsed();

    if let Some(model) = cli.model {
        config.model.path = Some(model);
    }
    if let Some(endpoint) = cli.endpoint {
        config.server.endpoint = endpoint;
        config.validate()?;
    }

    let metrics_registry = new_registry();
    let daemon_metrics = DaemonMetrics::new(metrics_registry.clone())?;
    daemon_metrics.observe_config_load(load_duration.as_secs_f64());
    daemon_metrics.inc_start();
    let profile = if cfg!(debug_assertions) { "debug" } else { "release" };
    daemon_metrics.set_build_info(env!("CARGO_PKG_VERSION"), profile);

    init_tracing("basd", &config.logging)?;
    info!(config_path = %loaded.source.display(), "configuration loaded");

    let dispatch_metrics = DispatchMetrics::new(metrics_registry.clone())?;
    let address_space = Arc::new(AddressSpace::new(&config.server.application_uri));
    let registry = Arc::new(DeviceRegistry::new(config.effective_equipment()));
    let manager = Arc::new(ControllerNodeManager::new(
        &config,
        address_space.clone(),
        registry,
        Some(dispatch_metrics),
    ));
    let server = UaServer::new(address_space, config.server.endpoint.clone());

    let report = manager.startup();
    if let Some(failure) = &report.failure {
        warn!(step = %failure.step, error = %failure.error, "controller node manager degraded");
    }
    server.register_node_manager(manager.clone());

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let metrics_server = if config.metrics.enabled {
                info!(address = %config.metrics.listen, "metrics exporter enabled");
                Some(spawn_http_server(metrics_registry, config.metrics.listen)?)
            } else {
                info!("metrics exporter disabled by configuration");
                None
            };

            info!(
                endpoint = %server.endpoint(),
                product = %config.server.product_name,
                namespaces = ?server.address_space().namespace_uris(),
                "server running; waiting for termination signal"
            );
            signal::ctrl_c().await?;
            info!("ctrl-c received; shutting down");
            server.shutdown();

            if let Some(metrics_server) = metrics_server {
                metrics_server.shutdown().await?;
            }
        }
        Commands::Check => {
            print_tree(&server, &manager, &report);
            server.shutdown();
        }
    }

    Ok(())
}

fn print_tree(server: &UaServer, manager: &ControllerNodeManager, report: &StartupReport) {
    println!("Endpoint: {}", server.endpoint());
    for (index, uri) in server.address_space().namespace_uris().iter().enumerate() {
        println!("ns={index} {uri}");
    }
    match &report.failure {
        None => println!("Startup: complete"),
        Some(failure) => println!("Startup: failed at {} ({})", failure.step, failure.error),
    }
    if let Some(root) = manager.root_folder() {
        print_node(server, &root, 0);
    }
}

fn print_node(server: &UaServer, node_id: &NodeId, depth: usize) {
    let space = server.address_space();
    let Some(node) = space.node(node_id) else {
        return;
    };
    let indent = "  ".repeat(depth);
    match node.node_class() {
        NodeClass::Variable => {
            let value = server
                .read(&[ReadValueId::value(node_id.clone())])
                .remove(0);
            let access = server
                .read(&[ReadValueId::attribute(node_id.clone(), AttributeId::AccessLevel)])
                .remove(0);
            println!(
                "{indent}{} = {:?} [{}] access={:?}",
                node.browse_name.name,
                value.value,
                value.status,
                access.value
            );
        }
        class => println!("{indent}{} ({class:?})", node.browse_name.name),
    }
    for child in space.children(node_id) {
        print_node(server, &child, depth + 1);
    }
}
