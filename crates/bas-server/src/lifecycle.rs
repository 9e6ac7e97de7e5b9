//! ---
//! bas_section: "01-core-functionality"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "Primary orchestration and lifecycle management."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bas_common::{AppConfig, ServerConfig};
use bas_device::DeviceRegistry;
use bas_logging::{bas_info, log_system_event, LogContext, SystemEventOutcome};
use bas_metrics::DispatchMetrics;
use bas_ua::{
    AddressSpace, AddressSpaceError, CallMethodRequest, CallMethodResult, DataValue, NodeId,
    NodeManager, ReadValueId, StatusCode, TypeModel, WriteValue,
};
use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::bindings::BindingTable;
use crate::builder::{Namespaces, NodeBuilder};
use crate::dispatcher::Dispatcher;

const MANAGER_NAME: &str = "ControllerNodeManager";

/// Ordered startup steps. Each depends on the previous one succeeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupStep {
    RegisterNamespaces,
    ImportModel,
    InitializeRegistry,
    CreateRootFolder,
    BuildBlocks,
}

impl StartupStep {
    pub const ALL: [StartupStep; 5] = [
        StartupStep::RegisterNamespaces,
        StartupStep::ImportModel,
        StartupStep::InitializeRegistry,
        StartupStep::CreateRootFolder,
        StartupStep::BuildBlocks,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StartupStep::RegisterNamespaces => "register-namespaces",
            StartupStep::ImportModel => "import-model",
            StartupStep::InitializeRegistry => "initialize-registry",
            StartupStep::CreateRootFolder => "create-root-folder",
            StartupStep::BuildBlocks => "build-blocks",
        }
    }
}

impl fmt::Display for StartupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("node manager already started")]
    AlreadyStarted,
    #[error("type model could not be loaded: {0}")]
    ModelLoad(#[source] AddressSpaceError),
    #[error("type model import failed: {0}")]
    ModelImport(#[source] AddressSpaceError),
    #[error("root folder '{folder}' could not be created: {source}")]
    RootFolder {
        folder: String,
        #[source]
        source: AddressSpaceError,
    },
    #[error("block '{block}' at address {address} could not be built: {source}")]
    Block {
        block: String,
        address: i32,
        #[source]
        source: AddressSpaceError,
    },
}

#[derive(Debug)]
pub struct StartupFailure {
    pub step: StartupStep,
    pub error: StartupError,
}

impl StartupFailure {
    fn new(step: StartupStep, error: StartupError) -> Self {
        Self { step, error }
    }
}

/// Outcome of [`ControllerNodeManager::startup`]. State built before a
/// failure stays in place.
#[derive(Debug, Default)]
pub struct StartupReport {
    pub completed: Vec<StartupStep>,
    pub failure: Option<StartupFailure>,
    pub blocks_built: usize,
    pub variables_bound: usize,
}

impl StartupReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.completed.len() == StartupStep::ALL.len()
    }
}

/// Node manager exposing the device registry's equipment as controller
/// objects in the instance namespace.
pub struct ControllerNodeManager {
    server: ServerConfig,
    model_path: Option<PathBuf>,
    address_space: Arc<AddressSpace>,
    registry: Arc<DeviceRegistry>,
    bindings: Arc<BindingTable>,
    dispatcher: Dispatcher,
    metrics: Option<DispatchMetrics>,
    namespaces: OnceCell<Namespaces>,
    running: AtomicBool,
}

impl fmt::Debug for ControllerNodeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(MANAGER_NAME)
            .field("namespaces", &self.namespaces.get())
            .field("running", &self.is_running())
            .field("bound_variables", &self.bindings.variable_count())
            .finish()
    }
}

impl ControllerNodeManager {
    pub fn new(
        config: &AppConfig,
        address_space: Arc<AddressSpace>,
        registry: Arc<DeviceRegistry>,
        metrics: Option<DispatchMetrics>,
    ) -> Self {
        let bindings = Arc::new(BindingTable::new());
        let dispatcher = Dispatcher::new(bindings.clone(), registry.clone(), metrics.clone());
        Self {
            server: config.server.clone(),
            model_path: config.model.path.clone(),
            address_space,
            registry,
            bindings,
            dispatcher,
            metrics,
            namespaces: OnceCell::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Run the startup sequence. Failures are logged and reported; the
    /// process keeps running with whatever was built.
    pub fn startup(&self) -> StartupReport {
        let ctx = LogContext::new().with_component(MANAGER_NAME);
        let mut report = StartupReport::default();
        // Registration is idempotent, so a repeated call only loses the race below.
        let namespaces = NodeBuilder::register_namespaces(&self.address_space, &self.server);
        if self.namespaces.set(namespaces).is_err() {
            report.failure = Some(StartupFailure::new(
                StartupStep::RegisterNamespaces,
                StartupError::AlreadyStarted,
            ));
            self.log_startup(&ctx, &report);
            return report;
        }
        self.step_done(&mut report, StartupStep::RegisterNamespaces);

        let builder = NodeBuilder::new(&self.address_space, &self.bindings, namespaces);
        if let Err(failure) = self.build(&builder, &mut report) {
            report.failure = Some(failure);
        }
        self.running.store(true, Ordering::Release);

        if let Some(metrics) = &self.metrics {
            metrics.set_startup(report.blocks_built, report.variables_bound);
        }
        self.log_startup(&ctx, &report);
        report
    }

    fn build(&self, builder: &NodeBuilder<'_>, report: &mut StartupReport) -> Result<(), StartupFailure> {
        let model = self.load_model().map_err(|err| {
            StartupFailure::new(StartupStep::ImportModel, StartupError::ModelLoad(err))
        })?;
        builder.import_model(&model).map_err(|err| {
            StartupFailure::new(StartupStep::ImportModel, StartupError::ModelImport(err))
        })?;
        self.step_done(report, StartupStep::ImportModel);

        self.registry.initialize();
        self.step_done(report, StartupStep::InitializeRegistry);

        let root = builder
            .create_root_folder(&self.server.root_folder)
            .map_err(|source| {
                StartupFailure::new(
                    StartupStep::CreateRootFolder,
                    StartupError::RootFolder {
                        folder: self.server.root_folder.clone(),
                        source,
                    },
                )
            })?;
        self.step_done(report, StartupStep::CreateRootFolder);

        for block in self.registry.list_blocks() {
            let summary = builder.build_block(&root, &block).map_err(|source| {
                StartupFailure::new(
                    StartupStep::BuildBlocks,
                    StartupError::Block {
                        block: block.name.clone(),
                        address: block.address,
                        source,
                    },
                )
            })?;
            report.blocks_built += 1;
            report.variables_bound += summary.variables;
        }
        self.step_done(report, StartupStep::BuildBlocks);
        Ok(())
    }

    fn load_model(&self) -> Result<TypeModel, AddressSpaceError> {
        match &self.model_path {
            Some(path) => TypeModel::from_path(path),
            None => TypeModel::building_automation(),
        }
    }

    fn step_done(&self, report: &mut StartupReport, step: StartupStep) {
        let ctx = LogContext::new()
            .with_component(MANAGER_NAME)
            .with_step(step.as_str());
        bas_info!(context = ctx, "startup step complete");
        report.completed.push(step);
    }

    fn log_startup(&self, ctx: &LogContext<'_>, report: &StartupReport) {
        match &report.failure {
            None if report.blocks_built == 0 => log_system_event(
                Some(ctx),
                "node_manager.startup",
                "node manager started without equipment",
                SystemEventOutcome::Degraded,
            ),
            None => log_system_event(
                Some(ctx),
                "node_manager.startup",
                &format!(
                    "{} blocks built, {} variables bound",
                    report.blocks_built, report.variables_bound
                ),
                SystemEventOutcome::Success,
            ),
            Some(failure) => {
                let step_ctx = ctx.clone().with_step(failure.step.as_str());
                log_system_event(
                    Some(&step_ctx),
                    "node_manager.startup",
                    &format!(
                        "node manager did not fully start: {} ({} blocks built)",
                        failure.error, report.blocks_built
                    ),
                    SystemEventOutcome::Fault,
                );
            }
        }
    }

    pub fn namespaces(&self) -> Option<Namespaces> {
        self.namespaces.get().copied()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn bindings(&self) -> &Arc<BindingTable> {
        &self.bindings
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Root folder node id, once namespaces are registered.
    pub fn root_folder(&self) -> Option<NodeId> {
        self.namespaces()
            .map(|ns| NodeId::string(ns.instances, &self.server.root_folder))
    }
}

impl NodeManager for ControllerNodeManager {
    fn name(&self) -> &str {
        MANAGER_NAME
    }

    /// The instance namespace stays owned from registration until the process
    /// exits; while the manager is not running its nodes answer BadNodeIdUnknown.
    fn owns(&self, node_id: &NodeId) -> bool {
        self.namespaces
            .get()
            .is_some_and(|ns| ns.instances == node_id.namespace)
    }

    fn read_batch(&self, requests: &[ReadValueId]) -> Vec<DataValue> {
        if !self.is_running() {
            return requests
                .iter()
                .map(|_| DataValue::bad(StatusCode::BAD_NODE_ID_UNKNOWN))
                .collect();
        }
        self.dispatcher.read_batch(requests)
    }

    fn write_batch(&self, requests: &[WriteValue]) -> Vec<StatusCode> {
        if !self.is_running() {
            return vec![StatusCode::BAD_NODE_ID_UNKNOWN; requests.len()];
        }
        self.dispatcher.write_batch(requests)
    }

    fn call_batch(&self, requests: &[CallMethodRequest]) -> Vec<CallMethodResult> {
        if !self.is_running() {
            return requests
                .iter()
                .map(|_| StatusCode::BAD_NODE_ID_UNKNOWN.into())
                .collect();
        }
        self.dispatcher.call_batch(requests)
    }

    fn shutdown(&self) -> Result<(), AddressSpaceError> {
        self.running.store(false, Ordering::Release);
        let ctx = LogContext::new().with_component(MANAGER_NAME);
        log_system_event(
            Some(&ctx),
            "node_manager.shutdown",
            "controller node manager stopped",
            SystemEventOutcome::Success,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bas_common::EquipmentConfig;

    fn manager(config: &AppConfig) -> ControllerNodeManager {
        let space = Arc::new(AddressSpace::new(&config.server.application_uri));
        let registry = Arc::new(DeviceRegistry::new(config.effective_equipment()));
        ControllerNodeManager::new(config, space, registry, None)
    }

    #[test]
    fn full_startup_builds_default_plant() {
        let manager = manager(&AppConfig::default());
        let report = manager.startup();
        assert!(report.is_complete(), "{:?}", report.failure);
        assert_eq!(report.completed, StartupStep::ALL.to_vec());
        assert_eq!(report.blocks_built, 3);
        assert_eq!(report.variables_bound, 15);
        assert_eq!(
            manager.registry().list_blocks().len(),
            EquipmentConfig::default_plant().blocks.len()
        );
    }

    #[test]
    fn second_startup_is_rejected() {
        let manager = manager(&AppConfig::default());
        assert!(manager.startup().is_complete());
        let again = manager.startup();
        assert!(matches!(
            again.failure,
            Some(StartupFailure {
                error: StartupError::AlreadyStarted,
                ..
            })
        ));
    }

    #[test]
    fn stopped_manager_keeps_ownership_but_serves_nothing() {
        let manager = manager(&AppConfig::default());
        let temperature = NodeId::string(3, "AC1.Temperature");
        assert!(!manager.owns(&temperature));
        manager.startup();
        assert!(manager.owns(&temperature));
        assert!(!manager.owns(&NodeId::string(2, "AC1.Temperature")));
        assert_eq!(
            manager.read_batch(&[ReadValueId::value(temperature.clone())])[0].status,
            StatusCode::GOOD
        );

        manager.shutdown().unwrap();
        assert!(manager.owns(&temperature));
        assert_eq!(
            manager.read_batch(&[ReadValueId::value(temperature.clone())])[0].status,
            StatusCode::BAD_NODE_ID_UNKNOWN
        );
        assert_eq!(
            manager.write_batch(&[WriteValue::value(temperature, 1.0)]),
            vec![StatusCode::BAD_NODE_ID_UNKNOWN]
        );
    }

    #[test]
    fn concurrent_startups_build_once() {
        let manager = manager(&AppConfig::default());
        let reports: Vec<StartupReport> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4).map(|_| scope.spawn(|| manager.startup())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(reports.iter().filter(|r| r.is_complete()).count(), 1);
        assert_eq!(manager.bindings().object_count(), 3);
    }
}
