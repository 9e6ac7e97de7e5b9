//! ---
//! bas_section: "01-core-functionality"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "Primary orchestration and lifecycle management."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use std::sync::Arc;

use bas_common::{AppConfig, BlockConfig, EquipmentConfig, EquipmentType, PropertyConfig};
use bas_device::{BlockMode, DeviceRegistry};
use bas_metrics::{new_registry, DispatchMetrics};
use bas_server::{ControllerNodeManager, StartupError, StartupStep};
use bas_ua::{
    ids, AddressSpace, AttributeId, CallMethodRequest, DataType, EuRange, NodeId, QualifiedName,
    ReadValueId, StatusCode, UaServer, Variant, WriteValue,
};

const INSTANCES: u16 = 3;

struct Harness {
    server: UaServer,
    manager: Arc<ControllerNodeManager>,
}

fn harness(config: AppConfig) -> Harness {
    harness_with_metrics(config, None)
}

fn harness_with_metrics(config: AppConfig, metrics: Option<DispatchMetrics>) -> Harness {
    let space = Arc::new(AddressSpace::new(&config.server.application_uri));
    let registry = Arc::new(DeviceRegistry::new(config.effective_equipment()));
    let manager = Arc::new(ControllerNodeManager::new(
        &config,
        space.clone(),
        registry,
        metrics,
    ));
    let server = UaServer::new(space, config.server.endpoint.clone());
    manager.startup();
    server.register_node_manager(manager.clone());
    Harness { server, manager }
}

fn scenario_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.equipment = EquipmentConfig::new(vec![BlockConfig::new(
        "AC1",
        EquipmentType::AirConditioner,
        0,
    )
    .with_property(PropertyConfig::new("Temperature", 0, DataType::Double).with_initial(21.0))
    .with_property(PropertyConfig::new("SetPoint", 1, DataType::Double).writable())]);
    config
}

fn node(path: &str) -> NodeId {
    NodeId::string(INSTANCES, path)
}

#[test]
fn scenario_reads_and_writes_through_the_server() {
    let h = harness(scenario_config());
    let reads = h.server.read(&[ReadValueId::value(node("AC1.Temperature"))]);
    assert_eq!(reads[0].status, StatusCode::GOOD);
    assert_eq!(reads[0].value, Some(Variant::Double(21.0)));
    assert!(reads[0].source_timestamp.is_some());

    let writes = h.server.write(&[
        WriteValue::value(node("AC1.Temperature"), Variant::Int32(99)),
        WriteValue::value(node("AC1.SetPoint"), Variant::Double(22.5)),
    ]);
    assert_eq!(
        writes,
        vec![StatusCode::BAD_USER_ACCESS_DENIED, StatusCode::GOOD]
    );
    let reads = h.server.read(&[ReadValueId::value(node("AC1.SetPoint"))]);
    assert_eq!(reads[0].value, Some(Variant::Double(22.5)));
}

#[test]
fn batch_entries_are_independent_and_ordered() {
    let h = harness(AppConfig::default());
    let reads = h.server.read(&[
        ReadValueId::value(node("AC1.Humidity")),
        ReadValueId::value(node("AC9.Humidity")),
        ReadValueId::value(node("AC2.Temperature")),
        ReadValueId::value(node("Controllers")),
    ]);
    let statuses: Vec<_> = reads.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            StatusCode::GOOD,
            StatusCode::BAD_NODE_ID_UNKNOWN,
            StatusCode::GOOD,
            StatusCode::BAD_NODE_ID_UNKNOWN,
        ]
    );
    assert_eq!(reads[0].value, Some(Variant::Double(45.0)));
    assert_eq!(reads[2].value, Some(Variant::Double(24.0)));
}

#[test]
fn write_with_index_range_is_rejected() {
    let h = harness(AppConfig::default());
    let writes = h.server.write(&[WriteValue::value(
        node("AC1.TemperatureSetPoint"),
        Variant::Double(23.0),
    )
    .with_index_range("0:1")]);
    assert_eq!(writes, vec![StatusCode::BAD_INDEX_RANGE_INVALID]);
}

#[test]
fn read_with_index_range_on_scalar_has_no_data() {
    let h = harness(AppConfig::default());
    let reads = h.server.read(&[
        ReadValueId::value(node("AC1.Temperature")).with_index_range("0"),
        ReadValueId::value(node("AC1.Temperature"))
            .with_data_encoding(QualifiedName::new(0, "Default XML")),
    ]);
    assert_eq!(reads[0].status, StatusCode::BAD_INDEX_RANGE_NO_DATA);
    assert_eq!(reads[1].status, StatusCode::BAD_DATA_ENCODING_INVALID);
}

#[test]
fn access_level_and_range_are_node_metadata() {
    let h = harness(AppConfig::default());
    let reads = h.server.read(&[
        ReadValueId::attribute(node("AC1.TemperatureSetPoint"), AttributeId::AccessLevel),
        ReadValueId::attribute(node("AC1.Temperature"), AttributeId::AccessLevel),
        ReadValueId::attribute(node("AC1"), AttributeId::BrowseName),
    ]);
    assert_eq!(reads[0].value, Some(Variant::Int32(3)));
    assert_eq!(reads[1].value, Some(Variant::Int32(1)));
    assert_eq!(reads[2].value, Some(Variant::from("2:AC1")));

    let space = h.server.address_space();
    let humidity = space.variable(&node("AC1.Humidity")).unwrap();
    assert_eq!(humidity.eu_range, Some(EuRange::new(0.0, 100.0)));
}

#[test]
fn node_tree_hangs_off_the_objects_folder() {
    let h = harness(AppConfig::default());
    let space = h.server.address_space();
    let root = h.manager.root_folder().unwrap();
    assert!(space.children(&ids::OBJECTS_FOLDER).contains(&root));
    assert_eq!(
        space.children(&root),
        vec![node("AC1"), node("AC2"), node("Furnace1")]
    );
    let ac1 = space.node(&node("AC1")).unwrap();
    assert_eq!(ac1.type_definition(), Some(&NodeId::numeric(2, 1003)));
    let furnace = space.node(&node("Furnace1")).unwrap();
    assert_eq!(furnace.type_definition(), Some(&ids::BASE_OBJECT_TYPE));
}

#[test]
fn commands_route_to_the_registry() {
    let h = harness(AppConfig::default());
    let ac1 = node("AC1");
    let results = h.server.call(&[
        CallMethodRequest::new(ac1.clone(), ac1.child("Start"), Vec::new()),
        CallMethodRequest::new(ac1.clone(), ac1.child("Start"), Vec::new()),
        CallMethodRequest::new(
            ac1.clone(),
            ac1.child("StartWithSetPoint"),
            vec![Variant::Double(24.0), Variant::Double(55.0)],
        ),
        CallMethodRequest::new(node("AC9"), node("AC9.Start"), Vec::new()),
        CallMethodRequest::new(ac1.clone(), node("AC2.Stop"), Vec::new()),
    ]);
    let statuses: Vec<_> = results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            StatusCode::GOOD,
            StatusCode::GOOD,
            StatusCode::GOOD,
            StatusCode::BAD_NODE_ID_UNKNOWN,
            StatusCode::BAD_METHOD_INVALID,
        ]
    );
    let registry = h.manager.registry();
    assert_eq!(registry.mode(0), Some(BlockMode::Running));
    assert_eq!(registry.set_points(0), Some((24.0, 55.0)));
    let reads = h.server.read(&[
        ReadValueId::value(ac1.child("State")),
        ReadValueId::value(ac1.child("TemperatureSetPoint")),
    ]);
    assert_eq!(reads[0].value, Some(Variant::Int32(1)));
    assert_eq!(reads[1].value, Some(Variant::Double(24.0)));
}

#[test]
fn duplicate_block_names_stop_construction_but_keep_built_nodes() {
    let mut config = AppConfig::default();
    config.equipment = EquipmentConfig::new(vec![
        BlockConfig::new("AC1", EquipmentType::AirConditioner, 0)
            .with_property(PropertyConfig::new("Temperature", 0, DataType::Double).with_initial(20.0)),
        BlockConfig::new("AC1", EquipmentType::AirConditioner, 1)
            .with_property(PropertyConfig::new("Temperature", 0, DataType::Double)),
        BlockConfig::new("AC3", EquipmentType::AirConditioner, 2)
            .with_property(PropertyConfig::new("Temperature", 0, DataType::Double)),
    ]);
    let space = Arc::new(AddressSpace::new(&config.server.application_uri));
    let registry = Arc::new(DeviceRegistry::new(config.effective_equipment()));
    let manager = Arc::new(ControllerNodeManager::new(&config, space.clone(), registry, None));
    let report = manager.startup();

    let failure = report.failure.as_ref().unwrap();
    assert_eq!(failure.step, StartupStep::BuildBlocks);
    assert!(matches!(
        &failure.error,
        StartupError::Block { block, address: 1, .. } if block == "AC1"
    ));
    assert_eq!(report.blocks_built, 1);
    assert!(!space.contains(&node("AC3")));

    let server = UaServer::new(space, config.server.endpoint.clone());
    server.register_node_manager(manager);
    let reads = server.read(&[ReadValueId::value(node("AC1.Temperature"))]);
    assert_eq!(reads[0].value, Some(Variant::Double(20.0)));
}

#[test]
fn missing_model_file_is_contained() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.model.path = Some(dir.path().join("missing.toml"));
    let h = harness(config);
    let report_blocks = h.manager.bindings().object_count();
    assert_eq!(report_blocks, 0);
    assert!(h.manager.is_running());
    let reads = h.server.read(&[ReadValueId::value(node("AC1.Temperature"))]);
    assert_eq!(reads[0].status, StatusCode::BAD_NODE_ID_UNKNOWN);
}

#[test]
fn custom_model_file_is_imported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.toml");
    std::fs::write(
        &path,
        r#"
namespace_uri = "http://se.com/BuildingAutomation/"

[[object_types]]
id = 1003
browse_name = "AirConditionerControllerType"

[[object_types.variables]]
browse_name = "Temperature"
"#,
    )
    .unwrap();
    let mut config = scenario_config();
    config.model.path = Some(path);

    let space = Arc::new(AddressSpace::new(&config.server.application_uri));
    let registry = Arc::new(DeviceRegistry::new(config.effective_equipment()));
    let manager = ControllerNodeManager::new(&config, space.clone(), registry, None);
    let report = manager.startup();
    assert!(report.is_complete(), "{:?}", report.failure);
    assert_eq!(report.variables_bound, 2);
    assert!(space.contains(&node("AC1.SetPoint")));
}

#[test]
fn invalid_equipment_leaves_empty_tree() {
    let mut config = AppConfig::default();
    config.equipment = EquipmentConfig::new(vec![BlockConfig::new(
        "Bad",
        EquipmentType::Generic,
        -1,
    )]);
    let h = harness(config);
    let root = h.manager.root_folder().unwrap();
    assert!(h.server.address_space().children(&root).is_empty());
    assert!(h.manager.registry().read(-1, 0).is_none());
    assert_eq!(
        h.manager.registry().start(-1),
        StatusCode::BAD_NODE_ID_UNKNOWN
    );
}

#[test]
fn metrics_reflect_startup_and_dispatch() {
    let metrics = DispatchMetrics::new(new_registry()).unwrap();
    let h = harness_with_metrics(AppConfig::default(), Some(metrics.clone()));
    assert_eq!(metrics.startup_blocks(), 3);
    h.server.read(&[ReadValueId::value(node("AC1.Temperature"))]);
    h.server
        .call(&[CallMethodRequest::new(node("AC1"), node("AC1.Stop"), Vec::new())]);
    assert_eq!(metrics.reads("Good"), 1);
    assert_eq!(metrics.calls("Good"), 1);
}

#[test]
fn concurrent_sessions_dispatch_safely() {
    let h = harness(AppConfig::default());
    std::thread::scope(|scope| {
        for worker in 0..4 {
            let server = &h.server;
            scope.spawn(move || {
                for i in 0..100 {
                    let value = f64::from(15 + (worker + i) % 15);
                    let writes = server.write(&[WriteValue::value(
                        node("AC1.TemperatureSetPoint"),
                        Variant::Double(value),
                    )]);
                    assert_eq!(writes, vec![StatusCode::GOOD]);
                    let reads = server.read(&[
                        ReadValueId::value(node("AC1.TemperatureSetPoint")),
                        ReadValueId::value(node("ghost")),
                    ]);
                    assert!(matches!(reads[0].value, Some(Variant::Double(_))));
                    assert_eq!(reads[1].status, StatusCode::BAD_NODE_ID_UNKNOWN);
                }
            });
        }
    });
}

#[test]
fn shutdown_leaves_bound_nodes_unknown() {
    let h = harness(AppConfig::default());
    h.server.shutdown();
    assert!(!h.manager.is_running());
    let reads = h.server.read(&[ReadValueId::value(node("AC1.Temperature"))]);
    assert_eq!(reads[0].status, StatusCode::BAD_NODE_ID_UNKNOWN);
    assert_eq!(reads[0].value, None);
    let calls = h
        .server
        .call(&[CallMethodRequest::new(node("AC1"), node("AC1.Start"), Vec::new())]);
    assert_eq!(calls[0].status, StatusCode::BAD_NODE_ID_UNKNOWN);
}

#[test]
fn property_named_after_a_method_fails_its_block_cleanly() {
    let mut config = AppConfig::default();
    config.equipment = EquipmentConfig::new(vec![
        BlockConfig::new("AC0", EquipmentType::AirConditioner, 5)
            .with_property(PropertyConfig::new("Temperature", 0, DataType::Double).with_initial(19.0)),
        BlockConfig::new("AC1", EquipmentType::AirConditioner, 0)
            .with_property(PropertyConfig::new("Start", 0, DataType::Double).with_initial(7.0)),
    ]);
    let space = Arc::new(AddressSpace::new(&config.server.application_uri));
    let registry = Arc::new(DeviceRegistry::new(config.effective_equipment()));
    let manager = Arc::new(ControllerNodeManager::new(&config, space.clone(), registry, None));
    let report = manager.startup();

    let failure = report.failure.as_ref().unwrap();
    assert!(matches!(
        &failure.error,
        StartupError::Block { block, address: 0, .. } if block == "AC1"
    ));
    assert_eq!(manager.bindings().address_of(&node("AC1.Start")), None);
    assert_eq!(manager.bindings().block_of(&node("AC1")), None);

    let server = UaServer::new(space, config.server.endpoint.clone());
    server.register_node_manager(manager);
    let reads = server.read(&[
        ReadValueId::value(node("AC1.Start")),
        ReadValueId::value(node("AC0.Temperature")),
    ]);
    assert_eq!(reads[0].status, StatusCode::BAD_NODE_ID_UNKNOWN);
    assert_eq!(reads[0].value, None);
    assert_eq!(reads[1].value, Some(Variant::Double(19.0)));
    let calls = server.call(&[CallMethodRequest::new(node("AC1"), node("AC1.Stop"), Vec::new())]);
    assert_eq!(calls[0].status, StatusCode::BAD_NODE_ID_UNKNOWN);
}

#[test]
fn model_declared_arguments_govern_method_calls() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.toml");
    std::fs::write(
        &path,
        r#"
[[object_types]]
id = 1003
browse_name = "AirConditionerControllerType"

[[object_types.methods]]
browse_name = "StartWithSetPoint"

[[object_types.methods.input_arguments]]
name = "TemperatureSetPoint"
data_type = "Double"
"#,
    )
    .unwrap();
    let mut config = AppConfig::default();
    config.model.path = Some(path);
    config.equipment = EquipmentConfig::new(vec![BlockConfig::new(
        "AC1",
        EquipmentType::AirConditioner,
        0,
    )
    .with_property(PropertyConfig::new("Temperature", 0, DataType::Double))]);
    let h = harness(config);

    let method = node("AC1.StartWithSetPoint");
    let calls = h.server.call(&[
        CallMethodRequest::new(node("AC1"), method.clone(), vec![Variant::Double(23.0)]),
        CallMethodRequest::new(
            node("AC1"),
            method,
            vec![Variant::Double(23.0), Variant::Double(45.0)],
        ),
    ]);
    assert_eq!(calls[0].status, StatusCode::GOOD);
    assert_eq!(calls[1].status, StatusCode::BAD_TOO_MANY_ARGUMENTS);
    assert_eq!(h.manager.registry().mode(0), Some(BlockMode::Running));
    assert_eq!(h.manager.registry().set_points(0), Some((23.0, 0.0)));
}
