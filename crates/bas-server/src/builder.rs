//! ---
//! bas_section: "01-core-functionality"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "Primary orchestration and lifecycle management."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use bas_common::{BlockConfig, EquipmentType, ServerConfig};
use bas_device::PhysicalAddress;
use bas_ua::{
    ids, AccessLevel, AddVariableSettings, AddressSpace, AddressSpaceError, CreateObjectSettings,
    NodeId, NodeKind, QualifiedName, TypeModel,
};
use tracing::{debug, warn};

use crate::bindings::{BindingTable, CommandKind, MethodBinding};

/// Numeric identifier of `AirConditionerControllerType` in the type namespace.
pub const AIR_CONDITIONER_CONTROLLER_TYPE: u32 = 1003;

/// Namespace indices registered by the controller node manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Namespaces {
    pub types: u16,
    pub instances: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct BlockSummary {
    pub variables: usize,
    pub methods: usize,
}

/// Populates the address space with the equipment node tree and records each
/// node's device location in the binding table.
pub(crate) struct NodeBuilder<'a> {
    address_space: &'a AddressSpace,
    bindings: &'a BindingTable,
    namespaces: Namespaces,
}

impl<'a> NodeBuilder<'a> {
    pub(crate) fn register_namespaces(address_space: &AddressSpace, server: &ServerConfig) -> Namespaces {
        Namespaces {
            types: address_space.register_namespace(&server.type_namespace_uri),
            instances: address_space.register_namespace(&server.instance_namespace_uri),
        }
    }

    pub(crate) fn new(
        address_space: &'a AddressSpace,
        bindings: &'a BindingTable,
        namespaces: Namespaces,
    ) -> Self {
        Self {
            address_space,
            bindings,
            namespaces,
        }
    }

    pub(crate) fn import_model(&self, model: &TypeModel) -> Result<usize, AddressSpaceError> {
        if let Some(uri) = &model.namespace_uri {
            let declared = self.address_space.namespace_index(uri);
            if declared != Some(self.namespaces.types) {
                warn!(model_namespace = %uri, "model namespace differs from the type namespace");
            }
        }
        self.address_space.import_model(self.namespaces.types, model)
    }

    pub(crate) fn create_root_folder(&self, name: &str) -> Result<NodeId, AddressSpaceError> {
        self.address_space.create_object(CreateObjectSettings {
            parent_node_id: ids::OBJECTS_FOLDER,
            reference_type_id: ids::ORGANIZES,
            requested_node_id: NodeId::string(self.namespaces.instances, name),
            browse_name: QualifiedName::new(self.namespaces.instances, name),
            display_name: None,
            type_definition_id: ids::FOLDER_TYPE,
        })
    }

    fn type_definition(&self, equipment_type: EquipmentType) -> NodeId {
        match equipment_type {
            EquipmentType::AirConditioner => {
                NodeId::numeric(self.namespaces.types, AIR_CONDITIONER_CONTROLLER_TYPE)
            }
            EquipmentType::Furnace | EquipmentType::Generic => ids::BASE_OBJECT_TYPE,
        }
    }

    /// Create the object for `block` beneath `root` and bind its properties.
    ///
    /// Properties without a placeholder from the type definition get a new
    /// variable under the object. Bindings are recorded only once every
    /// property of the block resolved to a variable.
    pub(crate) fn build_block(
        &self,
        root: &NodeId,
        block: &BlockConfig,
    ) -> Result<BlockSummary, AddressSpaceError> {
        let types = self.namespaces.types;
        let object = self.address_space.create_object(CreateObjectSettings {
            parent_node_id: root.clone(),
            reference_type_id: ids::ORGANIZES,
            requested_node_id: NodeId::string(self.namespaces.instances, &block.name),
            browse_name: QualifiedName::new(types, &block.name),
            display_name: Some(block.name.clone()),
            type_definition_id: self.type_definition(block.equipment_type),
        })?;

        let mut variables = Vec::with_capacity(block.properties.len());
        for property in &block.properties {
            let browse_name = QualifiedName::new(types, &property.name);
            let variable = match self.address_space.find_child(&object, &browse_name) {
                Some(existing) => existing,
                None => {
                    debug!(block = %block.name, property = %property.name, "no placeholder; adding variable");
                    self.address_space.add_variable(AddVariableSettings {
                        parent_node_id: object.clone(),
                        requested_node_id: object.child(&property.name),
                        browse_name,
                        data_type: property.data_type,
                    })?
                }
            };
            self.address_space.update_variable(&variable, |attrs| {
                attrs.data_type = property.data_type;
                attrs.access_level = AccessLevel::for_writable(property.writable);
                if let Some(range) = property.range {
                    attrs.eu_range = Some(range);
                }
            })?;
            variables.push((variable, PhysicalAddress::new(block.address, property.offset)));
        }

        let mut methods = Vec::new();
        for child in self.address_space.children(&object) {
            let Some(node) = self.address_space.node(&child) else {
                continue;
            };
            let NodeKind::Method(attrs) = node.kind else {
                continue;
            };
            if let Some(command) = CommandKind::from_browse_name(&node.browse_name.name) {
                methods.push((
                    child,
                    MethodBinding {
                        object: object.clone(),
                        block: block.address,
                        command,
                        arguments: attrs.input_arguments,
                    },
                ));
            }
        }

        let summary = BlockSummary {
            variables: variables.len(),
            methods: methods.len(),
        };
        self.bindings.bind_object(object.clone(), block.address);
        for (variable, address) in variables {
            self.bindings.bind_variable(variable, address);
        }
        for (method, binding) in methods {
            self.bindings.bind_method(method, binding);
        }
        debug!(block = %block.name, node = %object, variables = summary.variables, "block built");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bas_common::{EquipmentConfig, PropertyConfig};
    use bas_ua::{AttributeId, DataType, EuRange, ReadValueId, Variant};

    fn setup() -> (AddressSpace, BindingTable, Namespaces) {
        let space = AddressSpace::new("urn:test");
        let namespaces = NodeBuilder::register_namespaces(&space, &ServerConfig::default());
        let bindings = BindingTable::new();
        (space, bindings, namespaces)
    }

    #[test]
    fn namespaces_follow_the_application_namespace() {
        let (space, _, namespaces) = setup();
        assert_eq!(namespaces, Namespaces { types: 2, instances: 3 });
        let again = NodeBuilder::register_namespaces(&space, &ServerConfig::default());
        assert_eq!(again, namespaces);
    }

    #[test]
    fn air_conditioner_properties_bind_to_placeholders() {
        let (space, bindings, namespaces) = setup();
        let builder = NodeBuilder::new(&space, &bindings, namespaces);
        builder
            .import_model(&TypeModel::building_automation().unwrap())
            .unwrap();
        let root = builder.create_root_folder("Controllers").unwrap();
        let plant = EquipmentConfig::default_plant();
        let summary = builder.build_block(&root, &plant.blocks[0]).unwrap();
        assert_eq!(summary.variables, 6);
        assert_eq!(summary.methods, 3);

        let object = NodeId::string(namespaces.instances, "AC1");
        let set_point = object.child("TemperatureSetPoint");
        assert_eq!(bindings.address_of(&set_point), Some(PhysicalAddress::new(0, 1)));
        let attrs = space.variable(&set_point).unwrap();
        assert!(attrs.access_level.can_write());
        assert_eq!(attrs.eu_range, Some(EuRange::new(15.0, 30.0)));
        let temperature = space.variable(&object.child("Temperature")).unwrap();
        assert!(!temperature.access_level.can_write());

        let access = space.read_attribute(&ReadValueId::attribute(
            set_point,
            AttributeId::AccessLevel,
        ));
        assert_eq!(access.value, Some(Variant::Int32(3)));
    }

    #[test]
    fn generic_blocks_get_variables_created() {
        let (space, bindings, namespaces) = setup();
        let builder = NodeBuilder::new(&space, &bindings, namespaces);
        let root = builder.create_root_folder("Controllers").unwrap();
        let block = BlockConfig::new("Pump", EquipmentType::Generic, 9)
            .with_property(PropertyConfig::new("Flow", 0, DataType::Double))
            .with_property(PropertyConfig::new("Enabled", 1, DataType::Boolean).writable());
        let summary = builder.build_block(&root, &block).unwrap();
        assert_eq!(summary, BlockSummary { variables: 2, methods: 0 });

        let object = NodeId::string(namespaces.instances, "Pump");
        let node = space.node(&object).unwrap();
        assert_eq!(node.type_definition(), Some(&ids::BASE_OBJECT_TYPE));
        let enabled = object.child("Enabled");
        assert_eq!(bindings.address_of(&enabled), Some(PhysicalAddress::new(9, 1)));
        assert_eq!(space.variable(&enabled).unwrap().data_type, DataType::Boolean);
    }

    #[test]
    fn unknown_model_type_fails_the_block() {
        let (space, bindings, namespaces) = setup();
        let builder = NodeBuilder::new(&space, &bindings, namespaces);
        let root = builder.create_root_folder("Controllers").unwrap();
        let block = BlockConfig::new("AC1", EquipmentType::AirConditioner, 0);
        assert!(matches!(
            builder.build_block(&root, &block),
            Err(AddressSpaceError::UnknownTypeDefinition(_))
        ));
        assert_eq!(bindings.object_count(), 0);
    }

    #[test]
    fn property_named_like_a_method_binds_nothing() {
        let (space, bindings, namespaces) = setup();
        let builder = NodeBuilder::new(&space, &bindings, namespaces);
        builder
            .import_model(&TypeModel::building_automation().unwrap())
            .unwrap();
        let root = builder.create_root_folder("Controllers").unwrap();
        let block = BlockConfig::new("AC1", EquipmentType::AirConditioner, 0)
            .with_property(PropertyConfig::new("Temperature", 0, DataType::Double))
            .with_property(PropertyConfig::new("Start", 1, DataType::Double));
        let err = builder.build_block(&root, &block).unwrap_err();
        assert!(matches!(err, AddressSpaceError::NotAVariable(_)));

        let object = NodeId::string(namespaces.instances, "AC1");
        assert_eq!(bindings.address_of(&object.child("Start")), None);
        assert_eq!(bindings.address_of(&object.child("Temperature")), None);
        assert_eq!(bindings.block_of(&object), None);
        assert_eq!(bindings.method(&object.child("Stop")), None);
    }

    #[test]
    fn method_bindings_carry_declared_arguments() {
        let (space, bindings, namespaces) = setup();
        let builder = NodeBuilder::new(&space, &bindings, namespaces);
        builder
            .import_model(&TypeModel::building_automation().unwrap())
            .unwrap();
        let root = builder.create_root_folder("Controllers").unwrap();
        let plant = EquipmentConfig::default_plant();
        builder.build_block(&root, &plant.blocks[0]).unwrap();

        let object = NodeId::string(namespaces.instances, "AC1");
        let binding = bindings.method(&object.child("StartWithSetPoint")).unwrap();
        let names: Vec<_> = binding.arguments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["TemperatureSetPoint", "HumiditySetPoint"]);
        assert!(bindings.method(&object.child("Stop")).unwrap().arguments.is_empty());
    }
}
