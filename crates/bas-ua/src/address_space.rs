//! ---
//! bas_section: "05-networking-external-interfaces"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "OPC UA address-space surface consumed by node managers."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use std::collections::HashMap;

use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::attributes::{AccessLevel, AttributeId, EuRange, ReadValueId, WriteValue};
use crate::error::{AddressSpaceError, Result};
use crate::index_range::apply_index_range_and_encoding;
use crate::model::{ArgumentDefinition, ObjectTypeDefinition, TypeModel};
use crate::namespace::NamespaceTable;
use crate::node_id::{ids, NodeId, QualifiedName};
use crate::status::StatusCode;
use crate::variant::{DataType, DataValue, Variant};

/// Class of a node, mirroring the OPC UA NodeClass attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeClass {
    Object,
    Variable,
    Method,
    ObjectType,
}

impl NodeClass {
    /// Wire value of the NodeClass attribute.
    pub const fn code(self) -> i32 {
        match self {
            NodeClass::Object => 1,
            NodeClass::Variable => 2,
            NodeClass::Method => 4,
            NodeClass::ObjectType => 8,
        }
    }
}

/// Mutable attributes of a variable node.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableAttributes {
    pub data_type: DataType,
    pub access_level: AccessLevel,
    pub value: Option<Variant>,
    pub eu_range: Option<EuRange>,
}

impl VariableAttributes {
    fn placeholder(data_type: DataType) -> Self {
        Self {
            data_type,
            access_level: AccessLevel::CURRENT_READ,
            value: None,
            eu_range: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodAttributes {
    pub input_arguments: Vec<ArgumentDefinition>,
}

/// Class-specific payload of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Object { type_definition: NodeId },
    Variable(VariableAttributes),
    Method(MethodAttributes),
    ObjectType,
}

/// Forward reference from one node to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub reference_type: NodeId,
    pub target: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub node_id: NodeId,
    pub browse_name: QualifiedName,
    pub display_name: String,
    pub kind: NodeKind,
    pub references: Vec<Reference>,
}

impl Node {
    pub fn node_class(&self) -> NodeClass {
        match self.kind {
            NodeKind::Object { .. } => NodeClass::Object,
            NodeKind::Variable(_) => NodeClass::Variable,
            NodeKind::Method(_) => NodeClass::Method,
            NodeKind::ObjectType => NodeClass::ObjectType,
        }
    }

    pub fn as_variable(&self) -> Option<&VariableAttributes> {
        match &self.kind {
            NodeKind::Variable(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub fn type_definition(&self) -> Option<&NodeId> {
        match &self.kind {
            NodeKind::Object { type_definition } => Some(type_definition),
            _ => None,
        }
    }

    fn hierarchical_children(&self) -> impl Iterator<Item = &NodeId> {
        self.references
            .iter()
            .filter(|r| {
                r.reference_type == ids::HAS_COMPONENT
                    || r.reference_type == ids::HAS_PROPERTY
                    || r.reference_type == ids::ORGANIZES
            })
            .map(|r| &r.target)
    }
}

/// Request to instantiate an object (and its type's instance declarations).
#[derive(Debug, Clone)]
pub struct CreateObjectSettings {
    pub parent_node_id: NodeId,
    pub reference_type_id: NodeId,
    pub requested_node_id: NodeId,
    pub browse_name: QualifiedName,
    pub display_name: Option<String>,
    pub type_definition_id: NodeId,
}

/// Request to add a variable beneath an existing node.
#[derive(Debug, Clone)]
pub struct AddVariableSettings {
    pub parent_node_id: NodeId,
    pub requested_node_id: NodeId,
    pub browse_name: QualifiedName,
    pub data_type: DataType,
}

#[derive(Debug)]
struct Inner {
    namespaces: NamespaceTable,
    nodes: IndexMap<NodeId, Node>,
    object_types: HashMap<NodeId, ObjectTypeDefinition>,
}

impl Inner {
    fn ensure_namespace(&self, index: u16) -> Result<()> {
        if self.namespaces.contains_index(index) {
            Ok(())
        } else {
            Err(AddressSpaceError::NamespaceOutOfRange(index))
        }
    }

    fn ensure_absent(&self, node_id: &NodeId) -> Result<()> {
        if self.nodes.contains_key(node_id) {
            Err(AddressSpaceError::NodeIdExists(node_id.clone()))
        } else {
            Ok(())
        }
    }

    fn link(&mut self, parent: &NodeId, reference_type: NodeId, target: NodeId) -> Result<()> {
        let node = self
            .nodes
            .get_mut(parent)
            .ok_or_else(|| AddressSpaceError::UnknownNode(parent.clone()))?;
        node.references.push(Reference {
            reference_type,
            target,
        });
        Ok(())
    }

    fn insert(&mut self, node: Node) {
        self.nodes.insert(node.node_id.clone(), node);
    }
}

/// In-memory node repository shared by the protocol stack and node managers.
///
/// Every mutation of node state, including access level and metadata updates
/// made after a node is published, takes the single write lock.
#[derive(Debug)]
pub struct AddressSpace {
    inner: RwLock<Inner>,
}

impl AddressSpace {
    /// Address space seeded with the standard root, objects folder, and base types.
    pub fn new(application_uri: &str) -> Self {
        let mut inner = Inner {
            namespaces: NamespaceTable::new(application_uri),
            nodes: IndexMap::new(),
            object_types: HashMap::new(),
        };
        let standard = [
            (ids::ROOT_FOLDER, "Root", NodeKind::Object { type_definition: ids::FOLDER_TYPE }),
            (
                ids::OBJECTS_FOLDER,
                "Objects",
                NodeKind::Object { type_definition: ids::FOLDER_TYPE },
            ),
            (ids::BASE_OBJECT_TYPE, "BaseObjectType", NodeKind::ObjectType),
            (ids::FOLDER_TYPE, "FolderType", NodeKind::ObjectType),
        ];
        for (node_id, name, kind) in standard {
            inner.insert(Node {
                node_id,
                browse_name: QualifiedName::new(0, name),
                display_name: name.to_owned(),
                kind,
                references: Vec::new(),
            });
        }
        inner.nodes[&ids::ROOT_FOLDER].references.push(Reference {
            reference_type: ids::ORGANIZES,
            target: ids::OBJECTS_FOLDER,
        });
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Register a namespace URI, returning its stable index.
    pub fn register_namespace(&self, uri: &str) -> u16 {
        self.inner.write().namespaces.register(uri)
    }

    pub fn namespace_index(&self, uri: &str) -> Option<u16> {
        self.inner.read().namespaces.index_of(uri)
    }

    pub fn namespace_uris(&self) -> Vec<String> {
        self.inner.read().namespaces.uris().to_vec()
    }

    /// Import object type definitions into `namespace`. Types already imported
    /// before a failure remain in place.
    pub fn import_model(&self, namespace: u16, model: &TypeModel) -> Result<usize> {
        let mut inner = self.inner.write();
        inner.ensure_namespace(namespace)?;
        for definition in &model.object_types {
            let node_id = NodeId::numeric(namespace, definition.id);
            inner.ensure_absent(&node_id)?;
            inner.insert(Node {
                node_id: node_id.clone(),
                browse_name: QualifiedName::new(namespace, &definition.browse_name),
                display_name: definition.browse_name.clone(),
                kind: NodeKind::ObjectType,
                references: Vec::new(),
            });
            inner.object_types.insert(node_id, definition.clone());
        }
        debug!(namespace, types = model.object_types.len(), "type model imported");
        Ok(model.object_types.len())
    }

    /// Create an object node and instantiate the instance declarations of its
    /// type definition beneath it. Nothing is inserted if any identifier clashes.
    pub fn create_object(&self, settings: CreateObjectSettings) -> Result<NodeId> {
        let mut inner = self.inner.write();
        let object_id = settings.requested_node_id;
        inner.ensure_namespace(object_id.namespace)?;
        if !inner.nodes.contains_key(&settings.parent_node_id) {
            return Err(AddressSpaceError::UnknownNode(settings.parent_node_id));
        }
        inner.ensure_absent(&object_id)?;

        let type_id = settings.type_definition_id;
        let is_type = inner
            .nodes
            .get(&type_id)
            .is_some_and(|n| n.node_class() == NodeClass::ObjectType);
        if !is_type {
            return Err(AddressSpaceError::UnknownTypeDefinition(type_id));
        }
        let (variables, methods) = match inner.object_types.get(&type_id) {
            Some(definition) => (definition.variables.clone(), definition.methods.clone()),
            None => (Vec::new(), Vec::new()),
        };
        let type_namespace = type_id.namespace;

        let mut children = Vec::with_capacity(variables.len() + methods.len());
        for variable in &variables {
            children.push(Node {
                node_id: object_id.child(&variable.browse_name),
                browse_name: QualifiedName::new(type_namespace, &variable.browse_name),
                display_name: variable.browse_name.clone(),
                kind: NodeKind::Variable(VariableAttributes::placeholder(variable.data_type)),
                references: Vec::new(),
            });
        }
        for method in &methods {
            children.push(Node {
                node_id: object_id.child(&method.browse_name),
                browse_name: QualifiedName::new(type_namespace, &method.browse_name),
                display_name: method.browse_name.clone(),
                kind: NodeKind::Method(MethodAttributes {
                    input_arguments: method.input_arguments.clone(),
                }),
                references: Vec::new(),
            });
        }
        for child in &children {
            inner.ensure_absent(&child.node_id)?;
        }

        let mut references = vec![Reference {
            reference_type: ids::HAS_TYPE_DEFINITION,
            target: type_id.clone(),
        }];
        references.extend(children.iter().map(|child| Reference {
            reference_type: ids::HAS_COMPONENT,
            target: child.node_id.clone(),
        }));
        let display_name = settings
            .display_name
            .unwrap_or_else(|| settings.browse_name.name.clone());
        inner.insert(Node {
            node_id: object_id.clone(),
            browse_name: settings.browse_name,
            display_name,
            kind: NodeKind::Object {
                type_definition: type_id,
            },
            references,
        });
        for child in children {
            inner.insert(child);
        }
        inner.link(
            &settings.parent_node_id,
            settings.reference_type_id,
            object_id.clone(),
        )?;
        debug!(node = %object_id, "object created");
        Ok(object_id)
    }

    /// Add a read-only variable beneath `parent_node_id`.
    pub fn add_variable(&self, settings: AddVariableSettings) -> Result<NodeId> {
        let mut inner = self.inner.write();
        let node_id = settings.requested_node_id;
        inner.ensure_namespace(node_id.namespace)?;
        if !inner.nodes.contains_key(&settings.parent_node_id) {
            return Err(AddressSpaceError::UnknownNode(settings.parent_node_id));
        }
        inner.ensure_absent(&node_id)?;
        inner.insert(Node {
            node_id: node_id.clone(),
            display_name: settings.browse_name.name.clone(),
            browse_name: settings.browse_name,
            kind: NodeKind::Variable(VariableAttributes::placeholder(settings.data_type)),
            references: Vec::new(),
        });
        inner.link(&settings.parent_node_id, ids::HAS_COMPONENT, node_id.clone())?;
        Ok(node_id)
    }

    /// Find the direct child of `parent` carrying `browse_name`.
    pub fn find_child(&self, parent: &NodeId, browse_name: &QualifiedName) -> Option<NodeId> {
        let inner = self.inner.read();
        let node = inner.nodes.get(parent)?;
        let found = node
            .hierarchical_children()
            .find(|child| {
                inner
                    .nodes
                    .get(*child)
                    .is_some_and(|c| &c.browse_name == browse_name)
            })
            .cloned();
        found
    }

    /// Mutate the attributes of a variable under the node write lock.
    pub fn update_variable<F>(&self, node_id: &NodeId, update: F) -> Result<()>
    where
        F: FnOnce(&mut VariableAttributes),
    {
        let mut inner = self.inner.write();
        let node = inner
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| AddressSpaceError::UnknownNode(node_id.clone()))?;
        match &mut node.kind {
            NodeKind::Variable(attrs) => {
                update(attrs);
                Ok(())
            }
            _ => Err(AddressSpaceError::NotAVariable(node_id.clone())),
        }
    }

    pub fn node(&self, node_id: &NodeId) -> Option<Node> {
        self.inner.read().nodes.get(node_id).cloned()
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.inner.read().nodes.contains_key(node_id)
    }

    pub fn variable(&self, node_id: &NodeId) -> Option<VariableAttributes> {
        self.inner
            .read()
            .nodes
            .get(node_id)
            .and_then(|n| n.as_variable().cloned())
    }

    /// Hierarchical children of `node_id` in creation order.
    pub fn children(&self, node_id: &NodeId) -> Vec<NodeId> {
        self.inner
            .read()
            .nodes
            .get(node_id)
            .map(|n| n.hierarchical_children().cloned().collect())
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.inner.read().nodes.len()
    }

    /// Serve an attribute read from the stored node state.
    pub fn read_attribute(&self, request: &ReadValueId) -> DataValue {
        let inner = self.inner.read();
        let Some(node) = inner.nodes.get(&request.node_id) else {
            return DataValue::bad(StatusCode::BAD_NODE_ID_UNKNOWN);
        };
        let now = Utc::now();
        let value = match request.attribute_id {
            AttributeId::NodeId => Variant::String(node.node_id.to_string()),
            AttributeId::NodeClass => Variant::Int32(node.node_class().code()),
            AttributeId::BrowseName => Variant::String(node.browse_name.to_string()),
            AttributeId::DisplayName => Variant::String(node.display_name.clone()),
            AttributeId::DataType => match node.as_variable() {
                Some(attrs) => Variant::String(attrs.data_type.node_id().to_string()),
                None => return DataValue::bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
            },
            AttributeId::AccessLevel => match node.as_variable() {
                Some(attrs) => Variant::Int32(i32::from(attrs.access_level.bits())),
                None => return DataValue::bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
            },
            AttributeId::Value => match node.as_variable() {
                Some(VariableAttributes { value: Some(value), .. }) => value.clone(),
                Some(_) => {
                    return DataValue {
                        value: None,
                        status: StatusCode::GOOD,
                        source_timestamp: None,
                        server_timestamp: Some(now),
                    }
                }
                None => return DataValue::bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
            },
        };
        let result = DataValue::new(value, now);
        if request.needs_transform() {
            apply_index_range_and_encoding(
                result,
                request.index_range.as_deref(),
                request.data_encoding.as_ref(),
            )
        } else {
            result
        }
    }

    /// Store a value written to a node that no node manager owns.
    pub fn write_attribute(&self, request: &WriteValue) -> StatusCode {
        let mut inner = self.inner.write();
        let Some(node) = inner.nodes.get_mut(&request.node_id) else {
            return StatusCode::BAD_NODE_ID_UNKNOWN;
        };
        if request.attribute_id != AttributeId::Value {
            return StatusCode::BAD_NOT_WRITABLE;
        }
        let NodeKind::Variable(attrs) = &mut node.kind else {
            return StatusCode::BAD_ATTRIBUTE_ID_INVALID;
        };
        if !attrs.access_level.can_write() {
            return StatusCode::BAD_NOT_WRITABLE;
        }
        if request.has_index_range() {
            return StatusCode::BAD_INDEX_RANGE_INVALID;
        }
        match attrs.data_type.coerce(&request.value) {
            Some(value) => {
                attrs.value = Some(value);
                StatusCode::GOOD
            }
            None => StatusCode::BAD_TYPE_MISMATCH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space_with_model() -> (AddressSpace, u16, u16) {
        let space = AddressSpace::new("urn:test");
        let types = space.register_namespace("urn:types");
        let instances = space.register_namespace("urn:instances");
        let model = TypeModel::building_automation().unwrap();
        space.import_model(types, &model).unwrap();
        (space, types, instances)
    }

    fn object_settings(types: u16, instances: u16, name: &str) -> CreateObjectSettings {
        CreateObjectSettings {
            parent_node_id: ids::OBJECTS_FOLDER,
            reference_type_id: ids::ORGANIZES,
            requested_node_id: NodeId::string(instances, name),
            browse_name: QualifiedName::new(types, name),
            display_name: None,
            type_definition_id: NodeId::numeric(types, 1003),
        }
    }

    #[test]
    fn instantiation_creates_placeholders() {
        let (space, types, instances) = space_with_model();
        let object = space
            .create_object(object_settings(types, instances, "AC1"))
            .unwrap();
        let temperature = space
            .find_child(&object, &QualifiedName::new(types, "Temperature"))
            .expect("placeholder variable");
        assert_eq!(temperature, NodeId::string(instances, "AC1.Temperature"));
        let attrs = space.variable(&temperature).unwrap();
        assert_eq!(attrs.access_level, AccessLevel::CURRENT_READ);
        let start = space
            .node(&NodeId::string(instances, "AC1.Start"))
            .unwrap();
        assert_eq!(start.node_class(), NodeClass::Method);
        assert!(space.children(&ids::OBJECTS_FOLDER).contains(&object));
    }

    #[test]
    fn duplicate_object_is_rejected_without_side_effects() {
        let (space, types, instances) = space_with_model();
        space
            .create_object(object_settings(types, instances, "AC1"))
            .unwrap();
        let before = space.node_count();
        let err = space
            .create_object(object_settings(types, instances, "AC1"))
            .unwrap_err();
        assert!(matches!(err, AddressSpaceError::NodeIdExists(_)));
        assert_eq!(space.node_count(), before);
    }

    #[test]
    fn unknown_type_and_namespace_are_rejected() {
        let (space, types, instances) = space_with_model();
        let mut settings = object_settings(types, instances, "AC1");
        settings.type_definition_id = NodeId::numeric(types, 9999);
        assert!(matches!(
            space.create_object(settings),
            Err(AddressSpaceError::UnknownTypeDefinition(_))
        ));
        let settings = object_settings(types, 42, "AC1");
        assert!(matches!(
            space.create_object(settings),
            Err(AddressSpaceError::NamespaceOutOfRange(42))
        ));
    }

    #[test]
    fn update_variable_and_read_attributes() {
        let (space, types, instances) = space_with_model();
        space
            .create_object(object_settings(types, instances, "AC1"))
            .unwrap();
        let node = NodeId::string(instances, "AC1.TemperatureSetPoint");
        space
            .update_variable(&node, |attrs| {
                attrs.access_level = AccessLevel::CURRENT_READ_OR_WRITE;
                attrs.eu_range = Some(EuRange::new(15.0, 30.0));
            })
            .unwrap();
        let access = space.read_attribute(&ReadValueId::attribute(
            node.clone(),
            AttributeId::AccessLevel,
        ));
        assert_eq!(access.value, Some(Variant::Int32(3)));
        assert_eq!(
            space.variable(&node).unwrap().eu_range,
            Some(EuRange::new(15.0, 30.0))
        );
        assert_eq!(
            space
                .read_attribute(&ReadValueId::value(NodeId::string(instances, "missing")))
                .status,
            StatusCode::BAD_NODE_ID_UNKNOWN
        );
    }

    #[test]
    fn unowned_writes_respect_access_level() {
        let (space, types, instances) = space_with_model();
        space
            .create_object(object_settings(types, instances, "AC1"))
            .unwrap();
        let node = NodeId::string(instances, "AC1.Humidity");
        assert_eq!(
            space.write_attribute(&WriteValue::value(node.clone(), 40.0)),
            StatusCode::BAD_NOT_WRITABLE
        );
        space
            .update_variable(&node, |attrs| {
                attrs.access_level = AccessLevel::CURRENT_READ_OR_WRITE
            })
            .unwrap();
        assert_eq!(
            space.write_attribute(&WriteValue::value(node.clone(), Variant::Int32(40))),
            StatusCode::GOOD
        );
        assert_eq!(
            space.read_attribute(&ReadValueId::value(node)).value,
            Some(Variant::Double(40.0))
        );
    }
}
