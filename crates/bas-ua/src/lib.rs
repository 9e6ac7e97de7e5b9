//! ---
//! bas_section: "05-networking-external-interfaces"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "OPC UA address-space surface consumed by node managers."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
//! Protocol-facing vocabulary shared by the server crates: node identities,
//! status codes, values, the namespace table, type-model import, and the
//! in-memory address space that hosts pluggable node managers.

pub mod address_space;
pub mod attributes;
pub mod error;
pub mod index_range;
pub mod manager;
pub mod model;
pub mod namespace;
pub mod node_id;
pub mod status;
pub mod variant;

pub use address_space::{
    AddVariableSettings, AddressSpace, CreateObjectSettings, MethodAttributes, Node, NodeClass,
    NodeKind, Reference, VariableAttributes,
};
pub use attributes::{
    AccessLevel, AttributeId, CallMethodRequest, CallMethodResult, EuRange, ReadValueId,
    WriteValue,
};
pub use error::AddressSpaceError;
pub use index_range::{apply_index_range_and_encoding, IndexRange};
pub use manager::{NodeManager, UaServer};
pub use model::{ArgumentDefinition, MethodDefinition, ObjectTypeDefinition, TypeModel};
pub use namespace::NamespaceTable;
pub use node_id::{ids, Identifier, NodeId, QualifiedName};
pub use status::StatusCode;
pub use variant::{DataType, DataValue, Variant};
