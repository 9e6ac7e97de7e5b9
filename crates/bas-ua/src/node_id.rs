//! ---
//! bas_section: "05-networking-external-interfaces"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "OPC UA address-space surface consumed by node managers."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier part of a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identifier {
    /// Numeric identifier (`i=`).
    Numeric(u32),
    /// String identifier (`s=`).
    String(String),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Numeric(value) => write!(f, "i={value}"),
            Identifier::String(value) => write!(f, "s={value}"),
        }
    }
}

/// Protocol-level node identity: namespace index plus identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Index into the server namespace table.
    pub namespace: u16,
    /// Identifier within the namespace.
    pub identifier: Identifier,
}

impl NodeId {
    /// Build a numeric node id.
    pub const fn numeric(namespace: u16, value: u32) -> Self {
        Self {
            namespace,
            identifier: Identifier::Numeric(value),
        }
    }

    /// Build a string node id.
    pub fn string(namespace: u16, value: impl Into<String>) -> Self {
        Self {
            namespace,
            identifier: Identifier::String(value.into()),
        }
    }

    /// Identifier of a child node created beneath `self`, following the
    /// `<parent>.<browse name>` convention used for instance declarations.
    pub fn child(&self, browse_name: &str) -> Self {
        let parent = match &self.identifier {
            Identifier::Numeric(value) => value.to_string(),
            Identifier::String(value) => value.clone(),
        };
        Self::string(self.namespace, format!("{parent}.{browse_name}"))
    }

    /// Return the string identifier if present.
    pub fn as_str(&self) -> Option<&str> {
        match &self.identifier {
            Identifier::String(value) => Some(value),
            Identifier::Numeric(_) => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace == 0 {
            write!(f, "{}", self.identifier)
        } else {
            write!(f, "ns={};{}", self.namespace, self.identifier)
        }
    }
}

/// Namespace-qualified browse name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    /// Namespace index of the name.
    pub namespace: u16,
    /// Name text.
    pub name: String,
}

impl QualifiedName {
    /// Build a qualified name.
    pub fn new(namespace: u16, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    /// A null qualified name has namespace zero and an empty name.
    pub fn is_null(&self) -> bool {
        self.namespace == 0 && self.name.is_empty()
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// Well-known node ids from namespace zero.
pub mod ids {
    use super::NodeId;

    pub const ROOT_FOLDER: NodeId = NodeId::numeric(0, 84);
    pub const OBJECTS_FOLDER: NodeId = NodeId::numeric(0, 85);
    pub const BASE_OBJECT_TYPE: NodeId = NodeId::numeric(0, 58);
    pub const FOLDER_TYPE: NodeId = NodeId::numeric(0, 61);
    pub const ORGANIZES: NodeId = NodeId::numeric(0, 35);
    pub const HAS_TYPE_DEFINITION: NodeId = NodeId::numeric(0, 40);
    pub const HAS_PROPERTY: NodeId = NodeId::numeric(0, 46);
    pub const HAS_COMPONENT: NodeId = NodeId::numeric(0, 47);
}
