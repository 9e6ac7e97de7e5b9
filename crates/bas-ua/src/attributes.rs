//! ---
//! bas_section: "05-networking-external-interfaces"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "OPC UA address-space surface consumed by node managers."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

use crate::node_id::{NodeId, QualifiedName};
use crate::status::StatusCode;
use crate::variant::Variant;

/// Node attributes addressable by read and write requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeId {
    NodeId,
    NodeClass,
    BrowseName,
    DisplayName,
    Value,
    DataType,
    AccessLevel,
}

/// Variable access level bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessLevel(u8);

impl AccessLevel {
    pub const CURRENT_READ: AccessLevel = AccessLevel(0x01);
    pub const CURRENT_WRITE: AccessLevel = AccessLevel(0x02);
    pub const CURRENT_READ_OR_WRITE: AccessLevel = AccessLevel(0x03);

    /// Read-write for writable properties, read-only otherwise.
    pub const fn for_writable(writable: bool) -> Self {
        if writable {
            Self::CURRENT_READ_OR_WRITE
        } else {
            Self::CURRENT_READ
        }
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn can_write(self) -> bool {
        self.0 & Self::CURRENT_WRITE.0 != 0
    }
}

/// Engineering-unit range published as descriptive metadata.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EuRange {
    pub low: f64,
    pub high: f64,
}

impl EuRange {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }
}

/// One entry of a read request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadValueId {
    pub node_id: NodeId,
    pub attribute_id: AttributeId,
    pub index_range: Option<String>,
    pub data_encoding: Option<QualifiedName>,
}

impl ReadValueId {
    /// Plain read of the Value attribute.
    pub fn value(node_id: NodeId) -> Self {
        Self::attribute(node_id, AttributeId::Value)
    }

    pub fn attribute(node_id: NodeId, attribute_id: AttributeId) -> Self {
        Self {
            node_id,
            attribute_id,
            index_range: None,
            data_encoding: None,
        }
    }

    pub fn with_index_range(mut self, range: impl Into<String>) -> Self {
        self.index_range = Some(range.into());
        self
    }

    pub fn with_data_encoding(mut self, encoding: QualifiedName) -> Self {
        self.data_encoding = Some(encoding);
        self
    }

    /// True when the request asks for a sub-range or an alternate encoding.
    pub fn needs_transform(&self) -> bool {
        self.index_range.as_deref().is_some_and(|r| !r.is_empty())
            || self.data_encoding.as_ref().is_some_and(|e| !e.is_null())
    }
}

/// One entry of a write request.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteValue {
    pub node_id: NodeId,
    pub attribute_id: AttributeId,
    pub index_range: Option<String>,
    pub value: Variant,
}

impl WriteValue {
    /// Write of the Value attribute.
    pub fn value(node_id: NodeId, value: impl Into<Variant>) -> Self {
        Self {
            node_id,
            attribute_id: AttributeId::Value,
            index_range: None,
            value: value.into(),
        }
    }

    pub fn with_index_range(mut self, range: impl Into<String>) -> Self {
        self.index_range = Some(range.into());
        self
    }

    pub fn has_index_range(&self) -> bool {
        self.index_range.as_deref().is_some_and(|r| !r.is_empty())
    }
}

/// One entry of a method call request.
#[derive(Debug, Clone, PartialEq)]
pub struct CallMethodRequest {
    pub object_id: NodeId,
    pub method_id: NodeId,
    pub input_arguments: Vec<Variant>,
}

impl CallMethodRequest {
    pub fn new(object_id: NodeId, method_id: NodeId, input_arguments: Vec<Variant>) -> Self {
        Self {
            object_id,
            method_id,
            input_arguments,
        }
    }
}

/// Outcome of one method call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallMethodResult {
    pub status: StatusCode,
    pub output_arguments: Vec<Variant>,
}

impl From<StatusCode> for CallMethodResult {
    fn from(status: StatusCode) -> Self {
        Self {
            status,
            output_arguments: Vec::new(),
        }
    }
}
