//! ---
//! bas_section: "05-networking-external-interfaces"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "OPC UA address-space surface consumed by node managers."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::node_id::NodeId;
use crate::status::StatusCode;

/// Built-in data types a plant property may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DataType {
    Boolean,
    Int32,
    UInt32,
    #[default]
    Double,
    String,
}

impl DataType {
    /// Namespace-zero data type node.
    pub const fn node_id(self) -> NodeId {
        match self {
            DataType::Boolean => NodeId::numeric(0, 1),
            DataType::Int32 => NodeId::numeric(0, 6),
            DataType::UInt32 => NodeId::numeric(0, 7),
            DataType::Double => NodeId::numeric(0, 11),
            DataType::String => NodeId::numeric(0, 12),
        }
    }

    /// Zero value used when a property declares no initial value.
    pub fn default_value(self) -> Variant {
        match self {
            DataType::Boolean => Variant::Boolean(false),
            DataType::Int32 => Variant::Int32(0),
            DataType::UInt32 => Variant::UInt32(0),
            DataType::Double => Variant::Double(0.0),
            DataType::String => Variant::String(String::new()),
        }
    }

    /// Convert `value` into this type, allowing lossless numeric widening.
    /// Returns `None` when the value cannot be represented.
    pub fn coerce(self, value: &Variant) -> Option<Variant> {
        match (self, value) {
            (DataType::Boolean, Variant::Boolean(v)) => Some(Variant::Boolean(*v)),
            (DataType::Int32, Variant::Int32(v)) => Some(Variant::Int32(*v)),
            (DataType::Int32, Variant::UInt32(v)) => i32::try_from(*v).ok().map(Variant::Int32),
            (DataType::UInt32, Variant::UInt32(v)) => Some(Variant::UInt32(*v)),
            (DataType::UInt32, Variant::Int32(v)) => u32::try_from(*v).ok().map(Variant::UInt32),
            (DataType::Double, Variant::Double(v)) => Some(Variant::Double(*v)),
            (DataType::Double, Variant::Int32(v)) => Some(Variant::Double(f64::from(*v))),
            (DataType::Double, Variant::UInt32(v)) => Some(Variant::Double(f64::from(*v))),
            (DataType::String, Variant::String(v)) => Some(Variant::String(v.clone())),
            _ => None,
        }
    }
}

/// Value container exchanged with clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Variant {
    Boolean(bool),
    Int32(i32),
    UInt32(u32),
    Double(f64),
    String(String),
    Array(Vec<Variant>),
}

impl Variant {
    /// Scalar data type of the value, `None` for arrays.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Variant::Boolean(_) => Some(DataType::Boolean),
            Variant::Int32(_) => Some(DataType::Int32),
            Variant::UInt32(_) => Some(DataType::UInt32),
            Variant::Double(_) => Some(DataType::Double),
            Variant::String(_) => Some(DataType::String),
            Variant::Array(_) => None,
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Variant::Int32(v) => Some(f64::from(*v)),
            Variant::UInt32(v) => Some(f64::from(*v)),
            Variant::Double(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Variant::Boolean(value)
    }
}

impl From<i32> for Variant {
    fn from(value: i32) -> Self {
        Variant::Int32(value)
    }
}

impl From<u32> for Variant {
    fn from(value: u32) -> Self {
        Variant::UInt32(value)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Variant::Double(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_owned())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::String(value)
    }
}

/// Value plus status and timestamps, as returned by attribute reads.
#[derive(Debug, Clone, PartialEq)]
pub struct DataValue {
    pub value: Option<Variant>,
    pub status: StatusCode,
    pub source_timestamp: Option<DateTime<Utc>>,
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl DataValue {
    /// Good value stamped with `timestamp` as both source and server time.
    pub fn new(value: Variant, timestamp: DateTime<Utc>) -> Self {
        Self {
            value: Some(value),
            status: StatusCode::GOOD,
            source_timestamp: Some(timestamp),
            server_timestamp: Some(timestamp),
        }
    }

    /// Value-less result carrying only a status.
    pub fn bad(status: StatusCode) -> Self {
        Self {
            value: None,
            status,
            source_timestamp: None,
            server_timestamp: None,
        }
    }

    pub fn is_good(&self) -> bool {
        self.status.is_good()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_widens_integers_into_double() {
        assert_eq!(
            DataType::Double.coerce(&Variant::Int32(22)),
            Some(Variant::Double(22.0))
        );
        assert_eq!(DataType::Int32.coerce(&Variant::Double(1.5)), None);
        assert_eq!(DataType::UInt32.coerce(&Variant::Int32(-1)), None);
        assert_eq!(DataType::Boolean.coerce(&Variant::from("true")), None);
    }

    #[test]
    fn untagged_deserialisation_picks_natural_types() {
        #[derive(Deserialize)]
        struct Holder {
            a: Variant,
            b: Variant,
            c: Variant,
        }
        let holder: Holder = toml::from_str("a = 3\nb = 21.5\nc = \"idle\"").unwrap();
        assert_eq!(holder.a, Variant::Int32(3));
        assert_eq!(holder.b, Variant::Double(21.5));
        assert_eq!(holder.c, Variant::from("idle"));
    }
}
