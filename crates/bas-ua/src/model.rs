//! ---
//! bas_section: "05-networking-external-interfaces"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "OPC UA address-space surface consumed by node managers."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AddressSpaceError, Result};
use crate::variant::DataType;

const BUILDING_AUTOMATION_MODEL: &str = include_str!("../models/buildingautomation.toml");

/// Object type definitions imported into a type namespace.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TypeModel {
    #[serde(default)]
    pub namespace_uri: Option<String>,
    #[serde(default)]
    pub object_types: Vec<ObjectTypeDefinition>,
}

/// An object type and the instance declarations every instance receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectTypeDefinition {
    /// Numeric identifier within the type namespace.
    pub id: u32,
    pub browse_name: String,
    #[serde(default)]
    pub variables: Vec<VariableDeclaration>,
    #[serde(default)]
    pub methods: Vec<MethodDefinition>,
}

/// Placeholder variable instantiated beneath each object of the type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub browse_name: String,
    #[serde(default)]
    pub data_type: DataType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDefinition {
    pub browse_name: String,
    #[serde(default)]
    pub input_arguments: Vec<ArgumentDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentDefinition {
    pub name: String,
    pub data_type: DataType,
}

impl TypeModel {
    /// Model shipped with the server describing the building automation types.
    pub fn building_automation() -> Result<Self> {
        BUILDING_AUTOMATION_MODEL.parse()
    }

    /// Load a model file from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(model_path = %path.display(), "loading type model");
        let contents = fs::read_to_string(path).map_err(|source| AddressSpaceError::ModelIo {
            path: path.to_path_buf(),
            source,
        })?;
        contents.parse()
    }

    pub fn object_type(&self, id: u32) -> Option<&ObjectTypeDefinition> {
        self.object_types.iter().find(|t| t.id == id)
    }
}

impl FromStr for TypeModel {
    type Err = AddressSpaceError;

    fn from_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
