//! ---
//! bas_section: "05-networking-external-interfaces"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "OPC UA address-space surface consumed by node managers."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use std::path::PathBuf;

use thiserror::Error;

use crate::node_id::NodeId;

pub type Result<T> = std::result::Result<T, AddressSpaceError>;

#[derive(Debug, Error)]
pub enum AddressSpaceError {
    #[error("node {0} already exists")]
    NodeIdExists(NodeId),
    #[error("node {0} not found in address space")]
    UnknownNode(NodeId),
    #[error("type definition {0} is not known")]
    UnknownTypeDefinition(NodeId),
    #[error("node {0} is not a variable")]
    NotAVariable(NodeId),
    #[error("namespace index {0} is not registered")]
    NamespaceOutOfRange(u16),
    #[error("unable to read model file {path}: {source}")]
    ModelIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse type model: {0}")]
    ModelParse(#[from] toml::de::Error),
}
