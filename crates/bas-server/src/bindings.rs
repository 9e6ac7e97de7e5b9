//! ---
//! bas_section: "01-core-functionality"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "Primary orchestration and lifecycle management."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use std::collections::HashMap;

use bas_device::PhysicalAddress;
use bas_ua::{ArgumentDefinition, NodeId};
use parking_lot::RwLock;

/// Block command exposed as a method on controller objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Start,
    Stop,
    StartWithSetPoint,
}

impl CommandKind {
    pub fn from_browse_name(name: &str) -> Option<Self> {
        match name {
            "Start" => Some(CommandKind::Start),
            "Stop" => Some(CommandKind::Stop),
            "StartWithSetPoint" => Some(CommandKind::StartWithSetPoint),
            _ => None,
        }
    }
}

/// Method node bound to a block command, with the input arguments the type
/// model declares for it.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodBinding {
    pub object: NodeId,
    pub block: i32,
    pub command: CommandKind,
    pub arguments: Vec<ArgumentDefinition>,
}

/// Side table from node identity to the device location it stands for.
///
/// Entries are added while the node tree is built and never removed.
#[derive(Debug, Default)]
pub struct BindingTable {
    variables: RwLock<HashMap<NodeId, PhysicalAddress>>,
    objects: RwLock<HashMap<NodeId, i32>>,
    methods: RwLock<HashMap<NodeId, MethodBinding>>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_variable(&self, node_id: NodeId, address: PhysicalAddress) {
        self.variables.write().insert(node_id, address);
    }

    pub fn bind_object(&self, node_id: NodeId, block: i32) {
        self.objects.write().insert(node_id, block);
    }

    pub fn bind_method(&self, node_id: NodeId, binding: MethodBinding) {
        self.methods.write().insert(node_id, binding);
    }

    pub fn address_of(&self, node_id: &NodeId) -> Option<PhysicalAddress> {
        self.variables.read().get(node_id).copied()
    }

    pub fn block_of(&self, node_id: &NodeId) -> Option<i32> {
        self.objects.read().get(node_id).copied()
    }

    pub fn method(&self, node_id: &NodeId) -> Option<MethodBinding> {
        self.methods.read().get(node_id).cloned()
    }

    pub fn variable_count(&self) -> usize {
        self.variables.read().len()
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }
}
