//! ---
//! bas_section: "01-core-functionality"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "Primary orchestration and lifecycle management."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
//! Controller node manager: builds the equipment node tree and dispatches
//! value reads, writes, and method calls to the device registry.

mod bindings;
mod builder;
mod dispatcher;
mod lifecycle;

pub use bindings::{BindingTable, CommandKind, MethodBinding};
pub use builder::{Namespaces, AIR_CONDITIONER_CONTROLLER_TYPE};
pub use dispatcher::Dispatcher;
pub use lifecycle::{
    ControllerNodeManager, StartupError, StartupFailure, StartupReport, StartupStep,
};
