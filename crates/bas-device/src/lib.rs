//! ---
//! bas_section: "02-simulation-modeling"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "Simulated equipment state and command surface."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
//! Simulated plant equipment addressed by (block address, property offset).

mod block;
mod error;
mod registry;

pub use block::{BlockMode, PhysicalAddress};
pub use error::RegistryError;
pub use registry::DeviceRegistry;
