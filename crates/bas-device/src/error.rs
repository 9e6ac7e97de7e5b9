//! ---
//! bas_section: "02-simulation-modeling"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "Simulated equipment state and command surface."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use bas_common::EquipmentError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("equipment configuration rejected: {0}")]
    InvalidConfiguration(#[from] EquipmentError),
}
