//! ---
//! bas_section: "01-core-functionality"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "Shared primitives and utilities for the core runtime."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
//! Shared primitives for the building automation server workspace.
//! This crate exposes configuration loading and logging setup consumed
//! by the device, server, and daemon crates.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, BlockConfig, CommandBinding, EquipmentConfig, EquipmentError, EquipmentType,
    LoadedAppConfig, LoggingConfig, MetricsConfig, ModelConfig, PropertyConfig, ServerConfig,
};
pub use logging::{init_tracing, LogFormat};
