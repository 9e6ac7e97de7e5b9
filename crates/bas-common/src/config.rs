//! ---
//! bas_section: "01-core-functionality"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "Shared primitives and utilities for the core runtime."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use std::collections::{HashMap, HashSet};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use bas_ua::{DataType, EuRange, Variant};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::logging::LogFormat;

fn default_application_uri() -> String {
    "urn:localhost:bas:ControllerServer".to_owned()
}

fn default_product_name() -> String {
    "BAS Controller Server".to_owned()
}

fn default_endpoint() -> String {
    "opc.tcp://localhost:48030".to_owned()
}

fn default_type_namespace_uri() -> String {
    "http://se.com/BuildingAutomation/".to_owned()
}

fn default_instance_namespace_uri() -> String {
    "http://se.com/OPCUAServer/".to_owned()
}

fn default_root_folder() -> String {
    "Controllers".to_owned()
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9899))
}

/// Primary configuration object for the server process.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub equipment: EquipmentConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "BAS_CONFIG";

    /// Load configuration from disk, respecting the `BAS_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants of the server section. Equipment errors
    /// are left to the device registry, which contains them at initialisation.
    pub fn validate(&self) -> Result<()> {
        self.server.validate()
    }

    /// Configured equipment, or the built-in plant when none is declared.
    pub fn effective_equipment(&self) -> EquipmentConfig {
        if self.equipment.blocks.is_empty() {
            EquipmentConfig::default_plant()
        } else {
            self.equipment.clone()
        }
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Server identity and the namespaces its node manager registers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_application_uri")]
    pub application_uri: String,
    #[serde(default = "default_product_name")]
    pub product_name: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_type_namespace_uri")]
    pub type_namespace_uri: String,
    #[serde(default = "default_instance_namespace_uri")]
    pub instance_namespace_uri: String,
    #[serde(default = "default_root_folder")]
    pub root_folder: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            application_uri: default_application_uri(),
            product_name: default_product_name(),
            endpoint: default_endpoint(),
            type_namespace_uri: default_type_namespace_uri(),
            instance_namespace_uri: default_instance_namespace_uri(),
            root_folder: default_root_folder(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.type_namespace_uri == self.instance_namespace_uri {
            return Err(anyhow!(
                "type and instance namespaces must differ (both '{}')",
                self.type_namespace_uri
            ));
        }
        if self.root_folder.trim().is_empty() {
            return Err(anyhow!("server.root_folder cannot be empty"));
        }
        if !self.endpoint.starts_with("opc.tcp://") {
            return Err(anyhow!(
                "server.endpoint '{}' must use the opc.tcp scheme",
                self.endpoint
            ));
        }
        Ok(())
    }
}

/// Location of the type model imported at startup.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelConfig {
    /// When unset the embedded building automation model is used.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            listen: default_metrics_listen(),
        }
    }
}

/// Kind of equipment a block represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EquipmentType {
    #[serde(alias = "AirConditioner")]
    AirConditioner,
    #[serde(alias = "Furnace")]
    Furnace,
    #[default]
    #[serde(alias = "Generic")]
    Generic,
}

/// Block parameter a property mirrors when commands change it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum CommandBinding {
    #[serde(alias = "State")]
    State,
    #[serde(alias = "TemperatureSetPoint")]
    TemperatureSetPoint,
    #[serde(alias = "HumiditySetPoint")]
    HumiditySetPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyConfig {
    pub name: String,
    pub offset: i32,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub writable: bool,
    #[serde(default)]
    pub range: Option<EuRange>,
    #[serde(default)]
    pub initial: Option<Variant>,
    #[serde(default)]
    pub binding: Option<CommandBinding>,
}

impl PropertyConfig {
    pub fn new(name: impl Into<String>, offset: i32, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            offset,
            data_type,
            writable: false,
            range: None,
            initial: None,
            binding: None,
        }
    }

    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    pub fn with_range(mut self, low: f64, high: f64) -> Self {
        self.range = Some(EuRange::new(low, high));
        self
    }

    pub fn with_initial(mut self, value: impl Into<Variant>) -> Self {
        self.initial = Some(value.into());
        self
    }

    pub fn bound_to(mut self, binding: CommandBinding) -> Self {
        self.binding = Some(binding);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockConfig {
    pub name: String,
    #[serde(rename = "type", default)]
    pub equipment_type: EquipmentType,
    pub address: i32,
    #[serde(default)]
    pub properties: Vec<PropertyConfig>,
}

impl BlockConfig {
    pub fn new(name: impl Into<String>, equipment_type: EquipmentType, address: i32) -> Self {
        Self {
            name: name.into(),
            equipment_type,
            address,
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, property: PropertyConfig) -> Self {
        self.properties.push(property);
        self
    }
}

/// Ordered list of blocks making up the simulated plant.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EquipmentConfig {
    #[serde(default)]
    pub blocks: Vec<BlockConfig>,
}

/// Structural problems in an [`EquipmentConfig`].
#[derive(Debug, Error, PartialEq)]
pub enum EquipmentError {
    #[error("block at address {address} has an empty name")]
    EmptyName { address: i32 },
    #[error("block '{block}' uses reserved negative address {address}")]
    NegativeAddress { block: String, address: i32 },
    #[error("blocks '{first}' and '{second}' share address {address}")]
    DuplicateAddress {
        address: i32,
        first: String,
        second: String,
    },
    #[error("property '{block}.{property}' uses negative offset {offset}")]
    NegativeOffset {
        block: String,
        property: String,
        offset: i32,
    },
    #[error("block '{block}' declares offset {offset} more than once")]
    DuplicateOffset { block: String, offset: i32 },
    #[error("block '{block}' declares property '{property}' more than once")]
    DuplicatePropertyName { block: String, property: String },
    #[error("property '{block}.{property}' range low {low} exceeds high {high}")]
    InvalidRange {
        block: String,
        property: String,
        low: f64,
        high: f64,
    },
    #[error("property '{block}.{property}' initial value does not fit {data_type:?}")]
    IncompatibleInitialValue {
        block: String,
        property: String,
        data_type: DataType,
    },
}

impl EquipmentConfig {
    pub fn new(blocks: Vec<BlockConfig>) -> Self {
        Self { blocks }
    }

    /// Built-in plant used when the configuration declares no blocks.
    pub fn default_plant() -> Self {
        Self::new(vec![
            air_conditioner("AC1", 0, 21.5),
            air_conditioner("AC2", 1, 24.0),
            BlockConfig::new("Furnace1", EquipmentType::Furnace, 2)
                .with_property(PropertyConfig::new("Temperature", 0, DataType::Double).with_initial(18.0))
                .with_property(
                    PropertyConfig::new("TemperatureSetPoint", 1, DataType::Double)
                        .writable()
                        .with_range(10.0, 25.0)
                        .with_initial(20.0)
                        .bound_to(CommandBinding::TemperatureSetPoint),
                )
                .with_property(
                    PropertyConfig::new("State", 2, DataType::Int32)
                        .with_initial(Variant::Int32(0))
                        .bound_to(CommandBinding::State),
                ),
        ])
    }

    /// Check addressing invariants: non-negative, unique block addresses and
    /// unique offsets and names within each block.
    pub fn validate(&self) -> std::result::Result<(), EquipmentError> {
        let mut addresses: HashMap<i32, &str> = HashMap::new();
        for block in &self.blocks {
            if block.name.trim().is_empty() {
                return Err(EquipmentError::EmptyName {
                    address: block.address,
                });
            }
            if block.address < 0 {
                return Err(EquipmentError::NegativeAddress {
                    block: block.name.clone(),
                    address: block.address,
                });
            }
            if let Some(first) = addresses.insert(block.address, &block.name) {
                return Err(EquipmentError::DuplicateAddress {
                    address: block.address,
                    first: first.to_owned(),
                    second: block.name.clone(),
                });
            }
            let mut offsets = HashSet::new();
            let mut names = HashSet::new();
            for property in &block.properties {
                let err_ctx = || (block.name.clone(), property.name.clone());
                if property.offset < 0 {
                    let (block, property_name) = err_ctx();
                    return Err(EquipmentError::NegativeOffset {
                        block,
                        property: property_name,
                        offset: property.offset,
                    });
                }
                if !offsets.insert(property.offset) {
                    return Err(EquipmentError::DuplicateOffset {
                        block: block.name.clone(),
                        offset: property.offset,
                    });
                }
                if !names.insert(property.name.as_str()) {
                    let (block, property_name) = err_ctx();
                    return Err(EquipmentError::DuplicatePropertyName {
                        block,
                        property: property_name,
                    });
                }
                if let Some(range) = property.range {
                    if range.low > range.high {
                        let (block, property_name) = err_ctx();
                        return Err(EquipmentError::InvalidRange {
                            block,
                            property: property_name,
                            low: range.low,
                            high: range.high,
                        });
                    }
                }
                if let Some(initial) = &property.initial {
                    if property.data_type.coerce(initial).is_none() {
                        let (block, property_name) = err_ctx();
                        return Err(EquipmentError::IncompatibleInitialValue {
                            block,
                            property: property_name,
                            data_type: property.data_type,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

fn air_conditioner(name: &str, address: i32, temperature: f64) -> BlockConfig {
    BlockConfig::new(name, EquipmentType::AirConditioner, address)
        .with_property(PropertyConfig::new("Temperature", 0, DataType::Double).with_initial(temperature))
        .with_property(
            PropertyConfig::new("TemperatureSetPoint", 1, DataType::Double)
                .writable()
                .with_range(15.0, 30.0)
                .with_initial(22.0)
                .bound_to(CommandBinding::TemperatureSetPoint),
        )
        .with_property(
            PropertyConfig::new("State", 2, DataType::Int32)
                .with_initial(Variant::Int32(0))
                .bound_to(CommandBinding::State),
        )
        .with_property(PropertyConfig::new("PowerConsumption", 3, DataType::Double).with_initial(0.0))
        .with_property(
            PropertyConfig::new("Humidity", 4, DataType::Double)
                .with_range(0.0, 100.0)
                .with_initial(45.0),
        )
        .with_property(
            PropertyConfig::new("HumiditySetPoint", 5, DataType::Double)
                .writable()
                .with_range(20.0, 80.0)
                .with_initial(50.0)
                .bound_to(CommandBinding::HumiditySetPoint),
        )
}
