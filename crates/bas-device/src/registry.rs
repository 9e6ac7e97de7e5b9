//! ---
//! bas_section: "02-simulation-modeling"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "Simulated equipment state and command surface."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use bas_common::{BlockConfig, EquipmentConfig};
use bas_logging::{bas_debug, bas_info, bas_warn, LogContext};
use bas_ua::{StatusCode, Variant};
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::block::{BlockMode, BlockRuntime};
use crate::error::RegistryError;

const COMPONENT: &str = "device-registry";

/// In-memory table of simulated equipment blocks keyed by block address.
///
/// Every value access goes through one read-write lock, so a write never
/// interleaves with a concurrent read of the same block.
#[derive(Debug)]
pub struct DeviceRegistry {
    source: EquipmentConfig,
    blocks: RwLock<IndexMap<i32, BlockRuntime>>,
}

impl DeviceRegistry {
    pub fn new(source: EquipmentConfig) -> Self {
        Self {
            source,
            blocks: RwLock::new(IndexMap::new()),
        }
    }

    /// Populate the block table from the configuration supplied at
    /// construction. An invalid configuration leaves the table empty.
    /// Returns the number of blocks loaded.
    pub fn initialize(&self) -> usize {
        let ctx = LogContext::new().with_component(COMPONENT);
        match self.try_initialize() {
            Ok(count) => {
                bas_info!(context = ctx, "device registry initialised with {} blocks", count);
                count
            }
            Err(err) => {
                self.blocks.write().clear();
                bas_warn!(context = ctx, "device registry left empty: {}", err);
                0
            }
        }
    }

    fn try_initialize(&self) -> Result<usize, RegistryError> {
        self.source.validate()?;
        let table: IndexMap<i32, BlockRuntime> = self
            .source
            .blocks
            .iter()
            .map(|block| (block.address, BlockRuntime::new(block.clone())))
            .collect();
        let count = table.len();
        *self.blocks.write() = table;
        Ok(count)
    }

    /// Configured blocks in configuration order.
    pub fn list_blocks(&self) -> Vec<BlockConfig> {
        self.blocks
            .read()
            .values()
            .map(|block| block.descriptor().clone())
            .collect()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.read().len()
    }

    /// Current value at (address, offset), regardless of writability.
    pub fn read(&self, address: i32, offset: i32) -> Option<Variant> {
        self.blocks.read().get(&address)?.read(offset)
    }

    /// Store `value` at (address, offset). Fails for unknown or read-only
    /// properties and for values the property type cannot hold.
    pub fn write(&self, address: i32, offset: i32, value: Variant) -> bool {
        let mut blocks = self.blocks.write();
        let Some(block) = blocks.get_mut(&address) else {
            return false;
        };
        let stored = block.write(offset, &value);
        if !stored {
            let ctx = LogContext::new()
                .with_component(COMPONENT)
                .with_block(&block.descriptor().name, address);
            bas_debug!(context = ctx, "write rejected at offset {}", offset);
        }
        stored
    }

    pub fn start(&self, address: i32) -> StatusCode {
        self.command(address, "start", |block| block.set_mode(BlockMode::Running))
    }

    pub fn stop(&self, address: i32) -> StatusCode {
        self.command(address, "stop", |block| block.set_mode(BlockMode::Idle))
    }

    /// Start the block and record both set-points. Values outside the
    /// configured ranges are accepted as given.
    pub fn start_with_set_point(
        &self,
        address: i32,
        temperature_set_point: f64,
        humidity_set_point: f64,
    ) -> StatusCode {
        self.command(address, "start_with_set_point", |block| {
            block.apply_set_points(temperature_set_point, humidity_set_point);
            block.set_mode(BlockMode::Running);
        })
    }

    pub fn mode(&self, address: i32) -> Option<BlockMode> {
        self.blocks.read().get(&address).map(BlockRuntime::mode)
    }

    /// Set-points recorded by the last `start_with_set_point`.
    pub fn set_points(&self, address: i32) -> Option<(f64, f64)> {
        self.blocks.read().get(&address)?.set_points()
    }

    /// Set-points a partial `start_with_set_point` keeps: the last recorded
    /// pair, else the current values of the bound set-point properties.
    pub fn current_set_points(&self, address: i32) -> Option<(f64, f64)> {
        self.blocks
            .read()
            .get(&address)
            .map(BlockRuntime::current_set_points)
    }

    fn command(
        &self,
        address: i32,
        name: &str,
        apply: impl FnOnce(&mut BlockRuntime),
    ) -> StatusCode {
        let mut blocks = self.blocks.write();
        let Some(block) = blocks.get_mut(&address) else {
            return StatusCode::BAD_NODE_ID_UNKNOWN;
        };
        apply(block);
        let ctx = LogContext::new()
            .with_component(COMPONENT)
            .with_block(&block.descriptor().name, address);
        bas_debug!(context = ctx, "{} applied, mode {:?}", name, block.mode());
        StatusCode::GOOD
    }
}
