//! ---
//! bas_section: "02-simulation-modeling"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "Simulated equipment state and command surface."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use std::fmt;

use bas_common::{BlockConfig, CommandBinding, PropertyConfig};
use bas_ua::{DataType, Variant};
use indexmap::IndexMap;

/// (block address, property offset) pair identifying one simulated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicalAddress {
    pub block: i32,
    pub offset: i32,
}

impl PhysicalAddress {
    pub const fn new(block: i32, offset: i32) -> Self {
        Self { block, offset }
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block, self.offset)
    }
}

/// Operating mode driven by the start/stop commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockMode {
    #[default]
    Idle,
    Running,
}

impl BlockMode {
    /// Value mirrored into properties bound to [`CommandBinding::State`].
    pub const fn code(self) -> i32 {
        match self {
            BlockMode::Idle => 0,
            BlockMode::Running => 1,
        }
    }
}

#[derive(Debug)]
struct PropertySlot {
    data_type: DataType,
    writable: bool,
    binding: Option<CommandBinding>,
    value: Variant,
}

impl PropertySlot {
    fn from_config(config: &PropertyConfig) -> Self {
        let value = config
            .initial
            .as_ref()
            .and_then(|initial| config.data_type.coerce(initial))
            .unwrap_or_else(|| config.data_type.default_value());
        Self {
            data_type: config.data_type,
            writable: config.writable,
            binding: config.binding,
            value,
        }
    }

    /// Store a value produced by a command, skipping it when the property's
    /// type cannot hold it.
    fn mirror(&mut self, value: Variant) {
        if let Some(coerced) = self.data_type.coerce(&value) {
            self.value = coerced;
        }
    }
}

/// Runtime state for one configured block.
#[derive(Debug)]
pub(crate) struct BlockRuntime {
    descriptor: BlockConfig,
    mode: BlockMode,
    set_points: Option<(f64, f64)>,
    properties: IndexMap<i32, PropertySlot>,
}

impl BlockRuntime {
    pub(crate) fn new(descriptor: BlockConfig) -> Self {
        let properties = descriptor
            .properties
            .iter()
            .map(|p| (p.offset, PropertySlot::from_config(p)))
            .collect();
        Self {
            descriptor,
            mode: BlockMode::Idle,
            set_points: None,
            properties,
        }
    }

    pub(crate) fn descriptor(&self) -> &BlockConfig {
        &self.descriptor
    }

    pub(crate) fn mode(&self) -> BlockMode {
        self.mode
    }

    pub(crate) fn set_points(&self) -> Option<(f64, f64)> {
        self.set_points
    }

    /// Last recorded set-points, falling back to the values of the properties
    /// bound to them.
    pub(crate) fn current_set_points(&self) -> (f64, f64) {
        self.set_points.unwrap_or_else(|| {
            (
                self.bound_value(CommandBinding::TemperatureSetPoint),
                self.bound_value(CommandBinding::HumiditySetPoint),
            )
        })
    }

    fn bound_value(&self, binding: CommandBinding) -> f64 {
        self.properties
            .values()
            .find(|slot| slot.binding == Some(binding))
            .and_then(|slot| slot.value.as_f64())
            .unwrap_or_default()
    }

    pub(crate) fn read(&self, offset: i32) -> Option<Variant> {
        self.properties.get(&offset).map(|slot| slot.value.clone())
    }

    pub(crate) fn write(&mut self, offset: i32, value: &Variant) -> bool {
        let Some(slot) = self.properties.get_mut(&offset) else {
            return false;
        };
        if !slot.writable {
            return false;
        }
        match slot.data_type.coerce(value) {
            Some(coerced) => {
                slot.value = coerced;
                true
            }
            None => false,
        }
    }

    /// Enter `mode`. Repeating the current mode is a no-op.
    pub(crate) fn set_mode(&mut self, mode: BlockMode) {
        if self.mode == mode {
            return;
        }
        self.mode = mode;
        self.mirror(CommandBinding::State, Variant::Int32(mode.code()));
    }

    pub(crate) fn apply_set_points(&mut self, temperature: f64, humidity: f64) {
        self.set_points = Some((temperature, humidity));
        self.mirror(CommandBinding::TemperatureSetPoint, Variant::Double(temperature));
        self.mirror(CommandBinding::HumiditySetPoint, Variant::Double(humidity));
    }

    fn mirror(&mut self, binding: CommandBinding, value: Variant) {
        for slot in self.properties.values_mut() {
            if slot.binding == Some(binding) {
                slot.mirror(value.clone());
            }
        }
    }
}
