//! ---
//! bas_section: "01-core-functionality"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "Primary orchestration and lifecycle management."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use std::sync::Arc;

use bas_device::DeviceRegistry;
use bas_metrics::DispatchMetrics;
use bas_ua::{
    apply_index_range_and_encoding, AttributeId, CallMethodRequest, CallMethodResult, DataValue,
    ReadValueId, StatusCode, Variant, WriteValue,
};
use chrono::Utc;
use tracing::debug;

use crate::bindings::{BindingTable, CommandKind, MethodBinding};

/// Translates value reads, writes, and method calls on bound nodes into
/// device registry operations. Every entry is resolved independently and
/// results keep the input order.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    bindings: Arc<BindingTable>,
    registry: Arc<DeviceRegistry>,
    metrics: Option<DispatchMetrics>,
}

impl Dispatcher {
    pub fn new(
        bindings: Arc<BindingTable>,
        registry: Arc<DeviceRegistry>,
        metrics: Option<DispatchMetrics>,
    ) -> Self {
        Self {
            bindings,
            registry,
            metrics,
        }
    }

    pub fn read_batch(&self, requests: &[ReadValueId]) -> Vec<DataValue> {
        let results: Vec<DataValue> = requests.iter().map(|r| self.read_one(r)).collect();
        if let Some(metrics) = &self.metrics {
            for result in &results {
                metrics.record_read(result.status.name());
            }
        }
        debug!(entries = requests.len(), "dispatched read batch");
        results
    }

    fn read_one(&self, request: &ReadValueId) -> DataValue {
        if request.attribute_id != AttributeId::Value {
            return DataValue::bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID);
        }
        let Some(address) = self.bindings.address_of(&request.node_id) else {
            return DataValue::bad(StatusCode::BAD_NODE_ID_UNKNOWN);
        };
        let Some(value) = self.registry.read(address.block, address.offset) else {
            return DataValue::bad(StatusCode::BAD_NODE_ID_UNKNOWN);
        };
        let value = DataValue::new(value, Utc::now());
        if request.needs_transform() {
            apply_index_range_and_encoding(
                value,
                request.index_range.as_deref(),
                request.data_encoding.as_ref(),
            )
        } else {
            value
        }
    }

    pub fn write_batch(&self, requests: &[WriteValue]) -> Vec<StatusCode> {
        let results: Vec<StatusCode> = requests.iter().map(|r| self.write_one(r)).collect();
        if let Some(metrics) = &self.metrics {
            for status in &results {
                metrics.record_write(status.name());
            }
        }
        debug!(entries = requests.len(), "dispatched write batch");
        results
    }

    fn write_one(&self, request: &WriteValue) -> StatusCode {
        if request.has_index_range() {
            return StatusCode::BAD_INDEX_RANGE_INVALID;
        }
        let Some(address) = self.bindings.address_of(&request.node_id) else {
            return StatusCode::BAD_NODE_ID_UNKNOWN;
        };
        if self
            .registry
            .write(address.block, address.offset, request.value.clone())
        {
            StatusCode::GOOD
        } else {
            StatusCode::BAD_USER_ACCESS_DENIED
        }
    }

    pub fn call_batch(&self, requests: &[CallMethodRequest]) -> Vec<CallMethodResult> {
        let results: Vec<CallMethodResult> = requests
            .iter()
            .map(|r| CallMethodResult::from(self.call_one(r)))
            .collect();
        if let Some(metrics) = &self.metrics {
            for result in &results {
                metrics.record_call(result.status.name());
            }
        }
        debug!(entries = requests.len(), "dispatched call batch");
        results
    }

    fn call_one(&self, request: &CallMethodRequest) -> StatusCode {
        let Some(block) = self.bindings.block_of(&request.object_id) else {
            return StatusCode::BAD_NODE_ID_UNKNOWN;
        };
        let Some(method) = self
            .bindings
            .method(&request.method_id)
            .filter(|m| m.object == request.object_id)
        else {
            return StatusCode::BAD_METHOD_INVALID;
        };
        let arguments = match declared_arguments(&method, &request.input_arguments) {
            Ok(arguments) => arguments,
            Err(status) => return status,
        };
        match method.command {
            CommandKind::Start => self.registry.start(block),
            CommandKind::Stop => self.registry.stop(block),
            CommandKind::StartWithSetPoint => {
                // Set-points the method does not declare keep their current value.
                let (temperature, humidity) =
                    self.registry.current_set_points(block).unwrap_or_default();
                let (Some(temperature), Some(humidity)) = (
                    set_point(&arguments, "TemperatureSetPoint", temperature),
                    set_point(&arguments, "HumiditySetPoint", humidity),
                ) else {
                    return StatusCode::BAD_TYPE_MISMATCH;
                };
                self.registry
                    .start_with_set_point(block, temperature, humidity)
            }
        }
    }
}

/// Check `values` against the method's declared input arguments, returning
/// each value coerced to its declared type and paired with its name.
fn declared_arguments<'m>(
    method: &'m MethodBinding,
    values: &[Variant],
) -> Result<Vec<(&'m str, Variant)>, StatusCode> {
    let declared = &method.arguments;
    if values.len() < declared.len() {
        return Err(StatusCode::BAD_ARGUMENTS_MISSING);
    }
    if values.len() > declared.len() {
        return Err(StatusCode::BAD_TOO_MANY_ARGUMENTS);
    }
    declared
        .iter()
        .zip(values)
        .map(|(definition, value)| {
            definition
                .data_type
                .coerce(value)
                .map(|coerced| (definition.name.as_str(), coerced))
                .ok_or(StatusCode::BAD_TYPE_MISMATCH)
        })
        .collect()
}

fn set_point(arguments: &[(&str, Variant)], name: &str, current: f64) -> Option<f64> {
    match arguments.iter().find(|(argument, _)| *argument == name) {
        Some((_, value)) => value.as_f64(),
        None => Some(current),
    }
}
