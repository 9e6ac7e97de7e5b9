//! ---
//! bas_section: "05-networking-external-interfaces"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "OPC UA address-space surface consumed by node managers."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::address_space::AddressSpace;
use crate::attributes::{AttributeId, CallMethodRequest, CallMethodResult, ReadValueId, WriteValue};
use crate::error::AddressSpaceError;
use crate::node_id::NodeId;
use crate::status::StatusCode;
use crate::variant::DataValue;

/// Capability interface a node manager implements to take over value reads,
/// writes, and method calls for the nodes it owns.
///
/// Batch methods return exactly one result per input entry, in input order.
pub trait NodeManager: Send + Sync {
    fn name(&self) -> &str;

    /// True when Value reads and writes of `node_id` must be routed here.
    fn owns(&self, node_id: &NodeId) -> bool;

    fn read_batch(&self, requests: &[ReadValueId]) -> Vec<DataValue>;

    fn write_batch(&self, requests: &[WriteValue]) -> Vec<StatusCode>;

    fn call_batch(&self, requests: &[CallMethodRequest]) -> Vec<CallMethodResult> {
        requests
            .iter()
            .map(|_| StatusCode::BAD_METHOD_INVALID.into())
            .collect()
    }

    fn shutdown(&self) -> Result<(), AddressSpaceError> {
        Ok(())
    }
}

/// Host that owns the address space and fans client batches out to the
/// registered node managers.
pub struct UaServer {
    address_space: Arc<AddressSpace>,
    endpoint: String,
    managers: RwLock<Vec<Arc<dyn NodeManager>>>,
}

impl std::fmt::Debug for UaServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UaServer")
            .field("endpoint", &self.endpoint)
            .field("managers", &self.managers.read().len())
            .finish()
    }
}

impl UaServer {
    pub fn new(address_space: Arc<AddressSpace>, endpoint: impl Into<String>) -> Self {
        Self {
            address_space,
            endpoint: endpoint.into(),
            managers: RwLock::new(Vec::new()),
        }
    }

    pub fn address_space(&self) -> &Arc<AddressSpace> {
        &self.address_space
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn register_node_manager(&self, manager: Arc<dyn NodeManager>) {
        info!(manager = manager.name(), "node manager registered");
        self.managers.write().push(manager);
    }

    pub fn node_manager_count(&self) -> usize {
        self.managers.read().len()
    }

    /// Read a batch of attributes. Value reads of owned nodes go to their
    /// manager; everything else is answered from the address space.
    pub fn read(&self, requests: &[ReadValueId]) -> Vec<DataValue> {
        let results = self.route(
            requests,
            |r| (r.attribute_id == AttributeId::Value).then_some(&r.node_id),
            |manager, batch| manager.read_batch(batch),
            |request| self.address_space.read_attribute(request),
        );
        debug!(entries = requests.len(), "read batch served");
        results
    }

    pub fn write(&self, requests: &[WriteValue]) -> Vec<StatusCode> {
        let results = self.route(
            requests,
            |r| (r.attribute_id == AttributeId::Value).then_some(&r.node_id),
            |manager, batch| manager.write_batch(batch),
            |request| self.address_space.write_attribute(request),
        );
        debug!(entries = requests.len(), "write batch served");
        results
    }

    pub fn call(&self, requests: &[CallMethodRequest]) -> Vec<CallMethodResult> {
        self.route(
            requests,
            |r| Some(&r.object_id),
            |manager, batch| manager.call_batch(batch),
            |_| StatusCode::BAD_NODE_ID_UNKNOWN.into(),
        )
    }

    /// Split `requests` by owning manager, dispatch each sub-batch, and stitch
    /// the results back into input order.
    fn route<Req, Res, K, M, F>(&self, requests: &[Req], key: K, dispatch: M, fallback: F) -> Vec<Res>
    where
        Req: Clone,
        K: Fn(&Req) -> Option<&NodeId>,
        M: Fn(&dyn NodeManager, &[Req]) -> Vec<Res>,
        F: Fn(&Req) -> Res,
    {
        let managers = self.managers.read().clone();
        let mut slots: Vec<Option<Res>> = (0..requests.len()).map(|_| None).collect();
        let mut batches: Vec<(Vec<usize>, Vec<Req>)> = vec![(Vec::new(), Vec::new()); managers.len()];

        for (index, request) in requests.iter().enumerate() {
            let owner =
                key(request).and_then(|node_id| managers.iter().position(|m| m.owns(node_id)));
            match owner {
                Some(owner) => {
                    batches[owner].0.push(index);
                    batches[owner].1.push(request.clone());
                }
                None => slots[index] = Some(fallback(request)),
            }
        }

        for (manager, (indices, batch)) in managers.iter().zip(batches) {
            if batch.is_empty() {
                continue;
            }
            let results = dispatch(manager.as_ref(), &batch);
            if results.len() != indices.len() {
                warn!(
                    manager = manager.name(),
                    expected = indices.len(),
                    returned = results.len(),
                    "node manager returned a short batch"
                );
            }
            for (index, result) in indices.into_iter().zip(results) {
                slots[index] = Some(result);
            }
        }

        slots
            .into_iter()
            .zip(requests)
            .map(|(slot, request)| slot.unwrap_or_else(|| fallback(request)))
            .collect()
    }

    /// Shut down every node manager. Failures are logged, never returned.
    /// Managers stay registered and keep answering for the nodes they own.
    pub fn shutdown(&self) {
        let managers = self.managers.read().clone();
        for manager in managers {
            if let Err(err) = manager.shutdown() {
                warn!(manager = manager.name(), error = %err, "node manager shutdown failed");
            }
        }
        info!("server shutdown complete");
    }
}
