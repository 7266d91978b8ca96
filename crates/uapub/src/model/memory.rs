// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory information model with internal and external value backends.
//!
//! An `External` backend keeps the value in a shared cell owned by the
//! application; writes through the model land in that cell and fire an
//! optional notification callback. This mirrors the external value source
//! used on the subscriber side in RT deployments, where the application
//! holds the storage and the PubSub cycle writes into it directly.

use super::value::DataValue;
use super::{InformationModel, NodeIdentity};
use crate::pubsub::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Callback fired after a write lands in an external backend.
pub type WriteNotification = Box<dyn FnMut(&NodeIdentity, &DataValue)>;

/// Storage backend of one node.
pub enum ValueBackend {
    /// Value owned by the model.
    Internal(DataValue),
    /// Value owned by the application in a shared cell.
    External {
        cell: Arc<RwLock<DataValue>>,
        on_write: Option<WriteNotification>,
    },
}

/// Minimal node-identity -> value map implementing [`InformationModel`].
#[derive(Default)]
pub struct MemoryModel {
    nodes: HashMap<NodeIdentity, ValueBackend>,
}

impl MemoryModel {
    pub fn new() -> Self {
        MemoryModel {
            nodes: HashMap::new(),
        }
    }

    /// Register a node with a model-owned value.
    pub fn add_node(&mut self, node: NodeIdentity, value: DataValue) {
        self.nodes.insert(node, ValueBackend::Internal(value));
    }

    /// Register a node backed by an application-owned shared cell.
    pub fn add_external_node(
        &mut self,
        node: NodeIdentity,
        cell: Arc<RwLock<DataValue>>,
        on_write: Option<WriteNotification>,
    ) {
        self.nodes
            .insert(node, ValueBackend::External { cell, on_write });
    }

    pub fn contains(&self, node: &NodeIdentity) -> bool {
        self.nodes.contains_key(node)
    }
}

impl InformationModel for MemoryModel {
    fn write_value(&mut self, node: &NodeIdentity, value: DataValue) -> Result<()> {
        match self.nodes.get_mut(node) {
            Some(ValueBackend::Internal(stored)) => {
                *stored = value;
                Ok(())
            }
            Some(ValueBackend::External { cell, on_write }) => {
                *cell.write() = value.clone();
                if let Some(callback) = on_write {
                    callback(node, &value);
                }
                Ok(())
            }
            None => Err(Error::InvalidArgument("unknown target node")),
        }
    }

    fn read_value(&self, node: &NodeIdentity) -> Result<DataValue> {
        match self.nodes.get(node) {
            Some(ValueBackend::Internal(stored)) => Ok(stored.clone()),
            Some(ValueBackend::External { cell, .. }) => Ok(cell.read().clone()),
            None => Err(Error::InvalidArgument("unknown target node")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Variant;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_internal_backend_write_read() {
        let mut model = MemoryModel::new();
        let node = NodeIdentity::numeric(1, 50002);
        model.add_node(node.clone(), DataValue::new(Variant::UInt32(0)));

        model
            .write_value(&node, DataValue::new(Variant::UInt32(1000)))
            .expect("write");
        let value = model.read_value(&node).expect("read");
        assert_eq!(value.value, Variant::UInt32(1000));
    }

    #[test]
    fn test_external_backend_lands_in_cell_and_notifies() {
        let mut model = MemoryModel::new();
        let node = NodeIdentity::numeric(1, 50002);
        let cell = Arc::new(RwLock::new(DataValue::new(Variant::UInt32(0))));
        static WRITES: AtomicU32 = AtomicU32::new(0);

        model.add_external_node(
            node.clone(),
            Arc::clone(&cell),
            Some(Box::new(|_, _| {
                WRITES.fetch_add(1, Ordering::Relaxed);
            })),
        );

        model
            .write_value(&node, DataValue::new(Variant::UInt32(42)))
            .expect("write");
        assert_eq!(cell.read().value, Variant::UInt32(42));
        assert_eq!(WRITES.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_unknown_node_rejected() {
        let mut model = MemoryModel::new();
        let node = NodeIdentity::numeric(9, 9);
        assert!(model
            .write_value(&node, DataValue::new(Variant::Byte(1)))
            .is_err());
        assert!(model.read_value(&node).is_err());
    }
}
