// File: shared.rs
//
// The purpose of this file is to let several threads drive one ring by
// serializing every top-level operation behind a ring-wide lock.

use crate::error::Result;
use crate::hash::Id;
use crate::ring::{NodeSummary, Ring};
use parking_lot::RwLock;
use std::sync::Arc;

/// Automatic reference counted wrapper for a RwLock containing the ring
///
/// The core ring is single-threaded by design; this handle is the one
/// sanctioned way to share it. Cloning the handle shares the same
/// underlying ring. Mutating operations take the write lock, inspections
/// take the read lock, and every operation runs to completion before the
/// lock is released.
pub struct SharedRing<V> {
    inner: Arc<RwLock<Ring<V>>>,
}

impl<V> Clone for SharedRing<V> {
    fn clone(&self) -> SharedRing<V> {
        SharedRing {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> SharedRing<V> {
    /// Returns a new handle around an empty ring
    ///
    /// # Arguments
    ///
    /// * `m` - The number of bits in the identifier space, between 1 and 64
    pub fn new(m: u32) -> SharedRing<V> {
        SharedRing {
            inner: Arc::new(RwLock::new(Ring::new(m))),
        }
    }

    /// Joins a node to the ring
    pub fn join(&self, node_id: Id) -> Result<()> {
        self.inner.write().join(node_id).map(|_| ())
    }

    /// Removes a node from the ring
    pub fn leave(&self, node_id: Id) -> Result<()> {
        self.inner.write().leave(node_id)
    }

    /// Stores a key/value pair at the node owning the key
    pub fn insert(&self, key: &str, value: V) -> Result<()> {
        self.inner.write().insert(key, value)
    }

    /// Removes a key from the ring
    pub fn delete(&self, key: &str) -> Result<()> {
        self.inner.write().delete(key)
    }

    /// Returns the number of live nodes
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns whether the ring has no nodes
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Returns a serializable per-node view of the whole ring
    pub fn summary(&self) -> Vec<NodeSummary> {
        self.inner.read().summary()
    }
}

impl<V: Clone> SharedRing<V> {
    /// Returns the value stored for a key, if any
    /// The value is cloned out so the lock is released before it is used
    ///
    /// # Arguments
    ///
    /// * `key` - The key being queried
    pub fn lookup(&self, key: &str) -> Result<Option<V>> {
        self.inner.read().lookup(key).map(|value| value.cloned())
    }
}
