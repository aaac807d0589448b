// File: ring.rs
//
// The purpose of this file is to own the registry of live nodes and run
// every operation that spans more than one node: successor lookup, the
// join and leave protocols, and the client-facing DHT operations.

use crate::error::{Result, RingError};
use crate::hash::{self, Id};
use crate::node::Node;
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;

/// A Chord ring simulated in a single process
///
/// The ring owns every live node. Nodes refer to their peers by identifier
/// and every dereference goes back through the registry, so the cyclic
/// successor/predecessor/finger graph never holds a direct reference.
pub struct Ring<V> {
    m: u32,
    nodes: BTreeMap<Id, Node<V>>,
}

impl<V> Ring<V> {
    /// Returns a new, empty ring over a 2^m identifier space
    ///
    /// # Arguments
    ///
    /// * `m` - The number of bits in the identifier space, between 1 and 64
    pub fn new(m: u32) -> Ring<V> {
        assert!(
            m >= 1 && m <= 64,
            "identifier space must use between 1 and 64 bits"
        );
        Ring {
            m,
            nodes: BTreeMap::new(),
        }
    }

    /// Returns the number of bits in the identifier space
    pub fn bits(&self) -> u32 {
        self.m
    }

    /// Returns the number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns whether the ring has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns a node by identifier, if it is live
    ///
    /// # Arguments
    ///
    /// * `node_id` - The identifier of the node
    pub fn get(&self, node_id: Id) -> Option<&Node<V>> {
        self.nodes.get(&node_id)
    }

    /// Returns the live nodes ordered by ascending identifier
    pub fn nodes_in_order(&self) -> Vec<&Node<V>> {
        self.nodes.values().collect()
    }

    /// Creates a node with the given identifier and joins it to the ring
    ///
    /// The first node forms a singleton ring. Every later node enters
    /// through the smallest live identifier: it takes its place between its
    /// successor and predecessor, builds its finger table, rebuilds the
    /// finger tables of the other nodes, and pulls the keys it now owns
    /// from its successor.
    ///
    /// # Arguments
    ///
    /// * `node_id` - The identifier of the new node
    pub fn join(&mut self, node_id: Id) -> Result<&Node<V>> {
        if node_id > hash::id_mask(self.m) {
            return Err(RingError::OutOfBounds(node_id));
        }
        if self.nodes.contains_key(&node_id) {
            return Err(RingError::Duplicate(node_id));
        }

        let entry = self.smallest_id();
        self.nodes.insert(node_id, Node::new(node_id, self.m));

        match entry {
            None => info!("node {} is the first node in the ring", node_id),
            Some(entry) => {
                self.splice_in(node_id, entry);
                self.init_fingers(node_id);
                self.rebuild_other_fingers(node_id);
                self.pull_keys_from_successor(node_id);
                info!("node {} joined through node {}", node_id, entry);
            }
        }

        Ok(self.node(node_id))
    }

    /// Removes a node from the ring
    ///
    /// Before the node disappears its entries in other finger tables are
    /// replaced with its successor, its keys move to its successor, and its
    /// neighbors are linked to each other.
    ///
    /// # Arguments
    ///
    /// * `node_id` - The identifier of the leaving node
    pub fn leave(&mut self, node_id: Id) -> Result<()> {
        if !self.nodes.contains_key(&node_id) {
            return Err(RingError::NotFound(node_id));
        }

        let successor = self.node(node_id).successor();
        if successor != node_id {
            self.replace_in_other_fingers(node_id);
            self.push_keys_to_successor(node_id);

            let predecessor = self.node(node_id).predecessor();
            self.node_mut(successor).set_predecessor(predecessor);
            self.node_mut(predecessor).set_successor(successor);
            self.node_mut(node_id).reset_links();
        }

        self.nodes.remove(&node_id);
        info!("node {} left the ring", node_id);
        Ok(())
    }

    /// Stores a key/value pair at the node owning the key, replacing any
    /// previous value
    ///
    /// # Arguments
    ///
    /// * `key` - The key being stored
    /// * `value` - The value being stored
    pub fn insert(&mut self, key: &str, value: V) -> Result<()> {
        let owner = self.owner_of(key)?;
        debug!("key {:?} stored at node {}", key, owner);
        self.node_mut(owner).set(key.to_string(), value);
        Ok(())
    }

    /// Returns the value stored for a key, if any
    ///
    /// # Arguments
    ///
    /// * `key` - The key being queried
    pub fn lookup(&self, key: &str) -> Result<Option<&V>> {
        let owner = self.owner_of(key)?;
        Ok(self.node(owner).get(key))
    }

    /// Removes a key from the ring; removing an absent key does nothing
    ///
    /// # Arguments
    ///
    /// * `key` - The key being removed
    pub fn delete(&mut self, key: &str) -> Result<()> {
        let owner = self.owner_of(key)?;
        self.node_mut(owner).remove(key);
        Ok(())
    }

    /// Finds the live node whose identifier is the first at or after the
    /// target, walking clockwise from any entry node
    ///
    /// # Arguments
    ///
    /// * `from` - The identifier of the live node the query enters at
    /// * `target` - The identifier whose successor is wanted
    pub fn find_successor(&self, from: Id, target: Id) -> Id {
        let mut current = from;
        loop {
            let node = self.node(current);
            if node.id() == target {
                return current;
            }
            if hash::in_right_closed_range(node.id(), node.successor(), target) {
                return node.successor();
            }
            let next = node.closest_preceding_finger(target);
            if next == current {
                // no finger advances the query, which only happens while
                // finger tables are still being built; the successor link
                // is authoritative
                return node.successor();
            }
            current = next;
        }
    }

    /// Finds the live node whose identifier most closely precedes the
    /// target, walking clockwise from any entry node
    ///
    /// # Arguments
    ///
    /// * `from` - The identifier of the live node the query enters at
    /// * `target` - The identifier whose predecessor is wanted
    pub fn find_predecessor(&self, from: Id, target: Id) -> Id {
        let mut current = from;
        loop {
            let node = self.node(current);
            if hash::in_right_closed_range(node.id(), node.successor(), target) {
                return current;
            }
            let next = node.closest_preceding_finger(target);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    /// Returns a serializable per-node view of the whole ring, ordered by
    /// ascending identifier
    pub fn summary(&self) -> Vec<NodeSummary> {
        self.nodes
            .values()
            .map(|node| {
                let mut keys: Vec<String> = node.data().keys().cloned().collect();
                keys.sort();
                NodeSummary {
                    id: node.id(),
                    successor: node.successor(),
                    predecessor: node.predecessor(),
                    fingers: node.finger_ids(),
                    keys,
                }
            })
            .collect()
    }

    /// Links a freshly created node between its successor and predecessor
    ///
    /// # Arguments
    ///
    /// * `node_id` - The joining node
    /// * `entry` - The live node the join routes through
    fn splice_in(&mut self, node_id: Id, entry: Id) {
        let successor = self.find_successor(entry, node_id);
        let predecessor = self.node(successor).predecessor();

        {
            let node = self.node_mut(node_id);
            node.set_successor(successor);
            node.set_predecessor(predecessor);
        }
        self.node_mut(successor).set_predecessor(node_id);
        self.node_mut(predecessor).set_successor(node_id);
    }

    /// Fills the joining node's finger table
    /// Must run after the node is spliced in: lookups route through the
    /// fresh successor link and the rest of the ring
    ///
    /// # Arguments
    ///
    /// * `node_id` - The joining node
    fn init_fingers(&mut self, node_id: Id) {
        for i in 0..self.m {
            let start = self.node(node_id).finger_start(i);
            let finger = self.find_successor(node_id, start);
            self.node_mut(node_id).set_finger(i, finger);
        }
    }

    /// Rebuilds the finger table of every other node after a join
    /// Walks the ring once over successor links, resolving each entry from
    /// the joining node's now complete routing state
    ///
    /// # Arguments
    ///
    /// * `node_id` - The node that just joined
    fn rebuild_other_fingers(&mut self, node_id: Id) {
        let mut current = self.node(node_id).successor();
        while current != node_id {
            for i in 0..self.m {
                let start = self.node(current).finger_start(i);
                let finger = self.find_successor(node_id, start);
                self.node_mut(current).set_finger(i, finger);
            }
            current = self.node(current).successor();
        }
    }

    /// Replaces every finger pointing at a leaving node with its successor
    ///
    /// # Arguments
    ///
    /// * `node_id` - The leaving node
    fn replace_in_other_fingers(&mut self, node_id: Id) {
        let m = self.m;
        let successor = self.node(node_id).successor();
        let mut current = successor;
        while current != node_id {
            let node = self.node_mut(current);
            for i in 0..m {
                if node.finger(i) == node_id {
                    node.set_finger(i, successor);
                }
            }
            current = node.successor();
        }
    }

    /// Moves the keys a joining node now owns out of its successor
    /// The owned arc is (predecessor, node_id]; the key set is snapshotted
    /// before the successor's store is mutated
    ///
    /// # Arguments
    ///
    /// * `node_id` - The node that just joined
    fn pull_keys_from_successor(&mut self, node_id: Id) {
        let successor = self.node(node_id).successor();
        let predecessor = self.node(node_id).predecessor();

        let keys = self.node(successor).keys_in_range(predecessor, node_id);
        if keys.is_empty() {
            return;
        }
        debug!(
            "moving {} keys from node {} to node {}",
            keys.len(),
            successor,
            node_id
        );
        for key in keys {
            if let Some(value) = self.node_mut(successor).remove(&key) {
                self.node_mut(node_id).set(key, value);
            }
        }
    }

    /// Merges all of a leaving node's keys into its successor
    ///
    /// # Arguments
    ///
    /// * `node_id` - The leaving node
    fn push_keys_to_successor(&mut self, node_id: Id) {
        let successor = self.node(node_id).successor();
        let data = self.node_mut(node_id).take_data();
        if !data.is_empty() {
            debug!(
                "moving {} keys from node {} to node {}",
                data.len(),
                node_id,
                successor
            );
        }
        let target = self.node_mut(successor);
        for (key, value) in data {
            target.set(key, value);
        }
    }

    /// Resolves the node owning a key: the successor of the key's hashed
    /// identifier, found from the smallest live node
    ///
    /// # Arguments
    ///
    /// * `key` - The key being resolved
    fn owner_of(&self, key: &str) -> Result<Id> {
        let entry = self.smallest_id().ok_or(RingError::EmptyRing)?;
        let target = hash::hash_id(key, self.m);
        Ok(self.find_successor(entry, target))
    }

    /// Returns the smallest live identifier, the deterministic entry point
    fn smallest_id(&self) -> Option<Id> {
        self.nodes.keys().next().copied()
    }

    fn node(&self, id: Id) -> &Node<V> {
        self.nodes.get(&id).expect("identifier not in the ring registry")
    }

    fn node_mut(&mut self, id: Id) -> &mut Node<V> {
        self.nodes
            .get_mut(&id)
            .expect("identifier not in the ring registry")
    }
}

/// Per-node view of the ring used for printing and debugging
#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub id: Id,
    pub successor: Id,
    pub predecessor: Id,
    pub fingers: Vec<Id>,
    pub keys: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ring_rejects_data_operations() {
        let mut ring: Ring<&str> = Ring::new(3);
        assert_eq!(ring.insert("a", "val_a"), Err(RingError::EmptyRing));
        assert_eq!(ring.lookup("a"), Err(RingError::EmptyRing));
        assert_eq!(ring.delete("a"), Err(RingError::EmptyRing));
    }

    #[test]
    fn test_join_rejects_out_of_bounds_and_duplicates() {
        let mut ring: Ring<&str> = Ring::new(3);
        assert_eq!(ring.join(8).unwrap_err(), RingError::OutOfBounds(8));

        ring.join(0).unwrap();
        assert_eq!(ring.join(0).unwrap_err(), RingError::Duplicate(0));
    }

    #[test]
    fn test_leave_rejects_unknown_node() {
        let mut ring: Ring<&str> = Ring::new(3);
        assert_eq!(ring.leave(5).unwrap_err(), RingError::NotFound(5));
    }

    #[test]
    fn test_singleton_ring_points_at_itself() {
        let mut ring: Ring<&str> = Ring::new(3);
        ring.join(0).unwrap();

        let node = ring.get(0).unwrap();
        assert_eq!(ring.len(), 1);
        assert_eq!(node.successor(), 0);
        assert_eq!(node.predecessor(), 0);
        assert_eq!(node.finger_ids(), vec![0, 0, 0]);
    }

    #[test]
    fn test_singleton_owns_every_key() {
        let mut ring: Ring<&str> = Ring::new(3);
        ring.join(5).unwrap();

        ring.insert("a", "val_a").unwrap();
        ring.insert("c", "val_c").unwrap();
        assert_eq!(ring.lookup("a").unwrap(), Some(&"val_a"));
        assert_eq!(ring.lookup("c").unwrap(), Some(&"val_c"));
        assert_eq!(ring.get(5).unwrap().data().len(), 2);
    }

    #[test]
    fn test_insert_overwrites() {
        let mut ring: Ring<&str> = Ring::new(3);
        ring.join(0).unwrap();
        ring.join(4).unwrap();

        ring.insert("a", "old").unwrap();
        ring.insert("a", "new").unwrap();
        assert_eq!(ring.lookup("a").unwrap(), Some(&"new"));
    }

    #[test]
    fn test_delete_is_silent_on_absent_keys() {
        let mut ring: Ring<&str> = Ring::new(3);
        ring.join(0).unwrap();
        assert_eq!(ring.delete("missing"), Ok(()));
    }

    #[test]
    fn test_nodes_in_order_sorts_by_id() {
        let mut ring: Ring<&str> = Ring::new(4);
        for id in &[9, 2, 14, 5] {
            ring.join(*id).unwrap();
        }
        let ids: Vec<Id> = ring.nodes_in_order().iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec![2, 5, 9, 14]);
    }
}
