// Randomized join/leave/insert/delete sequences, with the ring state
// checked after every step against a plain sorted-list oracle.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use torc::{hash_id, in_right_closed_range, Id, Ring};

/// The successor oracle: the smallest live id at or after the target,
/// wrapping to the smallest live id overall
fn oracle_successor(live: &[Id], target: Id) -> Id {
    live.iter().copied().find(|&id| id >= target).unwrap_or(live[0])
}

/// The next node clockwise: the smallest live id strictly after this one,
/// wrapping to the smallest live id overall
fn oracle_next(live: &[Id], id: Id) -> Id {
    live.iter().copied().find(|&other| other > id).unwrap_or(live[0])
}

/// Checks every structural invariant of the ring in one pass
fn check_invariants(ring: &Ring<String>) {
    let nodes = ring.nodes_in_order();
    let live: Vec<Id> = nodes.iter().map(|node| node.id()).collect();
    let m = ring.bits();

    for node in &nodes {
        let id = node.id();

        // successor consistency and predecessor symmetry
        assert_eq!(
            node.successor(),
            oracle_next(&live, id),
            "successor of node {}",
            id
        );
        let successor = ring.get(node.successor()).unwrap();
        assert_eq!(successor.predecessor(), id, "predecessor of node {}", node.successor());

        // finger correctness against the oracle
        for i in 0..m {
            let target = node.finger_start(i);
            assert_eq!(
                node.finger(i),
                oracle_successor(&live, target),
                "finger {} of node {}",
                i,
                id
            );
        }

        // data placement: every stored key hashes into (predecessor, id]
        if live.len() > 1 {
            for key in node.data().keys() {
                let kid = hash_id(key, m);
                assert!(
                    in_right_closed_range(node.predecessor(), id, kid),
                    "key {:?} (id {}) misplaced at node {}",
                    key,
                    kid,
                    id
                );
            }
        }
    }
}

/// Checks that the ring agrees with a model map built alongside it
fn check_model(ring: &Ring<String>, model: &BTreeMap<String, String>) {
    for (key, value) in model {
        assert_eq!(
            ring.lookup(key).unwrap(),
            Some(value),
            "lookup of {:?}",
            key
        );
    }
    let stored: usize = ring.nodes_in_order().iter().map(|node| node.data().len()).sum();
    assert_eq!(stored, model.len(), "total stored pairs");
}

#[test]
fn random_churn_preserves_every_invariant() {
    let mut rng = StdRng::seed_from_u64(0x0dd5eed);

    for &m in [3u32, 5, 8].iter() {
        let space = 1u64 << m;
        let mut ring: Ring<String> = Ring::new(m);
        let mut model: BTreeMap<String, String> = BTreeMap::new();
        let mut serial = 0u32;

        for _ in 0..150 {
            if ring.is_empty() || rng.gen_bool(0.6) {
                let id = rng.gen_range(0, space);
                // joining an occupied id is rejected without side effects
                let _ = ring.join(id);
            } else if ring.len() > 1 {
                let live: Vec<Id> = ring.nodes_in_order().iter().map(|node| node.id()).collect();
                let id = live[rng.gen_range(0, live.len())];
                ring.leave(id).unwrap();
            }

            if !ring.is_empty() && rng.gen_bool(0.5) {
                let key = format!("key-{}", serial);
                let value = format!("value-{}", serial);
                serial += 1;
                ring.insert(&key, value.clone()).unwrap();
                model.insert(key, value);
            }

            if !ring.is_empty() && !model.is_empty() && rng.gen_bool(0.2) {
                let pick = rng.gen_range(0, model.len());
                let key = model.keys().nth(pick).cloned().unwrap();
                ring.delete(&key).unwrap();
                model.remove(&key);
            }

            check_invariants(&ring);
            check_model(&ring, &model);
        }
    }
}

#[test]
fn every_join_order_yields_the_same_tables() {
    // the invariants pin down every link and finger, so two rings over the
    // same identifiers must agree no matter the join order
    let mut rng = StdRng::seed_from_u64(42);
    let ids = [0u64, 1, 2, 4, 6];

    let mut reference: Ring<String> = Ring::new(3);
    for &id in ids.iter() {
        reference.join(id).unwrap();
    }
    let expected = reference.summary();

    for _ in 0..10 {
        let mut shuffled = ids;
        // Fisher-Yates over the five identifiers
        for i in (1..shuffled.len()).rev() {
            let j = rng.gen_range(0, i + 1);
            shuffled.swap(i, j);
        }

        let mut ring: Ring<String> = Ring::new(3);
        for &id in shuffled.iter() {
            ring.join(id).unwrap();
        }
        let summary = ring.summary();
        for (actual, wanted) in summary.iter().zip(expected.iter()) {
            assert_eq!(actual.id, wanted.id);
            assert_eq!(actual.successor, wanted.successor, "successor of {}", actual.id);
            assert_eq!(actual.predecessor, wanted.predecessor, "predecessor of {}", actual.id);
            assert_eq!(actual.fingers, wanted.fingers, "fingers of {}", actual.id);
        }
    }
}

#[test]
fn growing_and_shrinking_back_keeps_data_reachable() {
    let mut ring: Ring<String> = Ring::new(5);
    for &id in [4u64, 11, 19, 27].iter() {
        ring.join(id).unwrap();
    }
    for i in 0..20 {
        let key = format!("record-{}", i);
        ring.insert(&key, format!("payload-{}", i)).unwrap();
    }

    // grow the ring, then remove the newcomers again
    for &id in [0u64, 7, 15, 23, 30].iter() {
        ring.join(id).unwrap();
        check_invariants(&ring);
    }
    for &id in [0u64, 7, 15, 23, 30].iter() {
        ring.leave(id).unwrap();
        check_invariants(&ring);
    }

    for i in 0..20 {
        let key = format!("record-{}", i);
        assert_eq!(ring.lookup(&key).unwrap(), Some(&format!("payload-{}", i)));
    }
}
