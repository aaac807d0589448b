//! Single-process simulation of a Chord distributed hash table.
//!
//! The ring lives in one process: nodes are entries in a registry owned by
//! [`Ring`], they reference their peers by identifier, and every protocol
//! message of the original design is a direct method call. Joining and
//! leaving keep the placement invariant intact, so a key can always be
//! found at the successor of its hashed identifier no matter which node
//! the query enters at.

pub mod error;
pub mod hash;
pub mod node;
pub mod ring;
pub mod shared;

pub use error::{Result, RingError};
pub use hash::{hash_id, id_mask, in_open_range, in_right_closed_range, Id};
pub use node::Node;
pub use ring::{NodeSummary, Ring};
pub use shared::SharedRing;
