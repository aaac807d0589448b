// File: error.rs
//
// The purpose of this file is to define the errors the ring surfaces
// to its callers.

use crate::hash::Id;
use thiserror::Error;

/// Result alias for ring operations
pub type Result<T> = std::result::Result<T, RingError>;

/// Errors surfaced by the ring's client-facing operations
///
/// Lookups of absent keys are not errors; they return `None`. Deletes of
/// absent keys are no-ops. Once a join or leave protocol begins it runs to
/// completion, so everything here is raised before any node state changes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RingError {
    #[error("node id {0} is outside the identifier space")]
    OutOfBounds(Id),
    #[error("node id {0} is already in the ring")]
    Duplicate(Id),
    #[error("node id {0} is not in the ring")]
    NotFound(Id),
    #[error("the ring has no nodes")]
    EmptyRing,
}
