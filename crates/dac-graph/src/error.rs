//! Error types for graph operations.

use dac_refs::RefError;
use dac_store::StoreError;
use dac_types::ObjectId;

/// Errors that can occur during graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A required object does not exist.
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    /// A required reference is not bound.
    #[error("reference not found: {0}")]
    ReferenceNotFound(String),

    /// An id reachable through predecessor edges could not be read.
    #[error("orphaned ancestor {id}: {source}")]
    OrphanedAncestor {
        /// The unreadable ancestor.
        id: ObjectId,
        /// The read failure reported by the object source.
        source: StoreError,
    },

    /// Merge-base resolution needs at least two starting points.
    #[error("need at least 2 references, got {given}")]
    InsufficientReferences {
        /// How many were supplied.
        given: usize,
    },

    /// The two histories share no object.
    #[error("no common ancestor between {left} and {right}")]
    NoCommonAncestor {
        /// Left operand of the failing pairwise step.
        left: ObjectId,
        /// Right operand of the failing pairwise step.
        right: ObjectId,
    },

    /// A compare-and-swap move found a different current target.
    #[error("reference {name} moved: expected {expected:?}, found {actual:?}")]
    StaleReference {
        /// The reference being moved.
        name: String,
        /// The target the caller expected.
        expected: Option<ObjectId>,
        /// The target actually stored.
        actual: Option<ObjectId>,
    },

    /// A per-reference lock was poisoned by a panicking holder.
    #[error("reference lock poisoned: {0}")]
    LockPoisoned(String),

    /// Object store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Reference store failure.
    #[error("ref error: {0}")]
    Ref(#[from] RefError),
}

/// Convenience alias for graph results.
pub type GraphResult<T> = Result<T, GraphError>;
