use thiserror::Error;

use dac_graph::GraphError;
use dac_store::StoreError;
use dac_types::ObjectId;

use crate::types::Phase;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("malformed protocol line: {0}")]
    MalformedLine(String),

    #[error("not a fast-forward update for ref {name}: {from} is not an ancestor of {to}")]
    NonFastForward {
        name: String,
        from: ObjectId,
        to: ObjectId,
    },

    #[error("update of ref {name} references {id}, which the transfer does not contain")]
    OrphanedAncestor { name: String, id: ObjectId },

    #[error("timed out waiting for the peer during {phase}")]
    Timeout { phase: Phase },

    #[error("peer closed the line queue before the flush line during {phase}")]
    UnexpectedEof { phase: Phase },

    #[error("operation requires phase {expected}, session is in {actual}")]
    PhaseViolation { expected: Phase, actual: Phase },

    #[error("outbound line queue is closed")]
    TransportClosed,

    #[error("framing error: {0}")]
    Framing(String),

    #[error("line too long: {len} bytes (max {max})")]
    LineTooLong { len: usize, max: usize },

    #[error("invalid sync configuration: {0}")]
    Config(String),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type SyncResult<T> = Result<T, SyncError>;
