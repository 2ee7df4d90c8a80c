//! Per-reference-name serialization for read-then-write sequences.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{GraphError, GraphResult};

/// Lock table keyed by reference name.
///
/// Appends and moves on the same name run one at a time within a process;
/// different names proceed in parallel. Entries are created on first use and
/// kept for the lifetime of the table.
#[derive(Debug, Default)]
pub struct RefLocks {
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RefLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `name`. Hold its guard across the whole read-then-write.
    pub fn handle(&self, name: &str) -> GraphResult<Arc<Mutex<()>>> {
        let mut table = self
            .table
            .lock()
            .map_err(|e| GraphError::LockPoisoned(e.to_string()))?;
        Ok(Arc::clone(table.entry(name.to_string()).or_default()))
    }
}
