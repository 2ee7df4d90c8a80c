//! Reference storage contracts.
//!
//! Reading and writing are separate capabilities, composed by the graph
//! engine that needs both.

use crate::error::Result;
use crate::types::Reference;

/// Read capability over named references.
pub trait ReferenceReader: Send + Sync {
    /// Read a reference by name.
    ///
    /// Absence is `Ok(None)`, never an error.
    fn read_reference(&self, name: &str) -> Result<Option<Reference>>;

    /// All references, sorted by name.
    fn list_references(&self) -> Result<Vec<Reference>>;
}

/// Write capability over named references.
pub trait ReferenceWriter: Send + Sync {
    /// Create or update the reference keyed by `reference.name`.
    fn write_reference(&self, reference: &Reference) -> Result<()>;
}
