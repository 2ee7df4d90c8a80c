use dac_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::Object;

/// Read capability over content-addressed objects.
///
/// Concurrent reads are always safe because objects never change once
/// written.
pub trait ObjectReader: Send + Sync {
    /// Read an object by id.
    ///
    /// Returns [`StoreError::NotFound`] if no object with that id exists.
    fn read_object(&self, id: &ObjectId) -> StoreResult<Object>;

    /// Check whether an object exists.
    fn contains_object(&self, id: &ObjectId) -> StoreResult<bool> {
        match self.read_object(id) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Write capability over content-addressed objects.
pub trait ObjectWriter: Send + Sync {
    /// Persist an object under its id.
    ///
    /// Writing an object that is already stored is a no-op. Writing
    /// different content under an existing id must fail with
    /// [`StoreError::Collision`].
    fn write_object(&self, object: &Object) -> StoreResult<()>;

    /// Persist several objects.
    ///
    /// Default implementation calls `write_object()` for each. Backends may
    /// override for better performance (e.g., single fsync).
    fn write_objects(&self, objects: &[Object]) -> StoreResult<()> {
        objects.iter().try_for_each(|obj| self.write_object(obj))
    }
}
