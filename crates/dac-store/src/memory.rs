use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use dac_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::Object;
use crate::traits::{ObjectReader, ObjectWriter};

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. All objects are held in memory behind a
/// `RwLock` for safe concurrent access. Objects are cloned on read/write.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ObjectId, Object>>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read_map()?.len())
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.read_map()?.is_empty())
    }

    /// Return a sorted list of all object IDs in the store.
    pub fn all_ids(&self) -> StoreResult<Vec<ObjectId>> {
        let map = self.read_map()?;
        let mut ids: Vec<ObjectId> = map.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    fn read_map(
        &self,
    ) -> StoreResult<std::sync::RwLockReadGuard<'_, HashMap<ObjectId, Object>>> {
        self.objects
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectReader for InMemoryObjectStore {
    fn read_object(&self, id: &ObjectId) -> StoreResult<Object> {
        self.read_map()?
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound(*id))
    }

    fn contains_object(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.read_map()?.contains_key(id))
    }
}

impl ObjectWriter for InMemoryObjectStore {
    fn write_object(&self, object: &Object) -> StoreResult<()> {
        let id = object.id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        object.verify()?;

        let mut map = self
            .objects
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        match map.get(&id) {
            Some(existing) if existing == object => {}
            Some(_) => return Err(StoreError::Collision(id)),
            None => {
                debug!(id = %id.short_hex(), preds = object.predecessors().len(), "stored object");
                map.insert(id, object.clone());
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.read_map().map(|m| m.len()).unwrap_or_default();
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &count)
            .finish()
    }
}
