use std::collections::hash_map::Entry;
use std::collections::HashMap;

use dac_store::{Object, ObjectReader, StoreError, StoreResult};
use dac_types::ObjectId;

/// Read-only index over the objects supplied with a batch of updates.
///
/// Every object is verified on entry, so a forged id never reaches the
/// validation walk or the local store.
#[derive(Debug, Default)]
pub struct PackIndex {
    objects: Vec<Object>,
    positions: HashMap<ObjectId, usize>,
}

impl PackIndex {
    pub fn new(objects: Vec<Object>) -> StoreResult<Self> {
        let mut index = Self::default();
        for object in objects {
            object.verify()?;
            if let Entry::Vacant(slot) = index.positions.entry(object.id()) {
                slot.insert(index.objects.len());
                index.objects.push(object);
            }
        }
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects in arrival order, duplicates dropped.
    pub fn objects(&self) -> &[Object] {
        &self.objects
    }
}

impl ObjectReader for PackIndex {
    fn read_object(&self, id: &ObjectId) -> StoreResult<Object> {
        self.positions
            .get(id)
            .map(|&at| self.objects[at].clone())
            .ok_or(StoreError::NotFound(*id))
    }

    fn contains_object(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.positions.contains_key(id))
    }
}

/// The supplied objects, optionally backed by the local store for anything
/// the transfer left out.
pub struct TransferView<'a, L: ?Sized> {
    pack: &'a PackIndex,
    local: Option<&'a L>,
}

impl<'a, L: ObjectReader + ?Sized> TransferView<'a, L> {
    /// Only the supplied objects are visible.
    pub fn strict(pack: &'a PackIndex) -> Self {
        Self { pack, local: None }
    }

    /// Fall back to `local` for ids missing from the transfer.
    pub fn with_fallback(pack: &'a PackIndex, local: &'a L) -> Self {
        Self {
            pack,
            local: Some(local),
        }
    }
}

impl<L: ObjectReader + ?Sized> ObjectReader for TransferView<'_, L> {
    fn read_object(&self, id: &ObjectId) -> StoreResult<Object> {
        match (self.pack.read_object(id), self.local) {
            (Err(StoreError::NotFound(_)), Some(local)) => local.read_object(id),
            (result, _) => result,
        }
    }
}
