use serde::{Deserialize, Serialize};

use dac_crypto::ObjectHasher;
use dac_types::ObjectId;

use crate::error::{StoreError, StoreResult};

/// An immutable node in the object graph: content bytes plus an ordered list
/// of predecessor ids.
///
/// The id is always the digest of `(predecessors, content)`; [`Object::new`]
/// computes it, so two objects built from the same links and content are
/// identical. The store owns objects once written and never hands out a
/// mutable copy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    id: ObjectId,
    content: Vec<u8>,
    predecessors: Vec<ObjectId>,
}

impl Object {
    /// Build an object and compute its content-addressed id.
    pub fn new(content: impl Into<Vec<u8>>, predecessors: Vec<ObjectId>) -> Self {
        let content = content.into();
        let id = ObjectHasher::object_id(&predecessors, &content);
        Self {
            id,
            content,
            predecessors,
        }
    }

    /// Reassemble an object received from a backend or peer, checking that
    /// the claimed id matches its links and content.
    pub fn from_parts(
        id: ObjectId,
        content: Vec<u8>,
        predecessors: Vec<ObjectId>,
    ) -> StoreResult<Self> {
        let object = Self {
            id,
            content,
            predecessors,
        };
        object.verify()?;
        Ok(object)
    }

    /// The content-addressed id.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The opaque payload bytes.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Predecessor ids, in the order they were hashed.
    pub fn predecessors(&self) -> &[ObjectId] {
        &self.predecessors
    }

    /// Returns `true` if this object has no predecessors.
    pub fn is_root(&self) -> bool {
        self.predecessors.is_empty()
    }

    /// Recompute the digest and compare it with the stored id.
    pub fn verify(&self) -> StoreResult<()> {
        let computed = ObjectHasher::object_id(&self.predecessors, &self.content);
        if computed != self.id {
            return Err(StoreError::HashMismatch {
                id: self.id,
                computed,
            });
        }
        Ok(())
    }
}
