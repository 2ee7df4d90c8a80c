//! The graph engine: object creation, reference binding, and the query
//! surface the sync protocol builds on.
//!
//! [`Graph`] composes an object store and a reference store. It keeps no
//! cached copies of objects between calls; every read goes to the store.
//!
//! # Concurrency
//!
//! Reads and walks are safe to run concurrently but see no snapshot: a
//! reference may move mid-walk. `append_to_reference`, `bind_reference`,
//! and `move_reference` hold a per-name lock across their read-then-write,
//! so concurrent appends to one name in this process never lose an update.
//! Writers in other processes are only caught by the compare-and-swap form,
//! [`Graph::move_reference`].

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use dac_refs::{validate_reference_name, Reference, ReferenceReader, ReferenceWriter};
use dac_store::{Object, ObjectReader, ObjectWriter, StoreError};
use dac_types::ObjectId;

use crate::error::{GraphError, GraphResult};
use crate::locks::RefLocks;
use crate::merge_base::merge_base;
use crate::walk::{AncestryMap, AncestryWalker};

/// Object graph over pluggable object and reference stores.
#[derive(Debug)]
pub struct Graph<O, R> {
    objects: O,
    refs: R,
    locks: RefLocks,
}

impl<O, R> Graph<O, R>
where
    O: ObjectReader + ObjectWriter,
    R: ReferenceReader + ReferenceWriter,
{
    /// Bootstrap a graph over the given stores.
    pub fn new(objects: O, refs: R) -> Self {
        Self {
            objects,
            refs,
            locks: RefLocks::new(),
        }
    }

    /// The underlying object store.
    pub fn objects(&self) -> &O {
        &self.objects
    }

    /// The underlying reference store.
    pub fn refs(&self) -> &R {
        &self.refs
    }

    // ---------------------------------------------------------------
    // Objects
    // ---------------------------------------------------------------

    /// Create an object from content and an ordered predecessor list and
    /// write it to the store.
    ///
    /// Deterministic: identical arguments always produce the identical
    /// object. Null ids in `predecessors` encode "no predecessor" and are
    /// dropped before hashing.
    pub fn append_node(
        &self,
        content: impl Into<Vec<u8>>,
        predecessors: Vec<ObjectId>,
    ) -> GraphResult<Object> {
        let predecessors = predecessors.into_iter().filter(|id| !id.is_null()).collect();
        let object = Object::new(content, predecessors);
        self.objects.write_object(&object)?;
        debug!(
            id = %object.id().short_hex(),
            preds = object.predecessors().len(),
            "appended node"
        );
        Ok(object)
    }

    /// Read an object, mapping absence to [`GraphError::ObjectNotFound`].
    pub fn read_object(&self, id: &ObjectId) -> GraphResult<Object> {
        self.objects.read_object(id).map_err(|e| match e {
            StoreError::NotFound(id) => GraphError::ObjectNotFound(id),
            other => GraphError::Store(other),
        })
    }

    // ---------------------------------------------------------------
    // References
    // ---------------------------------------------------------------

    /// Read a reference; an unbound name is `Ok(None)`.
    pub fn read_reference(&self, name: &str) -> GraphResult<Option<Reference>> {
        Ok(self.refs.read_reference(name)?)
    }

    /// All local references, sorted by name.
    pub fn references(&self) -> GraphResult<Vec<Reference>> {
        Ok(self.refs.list_references()?)
    }

    /// The target of a bound reference.
    pub fn resolve(&self, name: &str) -> GraphResult<ObjectId> {
        self.read_reference(name)?
            .map(|r| r.target)
            .ok_or_else(|| GraphError::ReferenceNotFound(name.to_string()))
    }

    /// Append `content` on top of the reference's current target and move
    /// the reference to the new object.
    ///
    /// An unbound reference starts a new root object. The object is written
    /// before the reference, so the reference never names a missing object.
    pub fn append_to_reference(
        &self,
        content: impl Into<Vec<u8>>,
        name: &str,
    ) -> GraphResult<Object> {
        validate_reference_name(name)?;
        let handle = self.locks.handle(name)?;
        let _guard = handle
            .lock()
            .map_err(|e| GraphError::LockPoisoned(e.to_string()))?;

        let current = self.refs.read_reference(name)?;
        let predecessors = current.iter().map(|r| r.target).collect();
        let object = self.append_node(content, predecessors)?;
        self.refs
            .write_reference(&Reference::new(name, object.id()))?;

        info!(
            ref_name = %name,
            from = ?current.map(|r| r.target.short_hex()),
            to = %object.id().short_hex(),
            "advanced reference"
        );
        Ok(object)
    }

    /// Point `name` at an existing object.
    ///
    /// Fails with [`GraphError::ObjectNotFound`] if the object is not in the
    /// store, so no reference is ever created dangling.
    pub fn bind_reference(&self, id: ObjectId, name: &str) -> GraphResult<Reference> {
        validate_reference_name(name)?;
        let handle = self.locks.handle(name)?;
        let _guard = handle
            .lock()
            .map_err(|e| GraphError::LockPoisoned(e.to_string()))?;

        self.require_object(&id)?;
        let reference = Reference::new(name, id);
        self.refs.write_reference(&reference)?;
        info!(ref_name = %name, to = %id.short_hex(), "bound reference");
        Ok(reference)
    }

    /// Compare-and-swap move: point `name` at `new` only if its current
    /// target is `expected` (`None` meaning unbound).
    ///
    /// Fails with [`GraphError::StaleReference`] when another writer moved
    /// the reference first.
    pub fn move_reference(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        new: ObjectId,
    ) -> GraphResult<Reference> {
        validate_reference_name(name)?;
        let handle = self.locks.handle(name)?;
        let _guard = handle
            .lock()
            .map_err(|e| GraphError::LockPoisoned(e.to_string()))?;

        let actual = self.refs.read_reference(name)?.map(|r| r.target);
        if actual != expected {
            return Err(GraphError::StaleReference {
                name: name.to_string(),
                expected,
                actual,
            });
        }
        self.require_object(&new)?;

        let reference = Reference::new(name, new);
        self.refs.write_reference(&reference)?;
        info!(
            ref_name = %name,
            from = ?expected.map(|id| id.short_hex()),
            to = %new.short_hex(),
            "moved reference"
        );
        Ok(reference)
    }

    fn require_object(&self, id: &ObjectId) -> GraphResult<()> {
        if id.is_null() || !self.objects.contains_object(id)? {
            return Err(GraphError::ObjectNotFound(*id));
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Ancestry
    // ---------------------------------------------------------------

    /// Minimal depth of every object reachable from `starts`.
    pub fn ancestry(&self, starts: &[ObjectId]) -> GraphResult<AncestryMap> {
        AncestryWalker::new(&self.objects).walk(starts)
    }

    /// Whether `ancestor` is reachable from `descendant` (an object counts
    /// as its own ancestor).
    pub fn is_ancestor(&self, ancestor: ObjectId, descendant: ObjectId) -> GraphResult<bool> {
        Ok(AncestryWalker::new(&self.objects)
            .find(descendant, ancestor)?
            .is_some())
    }

    /// Objects reachable from `tip` but not from any of `known`, in
    /// topological order: every object comes after all of its predecessors
    /// that are in the result.
    ///
    /// Ids in `known` that are not stored locally are ignored: the objects
    /// behind them cannot be excluded without reading them.
    pub fn missing_objects(&self, tip: ObjectId, known: &[ObjectId]) -> GraphResult<Vec<Object>> {
        let mut present = Vec::with_capacity(known.len());
        for id in known {
            if !id.is_null() && self.objects.contains_object(id)? {
                present.push(*id);
            }
        }
        let walker = AncestryWalker::new(&self.objects);
        let excluded: HashSet<ObjectId> = walker.walk(&present)?.into_keys().collect();

        let mut pending: HashMap<ObjectId, Object> = HashMap::new();
        walker.walk_with(
            &[tip],
            |obj| !excluded.contains(&obj.id()),
            |obj, _| {
                pending.insert(obj.id(), obj.clone());
            },
        )?;

        // Depth-first post-order: an object is emitted once all of its
        // pending predecessors have been.
        let mut ordered = Vec::with_capacity(pending.len());
        let mut expanded = HashSet::new();
        let mut stack = vec![(tip, false)];
        while let Some((id, children_done)) = stack.pop() {
            if children_done {
                if let Some(object) = pending.remove(&id) {
                    ordered.push(object);
                }
                continue;
            }
            let Some(object) = pending.get(&id) else {
                continue;
            };
            if !expanded.insert(id) {
                continue;
            }
            stack.push((id, true));
            for &pred in object.predecessors().iter().rev() {
                if pending.contains_key(&pred) && !expanded.contains(&pred) {
                    stack.push((pred, false));
                }
            }
        }
        Ok(ordered)
    }

    // ---------------------------------------------------------------
    // Merge base
    // ---------------------------------------------------------------

    /// Deepest common ancestor of the objects named by two or more
    /// references.
    ///
    /// Every name must be bound ([`GraphError::ReferenceNotFound`]); fewer
    /// than two names fail with [`GraphError::InsufficientReferences`].
    pub fn lowest_common_ancestor(&self, names: &[&str]) -> GraphResult<Object> {
        if names.len() < 2 {
            return Err(GraphError::InsufficientReferences { given: names.len() });
        }
        let ids = names
            .iter()
            .map(|name| self.resolve(name))
            .collect::<GraphResult<Vec<_>>>()?;
        self.merge_base(&ids)
    }

    /// Deepest common ancestor of two or more object ids.
    pub fn merge_base(&self, ids: &[ObjectId]) -> GraphResult<Object> {
        let winner = merge_base(&self.objects, ids)?;
        self.read_object(&winner)
    }
}
