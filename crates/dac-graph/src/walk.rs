//! Breadth-first ancestry traversal.
//!
//! [`AncestryWalker`] follows predecessor edges from one or more start ids
//! and records, for every reachable object, its minimal edge distance from
//! the nearest start. The frontier is a FIFO queue: depths are dequeued in
//! non-decreasing order, so the first depth recorded for an id is its true
//! shortest distance. A LIFO frontier would record first-discovered depths
//! and overstate them on graphs with paths of different lengths.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

use tracing::trace;

use dac_store::{Object, ObjectReader, StoreError};
use dac_types::ObjectId;

use crate::error::{GraphError, GraphResult};

/// Minimal depth of every object reached by a walk.
pub type AncestryMap = HashMap<ObjectId, usize>;

/// A frontier entry: an object id and its distance from the nearest start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AncestryNode {
    pub id: ObjectId,
    pub depth: usize,
}

/// Breadth-first walker over any [`ObjectReader`].
///
/// The walker is read-only and holds no state between calls; several walks
/// may run concurrently against the same reader.
pub struct AncestryWalker<'r, R: ?Sized> {
    reader: &'r R,
}

impl<'r, R: ObjectReader + ?Sized> AncestryWalker<'r, R> {
    /// Walk objects served by `reader`.
    pub fn new(reader: &'r R) -> Self {
        Self { reader }
    }

    /// Depth of every object reachable from `starts` (the starts included, at
    /// depth 0).
    pub fn walk(&self, starts: &[ObjectId]) -> GraphResult<AncestryMap> {
        self.walk_with(starts, |_| false, |_, _| {})
    }

    /// Walk from `starts`, calling `on_collision` with the object and its
    /// depth once for every object for which `visit` returns `true`.
    ///
    /// Null ids are dropped without being recorded or expanded. Any read
    /// failure surfaces as [`GraphError::OrphanedAncestor`].
    pub fn walk_with<V, C>(
        &self,
        starts: &[ObjectId],
        mut visit: V,
        mut on_collision: C,
    ) -> GraphResult<AncestryMap>
    where
        V: FnMut(&Object) -> bool,
        C: FnMut(&Object, usize),
    {
        let mut depths = AncestryMap::new();
        let mut frontier = VecDeque::new();
        for &id in starts {
            enqueue(&mut depths, &mut frontier, id, 0);
        }

        while let Some(node) = frontier.pop_front() {
            let object = self.read(node.id)?;
            if visit(&object) {
                on_collision(&object, node.depth);
            }
            for &pred in object.predecessors() {
                enqueue(&mut depths, &mut frontier, pred, node.depth + 1);
            }
        }

        trace!(starts = starts.len(), reached = depths.len(), "ancestry walk done");
        Ok(depths)
    }

    /// Search backward from `start` for `target`, stopping as soon as it is
    /// dequeued.
    ///
    /// Returns the depth of `target` below `start`, or `None` once every
    /// ancestor has been read without meeting it. `target` itself is never
    /// read, so a source holding only the objects between the two ids is
    /// enough to prove ancestry.
    ///
    /// An id the reader does not hold is a dead end rather than a failure:
    /// `target` may still be reached along another path. Only when the
    /// search exhausts without meeting `target` does the first such id
    /// surface as [`GraphError::OrphanedAncestor`]. Other read errors abort
    /// immediately.
    pub fn find(&self, start: ObjectId, target: ObjectId) -> GraphResult<Option<usize>> {
        let mut depths = AncestryMap::new();
        let mut frontier = VecDeque::new();
        let mut unreadable: Option<(ObjectId, StoreError)> = None;
        enqueue(&mut depths, &mut frontier, start, 0);

        while let Some(node) = frontier.pop_front() {
            if node.id == target {
                return Ok(Some(node.depth));
            }
            let object = match self.reader.read_object(&node.id) {
                Ok(object) => object,
                Err(source @ StoreError::NotFound(_)) => {
                    trace!(id = %node.id.short_hex(), depth = node.depth, "dead end in search");
                    unreadable.get_or_insert((node.id, source));
                    continue;
                }
                Err(source) => return Err(GraphError::OrphanedAncestor { id: node.id, source }),
            };
            for &pred in object.predecessors() {
                enqueue(&mut depths, &mut frontier, pred, node.depth + 1);
            }
        }

        match unreadable {
            Some((id, source)) => Err(GraphError::OrphanedAncestor { id, source }),
            None => Ok(None),
        }
    }

    fn read(&self, id: ObjectId) -> GraphResult<Object> {
        self.reader
            .read_object(&id)
            .map_err(|source| GraphError::OrphanedAncestor { id, source })
    }
}

fn enqueue(
    depths: &mut AncestryMap,
    frontier: &mut VecDeque<AncestryNode>,
    id: ObjectId,
    depth: usize,
) {
    if id.is_null() {
        return;
    }
    if let Entry::Vacant(slot) = depths.entry(id) {
        slot.insert(depth);
        frontier.push_back(AncestryNode { id, depth });
    }
}
