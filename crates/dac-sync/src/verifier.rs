use dac_graph::{AncestryWalker, GraphError};
use dac_store::ObjectReader;

use crate::error::{SyncError, SyncResult};
use crate::types::RefUpdate;

/// Checks update requests against the objects a peer supplied.
pub struct FastForwardVerifier<'a, R: ?Sized> {
    objects: &'a R,
}

impl<'a, R: ObjectReader + ?Sized> FastForwardVerifier<'a, R> {
    pub fn new(objects: &'a R) -> Self {
        Self { objects }
    }

    /// Accept `update` only if it moves its reference forward.
    ///
    /// A move is forward when `from` is reached by walking back from `to`.
    /// Ids the transfer leaves out are dead ends; if `from` is never met and
    /// one was hit, the transfer is incomplete. A creation is accepted when
    /// the whole history of `to` is readable.
    pub fn verify(&self, update: &RefUpdate) -> SyncResult<()> {
        let walker = AncestryWalker::new(self.objects);
        let checked = match update.from {
            Some(from) => walker.find(update.to, from).map(|depth| match depth {
                Some(_) => Ok(()),
                None => Err(SyncError::NonFastForward {
                    name: update.name.clone(),
                    from,
                    to: update.to,
                }),
            }),
            None => walker.walk(&[update.to]).map(|_| Ok(())),
        };

        match checked {
            Ok(verdict) => verdict,
            Err(GraphError::OrphanedAncestor { id, .. }) => Err(SyncError::OrphanedAncestor {
                name: update.name.clone(),
                id,
            }),
            Err(e) => Err(e.into()),
        }
    }
}
