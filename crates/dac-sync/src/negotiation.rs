use std::collections::HashSet;

use tracing::debug;

use dac_graph::Graph;
use dac_refs::{Reference, ReferenceReader, ReferenceWriter};
use dac_store::{Object, ObjectReader, ObjectWriter};

use crate::error::SyncResult;
use crate::types::RefUpdate;

/// What a sender pushes: the update requests and the objects that back them.
#[derive(Debug, Default)]
pub struct PushPlan {
    pub updates: Vec<RefUpdate>,
    /// Deduplicated, ancestors before descendants.
    pub objects: Vec<Object>,
}

impl PushPlan {
    /// Plan pushing the local references `names` against a peer that
    /// advertised `remote`.
    ///
    /// References already at the advertised target are skipped. Objects
    /// reachable from any advertised target that is also stored locally are
    /// left out of the transfer.
    pub fn build<O, R>(graph: &Graph<O, R>, names: &[&str], remote: &[Reference]) -> SyncResult<Self>
    where
        O: ObjectReader + ObjectWriter,
        R: ReferenceReader + ReferenceWriter,
    {
        let known: Vec<_> = remote.iter().map(|r| r.target).collect();
        let mut plan = Self::default();
        let mut seen = HashSet::new();

        for &name in names {
            let tip = graph.resolve(name)?;
            let from = remote.iter().find(|r| r.name == name).map(|r| r.target);
            if from == Some(tip) {
                debug!(ref_name = %name, "remote already up to date");
                continue;
            }

            for object in graph.missing_objects(tip, &known)? {
                if seen.insert(object.id()) {
                    plan.objects.push(object);
                }
            }
            plan.updates.push(RefUpdate::new(name, from, tip));
        }

        debug!(
            updates = plan.updates.len(),
            objects = plan.objects.len(),
            "planned push"
        );
        Ok(plan)
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}
