//! Lowest-common-ancestor (merge-base) resolution.
//!
//! The pairwise step walks both histories breadth-first and picks the common
//! ancestor with the smallest combined depth. Equal-cost candidates, common
//! in diamond-shaped histories, are broken by the byte-wise smallest id so
//! the result is deterministic. N-way resolution is a left fold of the
//! pairwise step.

use tracing::debug;

use dac_store::ObjectReader;
use dac_types::ObjectId;

use crate::error::{GraphError, GraphResult};
use crate::walk::AncestryWalker;

/// Merge base of two objects.
///
/// Fails with [`GraphError::NoCommonAncestor`] if the histories are
/// disjoint.
pub fn pair_lca<R: ObjectReader + ?Sized>(
    reader: &R,
    left: ObjectId,
    right: ObjectId,
) -> GraphResult<ObjectId> {
    let walker = AncestryWalker::new(reader);
    let left_depths = walker.walk(&[left])?;

    let mut best: Option<(usize, ObjectId)> = None;
    walker.walk_with(
        &[right],
        |obj| left_depths.contains_key(&obj.id()),
        |obj, right_depth| {
            let Some(&left_depth) = left_depths.get(&obj.id()) else {
                return;
            };
            let candidate = (left_depth + right_depth, obj.id());
            if best.map_or(true, |current| candidate < current) {
                best = Some(candidate);
            }
        },
    )?;

    let (cost, winner) = best.ok_or(GraphError::NoCommonAncestor { left, right })?;
    debug!(
        left = %left.short_hex(),
        right = %right.short_hex(),
        base = %winner.short_hex(),
        cost,
        "resolved merge base"
    );
    Ok(winner)
}

/// Merge base of two or more objects, folded left to right:
/// `pair_lca(pair_lca(ids[0], ids[1]), ids[2])`, and so on.
pub fn merge_base<R: ObjectReader + ?Sized>(reader: &R, ids: &[ObjectId]) -> GraphResult<ObjectId> {
    let [first, rest @ ..] = ids else {
        return Err(GraphError::InsufficientReferences { given: 0 });
    };
    if rest.is_empty() {
        return Err(GraphError::InsufficientReferences { given: 1 });
    }

    rest.iter()
        .try_fold(*first, |acc, &next| pair_lca(reader, acc, next))
}
