//! Graph engine for the DAC object graph.
//!
//! Immutable, hash-identified [`Object`]s are linked by predecessor edges;
//! mutable [`Reference`]s point into the graph. [`Graph`] composes an object
//! store and a reference store and provides:
//!
//! - object creation ([`Graph::append_node`], [`Graph::append_to_reference`])
//! - reference binding and compare-and-swap moves
//! - breadth-first ancestry walks with minimal depths ([`AncestryWalker`])
//! - N-way merge-base resolution ([`Graph::lowest_common_ancestor`])
//!
//! [`Object`]: dac_store::Object
//! [`Reference`]: dac_refs::Reference

pub mod error;
pub mod graph;
pub mod locks;
pub mod merge_base;
pub mod walk;

pub use error::{GraphError, GraphResult};
pub use graph::Graph;
pub use locks::RefLocks;
pub use merge_base::{merge_base, pair_lca};
pub use walk::{AncestryMap, AncestryNode, AncestryWalker};
