//! Reference management for the DAC object graph.
//!
//! A [`Reference`] is a mutable, named pointer at an object, analogous to a
//! git branch. References are the human-readable entry points into the
//! graph; the objects they name are immutable.
//!
//! # Modules
//!
//! - [`error`]: Error types for ref operations
//! - [`types`]: The [`Reference`] record
//! - [`traits`]: [`ReferenceReader`] and [`ReferenceWriter`] storage contracts
//! - [`names`]: Reference name validation
//! - [`memory`]: In-memory [`InMemoryRefStore`] for tests

pub mod error;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use error::{RefError, Result};
pub use memory::InMemoryRefStore;
pub use names::validate_reference_name;
pub use traits::{ReferenceReader, ReferenceWriter};
pub use types::Reference;
