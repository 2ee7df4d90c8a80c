//! Foundation types for the DAC object graph.
//!
//! Every object in the graph is identified by an [`ObjectId`]: a fixed
//! 64-byte digest over the object's predecessor links and content. All other
//! DAC crates depend on `dac-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`]: Content-addressed identifier (64-byte digest)
//! - [`TypeError`]: Parse failures for hex-encoded identifiers

pub mod error;
pub mod object;

pub use error::TypeError;
pub use object::{ObjectId, OBJECT_ID_LEN};
