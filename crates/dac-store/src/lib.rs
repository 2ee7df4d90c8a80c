//! Content-addressed object storage for the DAC object graph.
//!
//! Every node in the graph is an immutable [`Object`] identified by the
//! 64-byte digest of its predecessor links and content. This crate defines
//! the storage contracts the graph engine consumes and an in-memory backend.
//!
//! # Contracts
//!
//! Reading and writing are separate capabilities so a backend only
//! implements what its role needs:
//!
//! - [`ObjectReader`]: `read_object` fails with [`StoreError::NotFound`]
//! - [`ObjectWriter`]: `write_object` is idempotent per id
//!
//! # Storage Backends
//!
//! - [`InMemoryObjectStore`]: `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. Writing the same object twice is a no-op; writing different content
//!    under an existing id is rejected.
//! 3. Concurrent reads are always safe (objects are immutable).
//! 4. The store never interprets object contents.

pub mod error;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use object::Object;
pub use traits::{ObjectReader, ObjectWriter};
