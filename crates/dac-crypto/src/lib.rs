//! Cryptographic primitives for the DAC object graph.
//!
//! Object identity is a 64-byte BLAKE3 extendable-output digest over the
//! concatenation of an object's predecessor ids (in order) and its raw
//! content. All crypto operations wrap established libraries.

pub mod hasher;

pub use hasher::ObjectHasher;
