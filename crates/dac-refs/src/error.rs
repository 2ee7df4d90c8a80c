//! Error types for reference operations.

use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The reference name is invalid.
    #[error("invalid reference name: {name}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A reference may not target the null object id.
    #[error("reference {name} cannot target the null object id")]
    NullTarget { name: String },

    /// A backend lock was poisoned by a panicking writer.
    #[error("ref store lock poisoned: {0}")]
    LockPoisoned(String),

    /// Backend-specific failure.
    #[error("ref backend error: {0}")]
    Backend(String),
}

/// Convenience type alias for ref operations.
pub type Result<T> = std::result::Result<T, RefError>;
