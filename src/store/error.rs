//! Store-specific error types.
//!
//! All store operations return [`StoreError`] on failure. Every variant
//! signals a mismatch between the caller's expectation and the shape of the
//! tree, so they are propagated rather than recovered.

use thiserror::Error;

/// Errors that can occur in the cluster store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No value exists at the requested path and no default was supplied.
    #[error("{0} not found")]
    NotFound(String),

    /// The path is empty or contains an empty segment.
    #[error("invalid path '{0}'")]
    InvalidPath(String),

    /// A segment along the path holds a value of the wrong shape.
    #[error("path conflict at '{path}': expected {expected}")]
    PathConflict {
        /// Dotted prefix where the conflict was found.
        path: String,
        /// Shape that was required at that prefix.
        expected: &'static str,
    },
}
