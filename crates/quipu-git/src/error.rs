//! Error types for git plumbing operations.
//!
//! [`GitError`] is the single error type returned by [`crate::GitDb`] methods.
//! It uses rich enum variants so callers (`quipu-core`) can match on specific
//! failure modes (missing object, CAS mismatch, unavailable repo) without
//! parsing error messages.

use thiserror::Error;

/// Errors returned by [`crate::GitDb`] operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The repository could not be opened, or a git subprocess/backend call
    /// could not complete at all.
    #[error("git repository unavailable: {message}")]
    Unavailable {
        /// Human-readable description of what failed.
        message: String,
    },

    /// A requested object or ref was not found.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable description of what was missing.
        message: String,
    },

    /// A ref update failed because the ref's current value did not match the
    /// expected old value (compare-and-swap / optimistic concurrency failure).
    #[error("ref conflict on `{ref_name}`: {message}")]
    RefConflict {
        /// The ref that could not be updated.
        ref_name: String,
        /// Details about the mismatch.
        message: String,
    },

    /// An OID string could not be parsed or was otherwise invalid.
    #[error("invalid OID `{value}`: {reason}")]
    InvalidOid {
        /// The raw value that failed validation.
        value: String,
        /// Why validation failed.
        reason: String,
    },

    /// An I/O error occurred (file system, process spawn, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying git backend (gix) returned an unclassified error.
    ///
    /// This is the catch-all for errors that don't fit other variants. The
    /// `message` should include enough context to diagnose the failure.
    #[error("git backend error: {message}")]
    Backend {
        /// Freeform error description from the backend.
        message: String,
    },
}

impl From<crate::types::OidParseError> for GitError {
    fn from(e: crate::types::OidParseError) -> Self {
        Self::InvalidOid {
            value: e.value,
            reason: e.reason,
        }
    }
}
