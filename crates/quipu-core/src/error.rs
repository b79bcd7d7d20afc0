//! Error types for the quipu storage/indexing core.
//!
//! [`QuipuError`] mirrors the language-neutral taxonomy: `GitUnavailable`,
//! `RefRaceLost`, `DecodeError`, `MirrorInconsistent`, `ConfigError`,
//! `IoError`. Propagation policy lives with each caller, not here: the
//! Writer never surfaces `MirrorInconsistent`, the Reader never surfaces
//! `DecodeError` (both log and continue instead).

use thiserror::Error;

/// Errors returned by `quipu-core` operations.
#[derive(Debug, Error)]
pub enum QuipuError {
    /// The underlying git repository is invalid or a git operation failed
    /// outright. Fatal at `Engine` construction; recoverable mid-session
    /// only by retrying once.
    #[error("git unavailable: {0}")]
    GitUnavailable(#[from] quipu_git::GitError),

    /// A compare-and-swap ref update lost the race. Callers reload the head
    /// and retry once before escalating.
    #[error("ref update lost the race on `{ref_name}`")]
    RefRaceLost {
        /// The ref that could not be advanced.
        ref_name: String,
    },

    /// A quipu commit exists but its metadata is malformed or its
    /// Output-Tree trailer is missing. Always skip-with-warning, never
    /// fatal; carried as a typed error so callers that want to know *why*
    /// a commit was skipped can inspect it before discarding it.
    #[error("failed to decode history node {commit_hash}: {reason}")]
    DecodeError {
        /// The commit that failed to decode.
        commit_hash: String,
        /// Why decoding failed.
        reason: String,
    },

    /// The SQLite double-write failed after the Git commit succeeded. A
    /// warning, never surfaced past the Writer: the next Hydrator run
    /// repairs it.
    #[error("mirror out of sync for {commit_hash}: {reason}")]
    MirrorInconsistent {
        /// The commit whose SQLite row failed to write.
        commit_hash: String,
        /// The underlying failure.
        reason: String,
    },

    /// `.quipu/config.yml` is malformed.
    #[error("invalid config: {0}")]
    ConfigError(String),

    /// A filesystem error on payload read/write.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The SQLite connection returned an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, QuipuError>;
