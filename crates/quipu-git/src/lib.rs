//! Git plumbing for quipu.
//!
//! [`GitDb`] is the single entry point: a thin, typed adapter over a local
//! `gix` repository exposing object reads/writes, ref CAS, and commit-log
//! walking. It knows nothing about history nodes, owners, or SQLite — that
//! domain logic lives in `quipu-core`, layered on top of this crate.

pub mod db;
pub mod error;
pub mod log;
mod objects;
pub mod refs;
pub mod tree_codec;
pub mod types;
mod worktree;

pub use db::GitDb;
pub use error::GitError;
pub use log::find_output_tree_trailer;
pub use objects::{read_blob, read_tree, write_blob, write_tree};
pub use types::{CommitRecord, EntryMode, Oid, OidParseError, RefName, RefNameError, Signature, TreeEntry};
