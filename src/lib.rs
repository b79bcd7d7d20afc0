//! quipu library crate — re-exports the git and core domain crates.
//!
//! The storage/indexing engine lives in `quipu-core` (backed by `quipu-git`
//! for Git plumbing). This crate is a thin facade so downstream binaries
//! (a CLI, a TUI, a plan executor) depend on a single package.

pub use quipu_core as core;
pub use quipu_git as git;
