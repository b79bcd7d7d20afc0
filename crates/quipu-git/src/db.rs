//! [`GitDb`]: the thin command-level adapter over a local Git repository.

use std::path::{Path, PathBuf};

use crate::error::GitError;
use crate::types::{CommitRecord, Oid, Signature, TreeEntry};
use crate::{log, objects, refs, worktree};

/// A handle onto a single local git repository, exposing the plumbing
/// operations quipu's storage layer needs.
pub struct GitDb {
    repo: gix::Repository,
    workdir: PathBuf,
}

impl GitDb {
    /// Open the repository containing `path` (searching upward for `.git`,
    /// the same way `gix::discover` and ordinary `git` commands do).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GitError> {
        let path = path.as_ref();
        let repo = gix::discover(path).map_err(|e| GitError::Unavailable {
            message: format!("failed to open git repository at {}: {e}", path.display()),
        })?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| GitError::Unavailable {
                message: format!("{} has no working tree (bare repository)", path.display()),
            })?
            .to_path_buf();
        Ok(Self { repo, workdir })
    }

    /// Root of the working tree this `GitDb` operates on.
    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Path to `.git` (or the git-dir for a worktree/submodule).
    #[must_use]
    pub fn git_dir(&self) -> &Path {
        self.repo.git_dir()
    }

    /// Compute the SHA of the current working tree.
    pub fn get_tree_hash(&self) -> Result<Oid, GitError> {
        worktree::get_tree_hash(&self.repo, &self.workdir)
    }

    /// Write a blob's raw bytes and return its OID. Trees and commits are
    /// built from typed entries via [`GitDb::mktree`]/[`GitDb::commit_tree`]
    /// instead of raw bytes, since quipu never hand-assembles their binary
    /// encoding outside the codec.
    pub fn hash_object(&self, bytes: &[u8]) -> Result<Oid, GitError> {
        objects::write_blob(&self.repo, bytes)
    }

    /// Batch-read many objects in one pass. Missing objects are omitted.
    pub fn batch_cat_file(
        &self,
        hashes: &[Oid],
    ) -> Result<std::collections::HashMap<Oid, Vec<u8>>, GitError> {
        objects::batch_cat_file(&self.repo, hashes)
    }

    /// Read a single blob's bytes.
    pub fn read_blob(&self, oid: Oid) -> Result<Vec<u8>, GitError> {
        objects::read_blob(&self.repo, oid)
    }

    /// Build a tree object from entries, canonicalized by name.
    pub fn mktree(&self, entries: &[TreeEntry]) -> Result<Oid, GitError> {
        objects::write_tree(&self.repo, entries)
    }

    /// Find a single named entry directly under a tree.
    pub fn tree_entry(&self, tree: Oid, name: &str) -> Result<Option<Oid>, GitError> {
        objects::tree_entry(&self.repo, tree, name)
    }

    /// Create a commit object. `parents` empty means a root commit. Does not
    /// update any ref; call [`GitDb::update_ref`] afterward.
    pub fn commit_tree(
        &self,
        tree: Oid,
        parents: &[Oid],
        message: &str,
        author: &Signature,
    ) -> Result<Oid, GitError> {
        objects::commit_tree(&self.repo, tree, parents, message, author)
    }

    /// Compare-and-set ref update. Fails with [`GitError::RefConflict`] if
    /// the ref's current value doesn't match `expected`.
    pub fn update_ref(&self, name: &str, sha: Oid, expected: Oid) -> Result<(), GitError> {
        refs::update_ref(&self.repo, name, sha, expected)
    }

    /// Read the current OID a ref points to, if it exists.
    pub fn read_ref(&self, name: &str) -> Result<Option<Oid>, GitError> {
        refs::read_ref(&self.repo, name)
    }

    /// Delete a ref unconditionally.
    pub fn delete_ref(&self, name: &str) -> Result<(), GitError> {
        refs::delete_ref(&self.repo, name)
    }

    /// List all refs under `prefix` as `(oid, full_ref_name)` pairs.
    pub fn get_all_ref_heads(&self, prefix: &str) -> Result<Vec<(Oid, String)>, GitError> {
        refs::get_all_ref_heads(&self.repo, prefix)
    }

    /// Walk all commits reachable from `heads`, newest first.
    pub fn log_ref(&self, heads: &[Oid]) -> Result<Vec<CommitRecord>, GitError> {
        log::log_ref(&self.repo, heads)
    }

    /// Reverse lookup: find the commit reachable from `heads` whose
    /// Output-Tree trailer matches `tree_sha`.
    pub fn get_commit_by_output_tree(
        &self,
        heads: &[Oid],
        tree_sha: Oid,
    ) -> Result<Option<Oid>, GitError> {
        log::get_commit_by_output_tree(&self.repo, heads, tree_sha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo() -> (tempfile::TempDir, GitDb) {
        let dir = tempfile::tempdir().unwrap();
        gix::init(dir.path()).unwrap();
        let db = GitDb::open(dir.path()).unwrap();
        (dir, db)
    }

    #[test]
    fn open_finds_workdir() {
        let (dir, db) = init_repo();
        assert_eq!(db.workdir(), dir.path().canonicalize().unwrap().as_path());
    }

    #[test]
    fn empty_worktree_hashes_to_empty_tree() {
        let (_dir, db) = init_repo();
        let hash = db.get_tree_hash().unwrap();
        assert_eq!(hash, Oid::EMPTY_TREE);
    }

    #[test]
    fn mktree_and_read_blob_roundtrip() {
        let (_dir, db) = init_repo();
        let blob = objects::write_blob(&db.repo, b"hello").unwrap();
        assert_eq!(db.read_blob(blob).unwrap(), b"hello");
    }

    #[test]
    fn ref_cas_rejects_create_when_ref_already_exists() {
        let (_dir, db) = init_repo();
        let blob = objects::write_blob(&db.repo, b"x").unwrap();
        let tree = db
            .mktree(&[TreeEntry {
                name: "a.txt".into(),
                mode: crate::types::EntryMode::Blob,
                oid: blob,
            }])
            .unwrap();
        let author = Signature {
            name: "Test".into(),
            email: "test@example.com".into(),
        };
        let c1 = db.commit_tree(tree, &[], "first\n", &author).unwrap();
        db.update_ref("refs/quipu/local/heads/main", c1, Oid::ZERO)
            .unwrap();

        let c2 = db.commit_tree(tree, &[c1], "second\n", &author).unwrap();
        let result = db.update_ref("refs/quipu/local/heads/main", c2, Oid::ZERO);
        assert!(result.is_err());
    }

    #[test]
    fn ref_cas_advances_with_correct_expected() {
        let (_dir, db) = init_repo();
        let blob = objects::write_blob(&db.repo, b"x").unwrap();
        let tree = db
            .mktree(&[TreeEntry {
                name: "a.txt".into(),
                mode: crate::types::EntryMode::Blob,
                oid: blob,
            }])
            .unwrap();
        let author = Signature {
            name: "Test".into(),
            email: "test@example.com".into(),
        };
        let c1 = db.commit_tree(tree, &[], "first\n", &author).unwrap();
        db.update_ref("refs/quipu/local/heads/main", c1, Oid::ZERO)
            .unwrap();

        let c2 = db.commit_tree(tree, &[c1], "second\n", &author).unwrap();
        db.update_ref("refs/quipu/local/heads/main", c2, c1)
            .unwrap();
        assert_eq!(
            db.read_ref("refs/quipu/local/heads/main").unwrap(),
            Some(c2)
        );
    }
}
