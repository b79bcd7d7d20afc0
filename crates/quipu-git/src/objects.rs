//! gix-backed object read/write.
//!
//! Converts between this crate's backend-agnostic types ([`Oid`],
//! [`TreeEntry`], [`EntryMode`]) and `gix`'s object model.

use crate::error::GitError;
use crate::types::{EntryMode, Oid, Signature, TreeEntry};

pub(crate) fn to_gix_oid(oid: Oid) -> gix::ObjectId {
    gix::ObjectId::from_bytes_or_panic(oid.as_bytes())
}

pub(crate) fn from_gix_oid(oid: gix::ObjectId) -> Oid {
    let bytes: [u8; 20] = oid.as_bytes().try_into().expect("SHA1 is 20 bytes");
    Oid::from_bytes(bytes)
}

fn from_gix_entry_mode(mode: gix::objs::tree::EntryMode) -> EntryMode {
    match mode.kind() {
        gix::objs::tree::EntryKind::Tree => EntryMode::Tree,
        gix::objs::tree::EntryKind::Blob => EntryMode::Blob,
        gix::objs::tree::EntryKind::BlobExecutable => EntryMode::BlobExecutable,
        gix::objs::tree::EntryKind::Link => EntryMode::Link,
        gix::objs::tree::EntryKind::Commit => EntryMode::Commit,
    }
}

fn to_gix_entry_kind(mode: EntryMode) -> gix::objs::tree::EntryKind {
    match mode {
        EntryMode::Blob => gix::objs::tree::EntryKind::Blob,
        EntryMode::BlobExecutable => gix::objs::tree::EntryKind::BlobExecutable,
        EntryMode::Tree => gix::objs::tree::EntryKind::Tree,
        EntryMode::Link => gix::objs::tree::EntryKind::Link,
        EntryMode::Commit => gix::objs::tree::EntryKind::Commit,
    }
}

/// Read a blob's raw content.
pub fn read_blob(repo: &gix::Repository, oid: Oid) -> Result<Vec<u8>, GitError> {
    let gix_oid = to_gix_oid(oid);
    let mut blob = repo.find_blob(gix_oid).map_err(|e| GitError::NotFound {
        message: format!("blob {oid}: {e}"),
    })?;
    Ok(blob.take_data())
}

/// Decode a tree object into its entries, in on-disk order.
pub fn read_tree(repo: &gix::Repository, oid: Oid) -> Result<Vec<TreeEntry>, GitError> {
    let gix_oid = to_gix_oid(oid);
    let tree = repo.find_tree(gix_oid).map_err(|e| GitError::NotFound {
        message: format!("tree {oid}: {e}"),
    })?;

    let mut entries = Vec::new();
    for result in tree.iter() {
        let entry = result.map_err(|e| GitError::Backend {
            message: format!("failed to decode tree entry: {e}"),
        })?;
        let oid_bytes: [u8; 20] = entry
            .inner
            .oid
            .as_bytes()
            .try_into()
            .expect("SHA1 is 20 bytes");
        entries.push(TreeEntry {
            name: entry.inner.filename.to_string(),
            mode: from_gix_entry_mode(entry.inner.mode),
            oid: Oid::from_bytes(oid_bytes),
        });
    }
    Ok(entries)
}

/// Find a named entry directly under a tree, without decoding the rest.
pub fn tree_entry(repo: &gix::Repository, tree: Oid, name: &str) -> Result<Option<Oid>, GitError> {
    Ok(read_tree(repo, tree)?
        .into_iter()
        .find(|e| e.name == name)
        .map(|e| e.oid))
}

/// Write a blob, returning its OID.
pub fn write_blob(repo: &gix::Repository, data: &[u8]) -> Result<Oid, GitError> {
    let id = repo.write_blob(data).map_err(|e| GitError::Backend {
        message: format!("failed to write blob: {e}"),
    })?;
    Ok(from_gix_oid(id.detach()))
}

/// Build a tree object from entries, canonicalized by name.
pub fn mktree(entries: &[TreeEntry]) -> Result<(), GitError> {
    // Canonicalization happens at the call site before invoking `write_tree`;
    // this free function exists to mirror the plumbing-level operation name
    // from the spec. Kept as a thin validating pass: reject duplicate names.
    let mut seen = std::collections::HashSet::with_capacity(entries.len());
    for e in entries {
        if !seen.insert(e.name.as_str()) {
            return Err(GitError::Backend {
                message: format!("duplicate tree entry name `{}`", e.name),
            });
        }
    }
    Ok(())
}

/// Build and write a tree object from `{name -> (mode, oid)}` entries.
///
/// Entries are sorted by name (git's canonical tree ordering) before writing.
pub fn write_tree(repo: &gix::Repository, entries: &[TreeEntry]) -> Result<Oid, GitError> {
    mktree(entries)?;
    let mut sorted: Vec<&TreeEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let tree = gix::objs::Tree {
        entries: sorted
            .into_iter()
            .map(|e| gix::objs::tree::Entry {
                mode: to_gix_entry_kind(e.mode).into(),
                filename: e.name.as_str().into(),
                oid: to_gix_oid(e.oid),
            })
            .collect(),
    };
    let id = repo.write_object(&tree).map_err(|e| GitError::Backend {
        message: format!("failed to write tree: {e}"),
    })?;
    Ok(from_gix_oid(id.detach()))
}

/// Create a commit object directly (no ref update).
///
/// `parents` is an ordered list; an empty list produces a root commit.
pub fn commit_tree(
    repo: &gix::Repository,
    tree: Oid,
    parents: &[Oid],
    message: &str,
    author: &Signature,
) -> Result<Oid, GitError> {
    let tree_oid = to_gix_oid(tree);
    let parent_oids: Vec<gix::ObjectId> = parents.iter().map(|p| to_gix_oid(*p)).collect();

    let sig = gix::actor::Signature {
        name: author.name.as_str().into(),
        email: author.email.as_str().into(),
        time: gix::date::Time::now_local_or_utc(),
    };

    let commit = gix::objs::Commit {
        message: message.into(),
        tree: tree_oid,
        author: sig.clone(),
        committer: sig,
        encoding: None,
        parents: parent_oids.into_iter().collect(),
        extra_headers: Vec::new(),
    };
    let id = repo.write_object(&commit).map_err(|e| GitError::Backend {
        message: format!("failed to write commit object: {e}"),
    })?;
    Ok(from_gix_oid(id.detach()))
}

/// Batch-read many objects in one pass. Missing objects are omitted.
pub fn batch_cat_file(
    repo: &gix::Repository,
    hashes: &[Oid],
) -> Result<std::collections::HashMap<Oid, Vec<u8>>, GitError> {
    let mut out = std::collections::HashMap::with_capacity(hashes.len());
    for &oid in hashes {
        let gix_oid = to_gix_oid(oid);
        if let Ok(mut obj) = repo.find_object(gix_oid) {
            out.insert(oid, obj.take_data());
        }
    }
    Ok(out)
}
