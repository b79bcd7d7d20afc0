//! Working-tree hashing: the equivalent of staging everything and running
//! `git write-tree`, without touching the git index.

use std::collections::BTreeMap;
use std::path::Path;

use ignore::WalkBuilder;

use crate::error::GitError;
use crate::objects::write_blob;
use crate::types::{EntryMode, Oid, TreeEntry};

/// An in-memory directory node, built from a working-tree walk before being
/// flushed into git tree objects bottom-up.
#[derive(Default)]
struct DirNode {
    files: BTreeMap<String, Oid>,
    dirs: BTreeMap<String, DirNode>,
}

/// Compute the tree hash of the current working tree, respecting
/// `.gitignore`/excludes the same way `git add -A && git write-tree` would.
pub fn get_tree_hash(repo: &gix::Repository, workdir: &Path) -> Result<Oid, GitError> {
    let walker = WalkBuilder::new(workdir)
        .hidden(false)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .filter_entry(|e| e.file_name() != ".git" && e.file_name() != ".quipu")
        .build();

    let mut root = DirNode::default();

    for entry in walker {
        let entry = entry.map_err(|e| GitError::Backend {
            message: format!("working-tree walk failed: {e}"),
        })?;
        let is_file = entry
            .file_type()
            .map(|t| t.is_file() || t.is_symlink())
            .unwrap_or(false);
        if !is_file {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(workdir)
            .unwrap_or(entry.path());
        let data = std::fs::read(entry.path())?;
        let oid = write_blob(repo, &data)?;
        insert_file(&mut root, rel, oid);
    }

    write_dir(repo, &root)
}

fn insert_file(node: &mut DirNode, rel_path: &Path, oid: Oid) {
    let mut components: Vec<String> = rel_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let Some(file_name) = components.pop() else {
        return;
    };
    let mut cursor = node;
    for dir in components {
        cursor = cursor.dirs.entry(dir).or_default();
    }
    cursor.files.insert(file_name, oid);
}

fn write_dir(repo: &gix::Repository, node: &DirNode) -> Result<Oid, GitError> {
    let mut entries = Vec::with_capacity(node.files.len() + node.dirs.len());
    for (name, oid) in &node.files {
        entries.push(TreeEntry {
            name: name.clone(),
            mode: EntryMode::Blob,
            oid: *oid,
        });
    }
    for (name, child) in &node.dirs {
        let child_oid = write_dir(repo, child)?;
        entries.push(TreeEntry {
            name: name.clone(),
            mode: EntryMode::Tree,
            oid: child_oid,
        });
    }
    crate::objects::write_tree(repo, &entries)
}
