//! [`Hydrator`]: the incremental, one-way Git→SQLite projection (§4.4).

use std::collections::HashMap;
use std::sync::Arc;

use quipu_git::{GitDb, Oid};

use crate::error::Result;
use crate::refs_layout::{self, QUIPU_PREFIX};
use crate::sqlite::{DatabaseManager, NodeRow};

/// Projects quipu commits missing from SQLite into the `nodes`/`edges`
/// tables. Never deletes or mutates existing rows other than `INSERT OR
/// REPLACE`; always safe to call repeatedly ("cache sync" in the CLI).
pub struct Hydrator {
    git: Arc<GitDb>,
    db: Arc<DatabaseManager>,
}

impl Hydrator {
    /// Construct a hydrator over `git`'s quipu refs and `db`.
    #[must_use]
    pub fn new(git: Arc<GitDb>, db: Arc<DatabaseManager>) -> Self {
        Self { git, db }
    }

    /// Attribute every commit reachable from a quipu ref head to that head's
    /// owner, first-ref-wins (§4.3) when two heads share history, and return
    /// the full reachable commit log alongside the attribution. A single
    /// combined rev-walk plus an in-memory reachability pass per head: O(V+E)
    /// in the size of the quipu history, not the ref count.
    fn commits_with_owner(&self, local_user_id: &str) -> Result<(Vec<quipu_git::CommitRecord>, HashMap<Oid, String>)> {
        let ref_heads = self.git.get_all_ref_heads(QUIPU_PREFIX)?;

        let mut owned_heads = Vec::new();
        for (sha, ref_name) in &ref_heads {
            if let Some(owner_id) = refs_layout::resolve_owner(ref_name, local_user_id) {
                owned_heads.push((*sha, owner_id));
            }
        }
        if owned_heads.is_empty() {
            return Ok((Vec::new(), HashMap::new()));
        }

        let heads: Vec<Oid> = owned_heads.iter().map(|(h, _)| *h).collect();
        let records = self.git.log_ref(&heads)?;
        let record_by_hash: HashMap<Oid, &quipu_git::CommitRecord> =
            records.iter().map(|r| (r.hash, r)).collect();

        let mut commit_to_owner: HashMap<Oid, String> = HashMap::new();
        for (head, owner_id) in &owned_heads {
            let mut stack = vec![*head];
            while let Some(hash) = stack.pop() {
                if commit_to_owner.contains_key(&hash) {
                    continue;
                }
                let Some(record) = record_by_hash.get(&hash) else {
                    continue;
                };
                commit_to_owner.insert(hash, owner_id.clone());
                stack.extend(record.parents.iter().copied());
            }
        }

        Ok((records, commit_to_owner))
    }

    /// Run one incremental sync pass. Safe to call with no missing commits
    /// (returns immediately).
    pub fn sync(&self, local_user_id: &str) -> Result<()> {
        let (records, commit_to_owner) = self.commits_with_owner(local_user_id)?;
        if commit_to_owner.is_empty() {
            tracing::debug!("no quipu refs to hydrate");
            return Ok(());
        }

        let known = self.db.get_all_node_hashes()?;
        let log_by_hash: HashMap<Oid, &quipu_git::CommitRecord> = records
            .iter()
            .filter(|r| commit_to_owner.contains_key(&r.hash) && !known.contains(&r.hash.to_string()))
            .map(|r| (r.hash, r))
            .collect();
        if log_by_hash.is_empty() {
            tracing::debug!("sqlite mirror already matches git history");
            return Ok(());
        }
        tracing::info!(count = log_by_hash.len(), "commits pending hydration");

        let missing_hashes: Vec<Oid> = log_by_hash.keys().copied().collect();
        let tree_hashes: Vec<Oid> = missing_hashes
            .iter()
            .filter_map(|h| log_by_hash.get(h).map(|r| r.tree))
            .collect();
        let trees_content = self.git.batch_cat_file(&tree_hashes)?;

        let mut tree_to_meta_blob: HashMap<Oid, Oid> = HashMap::new();
        let mut meta_blob_hashes = Vec::new();
        for (tree_hash, bytes) in &trees_content {
            if let Some(meta_oid) = quipu_git::tree_codec::find_entry(bytes, "metadata.json") {
                tree_to_meta_blob.insert(*tree_hash, meta_oid);
                meta_blob_hashes.push(meta_oid);
            }
        }
        let metas_content = self.git.batch_cat_file(&meta_blob_hashes)?;

        let mut nodes_to_insert = Vec::new();
        let mut edges_to_insert = Vec::new();

        for commit_hash in &missing_hashes {
            let Some(log_entry) = log_by_hash.get(commit_hash) else {
                continue;
            };
            let owner_id = &commit_to_owner[commit_hash];

            let Some(meta_blob_hash) = tree_to_meta_blob.get(&log_entry.tree) else {
                tracing::warn!(%commit_hash, "skipping: no metadata.json in tree");
                continue;
            };
            let Some(meta_bytes) = metas_content.get(meta_blob_hash) else {
                tracing::warn!(%commit_hash, "skipping: metadata blob unreadable");
                continue;
            };
            let Some(output_tree) = quipu_git::find_output_tree_trailer(&log_entry.body) else {
                tracing::warn!(%commit_hash, "skipping: missing Output-Tree trailer");
                continue;
            };

            let meta: crate::model::MetaJson = match serde_json::from_slice(meta_bytes) {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(%commit_hash, error = %e, "skipping: malformed metadata.json");
                    continue;
                }
            };

            let commit_hash_str = commit_hash.to_string();
            nodes_to_insert.push(NodeRow {
                commit_hash: commit_hash_str.clone(),
                owner_id: owner_id.clone(),
                output_tree: output_tree.to_string(),
                node_type: meta.node_type.clone(),
                timestamp: if meta.exec.start > 0.0 {
                    meta.exec.start
                } else {
                    log_entry.timestamp
                },
                summary: meta.summary.clone(),
                generator_id: Some(meta.generator.id.clone()),
                meta_json: String::from_utf8_lossy(meta_bytes).into_owned(),
                plan_md_cache: None,
            });

            for parent in &log_entry.parents {
                edges_to_insert.push((commit_hash_str.clone(), parent.to_string()));
            }
        }

        if !nodes_to_insert.is_empty() {
            self.db.batch_insert_nodes(&nodes_to_insert)?;
            tracing::info!(count = nodes_to_insert.len(), "hydrated node rows");
        }
        if !edges_to_insert.is_empty() {
            self.db.batch_insert_edges(&edges_to_insert)?;
            tracing::info!(count = edges_to_insert.len(), "hydrated edge rows");
        }
        Ok(())
    }
}
