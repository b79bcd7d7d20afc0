//! [`GitObjectReader`]: loads the history graph directly from Git (§4.6).

use std::sync::Arc;

use quipu_git::GitDb;

use crate::codec::GitObjectCodec;
use crate::error::Result;
use crate::model::{HistoryGraph, HistoryNode, NodeType};
use crate::refs_layout::{self, QUIPU_PREFIX};
use crate::storage::HistoryReader;

/// Reads history nodes straight from Git commits under `refs/quipu/`,
/// without any SQLite involvement.
pub struct GitObjectReader {
    git: Arc<GitDb>,
    local_user_id: String,
}

impl GitObjectReader {
    /// Construct a reader over `git`, attributing refs under
    /// `refs/quipu/local/heads/*` to `local_user_id`.
    #[must_use]
    pub fn new(git: Arc<GitDb>, local_user_id: impl Into<String>) -> Self {
        Self {
            git,
            local_user_id: local_user_id.into(),
        }
    }
}

impl HistoryReader for GitObjectReader {
    fn load_all_nodes(&self) -> Result<HistoryGraph> {
        let ref_heads = self.git.get_all_ref_heads(QUIPU_PREFIX)?;

        let mut owned_heads = Vec::new();
        for (sha, ref_name) in &ref_heads {
            if let Some(owner) = refs_layout::resolve_owner(ref_name, &self.local_user_id) {
                owned_heads.push((*sha, owner));
            }
        }
        if owned_heads.is_empty() {
            return Ok(HistoryGraph::default());
        }

        let heads: Vec<_> = owned_heads.iter().map(|(h, _)| *h).collect();
        let records = self.git.log_ref(&heads)?;
        let record_by_hash: std::collections::HashMap<_, _> =
            records.iter().map(|r| (r.hash, r)).collect();

        // Attribute every commit reachable from a head to that head's owner,
        // first-ref-wins (§4.3) when two heads share history. A single pass
        // over already-fetched records, no extra git calls: O(V+E).
        let mut commit_to_owner = std::collections::HashMap::new();
        for (head, owner) in &owned_heads {
            let mut stack = vec![*head];
            while let Some(hash) = stack.pop() {
                if commit_to_owner.contains_key(&hash) {
                    continue;
                }
                let Some(record) = record_by_hash.get(&hash) else {
                    continue;
                };
                commit_to_owner.insert(hash, owner.clone());
                stack.extend(record.parents.iter().copied());
            }
        }

        let mut nodes = Vec::with_capacity(records.len());
        let mut edges = Vec::new();
        for record in &records {
            let Some(owner_id) = commit_to_owner.get(&record.hash) else {
                continue;
            };
            let decoded = match GitObjectCodec::decode(&self.git, record) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(commit = %record.hash, error = %e, "skipping undecodable history node");
                    continue;
                }
            };

            for parent in &decoded.parents {
                edges.push((decoded.commit_hash.clone(), parent.clone()));
            }

            nodes.push(HistoryNode {
                commit_hash: decoded.commit_hash,
                owner_id: owner_id.clone(),
                input_tree: String::new(),
                output_tree: decoded.output_tree,
                node_type: NodeType::from(decoded.meta.node_type.as_str()),
                timestamp: decoded.timestamp,
                summary: decoded.summary,
                generator_id: decoded.meta.generator.id.clone(),
                content: String::new(),
                meta_json: decoded.meta,
                filename: None,
                parent: None,
                children: Vec::new(),
            });
        }

        Ok(HistoryGraph::build(nodes, &edges)?)
    }

    fn get_node_content(&self, node: &HistoryNode) -> Result<String> {
        GitObjectCodec::get_content(&self.git, node)
    }
}
