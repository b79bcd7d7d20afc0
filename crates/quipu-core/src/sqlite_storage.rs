//! [`SqliteReader`]/[`SqliteWriter`]: the double-write, read-through SQLite
//! backend (§4.7, §4.8).

use std::sync::Arc;

use quipu_git::GitDb;

use crate::error::Result;
use crate::model::{GENESIS_TREE, HistoryGraph, HistoryNode, MetaJson, NodeType};
use crate::reader::GitObjectReader;
use crate::sqlite::{DatabaseManager, NodeRow};
use crate::storage::{HistoryReader, HistoryWriter, NewNode};
use crate::writer::GitObjectWriter;

/// Reads the history graph from SQLite, falling back to Git (and
/// back-filling the cache) for node content on miss.
pub struct SqliteReader {
    db: Arc<DatabaseManager>,
    git_reader: Arc<GitObjectReader>,
}

impl SqliteReader {
    /// Construct a reader over `db`, delegating content misses to
    /// `git_reader`.
    #[must_use]
    pub fn new(db: Arc<DatabaseManager>, git_reader: Arc<GitObjectReader>) -> Self {
        Self { db, git_reader }
    }
}

impl HistoryReader for SqliteReader {
    fn load_all_nodes(&self) -> Result<HistoryGraph> {
        let rows = self.db.select_all_nodes()?;
        let edges_rows = self.db.select_all_edges()?;

        let mut nodes = Vec::with_capacity(rows.len());
        for row in rows {
            let meta: MetaJson = serde_json::from_str(&row.meta_json).unwrap_or_default();
            nodes.push(HistoryNode {
                commit_hash: row.commit_hash,
                owner_id: row.owner_id,
                input_tree: String::new(),
                output_tree: row.output_tree,
                node_type: NodeType::from(row.node_type.as_str()),
                timestamp: row.timestamp,
                summary: row.summary,
                generator_id: row.generator_id.unwrap_or_default(),
                content: row.plan_md_cache.unwrap_or_default(),
                meta_json: meta,
                filename: None,
                parent: None,
                children: Vec::new(),
            });
        }

        Ok(HistoryGraph::build(nodes, &edges_rows)?)
    }

    fn get_node_content(&self, node: &HistoryNode) -> Result<String> {
        if !node.content.is_empty() {
            return Ok(node.content.clone());
        }

        let content = self.git_reader.get_node_content(node)?;
        if !content.is_empty() {
            if let Err(e) = self.db.backfill_plan_cache(&node.commit_hash, &content) {
                tracing::warn!(commit = %node.commit_hash, error = %e, "failed to backfill plan cache");
            }
        }
        Ok(content)
    }
}

/// Writes new history nodes through [`GitObjectWriter`] (source of truth),
/// then mirrors the resulting row into SQLite. A SQLite failure is logged,
/// never surfaced — the next `Hydrator::sync` call repairs the mirror.
pub struct SqliteWriter {
    git: Arc<GitDb>,
    git_writer: Arc<GitObjectWriter>,
    db: Arc<DatabaseManager>,
}

impl SqliteWriter {
    /// Construct a double-writer delegating Git writes to `git_writer` and
    /// mirroring into `db`. `git` is the same repository `git_writer` commits
    /// to, used only for the post-write parent lookup.
    #[must_use]
    pub fn new(git: Arc<GitDb>, git_writer: Arc<GitObjectWriter>, db: Arc<DatabaseManager>) -> Self {
        Self { git, git_writer, db }
    }
}

impl HistoryWriter for SqliteWriter {
    fn create_node(&self, new_node: NewNode<'_>) -> Result<HistoryNode> {
        let input_tree = new_node.input_tree.to_owned();
        let node = self.git_writer.create_node(new_node)?;

        let meta_json = serde_json::to_string(&node.meta_json).unwrap_or_default();
        let row = NodeRow {
            commit_hash: node.commit_hash.clone(),
            owner_id: node.owner_id.clone(),
            output_tree: node.output_tree.clone(),
            node_type: node.node_type.as_str().to_owned(),
            timestamp: node.timestamp,
            summary: node.summary.clone(),
            generator_id: Some(node.generator_id.clone()),
            meta_json,
            plan_md_cache: Some(node.content.clone()),
        };

        if let Err(e) = self.db.upsert_node(&row) {
            tracing::warn!(commit = %node.commit_hash, error = %e, "mirror write failed, will repair on next hydrate");
            return Ok(node);
        }

        if input_tree != GENESIS_TREE && !input_tree.is_empty() {
            match self.resolve_parent(&node.commit_hash, &input_tree) {
                Ok(Some(parent_commit)) => {
                    if let Err(e) = self.db.insert_edge(&node.commit_hash, &parent_commit) {
                        tracing::warn!(commit = %node.commit_hash, error = %e, "edge mirror write failed");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(commit = %node.commit_hash, error = %e, "failed to resolve parent commit for edge mirror");
                }
            }
        }

        Ok(node)
    }
}

impl SqliteWriter {
    fn resolve_parent(&self, from_commit: &str, input_tree: &str) -> Result<Option<String>> {
        let Ok(from) = from_commit.parse::<quipu_git::Oid>() else {
            return Ok(None);
        };
        let Ok(target) = input_tree.parse::<quipu_git::Oid>() else {
            return Ok(None);
        };
        Ok(self
            .git
            .get_commit_by_output_tree(&[from], target)?
            .map(|oid| oid.to_string()))
    }
}
