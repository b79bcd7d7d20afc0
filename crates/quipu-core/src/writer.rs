//! [`GitObjectWriter`]: creates new history nodes as Git commits (§4.6).

use std::sync::Arc;

use quipu_git::{GitDb, Oid, Signature};

use crate::codec::{EncodeRequest, GitObjectCodec};
use crate::error::{QuipuError, Result};
use crate::model::{ExecInfo, HistoryNode, NodeType};
use crate::refs_layout;
use crate::storage::{default_summary, build_meta, HistoryWriter, NewNode};

/// Writes new history nodes directly as Git commits under
/// `refs/quipu/local/heads/<branch>`, advancing the ref with compare-and-set.
pub struct GitObjectWriter {
    git: Arc<GitDb>,
    owner_id: String,
    branch: String,
    author: Signature,
}

impl GitObjectWriter {
    /// Construct a writer that commits to `refs/quipu/local/heads/<branch>`
    /// as `owner_id`, signing commits with `author`.
    #[must_use]
    pub fn new(
        git: Arc<GitDb>,
        owner_id: impl Into<String>,
        branch: impl Into<String>,
        author: Signature,
    ) -> Self {
        Self {
            git,
            owner_id: owner_id.into(),
            branch: branch.into(),
            author,
        }
    }

    fn head_ref(&self) -> String {
        refs_layout::local_head_ref(&self.branch)
    }

    /// Current tip of this writer's local head ref, if any.
    pub fn current_head(&self) -> Result<Option<Oid>> {
        Ok(self.git.read_ref(&self.head_ref())?)
    }
}

fn now_seconds() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

impl HistoryWriter for GitObjectWriter {
    fn create_node(&self, new_node: NewNode<'_>) -> Result<HistoryNode> {
        let summary = new_node
            .summary
            .clone()
            .unwrap_or_else(|| default_summary(new_node.node_type, new_node.input_tree, new_node.output_tree));
        let timestamp = now_seconds();
        let parent = self.current_head()?;
        let meta = build_meta(&new_node, &summary, timestamp);

        let req = EncodeRequest {
            node_type: NodeType::from(new_node.node_type),
            input_tree: new_node.input_tree,
            output_tree: new_node.output_tree,
            summary: summary.clone(),
            generator: new_node.generator.clone(),
            env: new_node.env.clone(),
            exec: ExecInfo {
                start: timestamp,
                duration_ms: 0,
            },
            content: new_node.content.to_owned(),
            extra_blobs: Vec::new(),
            parent,
            author: self.author.clone(),
        };
        let commit_oid = GitObjectCodec::encode(&self.git, req)?;

        let expected = parent.unwrap_or(Oid::ZERO);
        self.git
            .update_ref(&self.head_ref(), commit_oid, expected)
            .map_err(|_| QuipuError::RefRaceLost {
                ref_name: self.head_ref(),
            })?;

        Ok(HistoryNode {
            commit_hash: commit_oid.to_string(),
            owner_id: self.owner_id.clone(),
            input_tree: new_node.input_tree.to_owned(),
            output_tree: new_node.output_tree.to_owned(),
            node_type: NodeType::from(new_node.node_type),
            timestamp,
            summary,
            generator_id: new_node.generator.id.clone(),
            content: new_node.content.to_owned(),
            meta_json: meta,
            filename: None,
            parent: None,
            children: Vec::new(),
        })
    }
}
