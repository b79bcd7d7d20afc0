//! `GitObjectCodec`: encodes and decodes history nodes as Git objects (§4.2).

use quipu_git::{CommitRecord, EntryMode, GitDb, Oid, Signature, TreeEntry};

use crate::error::{QuipuError, Result};
use crate::model::{ExecInfo, Generator, HistoryNode, MetaJson, NodeType};

const METADATA_BLOB_NAME: &str = "metadata.json";
const PLAN_BLOB_NAME: &str = "plan.md";
const INTENT_BLOB_NAME: &str = "intent.md";

/// One payload blob to embed alongside `metadata.json` in a node's tree.
pub struct PayloadBlob {
    /// Name the blob is written under (`plan.md`, `intent.md`, ...).
    pub name: String,
    /// Raw blob content.
    pub content: String,
}

/// Everything needed to encode a new history node.
pub struct EncodeRequest<'a> {
    /// Node kind.
    pub node_type: NodeType,
    /// 40-hex input tree.
    pub input_tree: &'a str,
    /// 40-hex output tree.
    pub output_tree: &'a str,
    /// Short summary line, becomes the commit's subject.
    pub summary: String,
    /// Generator identity.
    pub generator: Generator,
    /// Freeform environment metadata.
    pub env: serde_json::Value,
    /// Execution timing, if applicable.
    pub exec: ExecInfo,
    /// The primary textual payload (usually `plan.md`'s content).
    pub content: String,
    /// Additional payload blobs (`intent.md`, ...). `plan.md` is always
    /// written from `content` and need not be repeated here.
    pub extra_blobs: Vec<PayloadBlob>,
    /// Parent commit, or `None` for the owner's first node.
    pub parent: Option<Oid>,
    /// Commit author/committer identity.
    pub author: Signature,
}

/// Encodes a history node into Git objects and returns the resulting commit.
pub struct GitObjectCodec;

impl GitObjectCodec {
    /// Build the `metadata.json` bytes for a node, in the canonical key order
    /// (`meta_version, summary, type, generator, env, exec`).
    #[must_use]
    pub fn encode_metadata(meta: &MetaJson) -> Vec<u8> {
        // serde_json preserves struct field order, which matches the spec's
        // canonical order because `MetaJson`'s fields are declared that way.
        serde_json::to_vec(meta).unwrap_or_default()
    }

    /// Build the commit message: `<summary>\n\nX-Quipu-Output-Tree: <sha>\n`.
    #[must_use]
    pub fn build_commit_message(summary: &str, output_tree: &str) -> String {
        format!("{summary}\n\nX-Quipu-Output-Tree: {output_tree}\n")
    }

    /// Write the node's objects (metadata blob, payload blobs, tree, commit)
    /// and return the new commit's OID.
    pub fn encode(git: &GitDb, req: EncodeRequest<'_>) -> Result<Oid> {
        let meta = MetaJson {
            meta_version: "1.0".to_owned(),
            summary: req.summary.clone(),
            node_type: req.node_type.as_str().to_owned(),
            generator: req.generator,
            env: req.env,
            exec: req.exec,
        };
        let metadata_bytes = Self::encode_metadata(&meta);
        let metadata_oid = git.hash_object(&metadata_bytes)?;

        let mut entries = vec![TreeEntry {
            name: METADATA_BLOB_NAME.to_owned(),
            mode: EntryMode::Blob,
            oid: metadata_oid,
        }];

        if !req.content.is_empty() {
            let plan_oid = git.hash_object(req.content.as_bytes())?;
            entries.push(TreeEntry {
                name: PLAN_BLOB_NAME.to_owned(),
                mode: EntryMode::Blob,
                oid: plan_oid,
            });
        }
        for blob in &req.extra_blobs {
            let oid = git.hash_object(blob.content.as_bytes())?;
            entries.push(TreeEntry {
                name: blob.name.clone(),
                mode: EntryMode::Blob,
                oid,
            });
        }

        let tree_oid = git.mktree(&entries)?;
        let parents: Vec<Oid> = req.parent.into_iter().collect();
        let message = Self::build_commit_message(&req.summary, req.output_tree);
        let commit_oid = git.commit_tree(tree_oid, &parents, &message, &req.author)?;
        Ok(commit_oid)
    }

    /// Decode an already-fetched [`CommitRecord`] (e.g. from [`GitDb::log_ref`])
    /// into the parts of a [`HistoryNode`] that come from Git alone (no
    /// `owner_id`, since that's ref-derived).
    ///
    /// Returns `Err` on a missing/malformed Output-Tree trailer or malformed
    /// `metadata.json`; callers treat this as skip-with-warning, never fatal.
    pub fn decode(git: &GitDb, record: &CommitRecord) -> Result<DecodedNode> {
        let commit = record.hash;
        let output_tree = quipu_git::find_output_tree_trailer(&record.body).ok_or_else(|| {
            QuipuError::DecodeError {
                commit_hash: commit.to_string(),
                reason: "missing X-Quipu-Output-Tree trailer".to_owned(),
            }
        })?;

        let meta_oid = git
            .tree_entry(record.tree, METADATA_BLOB_NAME)?
            .ok_or_else(|| QuipuError::DecodeError {
                commit_hash: commit.to_string(),
                reason: "tree has no metadata.json entry".to_owned(),
            })?;
        let meta_bytes = git.read_blob(meta_oid)?;
        let meta: MetaJson =
            serde_json::from_slice(&meta_bytes).map_err(|e| QuipuError::DecodeError {
                commit_hash: commit.to_string(),
                reason: format!("malformed metadata.json: {e}"),
            })?;

        let summary = first_line(&record.body).to_owned();

        Ok(DecodedNode {
            commit_hash: commit.to_string(),
            tree: record.tree,
            output_tree: output_tree.to_string(),
            parents: record.parents.iter().map(Oid::to_string).collect(),
            timestamp: record.timestamp,
            summary,
            meta,
        })
    }

    /// Fetch a node's primary textual payload (`plan.md`), or empty string
    /// if the node carries none.
    pub fn get_content(git: &GitDb, node: &HistoryNode) -> Result<String> {
        let Ok(commit) = node.commit_hash.parse::<Oid>() else {
            return Ok(String::new());
        };
        let records = git.log_ref(&[commit])?;
        let Some(record) = records.into_iter().find(|r| r.hash == commit) else {
            return Ok(String::new());
        };
        let Some(blob_oid) = git.tree_entry(record.tree, PLAN_BLOB_NAME)? else {
            return Ok(String::new());
        };
        let bytes = git.read_blob(blob_oid)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Fetch `intent.md` from a node's tree, if present.
    pub fn get_intent(git: &GitDb, node: &HistoryNode) -> Result<Option<String>> {
        let Ok(commit) = node.commit_hash.parse::<Oid>() else {
            return Ok(None);
        };
        let records = git.log_ref(&[commit])?;
        let Some(record) = records.into_iter().find(|r| r.hash == commit) else {
            return Ok(None);
        };
        let Some(blob_oid) = git.tree_entry(record.tree, INTENT_BLOB_NAME)? else {
            return Ok(None);
        };
        let bytes = git.read_blob(blob_oid)?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

/// The Git-derived parts of a decoded history node.
pub struct DecodedNode {
    /// Hex commit hash.
    pub commit_hash: String,
    /// The commit's tree OID.
    pub tree: Oid,
    /// 40-hex output tree extracted from the trailer.
    pub output_tree: String,
    /// Hex parent commit hashes.
    pub parents: Vec<String>,
    /// Fractional-seconds epoch timestamp.
    pub timestamp: f64,
    /// First line of the commit message.
    pub summary: String,
    /// Parsed `metadata.json`.
    pub meta: MetaJson,
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_message_has_trailer() {
        let msg = GitObjectCodec::build_commit_message("did a thing", "a".repeat(40).as_str());
        assert!(msg.starts_with("did a thing\n\n"));
        assert!(msg.ends_with(&format!("X-Quipu-Output-Tree: {}\n", "a".repeat(40))));
    }

    #[test]
    fn metadata_key_order_is_canonical() {
        let meta = MetaJson::default();
        let bytes = GitObjectCodec::encode_metadata(&meta);
        let text = String::from_utf8(bytes).unwrap();
        let order = ["meta_version", "summary", "type", "generator", "env", "exec"];
        let positions: Vec<usize> = order.iter().map(|k| text.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
