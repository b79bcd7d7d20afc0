//! `.quipu/history/*.md` legacy filesystem backend (§6, Open Question (a)).
//!
//! Nodes are plain files, YAML front-matter bounded by `---\n...\n---\n\n`,
//! named `<input_tree>_<output_tree>_<YYYYMMDDHHMMSS>.md`. This backend never
//! touches Git objects or SQLite; it exists purely so repositories created by
//! an older quipu keep working unmodified.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{QuipuError, Result};
use crate::model::{GENESIS_TREE, HistoryGraph, HistoryNode, MetaJson, NodeType};
use crate::storage::{HistoryReader, HistoryWriter, NewNode};

/// `true` if `dir` looks like a legacy history directory: it exists and
/// contains at least one `*.md` file.
#[must_use]
pub fn is_legacy_history_dir(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries.filter_map(std::result::Result::ok).any(|e| {
        e.path().extension().and_then(std::ffi::OsStr::to_str) == Some("md")
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct FrontMatter {
    #[serde(rename = "type")]
    node_type: String,
    input_tree: String,
    output_tree: String,
    #[serde(flatten)]
    extra: std::collections::BTreeMap<String, serde_yaml::Value>,
}

fn parse_frontmatter(text: &str) -> Option<(FrontMatter, String)> {
    let rest = text.strip_prefix("---\n")?;
    let end = rest.find("\n---\n")?;
    let yaml = &rest[..end];
    let body = rest[end + 5..].trim_start_matches('\n').to_owned();
    let front: FrontMatter = serde_yaml::from_str(yaml).ok()?;
    Some((front, body))
}

/// Reads history nodes from `.quipu/history/*.md`.
pub struct FileSystemHistoryReader {
    history_dir: PathBuf,
}

impl FileSystemHistoryReader {
    /// Construct a reader over `history_dir`, creating it if absent.
    pub fn new(history_dir: impl Into<PathBuf>) -> Result<Self> {
        let history_dir = history_dir.into();
        fs::create_dir_all(&history_dir)?;
        Ok(Self { history_dir })
    }
}

impl HistoryReader for FileSystemHistoryReader {
    fn load_all_nodes(&self) -> Result<HistoryGraph> {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();

        let entries = fs::read_dir(&self.history_dir)?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(std::ffi::OsStr::to_str) != Some("md") {
                continue;
            }
            let text = fs::read_to_string(&path)?;
            let Some((front, body)) = parse_frontmatter(&text) else {
                tracing::warn!(path = %path.display(), "skipping legacy history file without valid front-matter");
                continue;
            };

            let commit_hash = path
                .file_stem()
                .and_then(std::ffi::OsStr::to_str)
                .unwrap_or_default()
                .to_owned();
            let timestamp = file_modified_timestamp(&path);

            nodes.push(HistoryNode {
                commit_hash: commit_hash.clone(),
                owner_id: "local".to_owned(),
                input_tree: front.input_tree.clone(),
                output_tree: front.output_tree.clone(),
                node_type: NodeType::from(front.node_type.as_str()),
                timestamp,
                summary: front
                    .extra
                    .get("summary")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_owned(),
                generator_id: String::new(),
                content: body,
                meta_json: MetaJson {
                    node_type: front.node_type.clone(),
                    ..MetaJson::default()
                },
                filename: Some(path),
                parent: None,
                children: Vec::new(),
            });

            if front.input_tree != GENESIS_TREE {
                // The parent edge is resolved below once all nodes are loaded,
                // by matching on output_tree rather than a stored parent hash:
                // legacy files carry only input/output tree SHAs, not parent
                // commit identity.
                edges.push((commit_hash, front.input_tree));
            }
        }

        // Resolve each pending (child_hash, parent_input_tree) edge to the
        // node whose output_tree equals that input_tree.
        let output_tree_to_hash: std::collections::HashMap<String, String> = nodes
            .iter()
            .map(|n| (n.output_tree.clone(), n.commit_hash.clone()))
            .collect();
        let resolved_edges: Vec<(String, String)> = edges
            .into_iter()
            .filter_map(|(child, input_tree)| {
                output_tree_to_hash.get(&input_tree).map(|parent| (child, parent.clone()))
            })
            .collect();

        Ok(HistoryGraph::build(nodes, &resolved_edges)?)
    }

    fn get_node_content(&self, node: &HistoryNode) -> Result<String> {
        if !node.content.is_empty() {
            return Ok(node.content.clone());
        }
        let Some(path) = &node.filename else {
            return Ok(String::new());
        };
        if !path.exists() {
            return Ok(String::new());
        }
        let text = fs::read_to_string(path)?;
        Ok(parse_frontmatter(&text).map(|(_, body)| body).unwrap_or_default())
    }
}

fn file_modified_timestamp(path: &Path) -> f64 {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Writes new history nodes as `.quipu/history/*.md` files.
pub struct FileSystemHistoryWriter {
    history_dir: PathBuf,
}

impl FileSystemHistoryWriter {
    /// Construct a writer over `history_dir`, creating it if absent.
    pub fn new(history_dir: impl Into<PathBuf>) -> Result<Self> {
        let history_dir = history_dir.into();
        fs::create_dir_all(&history_dir)?;
        Ok(Self { history_dir })
    }
}

impl HistoryWriter for FileSystemHistoryWriter {
    fn create_node(&self, new_node: NewNode<'_>) -> Result<HistoryNode> {
        let now = std::time::SystemTime::now();
        let ts_str = format_timestamp(now);
        let filename = self
            .history_dir
            .join(format!("{}_{}_{ts_str}.md", new_node.input_tree, new_node.output_tree));

        // Same-second collisions between two nodes with identical input/output
        // trees silently overwrite the earlier file. This mirrors the source
        // backend's ambiguous behavior exactly rather than inventing a counter
        // suffix it never specified; see DESIGN.md Open Question (a).
        let summary = new_node
            .summary
            .clone()
            .unwrap_or_else(|| crate::storage::default_summary(new_node.node_type, new_node.input_tree, new_node.output_tree));

        let mut extra = std::collections::BTreeMap::new();
        extra.insert("summary".to_owned(), serde_yaml::Value::String(summary.clone()));
        let front = FrontMatter {
            node_type: new_node.node_type.to_owned(),
            input_tree: new_node.input_tree.to_owned(),
            output_tree: new_node.output_tree.to_owned(),
            extra,
        };
        let yaml = serde_yaml::to_string(&front).map_err(|e| QuipuError::ConfigError(e.to_string()))?;
        let body = format!("{}\n", new_node.content.trim());
        let text = format!("---\n{yaml}---\n\n{body}");
        fs::write(&filename, text)?;

        let timestamp = file_modified_timestamp(&filename);
        Ok(HistoryNode {
            commit_hash: filename.file_stem().and_then(std::ffi::OsStr::to_str).unwrap_or_default().to_owned(),
            owner_id: "local".to_owned(),
            input_tree: new_node.input_tree.to_owned(),
            output_tree: new_node.output_tree.to_owned(),
            node_type: NodeType::from(new_node.node_type),
            timestamp,
            summary,
            generator_id: new_node.generator.id.clone(),
            content: body,
            meta_json: MetaJson {
                node_type: new_node.node_type.to_owned(),
                ..MetaJson::default()
            },
            filename: Some(filename),
            parent: None,
            children: Vec::new(),
        })
    }
}

fn format_timestamp(time: std::time::SystemTime) -> String {
    // YYYYMMDDHHMMSS, UTC, matching the original filename scheme exactly.
    let datetime: chrono::DateTime<chrono::Utc> = time.into();
    datetime.format("%Y%m%d%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_timestamp_matches_known_epoch_instant() {
        let time = std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_609_459_200);
        assert_eq!(format_timestamp(time), "20210101000000");
    }

    #[test]
    fn is_legacy_detects_md_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_legacy_history_dir(dir.path()));
        fs::write(dir.path().join("dummy.md"), "x").unwrap();
        assert!(is_legacy_history_dir(dir.path()));
    }

    #[test]
    fn writer_roundtrips_frontmatter() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileSystemHistoryWriter::new(dir.path().join("history")).unwrap();
        let node = writer
            .create_node(NewNode {
                node_type: "capture",
                input_tree: &GENESIS_TREE.to_string(),
                output_tree: &"b".repeat(40),
                content: "hello",
                summary: None,
                generator: crate::model::Generator::default(),
                env: serde_json::Value::Null,
            })
            .unwrap();
        assert_eq!(node.content.trim(), "hello");

        let reader = FileSystemHistoryReader::new(dir.path().join("history")).unwrap();
        let graph = reader.load_all_nodes().unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].output_tree, "b".repeat(40));
    }
}
