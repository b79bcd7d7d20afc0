//! The `HistoryNode` data model and the in-memory history graph.
//!
//! The graph is an arena (`Vec<HistoryNode>`), with `parent`/`children`
//! stored as indices into that arena rather than as `Rc`/raw pointers, per
//! the design note in the spec about ownership hazards. Each `load_all_nodes`
//! call produces a fresh, independently-owned `HistoryGraph`.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// `commit_hash` of the all-zero genesis input (the empty tree), mirrored
/// here as a string constant since `HistoryNode` stores hashes as strings.
pub const GENESIS_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// The kind of a history node.
///
/// Not itself `Serialize`/`Deserialize` — on the wire a node type is always
/// the plain string stored in `meta_json.node_type`; this enum exists so
/// in-memory code can match on the three well-known kinds without stringly
/// typing every comparison.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// A plan that has not yet been executed.
    Plan,
    /// A capture of drift between the current node and the working tree.
    Capture,
    /// An explicit user save.
    Save,
    /// Any other node type string, preserved for forward compatibility.
    Other(String),
}

impl NodeType {
    /// The canonical string form, as stored in `metadata.json` and the
    /// `nodes.node_type` column.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plan => "plan",
            Self::Capture => "capture",
            Self::Save => "save",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for NodeType {
    fn from(s: &str) -> Self {
        match s {
            "plan" => Self::Plan,
            "capture" => Self::Capture,
            "save" => Self::Save,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Generator identity: the agent/tool that produced a node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generator {
    /// Stable identifier of the generator (e.g. `"quipu-cli"`, `"agent:claude"`).
    pub id: String,
}

/// Execution timing metadata, present on `capture`/`plan`-execution nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecInfo {
    /// Fractional-seconds epoch timestamp execution began.
    #[serde(default)]
    pub start: f64,
    /// Wall-clock duration of execution, in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
}

/// The canonical `metadata.json` record embedded in every anchor commit's
/// tree (§4.2, §6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetaJson {
    /// Schema version of this metadata record.
    #[serde(default = "default_meta_version")]
    pub meta_version: String,
    /// Short human-readable summary line.
    pub summary: String,
    /// Node type string.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Generator identity.
    #[serde(default)]
    pub generator: Generator,
    /// Freeform environment metadata (host, tool versions, ...).
    #[serde(default)]
    pub env: serde_json::Value,
    /// Execution timing, when applicable.
    #[serde(default)]
    pub exec: ExecInfo,
}

fn default_meta_version() -> String {
    "1.0".to_owned()
}

impl Default for MetaJson {
    fn default() -> Self {
        Self {
            meta_version: default_meta_version(),
            summary: String::new(),
            node_type: NodeType::Plan.as_str().to_owned(),
            generator: Generator::default(),
            env: serde_json::Value::Object(serde_json::Map::new()),
            exec: ExecInfo::default(),
        }
    }
}

/// A single history node: an anchor commit plus the metadata and payload it
/// carries. See spec §3 for the full invariant list.
#[derive(Clone, Debug)]
pub struct HistoryNode {
    /// Git commit SHA of the node's anchor commit. Identity.
    pub commit_hash: String,
    /// Opaque, stable identifier of the author.
    pub owner_id: String,
    /// 40-hex SHA of the input working tree. [`GENESIS_TREE`] for roots.
    pub input_tree: String,
    /// 40-hex SHA of the output working tree.
    pub output_tree: String,
    /// Node kind.
    pub node_type: NodeType,
    /// Fractional-seconds epoch timestamp.
    pub timestamp: f64,
    /// Short human-readable summary line.
    pub summary: String,
    /// Identifier of the agent/tool that produced the node.
    pub generator_id: String,
    /// Primary textual payload. Lazily loaded; may be empty until
    /// `get_node_content` is called.
    pub content: String,
    /// Canonical metadata record.
    pub meta_json: MetaJson,
    /// Legacy filesystem backend only: the backing file, if any.
    pub filename: Option<PathBuf>,
    /// Arena index of the parent node, if any.
    pub parent: Option<usize>,
    /// Arena indices of child nodes, sorted by timestamp ascending.
    pub children: Vec<usize>,
}

impl HistoryNode {
    /// `true` if this node has no parent (its `input_tree` is the genesis tree).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// A loaded, linked history graph: a forest of DAGs rooted at nodes whose
/// `input_tree` is the genesis tree.
///
/// Owns every node by value in an arena; `parent`/`children` on each node
/// are indices into `self.nodes`, never raw pointers.
#[derive(Clone, Debug, Default)]
pub struct HistoryGraph {
    /// All nodes, in arbitrary arena order.
    pub nodes: Vec<HistoryNode>,
    /// `commit_hash -> arena index`, for O(1) lookup during linking and queries.
    pub index_by_hash: HashMap<String, usize>,
}

impl HistoryGraph {
    /// Build a graph from an unordered set of nodes (no links yet) plus an
    /// explicit parent-edge list `(child_hash, parent_hash)`.
    ///
    /// Returns an error if a cycle is detected (the graph must be a DAG).
    pub fn build(
        mut nodes: Vec<HistoryNode>,
        edges: &[(String, String)],
    ) -> Result<Self, CycleError> {
        let mut index_by_hash = HashMap::with_capacity(nodes.len());
        for (i, n) in nodes.iter().enumerate() {
            index_by_hash.insert(n.commit_hash.clone(), i);
        }

        for (child_hash, parent_hash) in edges {
            let (Some(&child_idx), Some(&parent_idx)) = (
                index_by_hash.get(child_hash),
                index_by_hash.get(parent_hash),
            ) else {
                continue;
            };
            nodes[child_idx].parent = Some(parent_idx);
            nodes[parent_idx].children.push(child_idx);
        }

        detect_cycles(&nodes)?;

        for node in &mut nodes {
            node.children
                .sort_by(|&a, &b| nodes_timestamp(&nodes, a).total_cmp(&nodes_timestamp(&nodes, b)));
        }
        // Re-derive input_tree from the parent's output_tree for nodes loaded
        // without it pre-populated (the SQLite path; see `sqlite_storage.rs`).
        for i in 0..nodes.len() {
            if let Some(parent_idx) = nodes[i].parent {
                let parent_output = nodes[parent_idx].output_tree.clone();
                if nodes[i].input_tree.is_empty() {
                    nodes[i].input_tree = parent_output;
                }
            } else if nodes[i].input_tree.is_empty() {
                nodes[i].input_tree = GENESIS_TREE.to_owned();
            }
        }

        Ok(Self { nodes, index_by_hash })
    }

    /// Look up a node by commit hash.
    #[must_use]
    pub fn get(&self, commit_hash: &str) -> Option<&HistoryNode> {
        self.index_by_hash.get(commit_hash).map(|&i| &self.nodes[i])
    }

    /// Find the node whose `output_tree` matches, if any (first match wins).
    #[must_use]
    pub fn find_by_output_tree(&self, output_tree: &str) -> Option<&HistoryNode> {
        self.nodes.iter().find(|n| n.output_tree == output_tree)
    }
}

fn nodes_timestamp(nodes: &[HistoryNode], idx: usize) -> f64 {
    nodes[idx].timestamp
}

/// A cycle was detected while linking parent/child edges; the source data
/// violates the DAG invariant the graph relies on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleError {
    /// One commit hash on the detected cycle.
    pub commit_hash: String,
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cycle detected in history graph at {}", self.commit_hash)
    }
}

impl std::error::Error for CycleError {}

fn detect_cycles(nodes: &[HistoryNode]) -> Result<(), CycleError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }
    let mut marks = vec![Mark::Unvisited; nodes.len()];

    fn visit(idx: usize, nodes: &[HistoryNode], marks: &mut [Mark]) -> Result<(), CycleError> {
        match marks[idx] {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                return Err(CycleError {
                    commit_hash: nodes[idx].commit_hash.clone(),
                });
            }
            Mark::Unvisited => {}
        }
        marks[idx] = Mark::InProgress;
        if let Some(parent_idx) = nodes[idx].parent {
            visit(parent_idx, nodes, marks)?;
        }
        marks[idx] = Mark::Done;
        Ok(())
    }

    for i in 0..nodes.len() {
        visit(i, nodes, &mut marks)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(hash: &str, input_tree: &str, output_tree: &str) -> HistoryNode {
        HistoryNode {
            commit_hash: hash.to_owned(),
            owner_id: "u1".to_owned(),
            input_tree: input_tree.to_owned(),
            output_tree: output_tree.to_owned(),
            node_type: NodeType::Capture,
            timestamp: 0.0,
            summary: String::new(),
            generator_id: String::new(),
            content: String::new(),
            meta_json: MetaJson::default(),
            filename: None,
            parent: None,
            children: Vec::new(),
        }
    }

    #[test]
    fn root_has_genesis_input_tree() {
        let graph = HistoryGraph::build(vec![node("a", "", "t1")], &[]).unwrap();
        assert_eq!(graph.get("a").unwrap().input_tree, GENESIS_TREE);
    }

    #[test]
    fn child_input_tree_matches_parent_output_tree() {
        let nodes = vec![node("a", "", "t1"), node("b", "", "t2")];
        let graph = HistoryGraph::build(nodes, &[("b".into(), "a".into())]).unwrap();
        let a = graph.get("a").unwrap();
        let b = graph.get("b").unwrap();
        assert_eq!(b.input_tree, a.output_tree);
        assert!(a.is_root());
        assert!(!b.is_root());
    }

    #[test]
    fn children_sorted_by_timestamp() {
        let mut early = node("early", "", "t-early");
        early.timestamp = 1.0;
        let mut late = node("late", "", "t-late");
        late.timestamp = 2.0;
        let nodes = vec![node("root", "", "t0"), late, early];
        let graph = HistoryGraph::build(
            nodes,
            &[
                ("late".into(), "root".into()),
                ("early".into(), "root".into()),
            ],
        )
        .unwrap();
        let root = graph.get("root").unwrap();
        let child_hashes: Vec<&str> = root
            .children
            .iter()
            .map(|&i| graph.nodes[i].commit_hash.as_str())
            .collect();
        assert_eq!(child_hashes, vec!["early", "late"]);
    }

    #[test]
    fn mutual_parent_edges_are_rejected_as_a_cycle() {
        let nodes = vec![node("a", "", "t1"), node("b", "", "t2")];
        let edges = vec![("a".to_owned(), "b".to_owned()), ("b".to_owned(), "a".to_owned())];
        assert!(HistoryGraph::build(nodes, &edges).is_err());
    }

    #[test]
    fn find_by_output_tree_locates_node() {
        let nodes = vec![node("a", "", "t1"), node("b", "t1", "t2")];
        let graph = HistoryGraph::build(nodes, &[("b".into(), "a".into())]).unwrap();
        assert_eq!(graph.find_by_output_tree("t2").unwrap().commit_hash, "b");
        assert!(graph.find_by_output_tree("missing").is_none());
    }
}
