//! The `HistoryReader`/`HistoryWriter` capability traits (§6, §9 "Polymorphism
//! of readers/writers"). The [`crate::engine::Engine`] depends only on these
//! traits, never on a concrete backend variant.

use crate::error::Result;
use crate::model::{Generator, HistoryNode, MetaJson};

/// Read access to the history graph, regardless of backing store.
pub trait HistoryReader {
    /// Load the complete, linked graph.
    fn load_all_nodes(&self) -> Result<crate::model::HistoryGraph>;

    /// Fetch a node's primary textual payload, reading through to the
    /// backing store if not already cached on `node`. Empty string if the
    /// node carries no payload.
    fn get_node_content(&self, node: &HistoryNode) -> Result<String>;
}

/// Fields needed to create a new history node, independent of storage
/// backend.
pub struct NewNode<'a> {
    /// Node kind string (`"plan"`, `"capture"`, `"save"`, ...).
    pub node_type: &'a str,
    /// 40-hex input tree.
    pub input_tree: &'a str,
    /// 40-hex output tree.
    pub output_tree: &'a str,
    /// Primary textual payload.
    pub content: &'a str,
    /// Short summary line. Falls back to a generated one if empty.
    pub summary: Option<String>,
    /// Generator identity.
    pub generator: Generator,
    /// Freeform environment metadata.
    pub env: serde_json::Value,
}

/// Write access to the history graph, regardless of backing store.
pub trait HistoryWriter {
    /// Create and persist a new history node, returning it.
    fn create_node(&self, new_node: NewNode<'_>) -> Result<HistoryNode>;
}

/// Derive a default summary when the caller doesn't supply one, mirroring
/// the convention used across all backends: `"<type>: <input>.. -> <output>.."`.
#[must_use]
pub fn default_summary(node_type: &str, input_tree: &str, output_tree: &str) -> String {
    let short = |s: &str| s.get(..7).unwrap_or(s).to_owned();
    format!("{node_type}: {} -> {}", short(input_tree), short(output_tree))
}

/// Build the canonical `metadata.json` record for a new node.
#[must_use]
pub fn build_meta(new_node: &NewNode<'_>, summary: &str, timestamp: f64) -> MetaJson {
    MetaJson {
        meta_version: "1.0".to_owned(),
        summary: summary.to_owned(),
        node_type: new_node.node_type.to_owned(),
        generator: new_node.generator.clone(),
        env: new_node.env.clone(),
        exec: crate::model::ExecInfo {
            start: timestamp,
            duration_ms: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_summary_truncates_hashes() {
        let s = default_summary("capture", &"a".repeat(40), &"b".repeat(40));
        assert_eq!(s, format!("capture: {} -> {}", "a".repeat(7), "b".repeat(7)));
    }
}
