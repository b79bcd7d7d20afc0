//! The [`Engine`] state machine: ORPHAN/ALIGNED/DIRTY (§4.9).

use std::path::{Path, PathBuf};

use quipu_git::GitDb;

use crate::config::Config;
use crate::error::{QuipuError, Result};
use crate::ignores;
use crate::model::HistoryGraph;
use crate::storage::{HistoryReader, HistoryWriter, NewNode};

/// Current alignment of the working tree with the history graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// No quipu history exists in this repository yet.
    Orphan,
    /// The working tree's hash matches the current node's `output_tree`.
    Aligned,
    /// The working tree has drifted from the current node's `output_tree`.
    Dirty,
}

/// Materializes a tree SHA into the working directory. The Engine trusts
/// the result and never performs filesystem checkout itself — that's the
/// out-of-scope plan executor's job; this trait is the seam between them.
pub trait WorktreeMaterializer {
    /// Write `output_tree`'s contents into the working directory.
    fn materialize(&self, output_tree: &str) -> Result<()>;
}

/// A no-op materializer for read-only / test contexts where `checkout`
/// should update bookkeeping only, without ever touching the filesystem.
pub struct NoopMaterializer;

impl WorktreeMaterializer for NoopMaterializer {
    fn materialize(&self, _output_tree: &str) -> Result<()> {
        Ok(())
    }
}

/// The top-level quipu state machine, holding the current graph and
/// position. Lives for the process lifetime; there is no terminal state.
/// Requires `&mut self` for every transition — not safe to call
/// concurrently from multiple threads.
pub struct Engine {
    root: PathBuf,
    git: GitDb,
    reader: Box<dyn HistoryReader>,
    writer: Box<dyn HistoryWriter>,
    config: Config,
    graph: HistoryGraph,
    current_node: Option<String>,
    state: EngineState,
}

impl Engine {
    /// Resolve the project root by walking up from `work_dir` until a
    /// `.git` entry is found, falling back to `work_dir` itself.
    #[must_use]
    pub fn resolve_root(work_dir: &Path) -> PathBuf {
        let mut current = work_dir;
        loop {
            if current.join(".git").exists() {
                return current.to_path_buf();
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => return work_dir.to_path_buf(),
            }
        }
    }

    /// Construct an `Engine` over `reader`/`writer` at `root`, then align it
    /// before returning, so every `Engine` handed to a caller already
    /// reflects the current working-tree state (§4.9.1).
    pub fn new(
        root: PathBuf,
        git: GitDb,
        reader: Box<dyn HistoryReader>,
        writer: Box<dyn HistoryWriter>,
        config: Config,
    ) -> Result<Self> {
        let mut engine = Self {
            root,
            git,
            reader,
            writer,
            config,
            graph: HistoryGraph::default(),
            current_node: None,
            state: EngineState::Orphan,
        };
        engine.align()?;
        Ok(engine)
    }

    /// The repository root this engine operates on.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The current alignment state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// The node the engine currently considers "here", if any.
    #[must_use]
    pub fn current_node(&self) -> Option<&str> {
        self.current_node.as_deref()
    }

    /// The full loaded history graph.
    #[must_use]
    pub fn history_graph(&self) -> &HistoryGraph {
        &self.graph
    }

    /// Reload the graph from the backing store, sync persistent ignores,
    /// and recompute the alignment state against the working tree.
    /// Idempotent on an unchanged working tree (P5).
    pub fn align(&mut self) -> Result<()> {
        self.sync_ignores()?;
        self.graph = self.reader.load_all_nodes()?;

        let local_tip = self
            .git
            .get_all_ref_heads(crate::refs_layout::LOCAL_HEADS_PREFIX)?
            .into_iter()
            .max_by(|a, b| {
                let ta = self.graph.get(&a.0.to_string()).map_or(0.0, |n| n.timestamp);
                let tb = self.graph.get(&b.0.to_string()).map_or(0.0, |n| n.timestamp);
                ta.total_cmp(&tb)
            })
            .map(|(oid, _)| oid.to_string());

        self.current_node = local_tip;

        if self.graph.nodes.is_empty() {
            self.state = EngineState::Orphan;
            return Ok(());
        }

        let current_output_tree = self
            .current_node
            .as_deref()
            .and_then(|hash| self.graph.get(hash))
            .map(|n| n.output_tree.clone());

        let working_tree_hash = self.git.get_tree_hash()?.to_string();
        self.state = match current_output_tree {
            Some(output_tree) if output_tree == working_tree_hash => EngineState::Aligned,
            Some(_) => EngineState::Dirty,
            None => EngineState::Orphan,
        };
        Ok(())
    }

    /// Record drift between the current node and the working tree as a new
    /// `capture` node, advancing `current_node`. Retries once on a lost
    /// ref-CAS race by reloading and re-deriving the input tree.
    pub fn capture_drift(&mut self, dirty_tree: &str) -> Result<()> {
        for attempt in 0..2 {
            let input_tree = self
                .current_node
                .as_deref()
                .and_then(|hash| self.graph.get(hash))
                .map_or_else(|| quipu_git::Oid::EMPTY_TREE.to_string(), |n| n.output_tree.clone());

            let result = self.writer.create_node(NewNode {
                node_type: "capture",
                input_tree: &input_tree,
                output_tree: dirty_tree,
                content: "",
                summary: None,
                generator: crate::model::Generator::default(),
                env: serde_json::Value::Null,
            });

            match result {
                Ok(node) => {
                    self.current_node = Some(node.commit_hash);
                    self.graph = self.reader.load_all_nodes()?;
                    self.state = EngineState::Aligned;
                    return Ok(());
                }
                Err(QuipuError::RefRaceLost { .. }) if attempt == 0 => {
                    self.align()?;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        unreachable!("loop always returns on its second iteration")
    }

    /// Request the plan executor materialize `output_tree` into the working
    /// directory via `materializer`, then update `current_node` on success.
    pub fn checkout(
        &mut self,
        output_tree: &str,
        materializer: &dyn WorktreeMaterializer,
    ) -> Result<()> {
        materializer.materialize(output_tree)?;
        if let Some(node) = self.graph.find_by_output_tree(output_tree) {
            self.current_node = Some(node.commit_hash.clone());
        }
        self.state = EngineState::Aligned;
        Ok(())
    }

    /// Release any resources held by the engine's backends. A no-op beyond
    /// `Drop` today, kept as an explicit call so backends that later need
    /// flush-on-close semantics (e.g. a buffered SQLite writer) have a seam.
    pub fn close(self) {
        drop(self);
    }

    fn sync_ignores(&self) -> Result<()> {
        let exclude_path = self.git.git_dir().join("info").join("exclude");
        ignores::sync_ignores(&exclude_path, &self.config.persistent_ignores)
    }
}
