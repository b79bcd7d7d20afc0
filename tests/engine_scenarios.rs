//! Integration tests against the concrete scenarios enumerated in the
//! design notes: orphan start, capture drift, hydration, read-through
//! back-fill, subscription fetch, legacy detection.

use std::sync::Arc;

use quipu::core::config::Config;
use quipu::core::engine::{Engine, EngineState};
use quipu::core::hydrator::Hydrator;
use quipu::core::legacy::{is_legacy_history_dir, FileSystemHistoryReader, FileSystemHistoryWriter};
use quipu::core::model::Generator;
use quipu::core::reader::GitObjectReader;
use quipu::core::refs_layout;
use quipu::core::sqlite::DatabaseManager;
use quipu::core::sqlite_storage::{SqliteReader, SqliteWriter};
use quipu::core::storage::{HistoryReader, HistoryWriter, NewNode};
use quipu::core::writer::GitObjectWriter;
use quipu::git::{GitDb, Oid, Signature};

fn init_repo() -> (tempfile::TempDir, Arc<GitDb>) {
    let dir = tempfile::tempdir().unwrap();
    gix::init(dir.path()).unwrap();
    let git = Arc::new(GitDb::open(dir.path()).unwrap());
    (dir, git)
}

fn open_db(dir: &tempfile::TempDir) -> Arc<DatabaseManager> {
    Arc::new(DatabaseManager::open(dir.path().join("history.sqlite")).unwrap())
}

fn author() -> Signature {
    Signature {
        name: "Test User".to_owned(),
        email: "test@example.com".to_owned(),
    }
}

fn blank_node<'a>(node_type: &'a str, input_tree: &'a str, output_tree: &'a str) -> NewNode<'a> {
    NewNode {
        node_type,
        input_tree,
        output_tree,
        content: "",
        summary: None,
        generator: Generator::default(),
        env: serde_json::Value::Null,
    }
}

#[test]
fn orphan_start_has_empty_graph() {
    let (_dir, git) = init_repo();
    let reader = Box::new(GitObjectReader::new(git.clone(), "u1"));
    let writer = Box::new(GitObjectWriter::new(git.clone(), "u1", "main", author()));
    let engine = Engine::new(
        git.workdir().to_path_buf(),
        GitDb::open(git.workdir()).unwrap(),
        reader,
        writer,
        Config::default(),
    )
    .unwrap();

    assert_eq!(engine.state(), EngineState::Orphan);
    assert!(engine.current_node().is_none());
    assert!(engine.history_graph().nodes.is_empty());
}

#[test]
fn capture_drift_advances_local_head_with_git_parent() {
    let (_dir, git) = init_repo();
    let genesis = Oid::EMPTY_TREE.to_string();

    let writer = GitObjectWriter::new(git.clone(), "u1", "main", author());
    let t1 = "1".repeat(40);
    let first = writer.create_node(blank_node("capture", &genesis, &t1)).unwrap();

    let t2 = "2".repeat(40);
    let second = writer
        .create_node(blank_node("capture", &first.output_tree, &t2))
        .unwrap();

    let head = git.read_ref("refs/quipu/local/heads/main").unwrap().unwrap();
    assert_eq!(head.to_string(), second.commit_hash);

    let records = git.log_ref(&[head]).unwrap();
    let tip = records.iter().find(|r| r.hash == head).unwrap();
    assert_eq!(tip.parents.len(), 1);
    assert_eq!(tip.parents[0].to_string(), first.commit_hash);
}

#[test]
fn capture_drift_through_engine_updates_state() {
    let (_dir, git) = init_repo();
    let reader = Box::new(GitObjectReader::new(git.clone(), "u1"));
    let writer = Box::new(GitObjectWriter::new(git.clone(), "u1", "main", author()));
    let mut engine = Engine::new(
        git.workdir().to_path_buf(),
        GitDb::open(git.workdir()).unwrap(),
        reader,
        writer,
        Config::default(),
    )
    .unwrap();

    let dirty_tree = "3".repeat(40);
    engine.capture_drift(&dirty_tree).unwrap();

    assert_eq!(engine.state(), EngineState::Aligned);
    assert!(engine.current_node().is_some());
    assert_eq!(engine.history_graph().nodes.len(), 1);
}

#[test]
fn hydration_is_idempotent_and_links_edges() {
    let (dir, git) = init_repo();
    let genesis = Oid::EMPTY_TREE.to_string();
    let git_writer = GitObjectWriter::new(git.clone(), "u1", "main", author());

    let t1 = "1".repeat(40);
    let n1 = git_writer.create_node(blank_node("capture", &genesis, &t1)).unwrap();
    let t2 = "2".repeat(40);
    git_writer
        .create_node(blank_node("capture", &n1.output_tree, &t2))
        .unwrap();

    let db = open_db(&dir);
    let hydrator = Hydrator::new(git.clone(), db.clone());
    hydrator.sync("u1").unwrap();

    assert_eq!(db.select_all_nodes().unwrap().len(), 2);
    assert_eq!(db.select_all_edges().unwrap().len(), 1);
    for row in db.select_all_nodes().unwrap() {
        assert_eq!(row.owner_id, "u1");
    }

    hydrator.sync("u1").unwrap();
    assert_eq!(db.select_all_nodes().unwrap().len(), 2);
    assert_eq!(db.select_all_edges().unwrap().len(), 1);
}

#[test]
fn read_through_backfill_persists_to_cache() {
    let (dir, git) = init_repo();
    let genesis = Oid::EMPTY_TREE.to_string();
    let git_writer = GitObjectWriter::new(git.clone(), "u1", "main", author());
    let mut plan = blank_node("plan", &genesis, "");
    let t1 = "1".repeat(40);
    plan.output_tree = &t1;
    plan.content = "plan body";
    let node = git_writer.create_node(plan).unwrap();

    let db = open_db(&dir);
    let hydrator = Hydrator::new(git.clone(), db.clone());
    hydrator.sync("u1").unwrap();

    let cold_row = db
        .select_all_nodes()
        .unwrap()
        .into_iter()
        .find(|r| r.commit_hash == node.commit_hash)
        .unwrap();
    assert!(cold_row.plan_md_cache.is_none());

    let git_reader = Arc::new(GitObjectReader::new(git.clone(), "u1"));
    let sqlite_reader = SqliteReader::new(db.clone(), git_reader);
    let graph = sqlite_reader.load_all_nodes().unwrap();
    let cold_node = graph.get(&node.commit_hash).unwrap();

    let content = sqlite_reader.get_node_content(cold_node).unwrap();
    assert_eq!(content, "plan body");

    let warmed = db
        .select_all_nodes()
        .unwrap()
        .into_iter()
        .find(|r| r.commit_hash == node.commit_hash)
        .unwrap();
    assert_eq!(warmed.plan_md_cache.as_deref(), Some("plan body"));
}

#[test]
fn double_write_keeps_git_and_sqlite_in_sync() {
    let (dir, git) = init_repo();
    let genesis = Oid::EMPTY_TREE.to_string();
    let git_writer = Arc::new(GitObjectWriter::new(git.clone(), "u1", "main", author()));
    let db = open_db(&dir);
    let sqlite_writer = SqliteWriter::new(git.clone(), git_writer, db.clone());

    let t1 = "1".repeat(40);
    let mut save = blank_node("save", &genesis, &t1);
    save.content = "hi";
    save.summary = Some("explicit summary".to_owned());
    let node = sqlite_writer.create_node(save).unwrap();

    let rows = db.select_all_nodes().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].commit_hash, node.commit_hash);
    assert_eq!(rows[0].summary, "explicit summary");
}

#[test]
fn subscription_mirror_ref_resolves_to_subscribed_owner() {
    let (dir, git) = init_repo();
    let genesis = Oid::EMPTY_TREE.to_string();
    let owner_writer = GitObjectWriter::new(git.clone(), "owner-a", "main", author());
    let t1 = "1".repeat(40);
    owner_writer.create_node(blank_node("capture", &genesis, &t1)).unwrap();

    // Simulate a fetched mirror of owner-a's heads under the local repo.
    let owner_head = git.read_ref("refs/quipu/local/heads/main").unwrap().unwrap();
    let mirror_ref = refs_layout::remote_mirror_head_ref("origin", "owner-a", "main");
    git.update_ref(&mirror_ref, owner_head, Oid::ZERO).unwrap();

    let db = open_db(&dir);
    let hydrator = Hydrator::new(git.clone(), db.clone());
    hydrator.sync("local-user").unwrap();

    let rows = db.select_all_nodes().unwrap();
    assert!(rows.iter().any(|r| r.owner_id == "owner-a"));
}

#[test]
fn legacy_history_directory_is_detected_and_isolated_from_git_refs() {
    let dir = tempfile::tempdir().unwrap();
    gix::init(dir.path()).unwrap();
    let history_dir = dir.path().join(".quipu/history");
    std::fs::create_dir_all(&history_dir).unwrap();
    std::fs::write(
        history_dir.join("dummy.md"),
        "---\ntype: plan\ninput_tree: a\noutput_tree: b\n---\n\nbody\n",
    )
    .unwrap();

    assert!(is_legacy_history_dir(&history_dir));

    let writer = FileSystemHistoryWriter::new(history_dir.clone()).unwrap();
    let genesis = Oid::EMPTY_TREE.to_string();
    let c1 = "c".repeat(40);
    let mut plan = blank_node("plan", &genesis, &c1);
    plan.content = "new plan";
    writer.create_node(plan).unwrap();

    let reader = FileSystemHistoryReader::new(history_dir.clone()).unwrap();
    let graph = reader.load_all_nodes().unwrap();
    assert_eq!(graph.nodes.len(), 2);

    let git = GitDb::open(dir.path()).unwrap();
    let quipu_refs = git.get_all_ref_heads("refs/quipu/").unwrap();
    assert!(quipu_refs.is_empty());
}
