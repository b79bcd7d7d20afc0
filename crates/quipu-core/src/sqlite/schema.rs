//! DDL for `.quipu/history.sqlite` (§4.5).

/// Schema applied on every `DatabaseManager::open`. Idempotent via
/// `CREATE TABLE IF NOT EXISTS`/`CREATE INDEX IF NOT EXISTS`.
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS nodes (
    commit_hash    TEXT PRIMARY KEY,
    owner_id       TEXT NOT NULL,
    output_tree    TEXT NOT NULL,
    node_type      TEXT NOT NULL,
    timestamp      REAL NOT NULL,
    summary        TEXT NOT NULL,
    generator_id   TEXT,
    meta_json      TEXT NOT NULL,
    plan_md_cache  TEXT
);
CREATE INDEX IF NOT EXISTS idx_nodes_output_tree ON nodes(output_tree);
CREATE INDEX IF NOT EXISTS idx_nodes_owner_id ON nodes(owner_id);
CREATE INDEX IF NOT EXISTS idx_nodes_timestamp ON nodes(timestamp);

CREATE TABLE IF NOT EXISTS edges (
    child_hash  TEXT NOT NULL,
    parent_hash TEXT NOT NULL,
    PRIMARY KEY (child_hash, parent_hash)
);
CREATE INDEX IF NOT EXISTS idx_edges_parent_hash ON edges(parent_hash);

CREATE TABLE IF NOT EXISTS private_data (
    commit_hash TEXT PRIMARY KEY,
    intent_md   TEXT
);
";
