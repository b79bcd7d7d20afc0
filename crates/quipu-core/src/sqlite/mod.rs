//! The SQLite mirror: [`DatabaseManager`] wraps a single `rusqlite`
//! connection behind a mutex (§4.5, §5).

mod schema;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use crate::error::Result;

/// A row in the `nodes` table, as inserted by the Hydrator or
/// `SqliteWriter`.
#[derive(Clone, Debug)]
pub struct NodeRow {
    /// Commit hash, primary key.
    pub commit_hash: String,
    /// Resolved owner id.
    pub owner_id: String,
    /// 40-hex output tree.
    pub output_tree: String,
    /// Node type string.
    pub node_type: String,
    /// Fractional-seconds epoch timestamp.
    pub timestamp: f64,
    /// Summary line.
    pub summary: String,
    /// Generator id, if any.
    pub generator_id: Option<String>,
    /// Raw `metadata.json` text.
    pub meta_json: String,
    /// Cached payload, `None` for cold hydrated rows.
    pub plan_md_cache: Option<String>,
}

/// An owning handle onto `.quipu/history.sqlite`.
///
/// The connection is guarded by a `Mutex` rather than relying on SQLite's
/// own locking, so concurrent callers within one process serialize cleanly
/// instead of retrying on `SQLITE_BUSY`.
pub struct DatabaseManager {
    conn: Mutex<Connection>,
}

impl DatabaseManager {
    /// Open (creating if absent) the SQLite file at `path`, apply the
    /// schema, and switch to WAL mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(schema::SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database, for tests.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(schema::SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// All commit hashes currently present in `nodes`.
    pub fn get_all_node_hashes(&self) -> Result<std::collections::HashSet<String>> {
        let conn = self.conn.lock().expect("sqlite connection mutex poisoned");
        let mut stmt = conn.prepare("SELECT commit_hash FROM nodes")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = std::collections::HashSet::new();
        for row in rows {
            out.insert(row?);
        }
        Ok(out)
    }

    /// Insert or replace a batch of node rows under one transaction.
    pub fn batch_insert_nodes(&self, rows: &[NodeRow]) -> Result<()> {
        let mut conn = self.conn.lock().expect("sqlite connection mutex poisoned");
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO nodes
                 (commit_hash, owner_id, output_tree, node_type, timestamp, summary, generator_id, meta_json, plan_md_cache)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.commit_hash,
                    row.owner_id,
                    row.output_tree,
                    row.node_type,
                    row.timestamp,
                    row.summary,
                    row.generator_id,
                    row.meta_json,
                    row.plan_md_cache,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Insert or ignore a batch of `(child_hash, parent_hash)` edges under
    /// one transaction.
    pub fn batch_insert_edges(&self, edges: &[(String, String)]) -> Result<()> {
        let mut conn = self.conn.lock().expect("sqlite connection mutex poisoned");
        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO edges (child_hash, parent_hash) VALUES (?1, ?2)")?;
            for (child, parent) in edges {
                stmt.execute(params![child, parent])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// All node rows, most recent first.
    pub fn select_all_nodes(&self) -> Result<Vec<NodeRow>> {
        let conn = self.conn.lock().expect("sqlite connection mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT commit_hash, owner_id, output_tree, node_type, timestamp, summary, generator_id, meta_json, plan_md_cache
             FROM nodes ORDER BY timestamp DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(NodeRow {
                commit_hash: row.get(0)?,
                owner_id: row.get(1)?,
                output_tree: row.get(2)?,
                node_type: row.get(3)?,
                timestamp: row.get(4)?,
                summary: row.get(5)?,
                generator_id: row.get(6)?,
                meta_json: row.get(7)?,
                plan_md_cache: row.get(8)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// All `(child_hash, parent_hash)` edges.
    pub fn select_all_edges(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock().expect("sqlite connection mutex poisoned");
        let mut stmt = conn.prepare("SELECT child_hash, parent_hash FROM edges")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Insert a single node row (used by `SqliteWriter::create_node`).
    pub fn upsert_node(&self, row: &NodeRow) -> Result<()> {
        self.batch_insert_nodes(std::slice::from_ref(row))
    }

    /// Insert a single edge, ignoring if already present.
    pub fn insert_edge(&self, child_hash: &str, parent_hash: &str) -> Result<()> {
        self.batch_insert_edges(&[(child_hash.to_owned(), parent_hash.to_owned())])
    }

    /// Back-fill `plan_md_cache` for a node whose content was just fetched
    /// through the read-through path.
    pub fn backfill_plan_cache(&self, commit_hash: &str, content: &str) -> Result<()> {
        let conn = self.conn.lock().expect("sqlite connection mutex poisoned");
        conn.execute(
            "UPDATE nodes SET plan_md_cache = ?1 WHERE commit_hash = ?2",
            params![content, commit_hash],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(hash: &str) -> NodeRow {
        NodeRow {
            commit_hash: hash.to_owned(),
            owner_id: "u1".to_owned(),
            output_tree: "t".to_owned(),
            node_type: "capture".to_owned(),
            timestamp: 1.0,
            summary: "s".to_owned(),
            generator_id: None,
            meta_json: "{}".to_owned(),
            plan_md_cache: None,
        }
    }

    #[test]
    fn batch_insert_is_idempotent() {
        let db = DatabaseManager::open_in_memory().unwrap();
        db.batch_insert_nodes(&[row("a")]).unwrap();
        db.batch_insert_nodes(&[row("a")]).unwrap();
        assert_eq!(db.select_all_nodes().unwrap().len(), 1);
    }

    #[test]
    fn backfill_updates_plan_cache() {
        let db = DatabaseManager::open_in_memory().unwrap();
        db.batch_insert_nodes(&[row("a")]).unwrap();
        db.backfill_plan_cache("a", "hello").unwrap();
        let rows = db.select_all_nodes().unwrap();
        assert_eq!(rows[0].plan_md_cache.as_deref(), Some("hello"));
    }

    #[test]
    fn edges_ignore_duplicates() {
        let db = DatabaseManager::open_in_memory().unwrap();
        db.insert_edge("a", "b").unwrap();
        db.insert_edge("a", "b").unwrap();
        assert_eq!(db.select_all_edges().unwrap().len(), 1);
    }
}
