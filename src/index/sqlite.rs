//! SQLite index store
//!
//! A local implementation of the [`IndexStore`] contract, used for
//! `--local-index` runs and in tests. Records are kept as JSON text and
//! filtered with SQLite's JSON functions.

use crate::index::schema::{initialize_schema, CONTENT_TABLES};
use crate::index::traits::{
    BrowseFilter, IndexError, IndexResult, IndexStore, Record, SaveRulesOptions,
};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// SQLite-backed index store
pub struct SqliteIndexStore {
    conn: Mutex<Connection>,
}

impl SqliteIndexStore {
    /// Opens or creates an index database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn open(path: &Path) -> IndexResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory store
    pub fn open_in_memory() -> IndexResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns true if the index exists
    pub fn index_exists(&self, name: &str) -> IndexResult<bool> {
        let conn = self.lock();
        Ok(index_exists(&conn, name)?)
    }

    /// Names of every existing index, sorted
    pub fn index_names(&self) -> IndexResult<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT name FROM indexes ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Counts the records of an index
    pub fn count_objects(&self, index: &str) -> IndexResult<u64> {
        self.count_rows("objects", index)
    }

    pub fn count_rules(&self, index: &str) -> IndexResult<u64> {
        self.count_rows("rules", index)
    }

    pub fn count_synonyms(&self, index: &str) -> IndexResult<u64> {
        self.count_rows("synonyms", index)
    }

    fn count_rows(&self, table: &str, index: &str) -> IndexResult<u64> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE index_name = ?1", table),
            params![index],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Fetches one record by object ID
    pub fn get_object(&self, index: &str, object_id: &str) -> IndexResult<Option<Record>> {
        let conn = self.lock();
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM objects WHERE index_name = ?1 AND object_id = ?2",
                params![index, object_id],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| serde_json::from_str(&b).map_err(IndexError::from))
            .transpose()
    }

    /// Fetches the settings of an index
    pub fn get_settings(&self, index: &str) -> IndexResult<Option<Value>> {
        let conn = self.lock();
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM settings WHERE index_name = ?1",
                params![index],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| serde_json::from_str(&b).map_err(IndexError::from))
            .transpose()
    }

    /// Every record of an index, ordered by object ID
    pub fn all_objects(&self, index: &str) -> IndexResult<Vec<Record>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT body FROM objects WHERE index_name = ?1 ORDER BY object_id")?;
        let bodies = stmt
            .query_map(params![index], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        bodies
            .iter()
            .map(|b| serde_json::from_str(b).map_err(IndexError::from))
            .collect()
    }
}

#[async_trait]
impl IndexStore for SqliteIndexStore {
    async fn create_index(&self, name: &str) -> IndexResult<()> {
        let conn = self.lock();
        ensure_index(&conn, name)?;
        Ok(())
    }

    async fn copy_index(&self, src: &str, dst: &str) -> IndexResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        for table in CONTENT_TABLES {
            delete_rows(&tx, table, dst)?;
        }
        if index_exists(&tx, src)? {
            for table in CONTENT_TABLES {
                copy_rows(&tx, table, src, dst)?;
            }
        } else {
            debug!(src, dst, "Copy source does not exist, destination starts empty");
        }
        ensure_index(&tx, dst)?;

        tx.commit()?;
        Ok(())
    }

    async fn copy_rules(&self, src: &str, dst: &str) -> IndexResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        delete_rows(&tx, "rules", dst)?;
        copy_rows(&tx, "rules", src, dst)?;
        ensure_index(&tx, dst)?;

        tx.commit()?;
        Ok(())
    }

    async fn set_settings(&self, index: &str, settings: &Value) -> IndexResult<()> {
        let conn = self.lock();
        ensure_index(&conn, index)?;
        conn.execute(
            "INSERT OR REPLACE INTO settings (index_name, body) VALUES (?1, ?2)",
            params![index, serde_json::to_string(settings)?],
        )?;
        Ok(())
    }

    async fn save_rules(
        &self,
        index: &str,
        rules: &[Value],
        options: SaveRulesOptions,
    ) -> IndexResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        ensure_index(&tx, index)?;
        if options.clear_existing {
            delete_rows(&tx, "rules", index)?;
        }
        if options.forward_to_replicas {
            debug!(index, "Local store has no replicas to forward rules to");
        }
        upsert_bodies(&tx, "rules", index, rules)?;

        tx.commit()?;
        Ok(())
    }

    async fn save_objects(&self, index: &str, batch: &[Record]) -> IndexResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        ensure_index(&tx, index)?;
        let now = Utc::now().to_rfc3339();
        for record in batch {
            let (object_id, body) = with_object_id(record)?;
            tx.execute(
                "INSERT OR REPLACE INTO objects (index_name, object_id, body, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![index, object_id, body, now],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    async fn save_synonyms(&self, index: &str, synonyms: &[Value]) -> IndexResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        ensure_index(&tx, index)?;
        upsert_bodies(&tx, "synonyms", index, synonyms)?;

        tx.commit()?;
        Ok(())
    }

    async fn clear_objects(&self, index: &str) -> IndexResult<()> {
        let conn = self.lock();
        delete_rows(&conn, "objects", index)?;
        Ok(())
    }

    async fn move_index(&self, src: &str, dst: &str) -> IndexResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        if !index_exists(&tx, src)? {
            return Err(IndexError::NotFound(src.to_string()));
        }

        for table in CONTENT_TABLES {
            delete_rows(&tx, table, dst)?;
            tx.execute(
                &format!(
                    "UPDATE {} SET index_name = ?1 WHERE index_name = ?2",
                    table
                ),
                params![dst, src],
            )?;
        }
        tx.execute("DELETE FROM indexes WHERE name = ?1", params![dst])?;
        tx.execute(
            "UPDATE indexes SET name = ?1, updated_at = ?2 WHERE name = ?3",
            params![dst, Utc::now().to_rfc3339(), src],
        )?;

        tx.commit()?;
        Ok(())
    }

    async fn browse_objects(&self, index: &str, filter: &BrowseFilter) -> IndexResult<Vec<String>> {
        let conn = self.lock();

        let mut sql = "SELECT object_id FROM objects WHERE index_name = ?".to_string();
        let mut values = vec![index.to_string()];
        for (attribute, value) in filter.conditions() {
            sql.push_str(" AND json_extract(body, ?) = ?");
            values.push(format!("$.\"{}\"", attribute));
            values.push(value.clone());
        }
        sql.push_str(" ORDER BY object_id");

        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    async fn delete_objects(&self, index: &str, ids: &[String]) -> IndexResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        for id in ids {
            tx.execute(
                "DELETE FROM objects WHERE index_name = ?1 AND object_id = ?2",
                params![index, id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

fn index_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM indexes WHERE name = ?1)",
        params![name],
        |row| row.get(0),
    )
}

fn ensure_index(conn: &Connection, name: &str) -> rusqlite::Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR IGNORE INTO indexes (name, created_at, updated_at) VALUES (?1, ?2, ?2)",
        params![name, now],
    )?;
    Ok(())
}

fn delete_rows(conn: &Connection, table: &str, index: &str) -> rusqlite::Result<()> {
    conn.execute(
        &format!("DELETE FROM {} WHERE index_name = ?1", table),
        params![index],
    )?;
    Ok(())
}

fn copy_rows(tx: &Transaction, table: &str, src: &str, dst: &str) -> rusqlite::Result<()> {
    let columns = match table {
        "objects" => "object_id, body, updated_at",
        "settings" => "body",
        _ => "object_id, body",
    };
    tx.execute(
        &format!(
            "INSERT INTO {table} (index_name, {columns}) SELECT ?1, {columns} FROM {table} WHERE index_name = ?2"
        ),
        params![dst, src],
    )?;
    Ok(())
}

fn upsert_bodies(tx: &Transaction, table: &str, index: &str, bodies: &[Value]) -> IndexResult<()> {
    for value in bodies {
        let (object_id, body) = with_object_id(value)?;
        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (index_name, object_id, body) VALUES (?1, ?2, ?3)",
                table
            ),
            params![index, object_id, body],
        )?;
    }
    Ok(())
}

/// Returns the object ID of `value` and its serialized body
///
/// Values without an `objectID` get one derived from their content, which is
/// also written into the stored body.
fn with_object_id(value: &Value) -> IndexResult<(String, String)> {
    if let Some(id) = value.get("objectID").and_then(Value::as_str) {
        return Ok((id.to_string(), serde_json::to_string(value)?));
    }

    let serialized = serde_json::to_string(value)?;
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    let id = hex::encode(&hasher.finalize()[..12]);

    let mut value = value.clone();
    if let Value::Object(map) = &mut value {
        map.insert("objectID".to_string(), Value::String(id.clone()));
    }
    Ok((id, serde_json::to_string(&value)?))
}
