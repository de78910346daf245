//! Database schema for the local index store
//!
//! Every table is keyed by index name, so an index rename is a single
//! `UPDATE` per table inside one transaction.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Known indexes
CREATE TABLE IF NOT EXISTS indexes (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Records, stored as JSON
CREATE TABLE IF NOT EXISTS objects (
    index_name TEXT NOT NULL,
    object_id TEXT NOT NULL,
    body TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (index_name, object_id)
);

-- Index settings, one JSON document per index
CREATE TABLE IF NOT EXISTS settings (
    index_name TEXT PRIMARY KEY,
    body TEXT NOT NULL
);

-- Query rules
CREATE TABLE IF NOT EXISTS rules (
    index_name TEXT NOT NULL,
    object_id TEXT NOT NULL,
    body TEXT NOT NULL,
    PRIMARY KEY (index_name, object_id)
);

-- Synonyms
CREATE TABLE IF NOT EXISTS synonyms (
    index_name TEXT NOT NULL,
    object_id TEXT NOT NULL,
    body TEXT NOT NULL,
    PRIMARY KEY (index_name, object_id)
);
"#;

/// Tables holding per-index content, in the order they are copied and moved
pub const CONTENT_TABLES: &[&str] = &["objects", "settings", "rules", "synonyms"];

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
