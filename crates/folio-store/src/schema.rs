//! Database schema SQL for the persisted index.

/// One row per chunk with its normalized embedding, plus key/value metadata
/// describing the generation (model name, dimension, build time).
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS index_chunks (
    id INTEGER PRIMARY KEY,
    text TEXT NOT NULL,
    start_offset INTEGER NOT NULL,
    end_offset INTEGER NOT NULL,
    embedding BLOB NOT NULL
);
"#;
