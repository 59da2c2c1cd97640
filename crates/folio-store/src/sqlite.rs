//! SQLite persistence for the vector index.
//!
//! The database holds exactly one index generation. `save` replaces it in a
//! single transaction, so a crash mid-save leaves the previous generation
//! intact.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::index::VectorIndex;
use crate::schema::SCHEMA_SQL;
use folio_core::{Error, Result};
use folio_ingest::Chunk;

const DB_FILE: &str = "folio.db";

const META_MODEL: &str = "model_name";
const META_DIMENSION: &str = "dimension";
const META_BUILT_AT: &str = "built_at";

/// File-backed store for one persisted index generation.
pub struct IndexStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl IndexStore {
    /// Open or create the store. The file will be `dir/folio.db`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = dir.join(DB_FILE);

        let conn = Self::create_connection(&db_path)?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        debug!("IndexStore opened at {}", db_path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Persist `index`, replacing whatever generation was stored before.
    pub fn save(&self, index: &VectorIndex) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;

        tx.execute_batch("DELETE FROM index_chunks; DELETE FROM index_meta;")
            .map_err(|e| Error::Database(e.to_string()))?;

        {
            let mut insert_chunk = tx
                .prepare(
                    "INSERT INTO index_chunks (id, text, start_offset, end_offset, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(|e| Error::Database(e.to_string()))?;
            for (i, chunk) in index.chunks().iter().enumerate() {
                let blob = vec_to_blob(&index.embedding(i).to_owned());
                insert_chunk
                    .execute(params![
                        chunk.id,
                        chunk.text,
                        chunk.start_offset as i64,
                        chunk.end_offset as i64,
                        blob
                    ])
                    .map_err(|e| Error::Database(e.to_string()))?;
            }

            let mut insert_meta = tx
                .prepare("INSERT INTO index_meta (key, value) VALUES (?1, ?2)")
                .map_err(|e| Error::Database(e.to_string()))?;
            let meta = [
                (META_MODEL, index.model_name().to_string()),
                (META_DIMENSION, index.dimension().to_string()),
                (META_BUILT_AT, index.built_at().to_rfc3339()),
            ];
            for (key, value) in meta {
                insert_meta
                    .execute(params![key, value])
                    .map_err(|e| Error::Database(e.to_string()))?;
            }
        }

        tx.commit().map_err(|e| Error::Database(e.to_string()))?;

        info!(
            "Persisted index: {} chunks, dim={}, path={}",
            index.len(),
            index.dimension(),
            self.db_path.display()
        );
        Ok(())
    }

    /// Load the stored generation. `None` when nothing has been saved yet.
    pub fn load(&self) -> Result<Option<VectorIndex>> {
        let conn = self.conn.lock();

        let Some(model_name) = Self::meta(&conn, META_MODEL)? else {
            return Ok(None);
        };
        let dimension: usize = Self::meta(&conn, META_DIMENSION)?
            .ok_or_else(|| Error::Storage("persisted index has no dimension".into()))?
            .parse()
            .map_err(|e| Error::Storage(format!("invalid persisted dimension: {}", e)))?;
        let built_at = Self::meta(&conn, META_BUILT_AT)?
            .and_then(|raw| match DateTime::parse_from_rfc3339(&raw) {
                Ok(ts) => Some(ts.with_timezone(&Utc)),
                Err(e) => {
                    warn!("Ignoring invalid persisted build time {:?}: {}", raw, e);
                    None
                }
            });

        let mut stmt = conn
            .prepare(
                "SELECT id, text, start_offset, end_offset, embedding
                 FROM index_chunks ORDER BY id",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                let start: i64 = row.get(2)?;
                let end: i64 = row.get(3)?;
                let blob: Vec<u8> = row.get(4)?;
                Ok((
                    Chunk {
                        id: row.get(0)?,
                        text: row.get(1)?,
                        start_offset: start as usize,
                        end_offset: end as usize,
                    },
                    blob,
                ))
            })
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut chunks = Vec::new();
        let mut embeddings = Vec::new();
        for row in rows {
            let (chunk, blob) = row.map_err(|e| Error::Database(e.to_string()))?;
            chunks.push(chunk);
            embeddings.push(blob_to_vec(&blob));
        }

        let mut index = VectorIndex::build(chunks, embeddings, dimension, model_name)?;
        if let Some(built_at) = built_at {
            index = index.with_built_at(built_at);
        }

        info!(
            "Loaded persisted index: {} chunks, dim={}, model={}",
            index.len(),
            index.dimension(),
            index.model_name()
        );
        Ok(Some(index))
    }

    fn meta(conn: &Connection, key: &str) -> Result<Option<String>> {
        conn.query_row(
            "SELECT value FROM index_meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| Error::Database(e.to_string()))
    }
}
