//! SQLite skill store: document rows, an FTS5 keyword index and stored embeddings.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, Row, params, params_from_iter};
use tracing::debug;

use super::error::{StorageError, StorageResult};
use super::model::{KeywordHit, SearchFilters, SkillDocument, query_terms};
use super::store::{DocumentStore, KeywordIndex};
use crate::embedding::cosine_similarity;
use crate::vectordb::client::rank_by_similarity;
use crate::vectordb::{
    SearchResult, VectorDbError, VectorIndex, VectorPoint, embedding_bytes_to_f32,
    f32_to_embedding_bytes,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// bm25() weights follow the FTS column order: id (unindexed), name, description, tags.
const BM25_WEIGHTS: &str = "0.0, 10.0, 4.0, 6.0";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS skills (
    id          TEXT PRIMARY KEY NOT NULL,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    tags        TEXT NOT NULL DEFAULT '[]',
    source      TEXT,
    category    TEXT,
    quality     REAL NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_skills_quality ON skills(quality);
CREATE VIRTUAL TABLE IF NOT EXISTS skills_fts USING fts5(
    id UNINDEXED,
    name,
    description,
    tags
);
CREATE TABLE IF NOT EXISTS skill_embeddings (
    id     TEXT PRIMARY KEY NOT NULL,
    dim    INTEGER NOT NULL,
    vector BLOB NOT NULL
);
";

/// Builds an FTS5 MATCH expression from plain user text.
///
/// Every term is quoted and the terms are OR-joined, so operators and column filters in the
/// input are matched literally. `None` when the text has no searchable term.
pub fn fts_query(text: &str) -> Option<String> {
    let terms = query_terms(text);
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

/// Documents, keyword index and embeddings in one SQLite database.
#[derive(Clone)]
pub struct SqliteSkillStore {
    conn: Arc<Mutex<Connection>>,
    dim: usize,
}

impl std::fmt::Debug for SqliteSkillStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSkillStore")
            .field("dim", &self.dim)
            .finish()
    }
}

impl SqliteSkillStore {
    /// Opens (or creates) the store at `path` for embeddings of length `dim`.
    pub fn open(path: impl AsRef<Path>, dim: usize) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Io(format!("{}: {}", parent.display(), e)))?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::from_connection(conn, dim)
    }

    pub fn open_in_memory(dim: usize) -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, dim)
    }

    fn from_connection(conn: Connection, dim: usize) -> StorageResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dim,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::TaskJoin(e.to_string()))?
    }
}

fn write_document(conn: &Connection, doc: &SkillDocument) -> StorageResult<()> {
    let tags = serde_json::to_string(&doc.tags)?;
    conn.execute(
        "INSERT OR REPLACE INTO skills (id, name, description, tags, source, category, quality)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            doc.id,
            doc.name,
            doc.description,
            tags,
            doc.source,
            doc.category,
            doc.quality
        ],
    )?;
    conn.execute("DELETE FROM skills_fts WHERE id = ?1", params![doc.id])?;
    conn.execute(
        "INSERT INTO skills_fts (id, name, description, tags) VALUES (?1, ?2, ?3, ?4)",
        params![doc.id, doc.name, doc.description, doc.tags.join(" ")],
    )?;
    Ok(())
}

fn map_document(row: &Row<'_>) -> rusqlite::Result<SkillDocument> {
    let tags: String = row.get(3)?;
    let tags: Vec<String> = serde_json::from_str(&tags).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e))
    })?;

    Ok(SkillDocument {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        tags,
        source: row.get(4)?,
        category: row.get(5)?,
        quality: row.get(6)?,
    })
}

impl DocumentStore for SqliteSkillStore {
    async fn upsert(&self, doc: SkillDocument) -> StorageResult<()> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            write_document(&tx, &doc)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn upsert_many(&self, docs: Vec<SkillDocument>) -> StorageResult<usize> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            for doc in &docs {
                write_document(&tx, doc)?;
            }
            tx.commit()?;
            Ok(docs.len())
        })
        .await
    }

    async fn get_by_ids(
        &self,
        ids: &[String],
        filters: &SearchFilters,
    ) -> StorageResult<Vec<SkillDocument>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let mut sql = format!(
            "SELECT id, name, description, tags, source, category, quality
             FROM skills WHERE id IN ({})",
            placeholders
        );
        let mut values: Vec<Value> = ids.iter().cloned().map(Value::Text).collect();
        if let Some(source) = &filters.source {
            sql.push_str(" AND source = ?");
            values.push(Value::Text(source.clone()));
        }
        if let Some(category) = &filters.category {
            sql.push_str(" AND category = ?");
            values.push(Value::Text(category.clone()));
        }
        if let Some(min_quality) = filters.min_quality {
            sql.push_str(" AND quality >= ?");
            values.push(Value::Real(min_quality));
        }

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let docs = stmt
                .query_map(params_from_iter(values), map_document)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(docs)
        })
        .await
    }

    async fn count(&self) -> StorageResult<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM skills", [], |row| row.get(0))?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
        .await
    }
}

impl KeywordIndex for SqliteSkillStore {
    async fn search(&self, query: &str, limit: usize) -> StorageResult<Vec<KeywordHit>> {
        let Some(expr) = fts_query(query) else {
            return Ok(Vec::new());
        };
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let hits = self
            .with_conn(move |conn| {
                let sql = format!(
                    "SELECT id, bm25(skills_fts, {}) AS score
                     FROM skills_fts WHERE skills_fts MATCH ?1
                     ORDER BY score, id LIMIT ?2",
                    BM25_WEIGHTS
                );
                let mut stmt = conn.prepare(&sql)?;
                let hits = stmt
                    .query_map(params![expr, limit], |row| {
                        Ok(KeywordHit::new(row.get::<_, String>(0)?, row.get(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(hits)
            })
            .await?;
        debug!(hits = hits.len(), "FTS keyword search");
        Ok(hits)
    }
}

fn to_vector_error(e: StorageError) -> VectorDbError {
    VectorDbError::SearchFailed {
        message: e.to_string(),
    }
}

impl VectorIndex for SqliteSkillStore {
    async fn upsert_vectors(&self, points: Vec<VectorPoint>) -> Result<(), VectorDbError> {
        for point in &points {
            if point.vector.len() != self.dim {
                return Err(VectorDbError::InvalidDimension {
                    expected: self.dim,
                    actual: point.vector.len(),
                });
            }
        }

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            for point in &points {
                tx.execute(
                    "INSERT OR REPLACE INTO skill_embeddings (id, dim, vector) VALUES (?1, ?2, ?3)",
                    params![
                        point.id,
                        point.vector.len() as i64,
                        f32_to_embedding_bytes(&point.vector)
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| VectorDbError::UpsertFailed {
            message: e.to_string(),
        })
    }

    async fn find_similar(
        &self,
        query: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<SearchResult>, VectorDbError> {
        if query.len() != self.dim {
            return Err(VectorDbError::InvalidDimension {
                expected: self.dim,
                actual: query.len(),
            });
        }
        let dim = self.dim as i64;

        let rows: Vec<(String, Vec<u8>)> = self
            .with_conn(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT id, vector FROM skill_embeddings WHERE dim = ?1")?;
                let rows = stmt
                    .query_map(params![dim], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(to_vector_error)?;

        let mut hits = Vec::with_capacity(rows.len());
        for (id, blob) in rows {
            let vector = embedding_bytes_to_f32(&blob)?;
            hits.push(SearchResult::new(id, cosine_similarity(&query, &vector)));
        }
        Ok(rank_by_similarity(hits, limit))
    }

    async fn delete_vectors(&self, ids: Vec<String>) -> Result<(), VectorDbError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            for id in &ids {
                tx.execute("DELETE FROM skill_embeddings WHERE id = ?1", params![id])?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| VectorDbError::DeleteFailed {
            message: e.to_string(),
        })
    }
}
