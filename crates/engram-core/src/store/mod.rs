//! Document Store Adapter
//!
//! A narrow capability over embedded SQLite: upsert / get / delete /
//! query-by-similarity, with metadata predicate filtering. The store is
//! a single flat collection; all typing and scoping lives in metadata.
//!
//! Concurrency: split reader/writer connections, each behind a `Mutex`,
//! so the adapter is `Send + Sync` and conflicting writes to the same ID
//! serialize here. All operations are idempotent by ID.

pub mod filter;

pub use filter::WhereFilter;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection};
use serde_json::Value;

use crate::document::{now_iso, validate_metadata};
use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{lock_poisoned, EngramError, Result};

// ============================================================================
// TYPES
// ============================================================================

/// A document as read back from the collection
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: String,
    pub text: String,
    pub metadata: Value,
    /// Present when the read requested embeddings
    pub embedding: Option<Vec<f32>>,
}

/// A document going into the collection. When `embedding` is omitted the
/// store computes one from the text.
#[derive(Debug, Clone)]
pub struct DocumentEntry {
    pub id: String,
    pub text: String,
    pub metadata: Value,
    pub embedding: Option<Vec<f32>>,
}

impl DocumentEntry {
    pub fn new(id: impl Into<String>, text: impl Into<String>, metadata: Value) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata,
            embedding: None,
        }
    }
}

/// A nearest-neighbor hit with its vector distance (1 - cosine)
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub document: StoredDocument,
    pub distance: f32,
}

// ============================================================================
// COLLECTION
// ============================================================================

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    body TEXT NOT NULL,
    metadata TEXT NOT NULL,
    embedding BLOB,
    dimensions INTEGER NOT NULL DEFAULT 0,
    indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_indexed_at ON documents(indexed_at);
"#;

/// The single flat document collection
pub struct Collection {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    embedder: Arc<Embedder>,
}

impl Collection {
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Open (or create) the collection at `db_path`
    pub fn open(db_path: PathBuf, embedder: Arc<Embedder>) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let writer = Connection::open(&db_path)?;
        Self::configure_connection(&writer)?;
        writer.execute_batch(SCHEMA)?;

        let reader = Connection::open(&db_path)?;
        Self::configure_connection(&reader)?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            embedder,
        })
    }

    /// The embedder backing this collection
    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    /// Upsert a batch of documents in one transaction.
    ///
    /// Metadata is validated against the taxonomy before anything is
    /// written; an `indexed_at` stamp is added if absent.
    pub fn upsert(&self, entries: Vec<DocumentEntry>) -> Result<usize> {
        for entry in &entries {
            validate_metadata(&entry.metadata)?;
        }

        let mut writer = self.writer.lock().map_err(|_| lock_poisoned("store writer"))?;
        let tx = writer.transaction()?;
        let count = entries.len();

        for mut entry in entries {
            let embedding = entry
                .embedding
                .take()
                .unwrap_or_else(|| self.embedder.embed(&entry.text));

            if entry.metadata.get("indexed_at").is_none() {
                if let Some(obj) = entry.metadata.as_object_mut() {
                    obj.insert("indexed_at".to_string(), Value::String(now_iso()));
                }
            }

            tx.execute(
                "INSERT INTO documents (id, body, metadata, embedding, dimensions, indexed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                     body = excluded.body,
                     metadata = excluded.metadata,
                     embedding = excluded.embedding,
                     dimensions = excluded.dimensions,
                     indexed_at = excluded.indexed_at",
                params![
                    entry.id,
                    entry.text,
                    serde_json::to_string(&entry.metadata)?,
                    embedding_to_bytes(&embedding),
                    embedding.len() as i64,
                    now_iso(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }

    /// Fetch documents by ID; missing IDs are silently skipped
    pub fn get_by_ids(&self, ids: &[String]) -> Result<Vec<StoredDocument>> {
        let reader = self.reader.lock().map_err(|_| lock_poisoned("store reader"))?;
        let mut out = Vec::with_capacity(ids.len());
        let mut stmt =
            reader.prepare("SELECT id, body, metadata, embedding FROM documents WHERE id = ?1")?;
        for id in ids {
            let row = stmt
                .query_row(params![id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<Vec<u8>>>(3)?,
                    ))
                })
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            if let Some((id, body, meta, blob)) = row {
                out.push(StoredDocument {
                    id,
                    text: body,
                    metadata: serde_json::from_str(&meta)?,
                    embedding: blob.as_deref().map(bytes_to_embedding),
                });
            }
        }
        Ok(out)
    }

    /// Fetch a single document by ID
    pub fn get_one(&self, id: &str) -> Result<StoredDocument> {
        self.get_by_ids(std::slice::from_ref(&id.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| EngramError::NotFound(format!("document: {}", id)))
    }

    /// Fetch all documents matching a filter (all documents when `None`).
    /// Embeddings are not loaded on this path.
    pub fn get_where(&self, filter: Option<&WhereFilter>) -> Result<Vec<StoredDocument>> {
        let reader = self.reader.lock().map_err(|_| lock_poisoned("store reader"))?;
        let mut stmt = reader.prepare("SELECT id, body, metadata FROM documents ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, body, meta) = row?;
            let metadata: Value = serde_json::from_str(&meta)?;
            if filter.map(|f| f.matches(&metadata)).unwrap_or(true) {
                out.push(StoredDocument {
                    id,
                    text: body,
                    metadata,
                    embedding: None,
                });
            }
        }
        Ok(out)
    }

    /// Delete documents by ID; returns how many rows were removed
    pub fn delete_ids(&self, ids: &[String]) -> Result<usize> {
        let mut writer = self.writer.lock().map_err(|_| lock_poisoned("store writer"))?;
        let tx = writer.transaction()?;
        let mut deleted = 0;
        for id in ids {
            deleted += tx.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(deleted)
    }

    /// Delete all documents matching a filter
    pub fn delete_where(&self, filter: &WhereFilter) -> Result<usize> {
        let ids: Vec<String> = self
            .get_where(Some(filter))?
            .into_iter()
            .map(|d| d.id)
            .collect();
        self.delete_ids(&ids)
    }

    /// Nearest-neighbor query over the filtered collection.
    ///
    /// Embeds the query text, scans matching rows, and returns the
    /// `top_k` by cosine distance. Ties break toward the lower ID so
    /// results are deterministic for identical state.
    pub fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&WhereFilter>,
    ) -> Result<Vec<QueryHit>> {
        let query_vector = self.embedder.embed_query(text);

        let reader = self.reader.lock().map_err(|_| lock_poisoned("store reader"))?;
        let mut stmt =
            reader.prepare("SELECT id, body, metadata, embedding FROM documents")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<Vec<u8>>>(3)?,
            ))
        })?;

        let mut hits: Vec<QueryHit> = Vec::new();
        for row in rows {
            let (id, body, meta, blob) = row?;
            let metadata: Value = serde_json::from_str(&meta)?;
            if !filter.map(|f| f.matches(&metadata)).unwrap_or(true) {
                continue;
            }
            let Some(blob) = blob else { continue };
            let embedding = bytes_to_embedding(&blob);
            let similarity = cosine_similarity(&query_vector, &embedding);
            hits.push(QueryHit {
                document: StoredDocument {
                    id,
                    text: body,
                    metadata,
                    embedding: None,
                },
                distance: 1.0 - similarity,
            });
        }

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Total number of documents
    pub fn count(&self) -> Result<usize> {
        let reader = self.reader.lock().map_err(|_| lock_poisoned("store reader"))?;
        let count: i64 = reader.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

// ============================================================================
// EMBEDDING SERIALIZATION
// ============================================================================

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_test_collection() -> (TempDir, Collection) {
        let dir = TempDir::new().unwrap();
        let collection =
            Collection::open(dir.path().join("engram.db"), Arc::new(Embedder::new())).unwrap();
        (dir, collection)
    }

    fn note_entry(id: &str, text: &str, repo: &str) -> DocumentEntry {
        DocumentEntry::new(
            id,
            text,
            json!({
                "type": "note",
                "repository": repo,
                "branch": "main",
                "status": "active",
                "created_at": now_iso(),
            }),
        )
    }

    #[test]
    fn test_upsert_and_get_roundtrip() {
        let (_dir, collection) = open_test_collection();
        collection
            .upsert(vec![note_entry("note:1", "decision about retries", "repo")])
            .unwrap();

        let doc = collection.get_one("note:1").unwrap();
        assert_eq!(doc.text, "decision about retries");
        assert_eq!(doc.metadata["type"], "note");
        assert!(doc.metadata.get("indexed_at").is_some());
    }

    #[test]
    fn test_upsert_is_idempotent_by_id() {
        let (_dir, collection) = open_test_collection();
        collection
            .upsert(vec![note_entry("note:1", "first", "repo")])
            .unwrap();
        collection
            .upsert(vec![note_entry("note:1", "second", "repo")])
            .unwrap();

        assert_eq!(collection.count().unwrap(), 1);
        assert_eq!(collection.get_one("note:1").unwrap().text, "second");
    }

    #[test]
    fn test_upsert_rejects_invalid_metadata() {
        let (_dir, collection) = open_test_collection();
        let entry = DocumentEntry::new("bad:1", "text", json!({"type": "bogus"}));
        let err = collection.upsert(vec![entry]).unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
        assert_eq!(collection.count().unwrap(), 0);
    }

    #[test]
    fn test_get_where_filters_by_metadata() {
        let (_dir, collection) = open_test_collection();
        collection
            .upsert(vec![
                note_entry("note:1", "alpha", "repo-a"),
                note_entry("note:2", "beta", "repo-b"),
            ])
            .unwrap();

        let filter = WhereFilter::eq("repository", "repo-a");
        let docs = collection.get_where(Some(&filter)).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "note:1");
    }

    #[test]
    fn test_delete_by_ids_and_where() {
        let (_dir, collection) = open_test_collection();
        collection
            .upsert(vec![
                note_entry("note:1", "alpha", "repo-a"),
                note_entry("note:2", "beta", "repo-b"),
                note_entry("note:3", "gamma", "repo-b"),
            ])
            .unwrap();

        assert_eq!(collection.delete_ids(&["note:1".to_string()]).unwrap(), 1);
        assert_eq!(
            collection
                .delete_where(&WhereFilter::eq("repository", "repo-b"))
                .unwrap(),
            2
        );
        assert_eq!(collection.count().unwrap(), 0);
    }

    #[test]
    fn test_query_orders_by_similarity() {
        let (_dir, collection) = open_test_collection();
        collection
            .upsert(vec![
                note_entry("note:1", "python programming is fun", "repo"),
                note_entry("note:2", "chrono timestamp arithmetic helpers", "repo"),
            ])
            .unwrap();

        let hits = collection
            .query("python programming language", 10, None)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.id, "note:1");
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn test_query_empty_collection_is_not_an_error() {
        let (_dir, collection) = open_test_collection();
        let hits = collection.query("anything", 5, None).unwrap();
        assert!(hits.is_empty());
    }
}
