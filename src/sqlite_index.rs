//! SQLite-backed [`VectorIndex`].
//!
//! Records live in the `chunk_records` table, scoped by a collection name.
//! Vectors are stored as little-endian f32 BLOBs ([`vec_to_blob`]); queries
//! load every vector in the collection and rank by exact cosine distance.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use docchat_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use docchat_core::index::{IndexedDocument, VectorIndex};
use docchat_core::models::{ChunkMetadata, IndexedRecord, ScoredChunk};
use docchat_core::{Error, Result};

const BACKEND: &str = "sqlite";

fn db_err(e: sqlx::Error) -> Error {
    Error::index(BACKEND, e.to_string())
}

/// Persistent vector index over a shared [`SqlitePool`].
pub struct SqliteIndex {
    pool: SqlitePool,
    collection: String,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool, collection: impl Into<String>) -> Self {
        Self {
            pool,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    fn backend_name(&self) -> &str {
        BACKEND
    }

    async fn upsert(&self, records: &[IndexedRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO chunk_records (collection, id, doc_id, doc_name, chunk_index, text, dims, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    doc_id = excluded.doc_id,
                    doc_name = excluded.doc_name,
                    chunk_index = excluded.chunk_index,
                    text = excluded.text,
                    dims = excluded.dims,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&self.collection)
            .bind(&record.id)
            .bind(&record.metadata.doc_id)
            .bind(&record.metadata.doc_name)
            .bind(record.metadata.chunk_index as i64)
            .bind(&record.text)
            .bind(record.vector.len() as i64)
            .bind(vec_to_blob(&record.vector))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let rows = sqlx::query(
            "SELECT doc_id, doc_name, chunk_index, text, dims, embedding FROM chunk_records WHERE collection = ?",
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut mismatched = 0usize;
        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let dims: i64 = row.get("dims");
            if dims as usize != vector.len() {
                mismatched += 1;
            }
            let blob: Vec<u8> = row.get("embedding");
            let chunk_index: i64 = row.get("chunk_index");
            scored.push(ScoredChunk {
                text: row.get("text"),
                metadata: ChunkMetadata {
                    doc_id: row.get("doc_id"),
                    doc_name: row.get("doc_name"),
                    chunk_index: chunk_index as usize,
                },
                distance: cosine_distance(vector, &blob_to_vec(&blob)),
            });
        }

        if mismatched > 0 {
            warn!(
                collection = %self.collection,
                mismatched,
                query_dims = vector.len(),
                "records with different dimensions scored as unrelated"
            );
        }

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete_document(&self, doc_id: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM chunk_records WHERE collection = ? AND doc_id = ?")
            .bind(&self.collection)
            .bind(doc_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() as usize)
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_records WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(n as usize)
    }

    async fn list_documents(&self) -> Result<Vec<IndexedDocument>> {
        let rows = sqlx::query(
            r#"
            SELECT doc_id, MIN(doc_name) AS doc_name, COUNT(*) AS chunks
            FROM chunk_records
            WHERE collection = ?
            GROUP BY doc_id
            ORDER BY doc_name, doc_id
            "#,
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .iter()
            .map(|row| {
                let chunks: i64 = row.get("chunks");
                IndexedDocument {
                    doc_id: row.get("doc_id"),
                    doc_name: row.get("doc_name"),
                    chunks: chunks as usize,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};
    use docchat_core::models::record_id;

    async fn index(dir: &tempfile::TempDir, collection: &str) -> SqliteIndex {
        let pool = db::connect_path(&dir.path().join("index.sqlite"))
            .await
            .unwrap();
        migrate::apply_schema(&pool).await.unwrap();
        SqliteIndex::new(pool, collection)
    }

    fn record(doc: &str, i: usize, vector: Vec<f32>) -> IndexedRecord {
        IndexedRecord {
            id: record_id(doc, i),
            vector,
            text: format!("{} text {}", doc, i),
            metadata: ChunkMetadata {
                doc_id: doc.to_string(),
                doc_name: format!("{}.txt", doc),
                chunk_index: i,
            },
        }
    }

    #[tokio::test]
    async fn test_upsert_query_delete() {
        let dir = tempfile::tempdir().unwrap();
        let index = index(&dir, "docchat").await;

        index
            .upsert(&[
                record("a", 0, vec![1.0, 0.0]),
                record("a", 1, vec![0.0, 1.0]),
                record("b", 0, vec![0.6, 0.8]),
            ])
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 3);

        let hits = index.query(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata.doc_id, "a");
        assert_eq!(hits[0].metadata.chunk_index, 0);
        assert!(hits[0].distance < 1e-6);
        assert_eq!(hits[1].metadata.doc_id, "b");
        assert!((hits[1].distance - 0.4).abs() < 1e-5);

        assert_eq!(index.delete_document("a").await.unwrap(), 2);
        let hits = index.query(&[1.0, 0.0], 10).await.unwrap();
        assert!(hits.iter().all(|h| h.metadata.doc_id != "a"));
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_id() {
        let dir = tempfile::tempdir().unwrap();
        let index = index(&dir, "docchat").await;

        index.upsert(&[record("a", 0, vec![1.0, 0.0])]).await.unwrap();
        index.upsert(&[record("a", 0, vec![0.0, 1.0])]).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
        let hits = index.query(&[0.0, 1.0], 1).await.unwrap();
        assert!(hits[0].distance < 1e-6);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let first = index(&dir, "first").await;
        let second = index(&dir, "second").await;

        first.upsert(&[record("a", 0, vec![1.0])]).await.unwrap();
        assert_eq!(first.count().await.unwrap(), 1);
        assert_eq!(second.count().await.unwrap(), 0);
        assert!(second.query(&[1.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_documents_groups_by_doc() {
        let dir = tempfile::tempdir().unwrap();
        let index = index(&dir, "docchat").await;
        index
            .upsert(&[
                record("b", 0, vec![1.0]),
                record("a", 0, vec![1.0]),
                record("a", 1, vec![1.0]),
            ])
            .await
            .unwrap();

        let docs = index.list_documents().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].doc_id, "a");
        assert_eq!(docs[0].chunks, 2);
        assert_eq!(docs[1].doc_name, "b.txt");
    }

    #[tokio::test]
    async fn test_mixed_dimensions_score_as_unrelated() {
        let dir = tempfile::tempdir().unwrap();
        let index = index(&dir, "docchat").await;
        index
            .upsert(&[record("a", 0, vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        let hits = index.query(&[1.0, 0.0], 1).await.unwrap();
        assert!((hits[0].distance - 1.0).abs() < 1e-6);
    }
}
