//! SQLite-backed [`DocumentRegistry`] over the `documents` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use docchat_core::models::{DocumentRecord, FileType};
use docchat_core::registry::DocumentRegistry;
use docchat_core::{Error, Result};

fn db_err(e: sqlx::Error) -> Error {
    Error::Registry(e.to_string())
}

pub struct SqliteRegistry {
    pool: SqlitePool,
}

impl SqliteRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &SqliteRow) -> Result<DocumentRecord> {
    let file_type: String = row.get("file_type");
    let uploaded_at: i64 = row.get("uploaded_at");
    let num_chunks: i64 = row.get("num_chunks");
    Ok(DocumentRecord {
        id: row.get("id"),
        name: row.get("name"),
        file_type: file_type.parse::<FileType>().map_err(Error::Registry)?,
        uploaded_at: DateTime::<Utc>::from_timestamp_millis(uploaded_at).unwrap_or_default(),
        num_chunks: num_chunks as usize,
        embedded: row.get("embedded"),
    })
}

#[async_trait]
impl DocumentRegistry for SqliteRegistry {
    async fn create(&self, name: &str, file_type: FileType) -> Result<DocumentRecord> {
        let record = DocumentRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            file_type,
            uploaded_at: Utc::now(),
            num_chunks: 0,
            embedded: false,
        };

        sqlx::query(
            "INSERT INTO documents (id, name, file_type, uploaded_at, num_chunks, embedded) VALUES (?, ?, ?, ?, 0, 0)",
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(record.file_type.as_str())
        .bind(record.uploaded_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(record)
    }

    async fn update(&self, record: &DocumentRecord) -> Result<()> {
        let result = sqlx::query(
            "UPDATE documents SET name = ?, file_type = ?, num_chunks = ?, embedded = ? WHERE id = ?",
        )
        .bind(&record.name)
        .bind(record.file_type.as_str())
        .bind(record.num_chunks as i64)
        .bind(record.embedded)
        .bind(&record.id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("document {}", record.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query(
            "SELECT id, name, file_type, uploaded_at, num_chunks, embedded FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn list(&self) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query(
            "SELECT id, name, file_type, uploaded_at, num_chunks, embedded FROM documents ORDER BY uploaded_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_record).collect()
    }
}
