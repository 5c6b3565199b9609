//! Document registry boundary.
//!
//! The registry owns the lifecycle of [`DocumentRecord`]s: the ingestion
//! pipeline creates a record before extraction, updates it once vectors
//! are stored, and deletes it on rollback or removal. The app crate ships
//! a SQLite implementation; [`InMemoryRegistry`] serves tests.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{DocumentRecord, FileType};

/// Persistent store of document records keyed by id.
#[async_trait]
pub trait DocumentRegistry: Send + Sync {
    /// Create a record with a fresh id, `num_chunks = 0` and `embedded = false`.
    async fn create(&self, name: &str, file_type: FileType) -> Result<DocumentRecord>;

    /// Overwrite the mutable fields of an existing record.
    async fn update(&self, record: &DocumentRecord) -> Result<()>;

    /// Delete a record. Deleting a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<DocumentRecord>>;

    /// All records, newest upload first.
    async fn list(&self) -> Result<Vec<DocumentRecord>>;
}

/// Registry held in process memory.
#[derive(Default)]
pub struct InMemoryRegistry {
    records: RwLock<HashMap<String, DocumentRecord>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> Error {
    Error::Registry("lock poisoned".to_string())
}

#[async_trait]
impl DocumentRegistry for InMemoryRegistry {
    async fn create(&self, name: &str, file_type: FileType) -> Result<DocumentRecord> {
        let record = DocumentRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            file_type,
            uploaded_at: Utc::now(),
            num_chunks: 0,
            embedded: false,
        };
        self.records
            .write()
            .map_err(|_| poisoned())?
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update(&self, record: &DocumentRecord) -> Result<()> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        match records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(Error::NotFound(format!("document {}", record.id))),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.records.write().map_err(|_| poisoned())?.remove(id);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        Ok(self.records.read().map_err(|_| poisoned())?.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<DocumentRecord>> {
        let mut all: Vec<DocumentRecord> = self
            .records
            .read()
            .map_err(|_| poisoned())?
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let registry = InMemoryRegistry::new();
        let mut record = registry.create("notes.txt", FileType::Txt).await.unwrap();
        assert!(!record.embedded);
        assert_eq!(record.num_chunks, 0);

        record.embedded = true;
        record.num_chunks = 4;
        registry.update(&record).await.unwrap();

        let fetched = registry.get(&record.id).await.unwrap().unwrap();
        assert!(fetched.embedded);
        assert_eq!(fetched.num_chunks, 4);

        registry.delete(&record.id).await.unwrap();
        assert!(registry.get(&record.id).await.unwrap().is_none());
        registry.delete(&record.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let registry = InMemoryRegistry::new();
        let record = registry.create("a", FileType::Pdf).await.unwrap();
        registry.delete(&record.id).await.unwrap();
        let err = registry.update(&record).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let registry = InMemoryRegistry::new();
        let a = registry.create("same", FileType::Txt).await.unwrap();
        let b = registry.create("same", FileType::Txt).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(registry.list().await.unwrap().len(), 2);
    }
}
