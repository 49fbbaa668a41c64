//! In-memory [`VectorStore`] implementation for tests.
//!
//! Collections live in a `HashMap` behind `std::sync::RwLock`. Search is
//! the same brute-force cosine ranking the SQLite store uses.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{rank_candidates, StoreError, StoredRecord, VectorStore};
use crate::models::{IndexedRecord, RecordMatch};

/// In-memory store. Cloning the handle is not supported; share it behind `Arc`.
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Vec<IndexedRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::Other("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn replace_collection(
        &self,
        name: &str,
        records: &[IndexedRecord],
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        collections.insert(name.to_string(), records.to_vec());
        Ok(())
    }

    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        k: usize,
        source: Option<&str>,
    ) -> Result<Vec<RecordMatch>, StoreError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        let records = collections
            .get(name)
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))?;

        let candidates = records
            .iter()
            .filter(|r| source.map_or(true, |s| r.source == s))
            .map(|r| {
                (
                    StoredRecord {
                        id: r.id.clone(),
                        text: r.text.clone(),
                        source: r.source.clone(),
                    },
                    r.embedding.clone(),
                )
            });

        Ok(rank_candidates(vector, candidates, k))
    }

    async fn records(&self, name: &str) -> Result<Vec<StoredRecord>, StoreError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        let records = collections
            .get(name)
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))?;
        Ok(records
            .iter()
            .map(|r| StoredRecord {
                id: r.id.clone(),
                text: r.text.clone(),
                source: r.source.clone(),
            })
            .collect())
    }
}
