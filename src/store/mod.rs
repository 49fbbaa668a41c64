//! Similarity index abstraction.
//!
//! The [`VectorStore`] trait is the retrieval service boundary: named
//! collections of records (id, text, source, vector) queried by cosine
//! similarity with an optional exact-match source filter. A missing
//! collection is reported as [`StoreError::CollectionNotFound`], which
//! callers treat differently from an empty result.
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`sqlite::SqliteStore`] | persistent index file (production) |
//! | [`memory::InMemoryStore`] | tests and embedding-free experiments |

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::embedding::cosine_similarity;
use crate::models::{IndexedRecord, RecordMatch};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("collection not found: {0}")]
    CollectionNotFound(String),
    #[error("index database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("index error: {0}")]
    Other(String),
}

/// A stored record without its vector.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StoredRecord {
    pub id: String,
    pub text: String,
    pub source: String,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Delete `name`, recreate it for cosine search and insert `records`.
    async fn replace_collection(
        &self,
        name: &str,
        records: &[IndexedRecord],
    ) -> Result<(), StoreError>;

    /// Top-`k` records by cosine similarity, most similar first.
    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        k: usize,
        source: Option<&str>,
    ) -> Result<Vec<RecordMatch>, StoreError>;

    /// Every record of a collection in insertion order.
    async fn records(&self, name: &str) -> Result<Vec<StoredRecord>, StoreError>;

    /// Release any held resources.
    async fn close(&self) {}
}

/// Score candidates against `vector` and keep the best `k`.
///
/// Ties keep insertion order, so identical indexes answer identically.
pub(crate) fn rank_candidates<I>(vector: &[f32], candidates: I, k: usize) -> Vec<RecordMatch>
where
    I: IntoIterator<Item = (StoredRecord, Vec<f32>)>,
{
    let mut scored: Vec<(usize, RecordMatch)> = candidates
        .into_iter()
        .enumerate()
        .map(|(position, (record, embedding))| {
            let score = cosine_similarity(vector, &embedding) as f64;
            (
                position,
                RecordMatch {
                    id: record.id,
                    text: record.text,
                    source: record.source,
                    score,
                },
            )
        })
        .collect();

    scored.sort_by(|(pa, a), (pb, b)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(pa.cmp(pb))
    });
    scored.truncate(k);
    scored.into_iter().map(|(_, m)| m).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> StoredRecord {
        StoredRecord {
            id: id.to_string(),
            text: format!("text {}", id),
            source: "a.docx".to_string(),
        }
    }

    #[test]
    fn ranks_by_similarity_and_truncates() {
        let candidates = vec![
            (record("doc_0"), vec![0.0, 1.0]),
            (record("doc_1"), vec![1.0, 0.0]),
            (record("doc_2"), vec![0.7, 0.7]),
        ];
        let ranked = rank_candidates(&[1.0, 0.0], candidates, 2);
        let ids: Vec<&str> = ranked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["doc_1", "doc_2"]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let candidates = vec![
            (record("doc_0"), vec![1.0, 0.0]),
            (record("doc_1"), vec![1.0, 0.0]),
        ];
        let ranked = rank_candidates(&[1.0, 0.0], candidates, 10);
        assert_eq!(ranked[0].id, "doc_0");
        assert_eq!(ranked[1].id, "doc_1");
    }
}
