//! Retriever: question → matching chunk texts.
//!
//! Rewrites the question with the synonym table, embeds it, and asks the
//! store for the top-K chunks, optionally restricted to one source document.
//! When the collection does not exist yet and lazy rebuilding is enabled,
//! the index is built once and the search runs against the fresh collection.
//! With a rebuild lock attached, the lazy build holds it and checks again for
//! the collection first, so concurrent callers build at most once.
//! A filter that matches nothing yields an empty list; the search is never
//! widened to other documents.

use anyhow::{bail, Result};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::index;
use crate::models::RecordMatch;
use crate::rewrite::QueryRewriter;
use crate::store::{StoreError, VectorStore};

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("failed to embed query: {0:#}")]
    QueryEmbedding(anyhow::Error),
}

pub struct Retriever<'a> {
    config: &'a Config,
    provider: &'a dyn EmbeddingProvider,
    store: &'a dyn VectorStore,
    rewriter: QueryRewriter,
    rebuild_lock: Option<&'a Mutex<()>>,
}

impl<'a> Retriever<'a> {
    pub fn new(
        config: &'a Config,
        provider: &'a dyn EmbeddingProvider,
        store: &'a dyn VectorStore,
    ) -> Self {
        Self {
            config,
            provider,
            store,
            rewriter: QueryRewriter::new(config.retrieval.synonyms.clone()),
            rebuild_lock: None,
        }
    }

    /// Serialize lazy rebuilds with every other holder of `lock`.
    pub fn with_rebuild_lock(mut self, lock: &'a Mutex<()>) -> Self {
        self.rebuild_lock = Some(lock);
        self
    }

    /// Chunk texts for `question`, most similar first. Empty means no match.
    pub async fn retrieve(&self, question: &str, filter: Option<&str>) -> Result<Vec<String>> {
        let matches = self.search(question, filter).await?;
        Ok(matches.into_iter().map(|m| m.text).collect())
    }

    /// Like [`retrieve`](Self::retrieve) but keeps ids, sources and scores.
    pub async fn search(&self, question: &str, filter: Option<&str>) -> Result<Vec<RecordMatch>> {
        let query_text = self.rewriter.rewrite(question);
        let query_vec = embedding::embed_query(self.provider, &query_text)
            .await
            .map_err(RetrieveError::QueryEmbedding)?;

        let collection = &self.config.index.collection;
        let top_k = self.config.retrieval.top_k;

        match self.store.query(collection, &query_vec, top_k, filter).await {
            Ok(matches) => Ok(matches),
            Err(StoreError::CollectionNotFound(_)) if self.config.retrieval.lazy_rebuild => {
                let _guard = match self.rebuild_lock {
                    Some(lock) => Some(lock.lock().await),
                    None => None,
                };

                // Built by another caller while we waited for the lock.
                match self.store.query(collection, &query_vec, top_k, filter).await {
                    Err(StoreError::CollectionNotFound(_)) => {}
                    other => return Ok(other?),
                }

                tracing::info!(collection = %collection, "collection missing, rebuilding index");
                index::build_index(self.config, self.provider, self.store).await?;
                match self.store.query(collection, &query_vec, top_k, filter).await {
                    Ok(matches) => Ok(matches),
                    Err(StoreError::CollectionNotFound(name)) => {
                        bail!("collection {} still missing after rebuild", name)
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}
