//! Index builder.
//!
//! A build is always a full rebuild: load every document, embed every
//! chunk, then replace the named collection. Nothing is merged with a
//! previous index. The builder takes no lock; callers that can issue
//! concurrent rebuilds must serialize them.

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::answer::credential_missing_message;
use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::loader;
use crate::models::{Corpus, IndexSummary, IndexedRecord};
use crate::store::{StoreError, VectorStore};

#[derive(Debug, Error)]
pub enum IndexError {
    /// The embedding provider needs an API key and the variable is unset.
    #[error("{}", credential_missing_message(.0))]
    MissingCredential(String),
    #[error("no documents loaded: no chunks found in the configured document folders")]
    NoContent,
    #[error("failed to load documents: {0}")]
    Load(anyhow::Error),
    #[error("failed to embed chunks: {0}")]
    Embedding(anyhow::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Load the configured documents and rebuild the index from them.
pub async fn build_index(
    config: &Config,
    provider: &dyn EmbeddingProvider,
    store: &dyn VectorStore,
) -> Result<IndexSummary, IndexError> {
    let corpus = loader::load_documents(config).map_err(IndexError::Load)?;
    build_from_corpus(config, &corpus, provider, store).await
}

/// Rebuild the index from an already-loaded corpus.
pub async fn build_from_corpus(
    config: &Config,
    corpus: &Corpus,
    provider: &dyn EmbeddingProvider,
    store: &dyn VectorStore,
) -> Result<IndexSummary, IndexError> {
    if corpus.is_empty() {
        return Err(IndexError::NoContent);
    }

    let collection = &config.index.collection;
    tracing::info!(
        collection = %collection,
        chunks = corpus.len(),
        model = provider.model_name(),
        "embedding handbook chunks"
    );

    let vectors =
        embedding::embed_batched(provider, &corpus.texts, config.embedding.batch_size)
            .await
            .map_err(IndexError::Embedding)?;

    let records: Vec<IndexedRecord> = corpus
        .iter()
        .zip(vectors)
        .enumerate()
        .map(|(i, ((text, source), embedding))| IndexedRecord {
            id: IndexedRecord::record_id(i),
            text: text.to_string(),
            source: source.to_string(),
            embedding,
        })
        .collect();

    store.replace_collection(collection, &records).await?;

    let documents = corpus.chunk_counts().len();

    let summary = IndexSummary {
        collection: collection.clone(),
        documents,
        records: records.len(),
        model: provider.model_name().to_string(),
        fingerprint: fingerprint(corpus),
    };

    tracing::info!(
        collection = %summary.collection,
        documents = summary.documents,
        records = summary.records,
        "index rebuilt"
    );

    Ok(summary)
}

/// SHA-256 over the corpus contents, stable across identical rebuilds.
fn fingerprint(corpus: &Corpus) -> String {
    let mut hasher = Sha256::new();
    for (text, source) in corpus.iter() {
        hasher.update(source.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;

    struct LengthProvider;

    #[async_trait]
    impl EmbeddingProvider for LengthProvider {
        fn model_name(&self) -> &str {
            "length"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            anyhow::bail!("quota exceeded")
        }
    }

    fn corpus(pairs: &[(&str, &str)]) -> Corpus {
        Corpus {
            texts: pairs.iter().map(|(t, _)| t.to_string()).collect(),
            sources: pairs.iter().map(|(_, s)| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn empty_corpus_is_no_content() {
        let store = InMemoryStore::new();
        let err = build_from_corpus(&Config::minimal(), &Corpus::default(), &LengthProvider, &store)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::NoContent));
    }

    #[tokio::test]
    async fn records_get_sequential_ids_and_sources() {
        let store = InMemoryStore::new();
        let cfg = Config::minimal();
        let c = corpus(&[("one", "a.docx"), ("two", "a.docx"), ("three", "b.docx")]);
        let summary = build_from_corpus(&cfg, &c, &LengthProvider, &store)
            .await
            .unwrap();

        assert_eq!(summary.records, 3);
        assert_eq!(summary.documents, 2);
        assert_eq!(summary.collection, "handbook");

        let records = store.records("handbook").await.unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["doc_0", "doc_1", "doc_2"]);
        assert_eq!(records[2].source, "b.docx");
    }

    #[tokio::test]
    async fn embedding_failure_keeps_previous_collection() {
        let store = InMemoryStore::new();
        let cfg = Config::minimal();
        build_from_corpus(&cfg, &corpus(&[("old", "a.docx")]), &LengthProvider, &store)
            .await
            .unwrap();

        let err = build_from_corpus(&cfg, &corpus(&[("new", "a.docx")]), &FailingProvider, &store)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Embedding(_)));

        let records = store.records("handbook").await.unwrap();
        assert_eq!(records[0].text, "old");
    }

    #[test]
    fn missing_credential_keeps_the_plain_message() {
        let err = IndexError::MissingCredential("OPENAI_API_KEY".into());
        assert_eq!(
            err.to_string(),
            "Error: OPENAI_API_KEY not set. Please add it to the environment."
        );
    }

    #[test]
    fn fingerprint_depends_on_content() {
        let a = fingerprint(&corpus(&[("x", "a.docx")]));
        let b = fingerprint(&corpus(&[("x", "b.docx")]));
        assert_ne!(a, b);
        assert_eq!(a, fingerprint(&corpus(&[("x", "a.docx")])));
    }
}
