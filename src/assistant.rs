//! Public pipeline entry points.
//!
//! [`Assistant`] wires configuration, credentials and a [`Backend`] into
//! the operations a front end needs:
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`load_documents`](Assistant::load_documents) | chunk texts and sources, no network |
//! | [`build_index`](Assistant::build_index) | full rebuild of the similarity index |
//! | [`get_answer`](Assistant::get_answer) | retrieve and answer one question |
//! | [`list_document_names`](Assistant::list_document_names) | sorted document names for filters |
//! | [`index_status`](Assistant::index_status) | whether the index is built, and its size |
//!
//! The backend constructs the service clients and opens the store, so tests
//! can substitute deterministic embedders and generators. The API key is
//! checked before the backend is asked for anything.
//!
//! Explicit rebuilds and the lazy rebuild inside [`get_answer`](Assistant::get_answer)
//! share one async mutex, so one `Assistant` never embeds the corpus twice
//! at the same time.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::answer::{self, REFUSAL};
use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::generation::{GenerationProvider, OpenAIChatProvider};
use crate::index::{self, IndexError};
use crate::loader;
use crate::models::{Corpus, IndexStatus, IndexSummary};
use crate::retriever::Retriever;
use crate::store::sqlite::SqliteStore;
use crate::store::{StoreError, VectorStore};

/// Factory for the external collaborators.
#[async_trait]
pub trait Backend: Send + Sync {
    fn embedder(
        &self,
        config: &Config,
        api_key: Option<&str>,
    ) -> Result<Arc<dyn EmbeddingProvider>>;

    fn generator(&self, config: &Config, api_key: &str) -> Result<Arc<dyn GenerationProvider>>;

    /// Open a fresh handle to the similarity index.
    async fn open_store(&self, config: &Config) -> Result<Arc<dyn VectorStore>>;
}

/// Production backend: HTTP providers and the SQLite index file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceBackend;

#[async_trait]
impl Backend for ServiceBackend {
    fn embedder(
        &self,
        config: &Config,
        api_key: Option<&str>,
    ) -> Result<Arc<dyn EmbeddingProvider>> {
        Ok(Arc::from(embedding::create_provider(
            &config.embedding,
            api_key,
        )?))
    }

    fn generator(&self, config: &Config, api_key: &str) -> Result<Arc<dyn GenerationProvider>> {
        Ok(Arc::new(OpenAIChatProvider::new(&config.generation, api_key)?))
    }

    async fn open_store(&self, config: &Config) -> Result<Arc<dyn VectorStore>> {
        Ok(Arc::new(SqliteStore::open(&config.index.path).await?))
    }
}

/// Read the API key from the configured environment variable.
///
/// Unset and blank values both count as missing.
pub fn read_credential(config: &Config) -> Option<String> {
    std::env::var(&config.credentials.api_key_env)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

pub struct Assistant<B: Backend = ServiceBackend> {
    config: Config,
    backend: B,
    rebuild_lock: Mutex<()>,
}

impl Assistant<ServiceBackend> {
    pub fn new(config: Config) -> Self {
        Self::with_backend(config, ServiceBackend)
    }
}

impl<B: Backend> Assistant<B> {
    pub fn with_backend(config: Config, backend: B) -> Self {
        Self {
            config,
            backend,
            rebuild_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Chunk every configured document. Never touches the network.
    pub fn load_documents(&self) -> Result<Corpus> {
        loader::load_documents(&self.config)
    }

    pub fn list_document_names(&self) -> Result<Vec<String>> {
        loader::list_document_names(&self.config)
    }

    /// Rebuild the index from the current documents.
    ///
    /// Fails with [`IndexError::MissingCredential`] when the embedding
    /// provider needs the API key and it is unset, and with
    /// [`IndexError::NoContent`] when nothing was loaded. Waits for any
    /// rebuild already in progress.
    pub async fn build_index(&self) -> Result<IndexSummary> {
        let api_key = read_credential(&self.config);
        if api_key.is_none() && self.config.embedding.needs_credential() {
            return Err(IndexError::MissingCredential(
                self.config.credentials.api_key_env.clone(),
            )
            .into());
        }

        let provider = self.backend.embedder(&self.config, api_key.as_deref())?;
        let _guard = self.rebuild_lock.lock().await;
        let store = self.backend.open_store(&self.config).await?;
        let result = index::build_index(&self.config, provider.as_ref(), store.as_ref()).await;
        store.close().await;
        Ok(result?)
    }

    /// Report whether the collection exists and how many records it holds.
    /// Needs no credential and never builds anything.
    pub async fn index_status(&self) -> Result<IndexStatus> {
        let collection = self.config.index.collection.clone();
        let store = self.backend.open_store(&self.config).await?;
        let records = store.records(&collection).await;
        store.close().await;

        match records {
            Ok(records) => Ok(IndexStatus {
                collection,
                built: true,
                records: records.len(),
            }),
            Err(StoreError::CollectionNotFound(_)) => Ok(IndexStatus {
                collection,
                built: false,
                records: 0,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Answer `question`, optionally searching only the document named `filter`.
    ///
    /// Returns the credential message when the API key is missing, and
    /// [`REFUSAL`] when nothing relevant was retrieved. Service failures
    /// are returned as errors.
    pub async fn get_answer(&self, question: &str, filter: Option<&str>) -> Result<String> {
        let api_key = match read_credential(&self.config) {
            Some(key) => key,
            None => {
                return Ok(answer::credential_missing_message(
                    &self.config.credentials.api_key_env,
                ))
            }
        };

        if question.trim().is_empty() {
            return Ok(REFUSAL.to_string());
        }
        let filter = filter.filter(|f| !f.is_empty());

        let provider = self.backend.embedder(&self.config, Some(&api_key))?;
        let store = self.backend.open_store(&self.config).await?;
        let retrieved = Retriever::new(&self.config, provider.as_ref(), store.as_ref())
            .with_rebuild_lock(&self.rebuild_lock)
            .retrieve(question, filter)
            .await;
        store.close().await;
        let chunks = retrieved?;

        if chunks.is_empty() {
            tracing::debug!(question, filter, "no relevant chunks, refusing");
            return Ok(REFUSAL.to_string());
        }

        let generator = self.backend.generator(&self.config, &api_key)?;
        let text = answer::answer(
            generator.as_ref(),
            question,
            &chunks,
            self.config.generation.temperature,
        )
        .await?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{GenerationError, GenerationRequest};
    use crate::store::memory::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo;

    #[async_trait]
    impl EmbeddingProvider for Echo {
        fn model_name(&self) -> &str {
            "echo"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    struct Canned;

    #[async_trait]
    impl GenerationProvider for Canned {
        fn model_name(&self) -> &str {
            "canned"
        }
        async fn complete(&self, _r: &GenerationRequest) -> Result<String, GenerationError> {
            Ok("canned answer".to_string())
        }
    }

    #[derive(Default)]
    struct Counting {
        store: Arc<InMemoryStore>,
        embedders: AtomicUsize,
        generators: AtomicUsize,
    }

    #[async_trait]
    impl Backend for Counting {
        fn embedder(&self, _c: &Config, _k: Option<&str>) -> Result<Arc<dyn EmbeddingProvider>> {
            self.embedders.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Echo))
        }
        fn generator(&self, _c: &Config, _k: &str) -> Result<Arc<dyn GenerationProvider>> {
            self.generators.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Canned))
        }
        async fn open_store(&self, _c: &Config) -> Result<Arc<dyn VectorStore>> {
            Ok(self.store.clone())
        }
    }

    /// Each test gets its own variable so parallel tests never race.
    fn config_with_key(var: &str, value: Option<&str>) -> Config {
        let mut cfg = Config::minimal();
        cfg.credentials.api_key_env = var.to_string();
        match value {
            Some(v) => std::env::set_var(var, v),
            None => std::env::remove_var(var),
        }
        cfg
    }

    #[tokio::test]
    async fn missing_key_returns_message_without_clients() {
        let cfg = config_with_key("HANDBOOK_TEST_KEY_MISSING", None);
        let assistant = Assistant::with_backend(cfg, Counting::default());

        let out = assistant.get_answer("How much PTO?", None).await.unwrap();
        assert_eq!(
            out,
            "Error: HANDBOOK_TEST_KEY_MISSING not set. Please add it to the environment."
        );
        assert_eq!(assistant.backend().embedders.load(Ordering::SeqCst), 0);
        assert_eq!(assistant.backend().generators.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blank_key_counts_as_missing() {
        let cfg = config_with_key("HANDBOOK_TEST_KEY_BLANK", Some("   "));
        assert!(read_credential(&cfg).is_none());
        let err = Assistant::with_backend(cfg, Counting::default())
            .build_index()
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IndexError>(),
            Some(IndexError::MissingCredential(var)) if var == "HANDBOOK_TEST_KEY_BLANK"
        ));
        assert_eq!(
            err.to_string(),
            "Error: HANDBOOK_TEST_KEY_BLANK not set. Please add it to the environment."
        );
    }

    #[tokio::test]
    async fn blank_question_refuses_without_clients() {
        let cfg = config_with_key("HANDBOOK_TEST_KEY_BLANK_Q", Some("sk-test"));
        let assistant = Assistant::with_backend(cfg, Counting::default());

        let out = assistant.get_answer("  \n ", None).await.unwrap();
        assert_eq!(out, REFUSAL);
        assert_eq!(assistant.backend().embedders.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_retrieved_chunks_skips_generation() {
        let cfg = config_with_key("HANDBOOK_TEST_KEY_NO_CHUNKS", Some("sk-test"));
        let backend = Counting::default();
        backend
            .store
            .replace_collection(
                "handbook",
                &[crate::models::IndexedRecord {
                    id: "doc_0".into(),
                    text: "Vacation accrues monthly.".into(),
                    source: "Vacation.docx".into(),
                    embedding: vec![1.0],
                }],
            )
            .await
            .unwrap();
        let assistant = Assistant::with_backend(cfg, backend);

        let out = assistant
            .get_answer("PTO?", Some("Does Not Exist.docx"))
            .await
            .unwrap();
        assert_eq!(out, REFUSAL);
        assert_eq!(assistant.backend().generators.load(Ordering::SeqCst), 0);

        let out = assistant.get_answer("PTO?", Some("")).await.unwrap();
        assert_eq!(out, "canned answer");
        assert_eq!(assistant.backend().generators.load(Ordering::SeqCst), 1);
    }

    /// Overlap counters for corpus-sized embedding calls.
    #[derive(Default)]
    struct Tracker {
        active: AtomicUsize,
        max_active: AtomicUsize,
        builds: AtomicUsize,
    }

    /// Query embeddings return at once; corpus batches sleep so that
    /// overlapping rebuilds would be observed.
    struct Slow(Arc<Tracker>);

    #[async_trait]
    impl EmbeddingProvider for Slow {
        fn model_name(&self) -> &str {
            "slow"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if texts.len() > 1 {
                self.0.builds.fetch_add(1, Ordering::SeqCst);
                let now = self.0.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.0.max_active.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                self.0.active.fetch_sub(1, Ordering::SeqCst);
            }
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    struct SlowBackend {
        store: Arc<InMemoryStore>,
        tracker: Arc<Tracker>,
    }

    #[async_trait]
    impl Backend for SlowBackend {
        fn embedder(&self, _c: &Config, _k: Option<&str>) -> Result<Arc<dyn EmbeddingProvider>> {
            Ok(Arc::new(Slow(self.tracker.clone())))
        }
        fn generator(&self, _c: &Config, _k: &str) -> Result<Arc<dyn GenerationProvider>> {
            Ok(Arc::new(Canned))
        }
        async fn open_store(&self, _c: &Config) -> Result<Arc<dyn VectorStore>> {
            Ok(self.store.clone())
        }
    }

    /// Two one-paragraph documents, index not built.
    fn cold_assistant(tmp: &tempfile::TempDir, var: &str) -> Assistant<SlowBackend> {
        use crate::extract::tests::docx_with_paragraphs;
        let docs = tmp.path().join("hr_docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(
            docs.join("Vacation.docx"),
            docx_with_paragraphs(&["Employees accrue 10 hours of vacation per month."]),
        )
        .unwrap();
        std::fs::write(
            docs.join("Holidays.docx"),
            docx_with_paragraphs(&["The office is closed on New Year's Day."]),
        )
        .unwrap();

        let mut cfg = config_with_key(var, Some("sk-test"));
        cfg.documents.folders = vec![docs];
        Assistant::with_backend(
            cfg,
            SlowBackend {
                store: Arc::new(InMemoryStore::new()),
                tracker: Arc::new(Tracker::default()),
            },
        )
    }

    #[tokio::test]
    async fn explicit_and_lazy_rebuilds_do_not_overlap() {
        let tmp = tempfile::TempDir::new().unwrap();
        let assistant = cold_assistant(&tmp, "HANDBOOK_TEST_KEY_OVERLAP");

        let (built, answered) = tokio::join!(
            assistant.build_index(),
            assistant.get_answer("PTO?", None)
        );
        assert_eq!(built.unwrap().records, 2);
        assert_eq!(answered.unwrap(), "canned answer");

        let tracker = &assistant.backend().tracker;
        assert_eq!(tracker.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_cold_questions_build_once() {
        let tmp = tempfile::TempDir::new().unwrap();
        let assistant = cold_assistant(&tmp, "HANDBOOK_TEST_KEY_COLD");

        let (a, b) = tokio::join!(
            assistant.get_answer("PTO?", None),
            assistant.get_answer("Holidays?", None)
        );
        assert_eq!(a.unwrap(), "canned answer");
        assert_eq!(b.unwrap(), "canned answer");

        let tracker = &assistant.backend().tracker;
        assert_eq!(tracker.builds.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn status_reports_built_and_size() {
        let tmp = tempfile::TempDir::new().unwrap();
        let assistant = cold_assistant(&tmp, "HANDBOOK_TEST_KEY_STATUS");

        let before = assistant.index_status().await.unwrap();
        assert!(!before.built);
        assert_eq!(before.records, 0);
        assert_eq!(before.collection, "handbook");

        assistant.build_index().await.unwrap();
        let after = assistant.index_status().await.unwrap();
        assert!(after.built);
        assert_eq!(after.records, 2);
        assert_eq!(assistant.backend().tracker.builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ollama_embedding_does_not_need_key() {
        let mut cfg = Config::minimal();
        cfg.embedding.provider = "ollama".into();
        assert!(!cfg.embedding.needs_credential());
    }
}
