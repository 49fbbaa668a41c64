//! Core data models used throughout the handbook assistant.
//!
//! These types represent the documents, chunks, and indexed records that
//! flow from the loader through the index builder into retrieval.

use serde::Serialize;
use std::collections::BTreeMap;

/// A source file and its non-blank paragraphs, in document order.
#[derive(Debug, Clone)]
pub struct Document {
    /// File name, e.g. `Vacation Policy.docx`. Unique across both folders.
    pub name: String,
    pub paragraphs: Vec<String>,
}

/// A run of consecutive paragraphs from one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Paragraphs joined by `\n`.
    pub text: String,
    pub source: String,
    pub paragraphs: Vec<String>,
}

/// Output of the loader: chunk texts and their source names, index-aligned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    pub texts: Vec<String>,
    pub sources: Vec<String>,
}

impl Corpus {
    pub fn push(&mut self, chunk: Chunk) {
        self.texts.push(chunk.text);
        self.sources.push(chunk.source);
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Iterate `(text, source)` pairs in load order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.texts
            .iter()
            .zip(self.sources.iter())
            .map(|(t, s)| (t.as_str(), s.as_str()))
    }

    /// Chunks per document name, sorted by name. Documents with the same
    /// name in different folders share one entry, as they share a filter.
    pub fn chunk_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for source in &self.sources {
            *counts.entry(source.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

/// A chunk ready for the similarity index.
#[derive(Debug, Clone)]
pub struct IndexedRecord {
    /// `doc_<n>`, sequential in load order.
    pub id: String,
    pub text: String,
    pub source: String,
    pub embedding: Vec<f32>,
}

impl IndexedRecord {
    pub fn record_id(position: usize) -> String {
        format!("doc_{}", position)
    }
}

/// A nearest-neighbour hit returned by a store query.
#[derive(Debug, Clone)]
pub struct RecordMatch {
    pub id: String,
    pub text: String,
    pub source: String,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f64,
}

/// Result of a successful index build.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub collection: String,
    pub documents: usize,
    pub records: usize,
    pub model: String,
    /// SHA-256 over every `(source, text)` pair in insertion order.
    pub fingerprint: String,
}

/// Whether the similarity index currently holds the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStatus {
    pub collection: String,
    pub built: bool,
    /// Zero when not built.
    pub records: usize,
}
