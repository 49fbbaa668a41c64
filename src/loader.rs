//! Document loader.
//!
//! Scans the configured folders (non-recursively), skips Office lock files,
//! extracts paragraphs and chunks every document. A document that fails to
//! parse is logged and skipped; the rest of the load continues.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::chunk::chunk_document;
use crate::config::Config;
use crate::extract;
use crate::models::{Corpus, Document};

/// A document file found on disk.
#[derive(Debug, Clone)]
pub struct DocumentFile {
    pub name: String,
    pub path: PathBuf,
}

/// List candidate document files: folder order first, then file name.
pub fn scan_documents(config: &Config) -> Result<Vec<DocumentFile>> {
    let docs = &config.documents;
    let include_set = build_globset(&docs.include_globs)?;
    let mut files = Vec::new();

    for folder in &docs.folders {
        if !folder.is_dir() {
            tracing::debug!(folder = %folder.display(), "document folder missing, skipping");
            continue;
        }

        let mut found = Vec::new();
        let walker = WalkDir::new(folder).min_depth(1).max_depth(1);
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(&docs.skip_prefix) {
                tracing::debug!(file = %name, "skipping lock file");
                continue;
            }
            if !include_set.is_match(&name) {
                continue;
            }

            found.push(DocumentFile {
                name,
                path: entry.path().to_path_buf(),
            });
        }

        found.sort_by(|a, b| a.name.cmp(&b.name));
        files.extend(found);
    }

    Ok(files)
}

/// Sorted, de-duplicated document names across all folders.
pub fn list_document_names(config: &Config) -> Result<Vec<String>> {
    let names: BTreeSet<String> = scan_documents(config)?
        .into_iter()
        .map(|f| f.name)
        .collect();
    Ok(names.into_iter().collect())
}

/// Read one file into a [`Document`].
pub fn read_document(file: &DocumentFile) -> Result<Document, extract::ExtractError> {
    let paragraphs = extract::extract_file(&file.path)?;
    Ok(Document {
        name: file.name.clone(),
        paragraphs,
    })
}

/// Load and chunk every document. An empty corpus is not an error here.
pub fn load_documents(config: &Config) -> Result<Corpus> {
    let files = scan_documents(config)?;
    let mut corpus = Corpus::default();

    for file in &files {
        let doc = match read_document(file) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(path = %file.path.display(), error = %e, "failed to load document");
                continue;
            }
        };

        let chunks = chunk_document(&doc, config.chunking.max_chars);
        tracing::debug!(document = %doc.name, chunks = chunks.len(), "chunked document");
        for chunk in chunks {
            corpus.push(chunk);
        }
    }

    Ok(corpus)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
