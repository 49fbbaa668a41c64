//! Paragraph-accumulation chunker.
//!
//! Paragraphs are appended to the current chunk until the next one would
//! push the joined text past `max_chars`; then the chunk is flushed and a new
//! one starts with that paragraph. Paragraphs are never split, so a single
//! paragraph longer than `max_chars` becomes a chunk of its own. Lengths are
//! counted in characters.

use crate::models::{Chunk, Document};

/// Separator between paragraphs inside a chunk.
pub const PARAGRAPH_SEPARATOR: &str = "\n";

/// Split a document's paragraphs into chunks of at most `max_chars`.
pub fn chunk_document(doc: &Document, max_chars: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0usize;

    for para in &doc.paragraphs {
        if para.trim().is_empty() {
            continue;
        }
        let para_len = para.chars().count();

        let would_be = if current.is_empty() {
            para_len
        } else {
            current_len + PARAGRAPH_SEPARATOR.len() + para_len
        };

        if would_be > max_chars && !current.is_empty() {
            chunks.push(make_chunk(&doc.name, std::mem::take(&mut current)));
            current_len = 0;
        }

        current_len = if current.is_empty() {
            para_len
        } else {
            current_len + PARAGRAPH_SEPARATOR.len() + para_len
        };
        current.push(para.clone());
    }

    if !current.is_empty() {
        chunks.push(make_chunk(&doc.name, current));
    }

    chunks
}

fn make_chunk(source: &str, paragraphs: Vec<String>) -> Chunk {
    Chunk {
        text: paragraphs.join(PARAGRAPH_SEPARATOR),
        source: source.to_string(),
        paragraphs,
    }
}
