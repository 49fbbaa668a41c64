//! # Handbook Assistant
//!
//! Retrieval-augmented question answering over an employee handbook.
//!
//! Policy documents (`.docx`) are split into paragraph-aligned chunks,
//! embedded, and stored in a local SQLite similarity index. A question is
//! rewritten with handbook vocabulary, matched against the index, and
//! answered by a chat model from the retrieved chunks only. When nothing
//! relevant is found the assistant returns a fixed refusal sentence instead
//! of calling the model.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌──────────┐
//! │ Documents │──▶│ Chunk+Embed  │──▶│  SQLite  │
//! │  (.docx)  │   │ (index build)│   │  vectors │
//! └───────────┘   └──────────────┘   └────┬─────┘
//!                                         │
//!                 ┌──────────┐      ┌─────▼─────┐      ┌──────────┐
//!  question ─────▶│ Rewriter │─────▶│ Retriever │─────▶│ Answerer │
//!                 └──────────┘      └───────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=...
//! handbook documents                 # list what will be indexed
//! handbook build                     # embed and store every chunk
//! handbook ask "How much PTO do I accrue each pay period?"
//! handbook serve                     # JSON API on 127.0.0.1:7340
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | `.docx` paragraph extraction |
//! | [`chunk`] | Paragraph-aligned chunking |
//! | [`loader`] | Document discovery and corpus loading |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`generation`] | Chat completion provider abstraction |
//! | [`store`] | Similarity index storage |
//! | [`index`] | Full index rebuild |
//! | [`rewrite`] | Synonym-based query rewriting |
//! | [`retriever`] | Question to chunk texts |
//! | [`answer`] | Grounded answer construction and refusal |
//! | [`assistant`] | Public pipeline entry points |
//! | [`server`] | JSON HTTP API |
//! | [`logging`] | Tracing subscriber setup |

pub mod answer;
pub mod assistant;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod index;
pub mod loader;
pub mod logging;
pub mod models;
pub mod retriever;
pub mod rewrite;
pub mod server;
pub mod store;

pub use answer::REFUSAL;
pub use assistant::{Assistant, Backend, ServiceBackend};
