//! # Handbook Assistant CLI (`handbook`)
//!
//! ## Usage
//!
//! ```bash
//! handbook --config ./config/handbook.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `handbook documents` | List indexable document names |
//! | `handbook load` | Dry run: chunk counts per document, no network |
//! | `handbook build` | Rebuild the similarity index |
//! | `handbook status` | Whether the index exists and how many chunks it holds |
//! | `handbook ask "<question>"` | Answer a question from the handbook |
//! | `handbook serve` | Start the JSON HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! # Answer from one document only
//! handbook ask "Can I carry over unused days?" --document "Vacation Policy.docx"
//!
//! # More logging
//! RUST_LOG=handbook_assistant=debug handbook build
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use handbook_assistant::{config, logging, server, Assistant};

/// Handbook Assistant: answers employee questions from the policy handbook.
///
/// The config file is optional; without it the built-in defaults read
/// `data/hr_docs` and `data/hr_extra` and use OpenAI.
#[derive(Parser)]
#[command(
    name = "handbook",
    about = "Handbook Assistant: retrieval-augmented answers over an employee handbook",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when it is missing.
    #[arg(long, global = true, default_value = "./config/handbook.toml")]
    config: PathBuf,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the sorted names of all indexable documents.
    Documents,

    /// Dry run: load and chunk every document, print per-document counts.
    ///
    /// Makes no network calls and does not touch the index.
    Load,

    /// Rebuild the similarity index from the current documents.
    ///
    /// Always a full rebuild. Requires the API key when the embedding
    /// provider is `openai`.
    Build,

    /// Report whether the index has been built and its size.
    ///
    /// Reads the local index only; no API key needed.
    Status,

    /// Answer a question.
    Ask {
        /// The question, in plain language.
        question: String,

        /// Search only this document (exact file name, e.g. `Vacation Policy.docx`).
        #[arg(long)]
        document: Option<String>,
    },

    /// Start the JSON HTTP API on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(logging::default_level(cli.verbose));

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Documents => {
            let assistant = Assistant::new(cfg);
            for name in assistant.list_document_names()? {
                println!("{}", name);
            }
        }
        Commands::Load => {
            let assistant = Assistant::new(cfg);
            let corpus = assistant.load_documents()?;

            let counts = corpus.chunk_counts();
            for (name, n) in &counts {
                println!("{:>5}  {}", n, name);
            }
            println!(
                "{} chunks from {} documents",
                corpus.len(),
                counts.len()
            );
        }
        Commands::Build => {
            let assistant = Assistant::new(cfg);
            let summary = assistant.build_index().await?;
            println!(
                "Indexed {} chunks from {} documents into '{}' (model {})",
                summary.records, summary.documents, summary.collection, summary.model
            );
            println!("fingerprint: {}", summary.fingerprint);
        }
        Commands::Status => {
            let assistant = Assistant::new(cfg);
            let status = assistant.index_status().await?;
            if status.built {
                println!(
                    "Built ({} chunks in '{}')",
                    status.records, status.collection
                );
            } else {
                println!("Not built (collection '{}')", status.collection);
            }
        }
        Commands::Ask { question, document } => {
            let assistant = Assistant::new(cfg);
            let answer = assistant
                .get_answer(&question, document.as_deref())
                .await?;
            println!("{}", answer);
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
