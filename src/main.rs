//! # SmartDoc CLI (`smartdoc`)
//!
//! Ask questions about local documents from the command line.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `smartdoc ask -f FILE... QUESTION` | Index the files and answer the question with the LLM |
//! | `smartdoc retrieve -f FILE... QUERY` | Index the files and print the ranked passages |
//! | `smartdoc ingest FILE...` | Show what each file yields (documents and chunks) |
//!
//! ## Examples
//!
//! ```bash
//! # Ask about a PDF and a spreadsheet
//! GROQ_API_KEY=... smartdoc ask -f report.pdf -f budget.xlsx "What was Q3 revenue?"
//!
//! # Pasted text, no LLM call: print the context that would be sent
//! smartdoc ask --text "$(cat notes.txt)" --no-generate "Who owns the rollout?"
//!
//! # Offline, with a config selecting hash embeddings
//! smartdoc --config ./smartdoc.toml retrieve -f handbook.docx "leave policy"
//! ```
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `info`).

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use smartdoc::answer::{self, AnswerGenerator, OpenAiCompatGenerator};
use smartdoc::config::{self, Config};
use smartdoc_core::chunk::chunk_documents;
use smartdoc::ingest::{self, UploadedFile};
use smartdoc::{IndexReport, Session, Submission};

/// SmartDoc: question answering over PDF, Word, Excel and text files.
///
/// A missing config file is not an error; built-in defaults are used.
#[derive(Parser)]
#[command(name = "smartdoc", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./smartdoc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index documents and answer a question about them.
    Ask {
        /// Document to index (repeatable).
        #[arg(short = 'f', long = "file")]
        files: Vec<PathBuf>,

        /// Text to index alongside the files.
        #[arg(long)]
        text: Option<String>,

        /// Print the retrieved context instead of calling the LLM.
        #[arg(long)]
        no_generate: bool,

        /// The question.
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Index documents and print the passages ranked for a query.
    Retrieve {
        /// Document to index (repeatable).
        #[arg(short = 'f', long = "file")]
        files: Vec<PathBuf>,

        /// Text to index alongside the files.
        #[arg(long)]
        text: Option<String>,

        /// Search query.
        query: String,
    },

    /// Ingest and chunk files, printing what each one yields.
    Ingest {
        /// Files to ingest.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Ask {
            files,
            text,
            no_generate,
            question,
        } => {
            let question = question.join(" ");
            run_ask(cfg, &files, text, &question, no_generate).await?;
        }
        Commands::Retrieve { files, text, query } => {
            run_retrieve(cfg, &files, text, &query).await?;
        }
        Commands::Ingest { files } => {
            run_ingest(&cfg, &files).await?;
        }
    }

    Ok(())
}

async fn read_files(paths: &[PathBuf]) -> Result<Vec<UploadedFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(UploadedFile::read(path).await?);
    }
    Ok(files)
}

/// Build a session over the given files and text, printing the summary.
async fn open_session(cfg: Config, paths: &[PathBuf], text: Option<String>) -> Result<Session> {
    let submission = Submission {
        uploaded_files: read_files(paths).await?,
        manual_text: text,
    };
    let mut session = Session::new(cfg);
    let report = match session.submit(submission).await {
        Ok(report) => report,
        Err(e) => bail!("{}", e.user_message()),
    };
    print_report(&report, &session);
    Ok(session)
}

fn print_report(report: &IndexReport, session: &Session) {
    for skipped in &report.skipped {
        eprintln!("Skipped {}: {}", skipped.filename, skipped.reason);
    }
    eprintln!(
        "Indexed {} documents ({} chunks) with {} / {} index / {} reranker",
        report.documents, report.chunks, report.embedder, report.index_backend, report.reranker
    );
    for source in session.sources() {
        eprintln!("  {} ({} chunks)", source.source, source.chunks);
    }
}

async fn run_ask(
    cfg: Config,
    paths: &[PathBuf],
    text: Option<String>,
    question: &str,
    no_generate: bool,
) -> Result<()> {
    let generation = cfg.generation.clone();
    let mut session = open_session(cfg, paths, text).await?;

    let chunks = match session.retrieve(question).await {
        Ok(chunks) => chunks,
        Err(e) => bail!("{}", e.user_message()),
    };

    if no_generate {
        println!("{}", answer::build_prompt(&answer::format_context(&chunks), question));
        return Ok(());
    }

    let generator = OpenAiCompatGenerator::from_env(&generation)?;
    let generator: &dyn AnswerGenerator = &generator;
    match answer::answer(generator, &chunks, question).await {
        Ok(text) => {
            println!("{}", text);
            let sources = answer::collect_sources(&chunks);
            if !sources.is_empty() {
                println!();
                println!("Sources: {}", sources.join(", "));
            }
        }
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "answer generation failed");
            bail!("{}", smartdoc::Error::RetrievalFailure(e.to_string()).user_message());
        }
    }
    Ok(())
}

async fn run_retrieve(
    cfg: Config,
    paths: &[PathBuf],
    text: Option<String>,
    query: &str,
) -> Result<()> {
    let mut session = open_session(cfg, paths, text).await?;
    let hits = match session.retrieve_scored(query).await {
        Ok(hits) => hits,
        Err(e) => bail!("{}", e.user_message()),
    };

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        let meta = &hit.chunk.metadata;
        let location = match (meta.page, &meta.sheet) {
            (Some(page), _) => format!(" p.{}", page),
            (None, Some(sheet)) => format!(" [{}]", sheet),
            (None, None) => String::new(),
        };
        println!(
            "{}. [{:.4}] {}{} #{}",
            i + 1,
            hit.score,
            meta.source,
            location,
            hit.chunk.chunk_index
        );
        println!("   {}", preview(&hit.chunk.content, 240));
    }
    Ok(())
}

async fn run_ingest(cfg: &Config, paths: &[PathBuf]) -> Result<()> {
    let files = read_files(paths).await?;
    for file in &files {
        match ingest::ingest(&file.bytes, &file.filename) {
            Ok(documents) => {
                let chunks =
                    chunk_documents(&documents, cfg.chunking.chunk_size, cfg.chunking.overlap);
                println!(
                    "{}: {} documents, {} chunks",
                    file.filename,
                    documents.len(),
                    chunks.len()
                );
            }
            Err(e) => println!("{}: {}", file.filename, e.user_message()),
        }
    }
    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}
