//! # SmartDoc
//!
//! Document question answering over PDF, Word, Excel and plain-text files.
//!
//! SmartDoc ingests a set of documents, splits them into overlapping
//! chunks, embeds and indexes the chunks, and for each question retrieves
//! the most relevant passages and hands them to a language model. Every
//! model or database the retrieval path depends on has a fallback, so a
//! missing model or a broken index degrades quality instead of failing the
//! query.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Ingest  │──▶│  Chunk  │──▶│    Embed     │──▶│    Index     │
//! │ pdf/docx │   │ recurse │   │ model | hash │   │ sqlite | mem │
//! │ xlsx/txt │   └─────────┘   └──────────────┘   └──────┬───────┘
//! └──────────┘                                           │ fetch_k
//!                          ┌──────────┐   ┌──────────────▼┐
//!                          │  Answer  │◀──│    Rerank     │
//!                          │   LLM    │   │ x-enc | pass  │
//!                          └──────────┘   └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! smartdoc ingest report.pdf budget.xlsx
//! smartdoc retrieve -f report.pdf "quarterly revenue"
//! GROQ_API_KEY=... smartdoc ask -f report.pdf What was Q3 revenue?
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | User-facing error taxonomy |
//! | [`extract`] | PDF, DOCX and spreadsheet text extraction |
//! | [`ingest`] | File and pasted-text ingestion |
//! | [`embedding`] | Model and hash embedders |
//! | [`db`] | SQLite connection |
//! | [`index`] | SQLite and in-memory vector indexes |
//! | [`rerank`] | Cross-encoder and pass-through rerankers |
//! | [`pipeline`] | Embed, search and rerank for one document set |
//! | [`session`] | Session state machine |
//! | [`answer`] | Prompt construction and LLM client |
//!
//! Chunking, document models and the vector store trait live in
//! `smartdoc-core`.

pub mod answer;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod pipeline;
pub mod rerank;
pub mod session;

pub use error::{Error, Result};
pub use ingest::{FailurePolicy, UploadedFile};
pub use session::{IndexReport, Phase, Session, Submission};
