//! Core data models shared by ingestion, chunking, indexing and retrieval.
//!
//! A [`Document`] is what the ingestor produces from one file (or one page /
//! sheet of a file). A [`Chunk`] is a bounded window of a document's text and
//! the unit that gets embedded, indexed and returned from retrieval.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Origin format of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Excel,
    Text,
    Manual,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docx => "docx",
            DocumentKind::Excel => "excel",
            DocumentKind::Text => "text",
            DocumentKind::Manual => "manual",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source metadata attached to a document and inherited by its chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Original filename, or `"Manual Input"` for pasted text.
    pub source: String,
    pub kind: DocumentKind,
    /// Worksheet name for spreadsheet documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    /// 1-based page number for PDF documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl DocumentMetadata {
    pub fn new(source: impl Into<String>, kind: DocumentKind) -> Self {
        Self {
            source: source.into(),
            kind,
            sheet: None,
            page: None,
        }
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

/// Normalized text unit produced by the ingestor. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// True when the content has no non-whitespace characters.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// A bounded window of a document's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Session-unique identifier (UUID v4).
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
    /// Position of this chunk within its parent document, starting at 0.
    pub chunk_index: usize,
    /// SHA-256 of `content`, hex encoded.
    pub hash: String,
}

/// A chunk paired with the score that ranked it.
///
/// The score is cosine similarity when produced by a vector store and a
/// cross-encoder relevance logit after reranking.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

impl ScoredChunk {
    pub fn new(chunk: Chunk, score: f32) -> Self {
        Self { chunk, score }
    }
}
