//! Document ingestion.
//!
//! Turns an uploaded file (bytes + filename) into one or more
//! [`Document`]s, dispatching on the lower-cased file extension. Pasted text
//! becomes a single `manual` document. Batches of files can either abort on
//! the first bad file or skip it and keep going; see [`FailurePolicy`].

use std::path::Path;

use tracing::{debug, warn};

use smartdoc_core::models::{Document, DocumentKind, DocumentMetadata};

use crate::error::{Error, Result};
use crate::extract;

/// Extensions accepted by [`ingest`], lower-case, without the dot.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["pdf", "docx", "doc", "xlsx", "xls", "txt"];

/// Source name given to pasted text.
pub const MANUAL_SOURCE: &str = "Manual Input";

/// A file handed over by the shell.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, naming it by its final path component.
    pub async fn read(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { filename, bytes })
    }
}

/// What to do when one file of a batch fails to ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the failure, remember it, and continue with the next file.
    #[default]
    SkipAndContinue,
    /// Stop and return the first error.
    AbortAll,
}

/// A file left out of a batch, with the reason shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    pub filename: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

/// Text after the last `.`, lowercased. A bare `.txt` is a text file.
fn extension_of(filename: &str) -> String {
    filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Ingest a single file.
///
/// Fails with [`Error::UnsupportedFormat`] for an unknown extension and
/// [`Error::LoadFailure`] when the content cannot be decoded or parsed.
pub fn ingest(bytes: &[u8], filename: &str) -> Result<Vec<Document>> {
    let ext = extension_of(filename);
    let docs = match ext.as_str() {
        "pdf" => ingest_pdf(bytes, filename)?,
        "docx" | "doc" => ingest_docx(bytes, filename)?,
        "xlsx" | "xls" => ingest_workbook(bytes, filename)?,
        "txt" => {
            let text = extract::decode_text(bytes).map_err(|e| Error::load_failure(filename, e))?;
            vec![Document::new(
                text,
                DocumentMetadata::new(filename, DocumentKind::Text),
            )]
        }
        _ => return Err(Error::UnsupportedFormat(ext)),
    };
    debug!(file = filename, documents = docs.len(), "ingested file");
    Ok(docs)
}

fn ingest_pdf(bytes: &[u8], filename: &str) -> Result<Vec<Document>> {
    let pages = extract::extract_pdf_pages(bytes).map_err(|e| Error::load_failure(filename, e))?;
    if pages.is_empty() {
        return Err(Error::load_failure(filename, "PDF has no pages"));
    }
    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let meta = DocumentMetadata::new(filename, DocumentKind::Pdf).with_page(i as u32 + 1);
            Document::new(text, meta)
        })
        .collect())
}

fn ingest_docx(bytes: &[u8], filename: &str) -> Result<Vec<Document>> {
    let text =
        extract::extract_docx_paragraphs(bytes).map_err(|e| Error::load_failure(filename, e))?;
    Ok(vec![Document::new(
        text,
        DocumentMetadata::new(filename, DocumentKind::Docx),
    )])
}

fn ingest_workbook(bytes: &[u8], filename: &str) -> Result<Vec<Document>> {
    let sheets = extract::extract_sheets(bytes).map_err(|e| Error::load_failure(filename, e))?;
    if sheets.is_empty() {
        return Err(Error::load_failure(filename, "workbook has no sheets"));
    }
    Ok(sheets
        .into_iter()
        .map(|sheet| {
            let meta = DocumentMetadata::new(filename, DocumentKind::Excel).with_sheet(&sheet.name);
            Document::new(sheet.content, meta)
        })
        .collect())
}

/// Wrap pasted text as a single document.
pub fn from_manual_text(text: &str) -> Document {
    Document::new(
        text,
        DocumentMetadata::new(MANUAL_SOURCE, DocumentKind::Manual),
    )
}

/// Ingest several files under the given failure policy.
pub fn ingest_batch(files: &[UploadedFile], policy: FailurePolicy) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();
    for file in files {
        match ingest(&file.bytes, &file.filename) {
            Ok(docs) => outcome.documents.extend(docs),
            Err(e) if policy == FailurePolicy::SkipAndContinue => {
                warn!(file = %file.filename, error = %e, "skipping file");
                outcome.skipped.push(SkippedFile {
                    filename: file.filename.clone(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(outcome)
}
