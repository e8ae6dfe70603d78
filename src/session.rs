//! Query session: the state machine around one document set.
//!
//! ```text
//! Empty ──submit──▶ Indexing ──ok──▶ Ready ──submit──▶ Indexing ...
//!                      │
//!                      └──error──▶ Empty
//! ```
//!
//! Submitting a new set drops the previous pipeline before any indexing
//! work starts. Queries are only answered in `Ready`; the index is complete
//! by then, so no query sees a partial build.

use chrono::{DateTime, Utc};
use tracing::info;

use smartdoc_core::chunk::chunk_documents;
use smartdoc_core::models::{Chunk, ScoredChunk};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ingest::{self, FailurePolicy, SkippedFile, UploadedFile};
use crate::pipeline::RetrievalPipeline;

/// What the user handed in for one document set.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub uploaded_files: Vec<UploadedFile>,
    pub manual_text: Option<String>,
}

impl Submission {
    fn manual_text(&self) -> Option<&str> {
        self.manual_text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.uploaded_files.is_empty() && self.manual_text().is_none()
    }
}

/// Outcome of a successful submission.
#[derive(Debug, Clone)]
pub struct IndexReport {
    pub documents: usize,
    pub chunks: usize,
    pub skipped: Vec<SkippedFile>,
    pub embedder: String,
    pub index_backend: &'static str,
    pub reranker: &'static str,
    pub indexed_at: DateTime<Utc>,
}

/// Chunk count per source, for the document summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    pub source: String,
    pub chunks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Indexing,
    Ready,
}

enum State {
    Empty,
    Indexing,
    Ready(Box<RetrievalPipeline>),
}

pub struct Session {
    config: Config,
    state: State,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: State::Empty,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::Empty => Phase::Empty,
            State::Indexing => Phase::Indexing,
            State::Ready(_) => Phase::Ready,
        }
    }

    /// Ingest, chunk, embed and index a new document set, replacing the
    /// current one.
    ///
    /// Files that fail to ingest are skipped and listed in the report. The
    /// call fails with [`Error::NoInput`] when nothing was submitted (the
    /// current set is kept), and with [`Error::EmptyDocumentSet`] when no
    /// chunk could be produced (the session is left empty).
    pub async fn submit(&mut self, submission: Submission) -> Result<IndexReport> {
        if submission.is_empty() {
            return Err(Error::NoInput);
        }

        if let State::Ready(previous) = std::mem::replace(&mut self.state, State::Indexing) {
            (*previous).close().await;
        }

        match self.index(&submission).await {
            Ok((pipeline, report)) => {
                self.state = State::Ready(Box::new(pipeline));
                info!(
                    documents = report.documents,
                    chunks = report.chunks,
                    skipped = report.skipped.len(),
                    "document set indexed"
                );
                Ok(report)
            }
            Err(e) => {
                self.state = State::Empty;
                Err(e)
            }
        }
    }

    async fn index(&self, submission: &Submission) -> Result<(RetrievalPipeline, IndexReport)> {
        let batch = ingest::ingest_batch(&submission.uploaded_files, FailurePolicy::SkipAndContinue)?;
        let mut documents = batch.documents;
        if let Some(text) = submission.manual_text() {
            documents.push(ingest::from_manual_text(text));
        }

        let chunks = chunk_documents(
            &documents,
            self.config.chunking.chunk_size,
            self.config.chunking.overlap,
        );
        if chunks.is_empty() {
            return Err(Error::EmptyDocumentSet);
        }

        let chunk_count = chunks.len();
        let pipeline = RetrievalPipeline::build(&self.config, chunks).await?;
        let report = IndexReport {
            documents: documents.len(),
            chunks: chunk_count,
            skipped: batch.skipped,
            embedder: pipeline.embedder_name().to_string(),
            index_backend: pipeline.index_backend(),
            reranker: pipeline.reranker_kind(),
            indexed_at: Utc::now(),
        };
        Ok((pipeline, report))
    }

    fn pipeline_mut(&mut self) -> Result<&mut RetrievalPipeline> {
        match &mut self.state {
            State::Ready(pipeline) => Ok(pipeline.as_mut()),
            _ => Err(Error::NotReady),
        }
    }

    /// Ranked chunks with their scores.
    pub async fn retrieve_scored(&mut self, query: &str) -> Result<Vec<ScoredChunk>> {
        self.pipeline_mut()?.retrieve(query).await
    }

    /// Ranked chunks for `query`, most relevant first.
    pub async fn retrieve(&mut self, query: &str) -> Result<Vec<Chunk>> {
        let hits = self.retrieve_scored(query).await?;
        Ok(hits.into_iter().map(|h| h.chunk).collect())
    }

    /// Sources of the current set with their chunk counts, in submission
    /// order. Empty unless the session is ready.
    pub fn sources(&self) -> Vec<SourceSummary> {
        let State::Ready(pipeline) = &self.state else {
            return Vec::new();
        };
        let mut summary: Vec<SourceSummary> = Vec::new();
        for chunk in pipeline.chunks() {
            match summary.iter_mut().find(|s| s.source == chunk.metadata.source) {
                Some(entry) => entry.chunks += 1,
                None => summary.push(SourceSummary {
                    source: chunk.metadata.source.clone(),
                    chunks: 1,
                }),
            }
        }
        summary
    }
}
