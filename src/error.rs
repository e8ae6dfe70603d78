//! User-facing error taxonomy.
//!
//! Only ingestion errors, empty submissions, queries against a session that
//! is not ready, and total retrieval failure ever reach the caller. Provider
//! and index failures are recovered inside the pipeline by switching to the
//! fallback path; their variants exist so the recovery sites can log a typed
//! cause.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported file format: .{0}")]
    UnsupportedFormat(String),

    #[error("failed to load {filename}: {cause}")]
    LoadFailure { filename: String, cause: String },

    #[error("no input: upload at least one file or enter some text")]
    NoInput,

    #[error("the submitted documents contain no indexable text")]
    EmptyDocumentSet,

    #[error("no document set is ready; submit documents first")]
    NotReady,

    #[error("{component} unavailable: {cause}")]
    ProviderInitFailure {
        component: &'static str,
        cause: String,
    },

    #[error("{backend} index build failed: {cause}")]
    IndexBuildFailure { backend: &'static str, cause: String },

    #[error("retrieval failed: {0}")]
    RetrievalFailure(String),
}

impl Error {
    pub(crate) fn load_failure(filename: &str, cause: impl std::fmt::Display) -> Self {
        Error::LoadFailure {
            filename: filename.to_string(),
            cause: cause.to_string(),
        }
    }

    /// Message suitable for end users.
    ///
    /// Retrieval failures are reduced to a generic notice; the technical
    /// cause is logged where the failure happens.
    pub fn user_message(&self) -> String {
        match self {
            Error::RetrievalFailure(_) => "Answer unavailable. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_failure_names_the_file() {
        let err = Error::load_failure("report.pdf", "bad xref");
        assert_eq!(err.to_string(), "failed to load report.pdf: bad xref");
        assert!(err.user_message().contains("report.pdf"));
    }

    #[test]
    fn test_retrieval_failure_hides_detail() {
        let err = Error::RetrievalFailure("sqlite: disk I/O error".into());
        assert!(!err.user_message().contains("sqlite"));
    }

    #[test]
    fn test_unsupported_format_names_extension() {
        assert_eq!(
            Error::UnsupportedFormat("csv".into()).to_string(),
            "unsupported file format: .csv"
        );
    }
}
