//! Staging file error types.

use std::path::Path;

/// Errors writing or reading the staged CSV files.
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// Filesystem operation failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding or decoding failed
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// A row that does not describe a valid record
    #[error("malformed record in {path} at line {line}: {reason}")]
    MalformedRecord {
        path: String,
        line: u64,
        reason: String,
    },
}

impl StagingError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StagingError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        StagingError::Csv {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn malformed(path: &Path, line: u64, reason: impl Into<String>) -> Self {
        StagingError::MalformedRecord {
            path: path.display().to_string(),
            line,
            reason: reason.into(),
        }
    }
}
