//! Indexer error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during indexing operations.
///
/// Every variant aborts the run. Uninteresting input and malformed tokens
/// are not errors; they are skipped silently.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The front-end handed over a translation unit that does not hang together
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A declaration that cannot be given a symbol
    #[error("Cannot mangle declaration #{decl} ({kind}): {reason}")]
    Mangle {
        decl: usize,
        kind: &'static str,
        reason: &'static str,
    },

    /// Failed to take or release the merge lock of an output file
    #[error("Lock error on {path}: {message}")]
    Lock { path: PathBuf, message: String },

    /// Configuration rejected by the core crate
    #[error(transparent)]
    Config(#[from] xref_core::CoreError),
}

impl From<serde_json::Error> for IndexerError {
    fn from(e: serde_json::Error) -> Self {
        IndexerError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IndexerError::Lock {
            path: PathBuf::from("/out/a.cpp"),
            message: "busy".to_string(),
        };
        assert!(err.to_string().contains("/out/a.cpp"));

        let err = IndexerError::Mangle {
            decl: 7,
            kind: "linkage spec",
            reason: "no symbol category",
        };
        assert!(err.to_string().contains("#7"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: IndexerError = io_err.into();
        assert!(matches!(err, IndexerError::Io(_)));
    }
}
