//! Error types for the ingestion pipeline and its collaborators.
//!
//! Each collaborator gets its own enum. The pipeline wraps them in [`IngestError`] and never
//! recovers from any of them: the first failure aborts the run.

use thiserror::Error;

/// Errors raised while reading and validating the source records.
#[derive(Debug, Error)]
pub enum InputError {
    /// The source file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid JSON or does not match the record schema.
    #[error("malformed exercise data: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A record failed validation after parsing.
    #[error("invalid record at position {position}: {reason}")]
    InvalidRecord { position: usize, reason: String },

    /// Two or more records share an identifier.
    #[error("duplicate exercise names: {0}")]
    DuplicateIds(String),
}

impl InputError {
    /// Create an invalid record error. `position` is 1-indexed.
    pub fn invalid_record(position: usize, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            position,
            reason: reason.into(),
        }
    }
}

/// Errors raised by the embedding provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The HTTP request could not be sent or the body could not be read.
    #[error("embedding request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("embedding provider returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The provider answered, but not with a usable embedding.
    #[error("malformed embedding response: {0}")]
    Malformed(String),

    /// The returned vector does not have the declared dimension.
    #[error("embedding has dimension {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Client setup failed (bad key, bad base URL).
    #[error("embedding client configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Create a malformed response error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Errors raised by the vector store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The target index does not exist.
    #[error("index not found: {0}")]
    IndexNotFound(String),

    /// An entry does not match the index dimension.
    #[error("entry {id} has dimension {actual}, index expects {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },

    /// The store rejected the request.
    #[error("vector store returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The store answered with something we could not interpret.
    #[error("malformed vector store response: {0}")]
    Malformed(String),

    /// The HTTP request could not be sent or the body could not be read.
    #[error("vector store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The index did not report ready within the polling window.
    #[error("index {0} did not become ready in time")]
    NotReady(String),

    /// Client setup failed (bad key, bad URL).
    #[error("vector store configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Create an index not found error.
    pub fn index_not_found(name: impl Into<String>) -> Self {
        Self::IndexNotFound(name.into())
    }

    /// Create a malformed response error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Top-level error for a pipeline run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_error_is_transparent() {
        let err: IngestError = StoreError::index_not_found("fitness").into();
        assert_eq!(err.to_string(), "index not found: fitness");
        assert!(matches!(err, IngestError::Store(StoreError::IndexNotFound(_))));
    }

    #[test]
    fn test_invalid_record_message() {
        let err = InputError::invalid_record(3, "exercise_name is empty");
        assert_eq!(
            err.to_string(),
            "invalid record at position 3: exercise_name is empty"
        );
    }
}
