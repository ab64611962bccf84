//! Error types for docsql-core.
//!
//! Minimal error types without adapter dependencies (no file IO, no CSV).

use thiserror::Error;

/// Query engine error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Type error: {0}")]
    TypeError(String),
}

/// Result type for query engine operations
pub type QueryResult<T> = Result<T, QueryError>;

impl QueryError {
    /// Shorthand used by the parser to report an offending fragment.
    pub(crate) fn unparsable(clause: &str, token: &str) -> Self {
        QueryError::ParseError(format!("Not capable of parsing {} token: {}", clause, token))
    }
}

impl serde::Serialize for QueryError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}
