use docsql_core::QueryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocSqlError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Table '{0}' is not registered")]
    TableNotRegistered(String),

    #[error("Invalid document in {path}: {message}")]
    InvalidDocument { path: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type DocSqlResult<T> = Result<T, DocSqlError>;

impl serde::Serialize for DocSqlError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl From<DocSqlError> for QueryError {
    fn from(err: DocSqlError) -> Self {
        match err {
            DocSqlError::Query(inner) => inner,
            DocSqlError::TableNotRegistered(name) => QueryError::TableNotFound(name),
            other => QueryError::ExecutionError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DocSqlError::TableNotRegistered("people".to_string());
        assert_eq!(err.to_string(), "Table 'people' is not registered");

        let err = DocSqlError::Config("missing path".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing path");

        let err = DocSqlError::InvalidDocument {
            path: "people.json".to_string(),
            message: "expected an object".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid document in people.json: expected an object"
        );
    }

    #[test]
    fn test_query_errors_pass_through() {
        let err: DocSqlError = QueryError::ParseError("unexpected token".to_string()).into();
        assert_eq!(err.to_string(), "Parse error: unexpected token");

        let back: QueryError = err.into();
        assert_eq!(back, QueryError::ParseError("unexpected token".to_string()));
    }

    #[test]
    fn test_conversion_to_query_error() {
        let err: QueryError = DocSqlError::TableNotRegistered("orders".to_string()).into();
        assert_eq!(err, QueryError::TableNotFound("orders".to_string()));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: QueryError = DocSqlError::from(io).into();
        assert!(matches!(err, QueryError::ExecutionError(msg) if msg.contains("gone")));
    }

    #[test]
    fn test_error_serialization() {
        let err = DocSqlError::Config("bad format".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Configuration error: bad format\"");
    }
}
