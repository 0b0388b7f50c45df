//! Engine error taxonomy.
//!
//! Validation failures (unknown columns, operators, relations, bad values) are
//! returned to the caller as typed errors. Execution failures carry the original
//! backend detail so it can be logged, but nothing above the compiler boundary
//! inspects that detail for control flow.

use thiserror::Error;

/// Errors produced by the engine and its backends.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Schema not found for table '{table}'")]
    SchemaNotFound { table: String },

    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    #[error("Operator '{operator}' is not supported")]
    OperatorNotFound { operator: String },

    #[error("Invalid sort '{value}': expected column.asc or column.desc")]
    InvalidSort { value: String },

    #[error("Invalid value for column '{column}': expected {expected}, got '{value}'")]
    InvalidValue {
        column: String,
        expected: String,
        value: String,
    },

    #[error("Relation '{relation}' not found on table '{table}'")]
    RelationNotFound { table: String, relation: String },

    #[error("Table '{table}' has no primary key")]
    PrimaryKeyMissing { table: String },

    #[error("Duplicate value for unique column '{column}'")]
    DuplicateRecord { column: String },

    #[error("Access to table '{table}' denied")]
    PermissionDenied { table: String },

    #[error("Invalid pagination cursor: {message}")]
    InvalidCursor { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    QueryExecution { message: String },

    #[error("{backend} does not support {operation}")]
    Unsupported { backend: String, operation: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl EngineError {
    /// Whether the error is caused by the request itself rather than the backend.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::SchemaNotFound { .. }
                | Self::ColumnNotFound { .. }
                | Self::OperatorNotFound { .. }
                | Self::InvalidSort { .. }
                | Self::InvalidValue { .. }
                | Self::RelationNotFound { .. }
                | Self::PrimaryKeyMissing { .. }
                | Self::InvalidCursor { .. }
        )
    }

    pub(crate) fn connection(message: impl ToString) -> Self {
        Self::Connection {
            message: message.to_string(),
        }
    }

    pub(crate) fn execution(message: impl ToString) -> Self {
        Self::QueryExecution {
            message: message.to_string(),
        }
    }

    pub(crate) fn config(message: impl ToString) -> Self {
        Self::Config {
            message: message.to_string(),
        }
    }

    pub(crate) fn unsupported(backend: &str, operation: &str) -> Self {
        Self::Unsupported {
            backend: backend.to_string(),
            operation: operation.to_string(),
        }
    }
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(EngineError::SchemaNotFound { table: "t".into() }, true)]
    #[case(EngineError::OperatorNotFound { operator: "between".into() }, true)]
    #[case(EngineError::RelationNotFound { table: "t".into(), relation: "r".into() }, true)]
    #[case(EngineError::execution("boom"), false)]
    #[case(EngineError::connection("refused"), false)]
    #[case(EngineError::PermissionDenied { table: "t".into() }, false)]
    fn test_is_validation(#[case] error: EngineError, #[case] expected: bool) {
        assert_eq!(error.is_validation(), expected);
    }

    #[rstest]
    fn test_execution_message_preserved() {
        let err = EngineError::execution("syntax error at or near \"FROM\"");
        assert_eq!(err.to_string(), "Query failed: syntax error at or near \"FROM\"");
    }
}
