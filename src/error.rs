use thiserror::Error;

/// Main error type for query construction and execution
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid operator: {0}")]
    BadOperator(String),

    #[error("No query found for operation")]
    MissingQuery,

    #[error("Field name `{0}` conflicts with a namespace in the mapping")]
    FieldConflict(String),

    #[error("No mapping found for index `{0}`")]
    MissingMapping(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for query operations
pub type Result<T> = std::result::Result<T, QueryError>;

impl QueryError {
    /// Check if this error was caused by misuse of the query API
    ///
    /// These errors are raised synchronously while building or finalizing a
    /// query and will fail the same way every time they are retried.
    pub fn is_caller_misuse(&self) -> bool {
        matches!(
            self,
            QueryError::Validation(_) | QueryError::BadOperator(_) | QueryError::MissingQuery
        )
    }
}
