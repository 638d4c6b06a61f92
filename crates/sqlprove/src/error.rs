//! Error types for sqlprove

use thiserror::Error;

/// Result type alias for sqlprove operations
pub type LiftResult<T> = Result<T, LiftError>;

/// Error types for query construction and execution
#[derive(Debug, Error)]
pub enum LiftError {
    /// Missing or invalid configuration (connection resolver, unbound
    /// parameter, unsupported table layout)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error reported by the database driver
    #[error("Database error: {0}")]
    Db(#[from] tokio_postgres::Error),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A single-row read matched more than one row
    #[error("Expected at most one row, got {0}")]
    RowCount(usize),

    /// A test-value shape produced no representative values
    #[error("No representative value for type {0}")]
    NoTestValues(&'static str),

    /// A value shape outside the supported primitive set
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl LiftError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an unsupported-shape error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
