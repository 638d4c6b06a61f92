//! Error types for sqlprove-verify

use sqlprove::{LiftError, ShapeIssue};
use thiserror::Error;

/// Result type alias for verification operations
pub type CheckResult<T> = Result<T, CheckError>;

/// Error types for schema verification
#[derive(Debug, Error)]
pub enum CheckError {
    /// Error reported by the database driver during a probe
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// Error surfaced by the data-access layer
    #[error(transparent)]
    Lift(#[from] LiftError),

    /// Missing or invalid verification configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The declared result shape does not match the observed columns
    #[error("{message}")]
    Shape { message: String },

    /// Supplied procedure parameters do not match the declared ones
    #[error("Parameter type mismatch: {0}")]
    ParamMismatch(String),

    /// An error annotated with the query or call site it belongs to
    #[error("{context}\n{source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<CheckError>,
    },
}

impl CheckError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a parameter mismatch error
    pub fn param_mismatch(message: impl Into<String>) -> Self {
        Self::ParamMismatch(message.into())
    }

    /// Create a shape error, appending a suggested declaration if one could
    /// be generated
    pub fn shape(issue: &ShapeIssue, suggested: Option<&str>) -> Self {
        let message = match suggested {
            Some(decl) => format!("{issue}\nsuggested declaration:\n{decl}"),
            None => issue.to_string(),
        };
        Self::Shape { message }
    }

    /// Annotate this error with surrounding context
    pub fn in_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, unwrapping any context layers
    pub fn root(&self) -> &CheckError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_layers_unwrap_to_the_root() {
        let err = CheckError::config("boom")
            .in_context("query at a.rs:1")
            .in_context("call site 'x'");
        assert!(matches!(err.root(), CheckError::Config(_)));
        let text = err.to_string();
        assert!(text.contains("call site 'x'"));
    }

    #[test]
    fn shape_errors_carry_the_suggestion() {
        let issue = ShapeIssue::FieldNotFound {
            field: "text".to_string(),
        };
        let err = CheckError::shape(&issue, Some("struct Row { text: Option<String> }"));
        let text = err.to_string();
        assert!(text.contains("field 'text' not found"));
        assert!(text.contains("suggested declaration"));
    }
}
