//! Error types for the billable time tracker
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized to a presentation layer.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed input: bad bounds, missing reference, negative rate
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invoice requested for a period without billable minutes
    #[error("No billable time between {start} and {end}")]
    EmptyPeriod { start: NaiveDate, end: NaiveDate },

    /// The acting user does not own the target record
    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Generic(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Whether the caller can fix the condition by changing its input.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_)
                | AppError::EmptyPeriod { .. }
                | AppError::Authorization(_)
                | AppError::NotFound { .. }
        )
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_correctable_classification() {
        assert!(AppError::validation("end before start").is_user_correctable());
        assert!(AppError::not_found("Project", "p1").is_user_correctable());
        assert!(!AppError::Generic("boom".to_string()).is_user_correctable());
    }

    #[test]
    fn test_serializes_as_display_string() {
        let err = AppError::not_found("Invoice", "abc");
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Invoice not found: abc\"");
    }
}
