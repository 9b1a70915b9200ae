//! Error types and handling.

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Store backend rejected or failed a request
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Record changed since it was read
    #[error("Conflict: {entity} {id} is at version {actual}, expected {expected}")]
    Conflict {
        entity: &'static str,
        id: i32,
        expected: i64,
        actual: i64,
    },

    /// A multi-step write failed and undoing the applied steps failed too
    #[error("Rollback failed after '{cause}': {rollback}")]
    RollbackFailed { cause: String, rollback: String },

    /// The user dismissed a pending decision
    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type alias for AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Create a store error with message
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a config error with message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error with message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error with message
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Message shown to the user when a reassignment fails.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Conflict { .. } => {
                "The org chart changed while you were editing it. Refresh and try again.".to_string()
            }
            Self::Cancelled => "Cancelled.".to_string(),
            _ => "Failed to move employee. Please try again.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message() {
        let err = AppError::Conflict {
            entity: "department",
            id: 4,
            expected: 2,
            actual: 3,
        };
        assert_eq!(err.to_string(), "Conflict: department 4 is at version 3, expected 2");
    }

    #[test]
    fn test_user_message_for_store_failure() {
        let err = AppError::store("connection reset");
        assert_eq!(err.user_message(), "Failed to move employee. Please try again.");
    }
}
