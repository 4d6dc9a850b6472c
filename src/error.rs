//! Error types for ShelfReader
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are categorized by domain (accounts, age gate, storage, reader, etc.)
//! so callers at the FFI boundary can decide what to show.
//!
//! The age gate itself never surfaces these to its callers: store and
//! presenter failures are folded into a `false` answer inside the gate worker.
//! They still flow through every other public operation of the crate.

use thiserror::Error;

/// Result type alias using our ShelfError type
pub type Result<T> = std::result::Result<T, ShelfError>;

/// Main error type for ShelfReader
#[derive(Error, Debug)]
pub enum ShelfError {
    // ===== Account Errors =====

    /// No library account is signed in
    #[error("No active account")]
    NoActiveAccount,

    /// Account not found in local database
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Account record failed validation before being saved
    #[error("Account validation failed: {field} {reason}")]
    AccountValidationFailed {
        field: String,
        reason: String,
    },

    // ===== Age Gate Errors =====

    /// The platform could not show the age prompt or never answered it
    #[error("Age prompt presentation failed: {0}")]
    PromptPresentationFailed(String),

    /// The gate worker is no longer running
    #[error("Age gate is not running")]
    GateUnavailable,

    /// The process-wide gate was used before it was initialized
    #[error("Age gate not initialized. {0}")]
    GateNotInitialized(String),

    /// A prompt completion referenced an unknown prompt id
    #[error("Unknown age prompt: {0}")]
    UnknownPrompt(u64),

    // ===== Reader Errors =====

    /// Publication format has no reading module
    #[error("Unsupported publication format: {0}")]
    UnsupportedFormat(String),

    /// A settings range was constructed with non-finite bounds
    #[error("Invalid settings range: {0}")]
    InvalidRange(String),

    // ===== Database Errors =====

    /// Database schema migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Stored value could not be decoded
    #[error("Corrupt stored value for {field}: {value}")]
    CorruptRecord {
        field: String,
        value: String,
    },

    // ===== File Errors =====

    /// Generic file I/O error
    #[error("File I/O error: {0}")]
    FileIoError(String),

    // ===== Configuration/State Errors =====

    /// Configuration file error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Generic input validation error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ===== General Errors =====

    /// Internal error that should not normally occur
    #[error("Internal error: {0}")]
    InternalError(String),

    // ===== External Library Errors =====

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Database driver error from sqlx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// Helper methods for creating common errors
impl ShelfError {
    /// Create an AccountNotFound error
    pub fn account_not_found<S: Into<String>>(account_id: S) -> Self {
        ShelfError::AccountNotFound(account_id.into())
    }

    /// Create an InvalidInput error with a message
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        ShelfError::InvalidInput(message.into())
    }

    /// Create an InternalError with a message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        ShelfError::InternalError(message.into())
    }

    /// Create a PromptPresentationFailed error
    pub fn prompt_failed<S: Into<String>>(reason: S) -> Self {
        ShelfError::PromptPresentationFailed(reason.into())
    }

    /// Create a CorruptRecord error
    pub fn corrupt<F: Into<String>, V: ToString>(field: F, value: V) -> Self {
        ShelfError::CorruptRecord {
            field: field.into(),
            value: value.to_string(),
        }
    }

    /// Check if error is retryable
    ///
    /// A failed prompt can be shown again, and a busy database may free up.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ShelfError::PromptPresentationFailed(_)
                | ShelfError::SqlxError(sqlx::Error::PoolTimedOut)
        )
    }

    /// Check if error means the user has to sign in first
    pub fn is_account_error(&self) -> bool {
        matches!(
            self,
            ShelfError::NoActiveAccount
                | ShelfError::AccountNotFound(_)
                | ShelfError::AccountValidationFailed { .. }
        )
    }

    /// Get user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            ShelfError::NoActiveAccount => {
                "Please sign in with your library card to continue.".to_string()
            }
            ShelfError::AccountNotFound(_) => {
                "This library account is no longer available on this device. Please sign in again.".to_string()
            }
            ShelfError::UnsupportedFormat(format) => {
                format!("This book's format ({}) can't be opened in the app.", format)
            }
            ShelfError::GateUnavailable | ShelfError::GateNotInitialized(_) => {
                "The app is still starting up. Please try again.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_failure_is_retryable() {
        assert!(ShelfError::prompt_failed("no window").is_retryable());
        assert!(!ShelfError::NoActiveAccount.is_retryable());
    }

    #[test]
    fn test_account_errors() {
        assert!(ShelfError::NoActiveAccount.is_account_error());
        assert!(ShelfError::account_not_found("card-1").is_account_error());
        assert!(!ShelfError::internal("boom").is_account_error());
    }

    #[test]
    fn test_user_message_hides_details() {
        let msg = ShelfError::account_not_found("2391000123").user_message();
        assert!(!msg.contains("2391000123"));
        assert_eq!(
            ShelfError::internal("boom").user_message(),
            "Internal error: boom"
        );
    }
}
