//! Error types for AuthorForge services
//!
//! Provides a single error enum for the engine and its stores:
//! - Distinct error types for different failure modes
//! - Error codes for operators and log aggregation
//! - Retry classification for batch job infrastructure

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Resource errors (4xxx)
    NotFound,
    ImportJobNotFound,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // External collaborator errors (8xxx)
    CollaboratorError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::NotFound => 4001,
            ErrorCode::ImportJobNotFound => 4004,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            ErrorCode::CollaboratorError => 8001,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Import job not found: {id}")]
    ImportJobNotFound { id: i64 },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // External collaborators (popularity generator, importer)
    #[error("Collaborator {collaborator} failed: {message}")]
    Collaborator {
        collaborator: String,
        message: String,
    },

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::ImportJobNotFound { .. } => ErrorCode::ImportJobNotFound,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Collaborator { .. } => ErrorCode::CollaboratorError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
        }
    }

    /// Whether rerunning the same pass could plausibly succeed.
    ///
    /// Passes never retry on their own; this is a hint for whatever
    /// schedules them.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::DatabaseConnection { .. } | AppError::Collaborator { .. }
        ) || matches!(self, AppError::Database(sea_orm::DbErr::ConnectionAcquire(_)))
    }

    /// Shorthand for a collaborator failure
    pub fn collaborator(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Collaborator {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
