//! AuthorForge Common Library
//!
//! Shared code for the AuthorForge dedup worker including:
//! - Database entities, store traits and their implementations
//! - Author name normalization and blocking keys
//! - Error types and handling
//! - Configuration management
//! - Metrics

pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod names;

// Re-export commonly used types
pub use crate::config::AppConfig;
pub use crate::db::{DbPool, MemoryStore, Repository};
pub use crate::errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
