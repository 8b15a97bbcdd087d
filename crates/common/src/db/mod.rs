//! Database layer for AuthorForge
//!
//! Provides:
//! - SeaORM entity models
//! - Store traits consumed by the dedup engine
//! - A Postgres repository and an in-memory store implementing them
//! - Connection pool management

pub mod memory;
pub mod models;
mod repository;
pub mod stores;

pub use memory::MemoryStore;
pub use repository::Repository;
pub use stores::{
    AuthorStore, DuplicateStore, ImportJobStore, NewDuplicate, PopularityGenerator,
    PopularityStore,
};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use backoff::{future::retry, ExponentialBackoff};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::{info, warn};

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    /// Primary connection (for writes)
    pub primary: DatabaseConnection,

    /// Read replica connection (optional)
    pub replica: Option<DatabaseConnection>,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to primary database...");
        let primary = connect_with_retry(&config.url, config, "primary").await?;

        // Connect to replica if configured
        let replica = if let Some(ref read_url) = config.read_url {
            info!("Connecting to read replica...");
            Some(connect_with_retry(read_url, config, "replica").await?)
        } else {
            None
        };

        info!("Database connections established");

        Ok(Self { primary, replica })
    }

    /// Get the connection for reads (replica if available, otherwise primary)
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    /// Get the connection for writes (always primary)
    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;

        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Primary ping failed: {}", e),
            })?;

        if let Some(ref replica) = self.replica {
            replica
                .execute_unprepared("SELECT 1")
                .await
                .map_err(|e| AppError::DatabaseConnection {
                    message: format!("Replica ping failed: {}", e),
                })?;
        }

        Ok(())
    }
}

/// Connect, retrying with exponential backoff until the configured budget
/// is spent.
async fn connect_with_retry(
    url: &str,
    config: &DatabaseConfig,
    role: &'static str,
) -> Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(url);
    opts.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .sqlx_logging(false);

    let policy = ExponentialBackoff {
        max_elapsed_time: Some(Duration::from_secs(config.connect_retry_budget_secs)),
        ..Default::default()
    };

    retry(policy, || {
        let opts = opts.clone();
        async move {
            Database::connect(opts).await.map_err(|e| {
                warn!(role, error = %e, "Database connection attempt failed");
                backoff::Error::transient(e)
            })
        }
    })
    .await
    .map_err(|e| AppError::DatabaseConnection {
        message: format!("Failed to connect to {}: {}", role, e),
    })
}
