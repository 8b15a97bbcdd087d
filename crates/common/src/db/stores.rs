//! Store traits consumed by the dedup engine
//!
//! The engine never talks to a database directly; it only sees these
//! interfaces. [`Repository`](super::Repository) implements them over
//! Postgres and [`MemoryStore`](super::memory::MemoryStore) in process.

use crate::db::models::{AuthorId, Author, AuthorPopularity, DuplicateAuthor, ImportJob};
use crate::errors::Result;
use crate::names::BlockingKey;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A duplicate-relation to be inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewDuplicate {
    pub son_id: AuthorId,
    pub father_id: AuthorId,
}

impl NewDuplicate {
    pub fn new(son_id: AuthorId, father_id: AuthorId) -> Self {
        Self { son_id, father_id }
    }
}

/// Read access to imported authors
#[async_trait]
pub trait AuthorStore: Send + Sync {
    /// Every author record
    async fn get_all(&self) -> Result<Vec<Author>>;

    /// Authors whose normalized name matches the key's
    /// `"<initial>% <surname>"` pattern, excluding `exclude`
    async fn find_by_blocking_key(
        &self,
        key: &BlockingKey,
        exclude: AuthorId,
    ) -> Result<Vec<Author>>;
}

/// Persistence of duplicate-relations
#[async_trait]
pub trait DuplicateStore: Send + Sync {
    /// Insert a new relation with `actual = son` and `clear = false`
    async fn save(&self, relation: NewDuplicate) -> Result<DuplicateAuthor>;

    /// Relations whose `updated_at` is strictly after `since`
    async fn find_updated_after(&self, since: DateTime<Utc>) -> Result<Vec<DuplicateAuthor>>;

    /// Any relation joining `a` and `b`, in either orientation
    async fn find_between(&self, a: AuthorId, b: AuthorId) -> Result<Option<DuplicateAuthor>>;
}

/// Persistence of per-author popularity
#[async_trait]
pub trait PopularityStore: Send + Sync {
    async fn find_by_author_id(&self, author_id: AuthorId) -> Result<Option<AuthorPopularity>>;

    /// Write back an existing record
    async fn save(&self, record: AuthorPopularity) -> Result<AuthorPopularity>;
}

/// Recomputes and persists the popularity of one author
#[async_trait]
pub trait PopularityGenerator: Send + Sync {
    async fn generate_popularity(&self, author_id: AuthorId) -> Result<()>;
}

/// Lookup of bulk import jobs
#[async_trait]
pub trait ImportJobStore: Send + Sync {
    async fn find_import_job(&self, id: i64) -> Result<Option<ImportJob>>;
}
