//! In-process implementation of every store trait
//!
//! Backs the worker's `--in-memory` mode and the engine's unit tests.
//! Ids are assigned from a single counter shared by all record kinds.

use crate::db::models::{
    AuthorId, Author, AuthorPopularity, DuplicateAuthor, ImportJob, JobStatus, RelationId,
};
use crate::db::stores::{
    AuthorStore, DuplicateStore, ImportJobStore, NewDuplicate, PopularityGenerator,
    PopularityStore,
};
use crate::errors::{AppError, Result};
use crate::names::{self, BlockingKey};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    next_id: i64,
    authors: BTreeMap<AuthorId, Author>,
    relations: BTreeMap<RelationId, DuplicateAuthor>,
    popularity: HashMap<AuthorId, AuthorPopularity>,
    import_jobs: HashMap<i64, ImportJob>,
    generated: Vec<AuthorId>,
    relation_writes_left: Option<usize>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Store holding all records in memory
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    generated_score: Option<f64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make [`PopularityGenerator::generate_popularity`] write `score` for
    /// the author, creating the record if needed. Without this the
    /// generator only records the call.
    pub fn with_generated_score(mut self, score: f64) -> Self {
        self.generated_score = Some(score);
        self
    }

    /// Insert an author, deriving the normalized name once
    pub async fn insert_author(&self, display_name: &str) -> Author {
        let mut state = self.state.write().await;
        let author = Author {
            id: state.next_id(),
            name: display_name.to_string(),
            lower_case_name: names::normalize(display_name),
            created_at: Utc::now().into(),
        };
        state.authors.insert(author.id, author.clone());
        author
    }

    /// All relations, in insertion order
    pub async fn relations(&self) -> Vec<DuplicateAuthor> {
        self.state.read().await.relations.values().cloned().collect()
    }

    /// Stand-in for the external arbiter: confirm a relation's resolution
    pub async fn resolve_relation(
        &self,
        id: RelationId,
        actual_id: AuthorId,
        clear: bool,
        at: DateTime<Utc>,
    ) -> Result<DuplicateAuthor> {
        let mut state = self.state.write().await;
        let relation = state
            .relations
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound {
                resource_type: "duplicate_author".to_string(),
                id: id.to_string(),
            })?;

        relation.actual_id = actual_id;
        relation.clear = clear;
        relation.updated_at = at.into();
        Ok(relation.clone())
    }

    /// Set or create an author's popularity record
    pub async fn set_popularity(&self, author_id: AuthorId, popularity: f64) {
        let mut state = self.state.write().await;
        upsert_popularity(&mut state, author_id, popularity);
    }

    pub async fn popularity(&self, author_id: AuthorId) -> Option<f64> {
        self.state
            .read()
            .await
            .popularity
            .get(&author_id)
            .map(|p| p.popularity)
    }

    /// Authors passed to the generator, in call order
    pub async fn generated(&self) -> Vec<AuthorId> {
        self.state.read().await.generated.clone()
    }

    /// Register an import job in the given state
    pub async fn put_import_job(&self, id: i64, status: impl Into<String>) {
        let status: String = status.into();
        let mut state = self.state.write().await;
        let now = Utc::now();
        let terminal = matches!(
            JobStatus::try_from(status.as_str()),
            Ok(JobStatus::Completed | JobStatus::Failed)
        );
        let authors_imported = state.authors.len() as i64;
        state.import_jobs.insert(
            id,
            ImportJob {
                id,
                status,
                authors_imported,
                error_message: None,
                created_at: now.into(),
                started_at: Some(now.into()),
                completed_at: terminal.then(|| now.into()),
            },
        );
    }

    /// Fail every relation insert after the next `n` succeed
    pub async fn fail_relation_writes_after(&self, n: usize) {
        self.state.write().await.relation_writes_left = Some(n);
    }
}

fn upsert_popularity(state: &mut State, author_id: AuthorId, popularity: f64) {
    let now = Utc::now().into();
    if let Some(record) = state.popularity.get_mut(&author_id) {
        record.popularity = popularity;
        record.updated_at = now;
        return;
    }

    let id = state.next_id();
    state.popularity.insert(
        author_id,
        AuthorPopularity {
            id,
            author_id,
            popularity,
            updated_at: now,
        },
    );
}

#[async_trait]
impl AuthorStore for MemoryStore {
    async fn get_all(&self) -> Result<Vec<Author>> {
        Ok(self.state.read().await.authors.values().cloned().collect())
    }

    async fn find_by_blocking_key(
        &self,
        key: &BlockingKey,
        exclude: AuthorId,
    ) -> Result<Vec<Author>> {
        Ok(self
            .state
            .read()
            .await
            .authors
            .values()
            .filter(|a| a.id != exclude && key.matches(&a.lower_case_name))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DuplicateStore for MemoryStore {
    async fn save(&self, relation: NewDuplicate) -> Result<DuplicateAuthor> {
        let mut state = self.state.write().await;

        if let Some(left) = state.relation_writes_left.as_mut() {
            if *left == 0 {
                return Err(AppError::DatabaseConnection {
                    message: "relation store unavailable".to_string(),
                });
            }
            *left -= 1;
        }

        let now = Utc::now();
        let saved = DuplicateAuthor {
            id: state.next_id(),
            son_id: relation.son_id,
            father_id: relation.father_id,
            actual_id: relation.son_id,
            clear: false,
            created_at: now.into(),
            updated_at: now.into(),
        };
        state.relations.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn find_updated_after(&self, since: DateTime<Utc>) -> Result<Vec<DuplicateAuthor>> {
        let mut found: Vec<_> = self
            .state
            .read()
            .await
            .relations
            .values()
            .filter(|r| r.updated_at > since)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.updated_at);
        Ok(found)
    }

    async fn find_between(&self, a: AuthorId, b: AuthorId) -> Result<Option<DuplicateAuthor>> {
        Ok(self
            .state
            .read()
            .await
            .relations
            .values()
            .find(|r| r.connects(a, b))
            .cloned())
    }
}

#[async_trait]
impl PopularityStore for MemoryStore {
    async fn find_by_author_id(&self, author_id: AuthorId) -> Result<Option<AuthorPopularity>> {
        Ok(self.state.read().await.popularity.get(&author_id).cloned())
    }

    async fn save(&self, record: AuthorPopularity) -> Result<AuthorPopularity> {
        let mut state = self.state.write().await;
        let stored = state
            .popularity
            .get_mut(&record.author_id)
            .ok_or_else(|| AppError::NotFound {
                resource_type: "author_popularity".to_string(),
                id: record.id.to_string(),
            })?;

        stored.popularity = record.popularity;
        stored.updated_at = Utc::now().into();
        Ok(stored.clone())
    }
}

#[async_trait]
impl PopularityGenerator for MemoryStore {
    async fn generate_popularity(&self, author_id: AuthorId) -> Result<()> {
        let mut state = self.state.write().await;
        state.generated.push(author_id);
        if let Some(score) = self.generated_score {
            upsert_popularity(&mut state, author_id, score);
        }
        Ok(())
    }
}

#[async_trait]
impl ImportJobStore for MemoryStore {
    async fn find_import_job(&self, id: i64) -> Result<Option<ImportJob>> {
        Ok(self.state.read().await.import_jobs.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_insert_author_normalizes_once() {
        let store = MemoryStore::new();
        let author = store.insert_author("John  ROBERT Smith").await;
        assert_eq!(author.name, "John  ROBERT Smith");
        assert_eq!(author.lower_case_name, "john robert smith");
    }

    #[tokio::test]
    async fn test_blocking_lookup_excludes_self() {
        let store = MemoryStore::new();
        let john = store.insert_author("John Smith").await;
        let j = store.insert_author("J. Smith").await;
        store.insert_author("Mary Smith").await;
        store.insert_author("John Smithers").await;

        let key = BlockingKey::for_name(&john.lower_case_name).unwrap();
        let found = assert_ok!(store.find_by_blocking_key(&key, john.id).await);
        assert_eq!(found.iter().map(|a| a.id).collect::<Vec<_>>(), vec![j.id]);
    }

    #[tokio::test]
    async fn test_new_relation_points_actual_at_son() {
        let store = MemoryStore::new();
        let saved = assert_ok!(DuplicateStore::save(&store, NewDuplicate::new(1, 2)).await);
        assert_eq!(saved.actual_id, 1);
        assert!(!saved.clear);

        let between = assert_ok!(store.find_between(2, 1).await);
        assert_eq!(between.map(|r| r.id), Some(saved.id));
        assert!(assert_ok!(store.find_between(1, 3).await).is_none());
    }

    #[tokio::test]
    async fn test_updated_after_is_strict() {
        let store = MemoryStore::new();
        let saved = assert_ok!(DuplicateStore::save(&store, NewDuplicate::new(1, 2)).await);
        let at = Utc::now() + chrono::Duration::minutes(5);
        assert_ok!(store.resolve_relation(saved.id, 2, true, at).await);

        assert!(assert_ok!(store.find_updated_after(at).await).is_empty());
        let later = assert_ok!(store.find_updated_after(at - chrono::Duration::seconds(1)).await);
        assert_eq!(later.len(), 1);
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let store = MemoryStore::new();
        store.fail_relation_writes_after(1).await;
        assert_ok!(DuplicateStore::save(&store, NewDuplicate::new(1, 2)).await);
        assert!(DuplicateStore::save(&store, NewDuplicate::new(3, 4)).await.is_err());
        assert_eq!(store.relations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_generator_records_calls() {
        let store = MemoryStore::new().with_generated_score(4.5);
        assert_ok!(store.generate_popularity(9).await);
        assert_eq!(store.generated().await, vec![9]);
        assert_eq!(store.popularity(9).await, Some(4.5));
    }
}
