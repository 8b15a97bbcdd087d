//! Repository pattern for database operations
//!
//! Implements every store trait the dedup engine consumes on top of a
//! Postgres connection pool.

use crate::db::models::*;
use crate::db::stores::{
    AuthorStore, DuplicateStore, ImportJobStore, NewDuplicate, PopularityGenerator,
    PopularityStore,
};
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::names::BlockingKey;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Unchanged, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, DbBackend, EntityTrait, QueryFilter, QueryOrder, Set, Statement,
};
use tracing::debug;

/// Recompute one author's popularity from the popularity of their papers,
/// including papers of sons whose confirmed resolution points at them.
const GENERATE_POPULARITY_SQL: &str = r#"
    INSERT INTO author_popularity (author_id, popularity, updated_at)
    SELECT $1::bigint, COALESCE(SUM(pp.popularity), 0), NOW()
    FROM paper_popularity pp
    WHERE pp.paper_id IN (
        SELECT pa.paper_id
        FROM paper_authors pa
        WHERE pa.author_id = $1
           OR pa.author_id IN (
               SELECT d.son_id
               FROM duplicate_authors d
               WHERE d.clear AND d.actual_id = $1 AND d.son_id <> $1
           )
    )
    ON CONFLICT (author_id) DO UPDATE SET
        popularity = EXCLUDED.popularity,
        updated_at = EXCLUDED.updated_at
"#;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }
}

// ========================================================================
// Author Operations
// ========================================================================

#[async_trait]
impl AuthorStore for Repository {
    async fn get_all(&self) -> Result<Vec<Author>> {
        AuthorEntity::find()
            .order_by_asc(AuthorColumn::Id)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_by_blocking_key(
        &self,
        key: &BlockingKey,
        exclude: AuthorId,
    ) -> Result<Vec<Author>> {
        AuthorEntity::find()
            .filter(AuthorColumn::LowerCaseName.like(key.like_pattern()))
            .filter(AuthorColumn::Id.ne(exclude))
            .order_by_asc(AuthorColumn::Id)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }
}

// ========================================================================
// Duplicate-Relation Operations
// ========================================================================

#[async_trait]
impl DuplicateStore for Repository {
    async fn save(&self, relation: NewDuplicate) -> Result<DuplicateAuthor> {
        let now = Utc::now();

        let model = DuplicateAuthorActiveModel {
            son_id: Set(relation.son_id),
            father_id: Set(relation.father_id),
            actual_id: Set(relation.son_id),
            clear: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let saved = model.insert(self.write_conn()).await?;
        debug!(
            relation_id = saved.id,
            son = saved.son_id,
            father = saved.father_id,
            "Duplicate relation inserted"
        );
        Ok(saved)
    }

    async fn find_updated_after(&self, since: DateTime<Utc>) -> Result<Vec<DuplicateAuthor>> {
        DuplicateAuthorEntity::find()
            .filter(DuplicateAuthorColumn::UpdatedAt.gt(since))
            .order_by_asc(DuplicateAuthorColumn::UpdatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_between(&self, a: AuthorId, b: AuthorId) -> Result<Option<DuplicateAuthor>> {
        DuplicateAuthorEntity::find()
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(DuplicateAuthorColumn::SonId.eq(a))
                            .add(DuplicateAuthorColumn::FatherId.eq(b)),
                    )
                    .add(
                        Condition::all()
                            .add(DuplicateAuthorColumn::SonId.eq(b))
                            .add(DuplicateAuthorColumn::FatherId.eq(a)),
                    ),
            )
            // Primary, so edges written earlier in the pass are visible despite replica lag
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }
}

// ========================================================================
// Popularity Operations
// ========================================================================

#[async_trait]
impl PopularityStore for Repository {
    async fn find_by_author_id(&self, author_id: AuthorId) -> Result<Option<AuthorPopularity>> {
        AuthorPopularityEntity::find()
            .filter(AuthorPopularityColumn::AuthorId.eq(author_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn save(&self, record: AuthorPopularity) -> Result<AuthorPopularity> {
        let model = AuthorPopularityActiveModel {
            id: Unchanged(record.id),
            author_id: Unchanged(record.author_id),
            popularity: Set(record.popularity),
            updated_at: Set(Utc::now().into()),
        };

        model.update(self.write_conn()).await.map_err(Into::into)
    }
}

#[async_trait]
impl PopularityGenerator for Repository {
    async fn generate_popularity(&self, author_id: AuthorId) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            GENERATE_POPULARITY_SQL,
            vec![author_id.into()],
        );

        self.write_conn()
            .execute(stmt)
            .await
            .map_err(|e| AppError::collaborator("popularity-generator", e.to_string()))?;
        debug!(author_id, "Popularity recomputed");
        Ok(())
    }
}

// ========================================================================
// Import Job Operations
// ========================================================================

#[async_trait]
impl ImportJobStore for Repository {
    async fn find_import_job(&self, id: i64) -> Result<Option<ImportJob>> {
        ImportJobEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }
}
