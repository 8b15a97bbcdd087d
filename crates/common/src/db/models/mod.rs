//! SeaORM entity models
//!
//! Database entities for AuthorForge

mod author;
mod author_popularity;
mod duplicate_author;
mod import_job;

pub use author::{
    Entity as AuthorEntity,
    Model as Author,
    ActiveModel as AuthorActiveModel,
    Column as AuthorColumn,
};

pub use duplicate_author::{
    Entity as DuplicateAuthorEntity,
    Model as DuplicateAuthor,
    ActiveModel as DuplicateAuthorActiveModel,
    Column as DuplicateAuthorColumn,
};

pub use author_popularity::{
    Entity as AuthorPopularityEntity,
    Model as AuthorPopularity,
    ActiveModel as AuthorPopularityActiveModel,
    Column as AuthorPopularityColumn,
};

pub use import_job::{
    Entity as ImportJobEntity,
    Model as ImportJob,
    ActiveModel as ImportJobActiveModel,
    Column as ImportJobColumn,
    JobStatus,
};

/// Author identifier
pub type AuthorId = i64;

/// Duplicate-relation identifier
pub type RelationId = i64;
