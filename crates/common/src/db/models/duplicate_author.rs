//! Duplicate-relation entity: a directed son -> father edge between authors

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "duplicate_authors")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Author discovered as a possible duplicate
    pub son_id: i64,

    /// Candidate canonical author found through blocking
    pub father_id: i64,

    /// Currently resolved canonical author for the son, the son itself
    /// until an arbiter re-points it
    pub actual_id: i64,

    /// Whether the resolution has been confirmed
    pub clear: bool,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(indexed)]
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// The son has been merged into another identity
    pub fn is_resolved_elsewhere(&self) -> bool {
        self.clear && self.actual_id != self.son_id
    }

    /// Whether this edge joins `a` and `b` in either orientation
    pub fn connects(&self, a: i64, b: i64) -> bool {
        (self.son_id == a && self.father_id == b) || (self.son_id == b && self.father_id == a)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::author::Entity",
        from = "Column::SonId",
        to = "super::author::Column::Id",
        on_delete = "Cascade"
    )]
    Son,

    #[sea_orm(
        belongs_to = "super::author::Entity",
        from = "Column::FatherId",
        to = "super::author::Column::Id",
        on_delete = "Cascade"
    )]
    Father,

    #[sea_orm(
        belongs_to = "super::author::Entity",
        from = "Column::ActualId",
        to = "super::author::Column::Id"
    )]
    Actual,
}

impl ActiveModelBehavior for ActiveModel {}
