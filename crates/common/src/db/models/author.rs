//! Author entity, populated by the bulk importer

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "authors")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Display name as imported
    #[sea_orm(column_type = "Text")]
    pub name: String,

    /// Case-normalized name used for matching, derived once on insert
    #[sea_orm(column_type = "Text", indexed)]
    pub lower_case_name: String,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Tokens of the normalized name
    pub fn name_tokens(&self) -> Vec<&str> {
        crate::names::tokens(&self.lower_case_name)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::author_popularity::Entity")]
    Popularity,
}

impl Related<super::author_popularity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Popularity.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
