//! Saved deal entity - A user's bookmark on a deal.
//! Independent of claims and carries no capacity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Saved deal database model, keyed by the (user, deal) pair
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "saved_deals")]
pub struct Model {
    /// User who saved the deal
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    /// Deal that was saved
    #[sea_orm(primary_key, auto_increment = false)]
    pub deal_id: i64,
    /// When the bookmark was made
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::deal::Entity",
        from = "Column::DealId",
        to = "super::deal::Column::Id"
    )]
    Deal,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::deal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Deal.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
