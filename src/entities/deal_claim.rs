//! Deal claim entity - One user's hold on one unit of a deal's capacity.
//!
//! A claim starts as `claimed`, becomes `used` when the merchant redeems it in
//! store, and becomes `expired` when its window lapses unused.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a claim
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    /// Claimed and waiting to be redeemed
    #[sea_orm(string_value = "claimed")]
    Claimed,
    /// Redeemed at the merchant
    #[sea_orm(string_value = "used")]
    Used,
    /// Lapsed without being redeemed
    #[sea_orm(string_value = "expired")]
    Expired,
}

/// Deal claim database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "deal_claims")]
pub struct Model {
    /// Unique identifier for the claim
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User holding the claim
    pub user_id: i64,
    /// Deal being claimed
    pub deal_id: i64,
    /// Current status
    pub status: ClaimStatus,
    /// When the claim was made
    pub claimed_at: DateTimeUtc,
    /// When the merchant redeemed the claim
    pub redeemed_at: Option<DateTimeUtc>,
}

/// Defines relationships between `DealClaim` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each claim belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// Each claim belongs to one deal
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
