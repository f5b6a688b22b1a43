//! Merchant entity - A business that publishes deals.
//!
//! Merchants are owned by a merchant-role user (or by nobody for legacy rows)
//! and are soft-deactivated rather than deleted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Merchant database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "merchants")]
pub struct Model {
    /// Unique identifier for the merchant
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user, None for unclaimed or legacy merchants
    pub owner_id: Option<i64>,
    /// Business name shown on the map and in lists
    pub name: String,
    /// Business category (e.g., "food", "fitness")
    pub category: String,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Street address
    pub address: String,
    /// Optional contact phone number
    pub phone: Option<String>,
    /// Optional website
    pub website: Option<String>,
    /// Soft delete flag - inactive merchants are hidden but data is preserved
    pub is_active: bool,
    /// When the merchant was created
    pub created_at: DateTimeUtc,
    /// When the merchant was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Merchant and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each merchant may belong to one owning user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id"
    )]
    Owner,
    /// One merchant has many deals
    #[sea_orm(has_many = "super::deal::Entity")]
    Deals,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::deal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Deals.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
