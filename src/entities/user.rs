//! User entity - The local profile behind an upstream identity.
//!
//! Authentication happens upstream; this row exists so that claims, saved deals,
//! notifications and merchant ownership can reference a user by foreign key.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role granted to a user by the identity provider
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Browses, saves and claims deals
    #[sea_orm(string_value = "customer")]
    Customer,
    /// Runs one or more merchants and their deals
    #[sea_orm(string_value = "merchant")]
    Merchant,
    /// Platform operator with access to the audit log and sweeps
    #[sea_orm(string_value = "super_merchant")]
    SuperMerchant,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "merchant" => Ok(Self::Merchant),
            "super_merchant" => Ok(Self::SuperMerchant),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier, matches the `x-user-id` supplied by the identity provider
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Contact email, unique across users
    #[sea_orm(unique)]
    pub email: String,
    /// Name shown to merchants and in notifications
    pub display_name: String,
    /// Role used for capability checks
    pub role: Role,
    /// When the profile was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user owns many merchants
    #[sea_orm(has_many = "super::merchant::Entity")]
    Merchants,
    /// One user holds many claims
    #[sea_orm(has_many = "super::deal_claim::Entity")]
    Claims,
    /// One user bookmarks many deals
    #[sea_orm(has_many = "super::saved_deal::Entity")]
    SavedDeals,
}

impl Related<super::merchant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Merchants.def()
    }
}

impl Related<super::deal_claim::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Claims.def()
    }
}

impl Related<super::saved_deal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SavedDeals.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
