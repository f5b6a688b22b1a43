//! Audit log entity - Append-only ledger of requests and lifecycle events.
//! Rows are only ever inserted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Audit log database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Acting user, None for anonymous requests
    pub user_id: Option<i64>,
    /// What happened (e.g., `"deal_claimed"`, `"POST /api/v1/deals/1/claim"`)
    pub action: String,
    /// Free-form JSON details
    pub details: Option<String>,
    /// Client address as reported by the proxy
    pub ip_address: Option<String>,
    /// Client user agent
    pub user_agent: Option<String>,
    /// Outcome, an HTTP status code or `"success"`/`"failure"`
    pub status: String,
    /// When the entry was written
    pub created_at: DateTimeUtc,
}

/// `AuditLog` has no enforced relationships so that entries survive any cleanup
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
