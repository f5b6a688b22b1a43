//! Audit ledger - append-only record of requests and lifecycle events.
//!
//! Writes are best effort: [`record`] logs a failed insert and carries on, so a
//! broken audit table never fails the operation being audited.

use crate::{
    entities::{AuditLog, audit_log},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};
use serde_json::Value;
use tracing::warn;

/// Default number of entries returned by [`list_entries`].
pub const DEFAULT_AUDIT_LIMIT: u64 = 100;

/// A single audit entry waiting to be written.
#[derive(Debug, Clone, Default)]
pub struct AuditEntry {
    /// Acting user, None for anonymous callers
    pub user_id: Option<i64>,
    /// What happened
    pub action: String,
    /// Structured details, stored as JSON text
    pub details: Option<Value>,
    /// Client address
    pub ip_address: Option<String>,
    /// Client user agent
    pub user_agent: Option<String>,
    /// Outcome
    pub status: String,
}

impl AuditEntry {
    /// A successful lifecycle event performed by `user_id`.
    #[must_use]
    pub fn event(user_id: Option<i64>, action: impl Into<String>) -> Self {
        Self {
            user_id,
            action: action.into(),
            status: "success".to_string(),
            ..Default::default()
        }
    }

    /// Attaches structured details.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Overrides the outcome.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }
}

/// Filter for [`list_entries`].
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// Only entries by this user
    pub user_id: Option<i64>,
    /// Only entries with exactly this action
    pub action: Option<String>,
    /// Maximum number of entries, defaults to [`DEFAULT_AUDIT_LIMIT`]
    pub limit: Option<u64>,
}

/// Inserts an audit entry and returns the stored row.
pub async fn try_record<C>(db: &C, entry: AuditEntry) -> Result<audit_log::Model>
where
    C: ConnectionTrait,
{
    let row = audit_log::ActiveModel {
        user_id: Set(entry.user_id),
        action: Set(entry.action),
        details: Set(entry.details.map(|d| d.to_string())),
        ip_address: Set(entry.ip_address),
        user_agent: Set(entry.user_agent),
        status: Set(entry.status),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    Ok(row.insert(db).await?)
}

/// Best-effort insert. Failures are logged and swallowed; returns whether the entry was stored.
pub async fn record<C>(db: &C, entry: AuditEntry) -> bool
where
    C: ConnectionTrait,
{
    let action = entry.action.clone();
    match try_record(db, entry).await {
        Ok(_) => true,
        Err(e) => {
            warn!(action = %action, "Failed to write audit entry: {}", e);
            false
        }
    }
}

/// Lists audit entries newest first.
pub async fn list_entries(
    db: &DatabaseConnection,
    query: &AuditQuery,
) -> Result<Vec<audit_log::Model>> {
    let mut select = AuditLog::find();
    if let Some(user_id) = query.user_id {
        select = select.filter(audit_log::Column::UserId.eq(user_id));
    }
    if let Some(action) = query.action.as_deref() {
        select = select.filter(audit_log::Column::Action.eq(action));
    }

    select
        .order_by_desc(audit_log::Column::CreatedAt)
        .order_by_desc(audit_log::Column::Id)
        .limit(query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT))
        .all(db)
        .await
        .map_err(Into::into)
}
