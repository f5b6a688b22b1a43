//! Operator endpoints: sweeps, the audit log and platform numbers.

use crate::{
    api::{error::ApiResult, extract::Query, state::AppState},
    core::{
        access::{self, Capabilities, Identity, Route},
        audit::{self, AuditQuery},
        recurrence::{self, SweepResult},
        report::{self, PlatformSummary},
    },
    entities::audit_log,
};
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sweep", post(run_sweep))
        .route("/audit-logs", get(audit_logs))
        .route("/summary", get(summary))
}

/// Runs the maintenance sweep now instead of waiting for the background task.
pub async fn run_sweep(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<SweepResult>> {
    access::require(&identity, Route::Operations, Capabilities::RUN_SWEEP)?;
    let result =
        recurrence::run_sweep(&state.db, Utc::now(), state.settings.sweep.catch_up).await?;
    Ok(Json(result))
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditLogQuery {
    pub user_id: Option<i64>,
    pub action: Option<String>,
    pub limit: Option<u64>,
}

pub async fn audit_logs(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<Json<Vec<audit_log::Model>>> {
    access::require(&identity, Route::AuditLog, Capabilities::VIEW_AUDIT_LOG)?;
    let max_page = state.settings.deals.max_page_size;
    let entries = audit::list_entries(
        &state.db,
        &AuditQuery {
            user_id: query.user_id,
            action: query.action,
            limit: query.limit.map(|limit| limit.min(max_page)),
        },
    )
    .await?;
    Ok(Json(entries))
}

pub async fn summary(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<PlatformSummary>> {
    let summary = report::platform_summary(&state.db, &identity, Utc::now()).await?;
    Ok(Json(summary))
}
