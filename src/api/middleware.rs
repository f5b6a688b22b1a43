//! Request audit middleware.
//!
//! Every request except health checks leaves one row in the audit log. The
//! insert runs on a spawned task after the response is produced and its
//! failure is only logged.

use crate::{
    api::{extract::user_id_from_headers, state::AppState},
    core::audit::{self, AuditEntry},
};
use axum::{
    extract::{OriginalUri, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde_json::json;

fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    forwarded
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(ToString::to_string)
}

pub async fn audit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map_or_else(|| request.uri().path(), |uri| uri.path())
        .to_string();
    if path.ends_with("/health") {
        return next.run(request).await;
    }

    let method = request.method().to_string();
    let headers = request.headers();
    let user_id = user_id_from_headers(headers);
    let ip_address = client_ip(headers);
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let response = next.run(request).await;
    let status = response.status();

    let mut entry = AuditEntry::event(user_id, format!("{method} {path}"))
        .with_details(json!({ "status_code": status.as_u16() }))
        .with_status(if status.is_success() { "success" } else { "failure" });
    entry.ip_address = ip_address;
    entry.user_agent = user_agent;
    let db = state.db.clone();
    tokio::spawn(async move {
        audit::record(&db, entry).await;
    });

    response
}
