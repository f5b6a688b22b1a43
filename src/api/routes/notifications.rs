use crate::{
    api::{error::ApiResult, extract::Path, state::AppState},
    core::{access::Identity, notification},
    entities::notification as notification_entity,
};
use axum::{
    Json, Router,
    extract::State,
    routing::post,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/{id}/read", post(mark_read))
}

pub async fn mark_read(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
) -> ApiResult<Json<notification_entity::Model>> {
    let notification = notification::mark_read(&state.db, &identity, id).await?;
    Ok(Json(notification))
}
