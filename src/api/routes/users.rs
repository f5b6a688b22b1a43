use crate::{
    api::{
        error::ApiResult,
        extract::{Path, ValidatedJson},
        state::AppState,
    },
    core::{access::Identity, user},
    entities::{Role, user as user_entity},
    errors::Error,
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use validator::Validate;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_user))
        .route("/{id}", get(get_user))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
    pub role: Role,
}

/// Registers the local profile for an identity issued upstream.
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<user_entity::Model>)> {
    let user = user::create_user(&state.db, body.email, body.display_name, body.role).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    _identity: Identity,
    Path(id): Path<i64>,
) -> ApiResult<Json<user_entity::Model>> {
    let user = user::get_user_by_id(&state.db, id)
        .await?
        .ok_or_else(|| Error::not_found("user", id))?;
    Ok(Json(user))
}
