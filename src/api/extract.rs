//! Request extractors: caller identity, path and query parameters, and
//! validated JSON bodies. All of them reject with the JSON error envelope.

use crate::{api::error::ApiError, core::access::Identity, entities::Role};
use axum::{
    Json,
    extract::{self, FromRequest, FromRequestParts, Request},
    http::{HeaderMap, request::Parts},
};
use serde::de::DeserializeOwned;
use validator::Validate;

/// Header carrying the caller's user id, set by the upstream auth proxy.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the caller's role, set by the upstream auth proxy.
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Reads the user id alone, for callers that only need to attribute a request.
pub fn user_id_from_headers(headers: &HeaderMap) -> Option<i64> {
    header_str(headers, USER_ID_HEADER).and_then(|raw| raw.parse().ok())
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw_id = header_str(&parts.headers, USER_ID_HEADER)
            .ok_or_else(|| ApiError::unauthorized(format!("missing {USER_ID_HEADER} header")))?;
        let user_id = raw_id
            .parse::<i64>()
            .map_err(|_| ApiError::unauthorized(format!("malformed {USER_ID_HEADER} header")))?;

        let role = header_str(&parts.headers, USER_ROLE_HEADER)
            .ok_or_else(|| ApiError::unauthorized(format!("missing {USER_ROLE_HEADER} header")))?
            .parse::<Role>()
            .map_err(ApiError::unauthorized)?;

        Ok(Self::new(user_id, role))
    }
}

/// JSON body that has passed its `validator` rules.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Path parameters; a value that fails to parse is a 400 in the error envelope.
#[derive(Debug, Clone)]
pub struct Path<T>(pub T);

impl<T, S> FromRequestParts<S> for Path<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let extract::Path(value) = extract::Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Query string parameters, rejected the same way as [`Path`].
#[derive(Debug, Clone)]
pub struct Query<T>(pub T);

impl<T, S> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let extract::Query(value) = extract::Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}
