//! User endpoints.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post, put};
use axum::Router;
use serde::Deserialize;

use crate::service::users::CreateUserRequest;

use super::{ApiError, AppState, PageQuery, caller_from_headers};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", post(create))
        .route("/api/users/me", get(me))
        .route("/api/users/all", get(list))
        .route("/api/users/{id}", get(get_by_id).delete(remove))
        .route("/api/users/{id}/password", put(update_password))
}

/// POST /api/users — create a user (201, or 409 on duplicate username).
async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state.users.create(req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/users/me — the acting user's own profile.
async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let caller = caller_from_headers(&state, &headers).await?;
    let user = state.users.get_by_username(&caller.username).await?;
    Ok(Json(user))
}

/// GET /api/users/all — paginated listing.
async fn list(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.users.list(page.page, page.per_page).await?;
    Ok(Json(users))
}

/// GET /api/users/{id}
async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.users.get_by_id(id).await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
struct UpdatePasswordRequest {
    new_password: String,
}

/// PUT /api/users/{id}/password — owner only.
async fn update_password(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = caller_from_headers(&state, &headers).await?;
    state
        .users
        .update_password(&caller, id, &req.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/users/{id} — owner only.
async fn remove(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let caller = caller_from_headers(&state, &headers).await?;
    state.users.delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
