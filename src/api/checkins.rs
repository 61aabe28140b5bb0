//! Check-in endpoints, including on-demand enrichment.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;

use crate::service::checkins::{CreateCheckInRequest, PatchCheckInRequest};

use super::{ApiError, AppState, PageQuery, caller_from_headers};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/checkins", post(create).get(list_mine))
        .route(
            "/api/checkins/{id}",
            get(get_by_id).patch(patch).delete(remove),
        )
        .route("/api/checkins/{id}/generate-message", post(generate_message))
}

/// POST /api/checkins — record a check-in for the acting user (201).
async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateCheckInRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = caller_from_headers(&state, &headers).await?;
    let created = state.check_ins.create(caller.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/checkins — the acting user's check-ins, paginated.
async fn list_mine(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = caller_from_headers(&state, &headers).await?;
    let check_ins = state
        .check_ins
        .list_for_user(caller.user_id, page.page, page.per_page)
        .await?;
    Ok(Json(check_ins))
}

/// GET /api/checkins/{id}
async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let check_in = state.check_ins.get(id).await?;
    Ok(Json(check_in))
}

/// PATCH /api/checkins/{id} — owner only.
async fn patch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<PatchCheckInRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = caller_from_headers(&state, &headers).await?;
    let updated = state.check_ins.update_partial(&caller, id, req).await?;
    Ok(Json(updated))
}

/// DELETE /api/checkins/{id} — owner only; cascades to the generated message.
async fn remove(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let caller = caller_from_headers(&state, &headers).await?;
    state.check_ins.delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/checkins/{id}/generate-message — enrich the check-in (201).
///
/// Always succeeds for an existing check-in, even when the generation
/// service is unreachable; the response then carries an empty message.
async fn generate_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.enrichment.enrich(id).await?;
    Ok((StatusCode::CREATED, Json(response)))
}
