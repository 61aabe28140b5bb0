//! HTTP API — thin axum layer over the services.
//!
//! Real authentication lives upstream of this service; handlers resolve the
//! acting user from the `x-username` header the gateway sets, and every
//! authorization decision happens in the services against that explicit
//! [`Caller`].

mod checkins;
mod users;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::enrichment::EnrichmentService;
use crate::error::ServiceError;
use crate::service::{Caller, CheckInService, UserService};

/// Shared state for all API routes.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserService>,
    pub check_ins: Arc<CheckInService>,
    pub enrichment: Arc<EnrichmentService>,
}

/// Build the full API router.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .merge(users::routes())
        .merge(checkins::routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Pagination query parameters; pages are zero-based.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_per_page() -> u32 {
    20
}

/// Resolve the acting user from the `x-username` header.
async fn caller_from_headers(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Caller, ApiError> {
    let username = headers
        .get("x-username")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;
    Ok(state.users.resolve_caller(username).await?)
}

/// HTTP-facing error wrapper around [`ServiceError`].
pub enum ApiError {
    Unauthorized,
    Service(ServiceError),
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self::Service(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Missing caller identity".into()),
            Self::Service(e) => {
                let status = match &e {
                    ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
                    ServiceError::Conflict(_) => StatusCode::CONFLICT,
                    ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
                    ServiceError::PasswordHash(_) | ServiceError::Storage(_) => {
                        tracing::error!(error = %e, "Internal error");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
