use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::app_state::AppState;
use crate::error::ApiError;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Gate for mutating endpoints. Compares a shared token from configuration;
/// with no token configured the gate is open (local development). Identity
/// and role management live upstream of this service.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = &state.config.admin_token else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    if provided == Some(expected.as_str()) {
        Ok(next.run(request).await)
    } else {
        Err(ApiError::Unauthorized)
    }
}
