use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, models::AppState};

/// Rejects the request unless it carries exactly `Authorization: Bearer <secret>`.
///
/// Runs before the handler, so the body of an unauthenticated request is
/// never read.
///
/// # Errors
/// Returns [`AppError::Unauthorized`] on a missing header, another scheme, or
/// a token that differs from the configured secret in any byte.
pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| *token == &*state.auth_token)
        .ok_or_else(|| {
            tracing::warn!("rejected request with missing or invalid bearer token");
            AppError::Unauthorized
        })?;

    Ok(next.run(request).await)
}
