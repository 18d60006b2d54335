use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
};

use crate::{models::StatusBody, notifier::NotifierError};

#[derive(Debug)]
pub enum AppError {
    /// Missing or wrong bearer token -> 401 with `WWW-Authenticate: Bearer`.
    Unauthorized,
    /// Body is not a JSON object of optional strings -> 400.
    InvalidJson(serde_json::Error),
    /// Notifier failed -> 501 if unsupported, 500 otherwise; logged.
    Notifier(NotifierError),
}

impl From<NotifierError> for AppError {
    fn from(e: NotifierError) -> Self {
        Self::Notifier(e)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidJson(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::Unauthorized => {
                let mut res = (
                    StatusCode::UNAUTHORIZED,
                    Json(StatusBody::error("Unauthorized")),
                )
                    .into_response();
                res.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Bearer"),
                );
                res
            }
            Self::InvalidJson(err) => {
                tracing::debug!(error = %err, "rejected malformed body");
                (
                    StatusCode::BAD_REQUEST,
                    Json(StatusBody::error("Invalid JSON")),
                )
                    .into_response()
            }
            Self::Notifier(err) => {
                tracing::error!(error = %err, "notification failed");
                let code = if err.is_unsupported() {
                    StatusCode::NOT_IMPLEMENTED
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                let body = Json(StatusBody::error(format!(
                    "Failed to send notification: {err}"
                )));
                (code, body).into_response()
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
