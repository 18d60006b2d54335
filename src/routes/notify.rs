use axum::{Json, body::Bytes, extract::State};
use serde_json::{Map, Value};

use crate::error::AppResult;
use crate::models::{AppState, NotificationRequest, StatusBody};

/// Relay one notification.
///
/// The body is parsed by hand rather than through the `Json` extractor so
/// that a missing `Content-Type` is accepted and every parse failure maps
/// to the same 400. It must be a JSON object; arrays are rejected before
/// they reach the struct deserializer, which would take them positionally.
///
/// # Errors
/// Returns an error if the body is not a JSON object of optional strings or
/// the notifier fails.
pub async fn send(State(state): State<AppState>, body: Bytes) -> AppResult<Json<StatusBody>> {
    let fields: Map<String, Value> = serde_json::from_slice(&body)?;
    let req: NotificationRequest = serde_json::from_value(Value::Object(fields))?;
    let notification = req.resolve();

    state
        .notifier
        .display(&notification.title, &notification.message)
        .await?;

    tracing::info!(title = %notification.title, "notification sent");
    Ok(Json(StatusBody::success("Notification sent")))
}
