use axum::Json;

use crate::models::StatusBody;

pub async fn get() -> Json<StatusBody> {
    Json(StatusBody::healthy("PopDesk webhook server is running"))
}
