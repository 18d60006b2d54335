use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::notifier::Notifier;

pub const DEFAULT_TITLE: &str = "Webhook Notification";
pub const DEFAULT_MESSAGE: &str = "You received a webhook notification!";

/* ---------- App state ---------- */
#[derive(Clone)]
pub struct AppState {
    /// Shared secret callers present as `Authorization: Bearer <token>`.
    pub auth_token: Arc<str>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(auth_token: impl Into<Arc<str>>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            auth_token: auth_token.into(),
            notifier,
        }
    }
}

/* ---------- API models ---------- */

/// Body of `POST /`. Both fields may be missing or `null`.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct NotificationRequest {
    pub title: Option<String>,
    pub message: Option<String>,
}

/// What the notifier receives once defaults are filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl NotificationRequest {
    #[must_use]
    pub fn resolve(self) -> Notification {
        Notification {
            title: non_empty_or(self.title, DEFAULT_TITLE),
            message: non_empty_or(self.message, DEFAULT_MESSAGE),
        }
    }
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_owned())
}

/// `{"status": ..., "message": ...}`, the envelope of every response.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StatusBody {
    pub status: String,
    pub message: String,
}

impl StatusBody {
    pub fn healthy(message: impl Into<String>) -> Self {
        Self::new("healthy", message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new("success", message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new("error", message)
    }

    fn new(status: &str, message: impl Into<String>) -> Self {
        Self {
            status: status.to_owned(),
            message: message.into(),
        }
    }
}
