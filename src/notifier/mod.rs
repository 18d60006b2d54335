//! Delivery of a resolved notification to the user.
//!
//! The concrete [`Notifier`] is chosen once at startup from configuration;
//! handlers only ever see `Arc<dyn Notifier>`.

mod desktop;
mod ntfy;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::NotifierSettings;

pub use desktop::{
    DesktopNotifier, NotificationCommand, Platform, escape_applescript, escape_xml,
    notification_command,
};
pub use ntfy::NtfyNotifier;

#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("desktop notifications are not supported on {platform}")]
    Unsupported { platform: String },

    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("`{program}` did not finish within {seconds}s")]
    TimedOut { program: String, seconds: u64 },

    #[error("request to ntfy failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ntfy rejected the notification with status {0}")]
    Rejected(reqwest::StatusCode),
}

impl NotifierError {
    /// True when the host has no way to display notifications at all.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Shows `message` under `title`, both passed through verbatim.
    async fn display(&self, title: &str, message: &str) -> Result<(), NotifierError>;
}

/// Builds the notifier selected in configuration.
#[must_use]
pub fn from_settings(settings: &NotifierSettings) -> Arc<dyn Notifier> {
    match settings {
        NotifierSettings::Desktop => {
            let notifier = DesktopNotifier::for_current_platform();
            tracing::info!(platform = %notifier.platform(), "using desktop notifier");
            Arc::new(notifier)
        }
        NotifierSettings::Ntfy(url) => {
            tracing::info!(url = %url, "using ntfy notifier");
            Arc::new(NtfyNotifier::new(url.clone()))
        }
    }
}
