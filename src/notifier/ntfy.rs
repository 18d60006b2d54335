use async_trait::async_trait;
use url::Url;

use super::{Notifier, NotifierError};

/// Publishes notifications to an ntfy topic, for hosts without a desktop
/// session (or phones subscribed to the topic).
#[derive(Debug, Clone)]
pub struct NtfyNotifier {
    client: reqwest::Client,
    topic_url: Url,
}

impl NtfyNotifier {
    #[must_use]
    pub fn new(topic_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            topic_url,
        }
    }

    /// Topic URL with the title attached as a query parameter; headers would
    /// need RFC 2047 encoding for non-ASCII titles.
    #[must_use]
    pub fn publish_url(&self, title: &str) -> Url {
        let mut url = self.topic_url.clone();
        url.query_pairs_mut().append_pair("title", title);
        url
    }
}

#[async_trait]
impl Notifier for NtfyNotifier {
    async fn display(&self, title: &str, message: &str) -> Result<(), NotifierError> {
        let resp = self
            .client
            .post(self.publish_url(title))
            .body(message.to_owned())
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            tracing::debug!(%status, "ntfy accepted notification");
            Ok(())
        } else {
            Err(NotifierError::Rejected(status))
        }
    }
}
