/// Usage instructions printed once the webhook is reachable.
///
/// The secret itself is not echoed; callers already know it, and the
/// console may be shared or recorded.
#[must_use]
pub fn instructions(url: &str) -> String {
    format!(
        "Webhook exposed at: {url}\n\
         Send a POST request to {url} with JSON like:\n\
         {{\"title\": \"Test\", \"message\": \"Hello from the webhook!\"}}\n\
         Include header: Authorization: Bearer <WEBHOOK_AUTH_TOKEN>\n\
         Press Ctrl+C to stop."
    )
}
