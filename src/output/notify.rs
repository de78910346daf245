//! Per-URL outcome notifications
//!
//! Notifications are fire-and-forget: delivery failures are logged at debug
//! level and never affect the run.

use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Payload posted for each reported URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub file_path: Option<String>,
    pub url: String,
    pub status: String,
    pub date: String,
    pub time: String,
}

impl Notification {
    /// Builds a notification stamped with the local date and time
    pub fn now(file_path: Option<&str>, url: &str, status: &str) -> Self {
        let now = Local::now();
        Self {
            file_path: file_path.map(str::to_string),
            url: url.to_string(),
            status: status.to_string(),
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M:%S").to_string(),
        }
    }
}

/// Notification collaborator
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one notification; returns false if delivery failed
    async fn notify(&self, notification: &Notification) -> bool;
}

/// Posts notifications as JSON to a webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            webhook_url: webhook_url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> bool {
        let result = self
            .client
            .post(&self.webhook_url)
            .json(notification)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(_) => true,
            Err(e) => {
                debug!(url = %notification.url, error = %e, "Notification not delivered");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_notification_fields() {
        let n = Notification::now(Some("guides/en/articles/foo.md"), "https://docs.example.com/en/articles/foo", "404");
        assert_eq!(n.status, "404");
        assert_eq!(n.date.len(), 10);
        assert_eq!(n.time.len(), 8);
    }

    #[tokio::test]
    async fn test_webhook_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(serde_json::json!({
                "file_path": "guides/en/articles/foo.md",
                "url": "https://docs.example.com/en/articles/foo",
                "status": "200"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(&format!("{}/hook", server.uri())).unwrap();
        let n = Notification::now(
            Some("guides/en/articles/foo.md"),
            "https://docs.example.com/en/articles/foo",
            "200",
        );
        assert!(notifier.notify(&n).await);
    }

    #[tokio::test]
    async fn test_webhook_failure_is_absorbed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(&server.uri()).unwrap();
        let n = Notification::now(None, "https://docs.example.com/", "404");
        assert!(!notifier.notify(&n).await);
    }
}
