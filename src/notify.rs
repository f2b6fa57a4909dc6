use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use reqwest::Client as HttpClient;
use serde_json::json;

/// Where alert text goes. One message per call, no delivery guarantee.
pub trait Notifier: Send + Sync {
    fn send<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Slack incoming webhook.
#[derive(Clone)]
pub struct SlackWebhook {
    url: String,
    http: HttpClient,
}

impl SlackWebhook {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("failed building webhook http client")?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }
}

// Keep the webhook secret out of Debug output.
impl std::fmt::Debug for SlackWebhook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackWebhook").finish_non_exhaustive()
    }
}

impl Notifier for SlackWebhook {
    fn send<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.http
                .post(&self.url)
                .json(&json!({ "text": text }))
                .send()
                .await
                .context("failed posting to slack webhook")?
                .error_for_status()
                .context("slack webhook rejected message")?;
            Ok(())
        })
    }
}

/// Collects messages in memory instead of delivering them.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<String>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

impl Notifier for MemoryNotifier {
    fn send<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<()>> {
        self.sent.lock().push(text.to_string());
        Box::pin(async { Ok(()) })
    }
}
