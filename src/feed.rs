use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use futures::future::BoxFuture;
use reqwest::Client as HttpClient;
use serde_json::Value;
use tracing::warn;

use crate::types::PlayEvent;

/// Source of the day's live plate-appearance feed.
pub trait FeedSource: Send + Sync {
    /// Raw feed entries, in feed order, undecoded.
    fn fetch(&self, date: NaiveDate) -> BoxFuture<'_, Result<Vec<Value>>>;
}

/// `GET <url>?date=YYYY-MM-DD`, answering with a JSON array of serialized events.
#[derive(Debug, Clone)]
pub struct HttpFeed {
    url: String,
    http: HttpClient,
}

impl HttpFeed {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("failed building feed http client")?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }
}

impl FeedSource for HttpFeed {
    fn fetch(&self, date: NaiveDate) -> BoxFuture<'_, Result<Vec<Value>>> {
        Box::pin(async move {
            let day = date.format("%Y-%m-%d").to_string();
            self.http
                .get(&self.url)
                .query(&[("date", day.as_str())])
                .send()
                .await
                .with_context(|| format!("failed fetching live feed from {}", self.url))?
                .error_for_status()
                .with_context(|| format!("live feed rejected by {}", self.url))?
                .json::<Vec<Value>>()
                .await
                .context("invalid live feed payload")
        })
    }
}

/// Decode feed entries, skipping blanks and anything malformed.
pub fn parse_entries(entries: Vec<Value>) -> Vec<PlayEvent> {
    let mut good = Vec::with_capacity(entries.len());
    for (i, entry) in entries.into_iter().enumerate() {
        let parsed = match entry {
            Value::Null => continue,
            Value::String(s) if s.trim().is_empty() => continue,
            Value::String(s) => serde_json::from_str::<PlayEvent>(&s),
            obj @ Value::Object(_) => serde_json::from_value::<PlayEvent>(obj),
            other => {
                warn!(index = i, kind = %kind_of(&other), "unexpected feed entry skipped");
                continue;
            }
        };
        match parsed {
            Ok(event) => good.push(event),
            Err(err) => warn!(index = i, error = %err, "bad feed row skipped"),
        }
    }
    good
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
