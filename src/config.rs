use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;

use crate::error::ConfigError;
use crate::poller::{FeedDate, PollerSettings};
use crate::retry::RetryPolicy;

pub const DEFAULT_MODEL_PATH: &str = "models/hr_model.json";
pub const DEFAULT_FEED_URL: &str = "https://baseballsavant.mlb.com/gf";
pub const DEFAULT_SCORE_URL: &str = "http://127.0.0.1:8000/predict_batch";

fn env_non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_non_empty(lookup, key) {
        None => Ok(default),
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value: v,
        }),
    }
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServeConfig {
    pub model_path: String,
    pub addr: SocketAddr,
}

impl ServeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model_path =
            env_non_empty(&lookup, "MODEL_PATH").unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string());
        let ip: IpAddr = env_parse(&lookup, "BIND_ADDR", IpAddr::from([0, 0, 0, 0]))?;
        let port: u16 = env_parse(&lookup, "PORT", 8000)?;
        Ok(Self {
            model_path,
            addr: SocketAddr::new(ip, port),
        })
    }
}

#[derive(Clone, PartialEq)]
pub struct AlertConfig {
    pub webhook_url: String,
    pub feed_url: String,
    pub score_url: String,
    pub model_path: Option<String>,
    pub threshold: f64,
    pub poll_interval: Duration,
    pub feed_date: FeedDate,
    pub fetch_retry: RetryPolicy,
    pub feed_timeout: Duration,
    pub score_timeout: Duration,
    pub notify_timeout: Duration,
}

impl std::fmt::Debug for AlertConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertConfig")
            .field("webhook_url", &"<redacted>")
            .field("feed_url", &self.feed_url)
            .field("score_url", &self.score_url)
            .field("model_path", &self.model_path)
            .field("threshold", &self.threshold)
            .field("poll_interval", &self.poll_interval)
            .field("feed_date", &self.feed_date)
            .field("fetch_retry", &self.fetch_retry)
            .finish_non_exhaustive()
    }
}

impl AlertConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let webhook_url = env_non_empty(&lookup, "SLACK_WEBHOOK")
            .ok_or(ConfigError::MissingSecret("SLACK_WEBHOOK"))?;

        let threshold: f64 = env_parse(&lookup, "ALERT_THRESHOLD", 0.08)?;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid {
                key: "ALERT_THRESHOLD",
                value: threshold.to_string(),
                reason: "must be within [0, 1]".into(),
            });
        }

        let feed_date = match env_non_empty(&lookup, "FEED_DATE") {
            None => FeedDate::Today,
            Some(v) => NaiveDate::parse_from_str(&v, "%Y-%m-%d")
                .map(FeedDate::Fixed)
                .map_err(|e| ConfigError::Invalid {
                    key: "FEED_DATE",
                    value: v,
                    reason: e.to_string(),
                })?,
        };

        let secs = |key: &'static str, default: u64| -> Result<Duration, ConfigError> {
            env_parse(&lookup, key, default).map(Duration::from_secs)
        };

        Ok(Self {
            webhook_url,
            feed_url: env_non_empty(&lookup, "FEED_URL")
                .unwrap_or_else(|| DEFAULT_FEED_URL.to_string()),
            score_url: env_non_empty(&lookup, "SCORE_URL")
                .unwrap_or_else(|| DEFAULT_SCORE_URL.to_string()),
            model_path: env_non_empty(&lookup, "ALERT_MODEL_PATH"),
            threshold,
            poll_interval: secs("POLL_SECS", 30)?,
            feed_date,
            fetch_retry: RetryPolicy {
                max_attempts: env_parse(&lookup, "FETCH_MAX_ATTEMPTS", 2)?,
                backoff: secs("FETCH_BACKOFF_SECS", 10)?,
            },
            feed_timeout: secs("FEED_TIMEOUT_SECS", 20)?,
            score_timeout: secs("SCORE_TIMEOUT_SECS", 10)?,
            notify_timeout: secs("NOTIFY_TIMEOUT_SECS", 10)?,
        })
    }

    pub fn poller_settings(&self) -> PollerSettings {
        PollerSettings {
            threshold: self.threshold,
            interval: self.poll_interval,
            fetch_retry: self.fetch_retry.clone(),
            date: self.feed_date,
        }
    }
}
