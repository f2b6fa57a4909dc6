//! Live feed poller.
//!
//! One cycle is FETCH -> FILTER -> SCORE -> DISPATCH, followed by SLEEP.
//! Cycles run strictly one after another. A failed fetch gets the configured
//! retries; a failed scoring call ends the loop, since the events in that
//! batch were already marked as seen and would otherwise be lost silently.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{NaiveDate, Utc};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::PollError;
use crate::feed::{parse_entries, FeedSource};
use crate::notify::Notifier;
use crate::retry::RetryPolicy;
use crate::scorer::BatchScorer;
use crate::types::PlayEvent;

/// Play ids that already went through scoring. Only ever grows.
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: HashSet<String>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the id was not seen before.
    pub fn insert(&mut self, play_id: &str) -> bool {
        if self.seen.contains(play_id) {
            return false;
        }
        self.seen.insert(play_id.to_string())
    }

    pub fn contains(&self, play_id: &str) -> bool {
        self.seen.contains(play_id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedDate {
    /// Current UTC date, looked up at every fetch.
    Today,
    Fixed(NaiveDate),
}

impl FeedDate {
    pub fn resolve(self) -> NaiveDate {
        match self {
            FeedDate::Today => Utc::now().date_naive(),
            FeedDate::Fixed(d) => d,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub threshold: f64,
    pub interval: Duration,
    pub fetch_retry: RetryPolicy,
    pub date: FeedDate,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            threshold: 0.08,
            interval: Duration::from_secs(30),
            fetch_retry: RetryPolicy::default(),
            date: FeedDate::Today,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub parsed: usize,
    pub fresh: usize,
    pub alerted: usize,
    pub failed_alerts: usize,
}

pub struct Poller {
    settings: PollerSettings,
    feed: Arc<dyn FeedSource>,
    scorer: Arc<dyn BatchScorer>,
    notifier: Arc<dyn Notifier>,
    seen: DedupSet,
}

impl Poller {
    pub fn new(
        settings: PollerSettings,
        feed: Arc<dyn FeedSource>,
        scorer: Arc<dyn BatchScorer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            settings,
            feed,
            scorer,
            notifier,
            seen: DedupSet::new(),
        }
    }

    pub fn seen(&self) -> &DedupSet {
        &self.seen
    }

    /// Poll until `stop` flips to true (or its sender goes away).
    pub async fn run(&mut self, mut stop: watch::Receiver<bool>) -> Result<(), PollError> {
        loop {
            if *stop.borrow_and_update() {
                info!(seen = self.seen.len(), "stop requested; poller exiting");
                return Ok(());
            }

            let date = self.settings.date.resolve();
            let report = self.run_cycle(date).await?;
            info!(
                date = %date,
                fetched = report.fetched,
                parsed = report.parsed,
                fresh = report.fresh,
                alerted = report.alerted,
                failed_alerts = report.failed_alerts,
                "poll cycle complete"
            );

            tokio::select! {
                _ = sleep(self.settings.interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        info!("stop channel closed; poller exiting");
                        return Ok(());
                    }
                }
            }
        }
    }

    pub async fn run_cycle(&mut self, date: NaiveDate) -> Result<CycleReport, PollError> {
        let mut report = CycleReport::default();

        // FETCH
        let feed = &self.feed;
        let entries = self
            .settings
            .fetch_retry
            .run("fetch_live_feed", || feed.fetch(date))
            .await
            .map_err(PollError::FeedFetch)?;
        report.fetched = entries.len();
        let events = parse_entries(entries);
        report.parsed = events.len();

        // FILTER: marked seen before scoring, so nothing is alerted twice.
        let seen = &mut self.seen;
        let fresh: Vec<PlayEvent> = events
            .into_iter()
            .filter(|e| e.launch_speed.is_some() && seen.insert(&e.play_id))
            .collect();
        report.fresh = fresh.len();
        if fresh.is_empty() {
            return Ok(report);
        }

        // SCORE
        let rows: Vec<_> = fresh.iter().map(|e| e.to_raw(date)).collect();
        let probs = self
            .scorer
            .score_batch(&rows)
            .await
            .map_err(PollError::Score)?;
        if probs.len() != rows.len() {
            return Err(PollError::Score(anyhow!(
                "scorer returned {} probabilities for {} rows",
                probs.len(),
                rows.len()
            )));
        }

        // DISPATCH
        for (event, prob) in fresh.iter().zip(probs) {
            if prob < self.settings.threshold {
                continue;
            }
            let text = format_alert(event, prob);
            match self.notifier.send(&text).await {
                Ok(()) => {
                    report.alerted += 1;
                    info!(play_id = %event.play_id, prob, "alert sent");
                }
                Err(err) => {
                    report.failed_alerts += 1;
                    warn!(play_id = %event.play_id, prob, error = %err, "alert delivery failed");
                }
            }
        }

        Ok(report)
    }
}

pub fn format_alert(event: &PlayEvent, prob: f64) -> String {
    let angle = event
        .launch_angle
        .map(|a| format!("{:.0}°", a))
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        ":baseball: *HR Risk {:.1}%* | {} @ {} - Inning {} | {} vs {}\nSpeed {:.1} mph, Angle {} (play {})",
        prob * 100.0,
        event.away_team,
        event.home_team,
        event.inning,
        event.player_name,
        event.pitcher_name,
        event.launch_speed.unwrap_or_default(),
        angle,
        event.play_id,
    )
}
