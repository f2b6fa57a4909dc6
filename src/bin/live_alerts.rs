use std::sync::Arc;

use anyhow::Context;
use hr_alerts::{
    config::AlertConfig,
    feed::HttpFeed,
    model,
    notify::SlackWebhook,
    poller::Poller,
    scorer::{BatchScorer, HttpScorer},
    server,
    InferenceService,
};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hr_alerts::init_tracing();

    // Secret and artifact problems stop us here, before the first poll.
    let cfg = AlertConfig::from_env()?;
    tracing::info!(config = ?cfg, "live alerts starting");

    let scorer: Arc<dyn BatchScorer> = match &cfg.model_path {
        Some(path) => {
            let loaded = model::load(path)
                .with_context(|| format!("failed loading model artifact {}", path))?;
            Arc::new(InferenceService::from_loaded(loaded)?)
        }
        None => Arc::new(HttpScorer::new(&cfg.score_url, cfg.score_timeout)?),
    };
    let feed = Arc::new(HttpFeed::new(&cfg.feed_url, cfg.feed_timeout)?);
    let notifier = Arc::new(SlackWebhook::new(&cfg.webhook_url, cfg.notify_timeout)?);

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        server::shutdown_on(tokio::signal::ctrl_c()).await;
        let _ = stop_tx.send(true);
    });

    let mut poller = Poller::new(cfg.poller_settings(), feed, scorer, notifier);
    poller.run(stop_rx).await?;
    Ok(())
}
