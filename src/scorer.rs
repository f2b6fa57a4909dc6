use std::time::Duration;

use anyhow::{ensure, Context, Result};
use futures::future::BoxFuture;
use reqwest::Client as HttpClient;

use crate::service::InferenceService;
use crate::types::{BatchPrediction, BatchRequest, RawPlateAppearance};

/// Batched HR probability scoring as seen by the poller.
pub trait BatchScorer: Send + Sync {
    fn score_batch<'a>(&'a self, rows: &'a [RawPlateAppearance]) -> BoxFuture<'a, Result<Vec<f64>>>;
}

/// Calls a running inference server's `/predict_batch`.
#[derive(Debug, Clone)]
pub struct HttpScorer {
    url: String,
    http: HttpClient,
}

impl HttpScorer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("failed building scoring http client")?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }
}

impl BatchScorer for HttpScorer {
    fn score_batch<'a>(&'a self, rows: &'a [RawPlateAppearance]) -> BoxFuture<'a, Result<Vec<f64>>> {
        Box::pin(async move {
            let body = BatchRequest {
                data: rows.to_vec(),
            };
            let resp: BatchPrediction = self
                .http
                .post(&self.url)
                .json(&body)
                .send()
                .await
                .with_context(|| format!("failed sending batch to {}", self.url))?
                .error_for_status()
                .with_context(|| format!("batch rejected by {}", self.url))?
                .json()
                .await
                .context("invalid predict_batch response payload")?;
            ensure!(
                resp.probabilities.len() == rows.len(),
                "predict_batch returned {} probabilities for {} rows",
                resp.probabilities.len(),
                rows.len()
            );
            Ok(resp.probabilities)
        })
    }
}

/// Scores in-process, without a server hop.
impl BatchScorer for InferenceService {
    fn score_batch<'a>(&'a self, rows: &'a [RawPlateAppearance]) -> BoxFuture<'a, Result<Vec<f64>>> {
        Box::pin(async move {
            let out = self
                .predict_batch(rows)
                .context("in-process batch scoring failed")?;
            Ok(out.probabilities)
        })
    }
}
