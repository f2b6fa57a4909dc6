use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ServiceError;
use crate::service::{InferenceService, DEFAULT_TOP_N};
use crate::types::{
    BatchExplanation, BatchPrediction, BatchRequest, ExplanationResult, PredictionResult,
    RawPlateAppearance,
};

type ApiError = (StatusCode, Json<Value>);

// ---------- Server state ----------

#[derive(Clone)]
struct AppState {
    svc: InferenceService,
}

#[derive(Deserialize, Debug)]
struct ExplainParams {
    #[serde(default = "default_top_n")]
    top_n: usize,
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn reject(err: ServiceError) -> ApiError {
    let status = match err {
        ServiceError::InvalidTopN => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::Model(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "inference failed");
    }
    (status, Json(json!({ "error": err.to_string() })))
}

// ---------- Handlers ----------

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "model_version": state.svc.model_version(),
        "n_features": state.svc.schema().len(),
    }))
}

async fn predict(
    State(state): State<AppState>,
    Json(pa): Json<RawPlateAppearance>,
) -> Result<Json<PredictionResult>, ApiError> {
    state.svc.predict(&pa).map(Json).map_err(reject)
}

async fn predict_batch(
    State(state): State<AppState>,
    Json(batch): Json<BatchRequest>,
) -> Result<Json<BatchPrediction>, ApiError> {
    tracing::debug!(rows = batch.data.len(), "predict_batch");
    state.svc.predict_batch(&batch.data).map(Json).map_err(reject)
}

async fn explain(
    State(state): State<AppState>,
    Query(params): Query<ExplainParams>,
    Json(pa): Json<RawPlateAppearance>,
) -> Result<Json<ExplanationResult>, ApiError> {
    state.svc.explain(&pa, params.top_n).map(Json).map_err(reject)
}

async fn explain_batch(
    State(state): State<AppState>,
    Query(params): Query<ExplainParams>,
    Json(batch): Json<BatchRequest>,
) -> Result<Json<BatchExplanation>, ApiError> {
    state
        .svc
        .explain_batch(&batch.data, params.top_n)
        .map(Json)
        .map_err(reject)
}

pub fn router(svc: InferenceService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/predict_batch", post(predict_batch))
        .route("/explain", post(explain))
        .route("/explain_batch", post(explain_batch))
        .with_state(AppState { svc })
}

/// Resolves once `signal` fires. A signal that cannot be installed never
/// resolves, so a failed handler keeps the process running.
pub async fn shutdown_on<F>(signal: F)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(err) => {
            tracing::warn!(error = %err, "cannot listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

/// Serve until the listener fails or `shutdown` resolves.
pub async fn serve<S>(
    listener: tokio::net::TcpListener,
    svc: InferenceService,
    shutdown: S,
) -> anyhow::Result<()>
where
    S: std::future::Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(svc))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
