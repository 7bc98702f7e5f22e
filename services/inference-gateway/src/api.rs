//! HTTP surface: `/health`, `/predict`, `/metrics`.

use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, instrument};

use serving_core::{metrics_response, ServiceMetrics, OUTCOME_ERROR, OUTCOME_INVALID, OUTCOME_OK};

use crate::model::{Prediction, Predictor};

/// Immutable per-process state, built once at startup and cloned into handlers.
#[derive(Clone)]
pub struct AppState {
    model: Arc<dyn Predictor>,
    version: Arc<str>,
    metrics: ServiceMetrics,
}

impl AppState {
    pub fn new(model: Arc<dyn Predictor>, version: impl Into<Arc<str>>) -> anyhow::Result<Self> {
        Ok(Self { model, version: version.into(), metrics: ServiceMetrics::new()? })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/metrics", get(metrics))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub x: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction: Prediction,
    pub model_version: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request validation failed: {0}")]
    Validation(#[from] JsonRejection),
    #[error("inference failed: {0}")]
    Inference(String),
}

fn rejection_type(r: &JsonRejection) -> &'static str {
    match r {
        JsonRejection::JsonDataError(_) => "value_error",
        JsonRejection::JsonSyntaxError(_) => "json_invalid",
        JsonRejection::MissingJsonContentType(_) => "content_type",
        JsonRejection::BytesRejection(_) => "body_unreadable",
        _ => "invalid",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(rejection) => {
                let body = json!({
                    "detail": [{
                        "loc": ["body"],
                        "msg": rejection.body_text(),
                        "type": rejection_type(&rejection),
                    }]
                });
                (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
            }
            // model faults stay opaque to the caller
            ApiError::Inference(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response(),
        }
    }
}

/// `/predict` body whose every rejection becomes a 422 and is counted
/// before any handler logic runs.
pub struct PredictBody(pub PredictRequest);

#[async_trait]
impl FromRequest<AppState> for PredictBody {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        match Json::<PredictRequest>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                state.metrics.observe_request("predict", OUTCOME_INVALID);
                debug!(reason = %rejection.body_text(), "predict_body_rejected");
                Err(ApiError::Validation(rejection))
            }
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    state.metrics.observe_request("health", OUTCOME_OK);
    Json(HealthResponse { status: "ok", version: state.version.to_string() })
}

#[instrument(name = "predict", skip_all)]
async fn predict(
    State(state): State<AppState>,
    PredictBody(request): PredictBody,
) -> Result<Json<PredictResponse>, ApiError> {
    debug!(features = request.x.len(), "predict_request");
    let model = Arc::clone(&state.model);
    let batch = vec![request.x];
    let started = Instant::now();
    let outcome = tokio::task::spawn_blocking(move || model.predict(&batch)).await;
    state.metrics.predict_latency_seconds.observe(started.elapsed().as_secs_f64());

    let prediction = match outcome {
        Ok(Ok(prediction)) => prediction,
        Ok(Err(e)) => {
            state.metrics.observe_request("predict", OUTCOME_ERROR);
            error!(error = %e, "inference_failed");
            return Err(ApiError::Inference(e.to_string()));
        }
        Err(join) => {
            state.metrics.observe_request("predict", OUTCOME_ERROR);
            error!(error = %join, "inference_panicked");
            return Err(ApiError::Inference(join.to_string()));
        }
    };
    state.metrics.observe_request("predict", OUTCOME_OK);
    Ok(Json(PredictResponse { prediction, model_version: state.version.to_string() }))
}

async fn metrics(State(state): State<AppState>) -> Response {
    metrics_response(&state.metrics)
}
