//! HTTP surface: routing and the three endpoints.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiResult;
use crate::generate::run_generation;
use crate::request::{GenerationRequest, GenerationResponse};
use crate::state::SharedState;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .route("/", get(service_info))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn predict(
    State(state): State<SharedState>,
    Json(request): Json<GenerationRequest>,
) -> ApiResult<Json<GenerationResponse>> {
    let destination = request.validate()?;
    let response = run_generation(&state, &request, destination).await?;
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    model_loaded: bool,
    model_id: String,
    gpu_available: bool,
    gpu_info: Option<String>,
    default_bucket: Option<String>,
    storage_client_initialized: bool,
}

/// Liveness/readiness report. Always succeeds, even before (or without)
/// a loaded model, so orchestrators can distinguish "starting" from "dead".
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let accelerator = ltx_core::available_accelerator();
    Json(HealthResponse {
        status: "healthy",
        model_loaded: state.model.is_some(),
        model_id: state.config.model_id.clone(),
        gpu_available: accelerator.is_some(),
        gpu_info: accelerator.map(|a| format!("{}:{}", a.kind(), a.ordinal())),
        default_bucket: state.config.default_bucket.clone(),
        storage_client_initialized: state.store.is_some(),
    })
}

async fn service_info(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "service": "ltx-serve",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.config.model_id,
        "endpoints": {
            "predict": "POST /predict",
            "health": "GET /health",
        },
        "features": {
            "efficient_attention": state.config.efficient_attention,
            "gcs_upload": state.config.default_bucket.is_some(),
        },
    }))
}
