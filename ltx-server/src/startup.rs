//! One-time startup: storage client, model load, encoder.

use std::sync::Arc;

use anyhow::{Context, Result};
use hf_hub::api::tokio::Api;
use ltx_core::{DeviceMap, PipelineOptions};

use crate::config::ServiceConfig;
use crate::encoder::FfmpegEncoder;
use crate::state::AppState;
use crate::storage::{GcsStore, ObjectStore};

/// Bring up every component the handlers depend on.
///
/// The storage client and model are loaded before the listener binds,
/// so a bound port means the service can actually serve `/predict`.
pub async fn initialize(config: ServiceConfig, device_map: DeviceMap) -> Result<AppState> {
    let store = GcsStore::connect(config.project_id.as_deref())
        .await
        .context("failed to initialize storage client")?;

    if let Some(bucket) = &config.default_bucket {
        if store.bucket_exists(bucket).await {
            tracing::info!(bucket, "default output bucket verified");
        } else {
            tracing::warn!(bucket, "default output bucket not reachable, uploads may fail");
        }
    } else {
        tracing::warn!("DEFAULT_OUTPUT_BUCKET not set, videos will stay on local disk");
    }

    let options = PipelineOptions {
        attention_slicing: true,
        efficient_attention: config.efficient_attention,
    };
    let api = Api::new().context("failed to initialize model hub client")?;
    let model = ltx_core::load_model(&config.model_id, api, device_map, options)
        .await
        .with_context(|| format!("failed to load model {}", config.model_id))?;

    Ok(AppState {
        config,
        model: Some(model),
        store: Some(Arc::new(store)),
        encoder: Arc::new(FfmpegEncoder),
    })
}
