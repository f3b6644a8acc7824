use anyhow::{anyhow, Result};
use hf_hub::api::tokio::Api;
use tracing::info;

use crate::{ltx, DeviceMap, Loader, LtxLoader, PipelineOptions, VideoModel};
use std::sync::Arc;

/// Enum of supported model families
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModelType {
    Ltx,
    // Add more model families as they become available
}

impl ModelType {
    /// Detect model family from model name
    pub fn from_name(model_name: &str) -> Option<Self> {
        let name_upper = model_name.to_uppercase();

        if name_upper.contains("LTX") {
            Some(ModelType::Ltx)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub enum ModelVariant {
    Ltx(ltx::LtxVariant),
}

impl ModelVariant {
    /// Detect model variant from model name
    pub fn from_name(model_name: &str) -> Option<Self> {
        let name_upper = model_name.to_uppercase();

        if name_upper.contains("LTX") {
            Some(ModelVariant::Ltx(if name_upper.contains("0.9.1") {
                ltx::LtxVariant::V091
            } else {
                // Default to the 2B v0.9 weights when no specific variant is named
                ltx::LtxVariant::V09
            }))
        } else {
            None
        }
    }
}

/// Load a model based on its name, automatically detecting the appropriate loader
pub async fn load_model(
    model_name: &str,
    api: Api,
    device_map: DeviceMap,
    options: PipelineOptions,
) -> Result<Arc<dyn VideoModel>> {
    let model_type = ModelType::from_name(model_name)
        .ok_or_else(|| anyhow!("Unsupported model type: {}", model_name))?;
    let model_variant = ModelVariant::from_name(model_name)
        .ok_or_else(|| anyhow!("Unsupported model variant: {}", model_name))?;

    info!(
        model = model_name,
        ?model_type,
        ?model_variant,
        "loading model pipeline"
    );

    match model_type {
        ModelType::Ltx => {
            let model =
                LtxLoader::load(model_name, model_variant, api, device_map, options).await?;
            Ok(Arc::new(model))
        }
    }
}
