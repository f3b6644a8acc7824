use std::env;

/// Model served when `HF_MODEL_ID` is not set.
pub const DEFAULT_MODEL_ID: &str = "Lightricks/LTX-Video";

/// Service configuration loaded from environment variables.
///
/// | Env Var                      | Default                 |
/// |------------------------------|-------------------------|
/// | `DEFAULT_OUTPUT_BUCKET`      | unset                   |
/// | `PROJECT_ID`                 | unset                   |
/// | `HF_MODEL_ID`                | `Lightricks/LTX-Video`  |
/// | `ENABLE_EFFICIENT_ATTENTION` | `true`                  |
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bucket that receives videos when a request names no destination.
    pub default_bucket: Option<String>,
    /// Cloud project the storage client is associated with.
    pub project_id: Option<String>,
    /// Model registry identifier of the pipeline to load.
    pub model_id: String,
    /// Toggle for the memory-efficient attention optimization.
    pub efficient_attention: bool,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let efficient_attention = env::var("ENABLE_EFFICIENT_ATTENTION")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(true);

        Self {
            default_bucket: env::var("DEFAULT_OUTPUT_BUCKET")
                .ok()
                .filter(|v| !v.is_empty()),
            project_id: env::var("PROJECT_ID").ok().filter(|v| !v.is_empty()),
            model_id: env::var("HF_MODEL_ID").unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string()),
            efficient_attention,
        }
    }
}
