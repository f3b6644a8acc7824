use ltx_core::GenerationParams;
use serde::{Deserialize, Serialize};

use crate::destination::GcsDestination;
use crate::error::{ApiError, FieldViolation};

fn default_seed() -> u64 {
    42
}
fn default_height() -> usize {
    704
}
fn default_width() -> usize {
    1216
}
fn default_num_frames() -> usize {
    121
}
fn default_steps() -> usize {
    50
}
fn default_guidance() -> f64 {
    7.5
}

/// Request body for `POST /predict`.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_height")]
    pub height: usize,
    #[serde(default = "default_width")]
    pub width: usize,
    #[serde(default = "default_num_frames")]
    pub num_frames: usize,
    #[serde(default = "default_steps")]
    pub num_inference_steps: usize,
    #[serde(default = "default_guidance")]
    pub guidance_scale: f64,
    /// Custom destination like `gs://bucket/path/video.mp4`; the
    /// configured default bucket is used when absent.
    #[serde(default)]
    pub gcs_destination: Option<String>,
}

impl GenerationRequest {
    /// Range-check every field and parse the optional destination.
    ///
    /// Runs before any generation work so that a request that cannot
    /// be stored as asked never reaches the pipeline.
    pub fn validate(&self) -> Result<Option<GcsDestination>, ApiError> {
        let mut violations = Vec::new();

        if self.prompt.is_empty() {
            violations.push(FieldViolation {
                field: "prompt",
                message: "must not be empty".to_string(),
            });
        }
        check_range(&mut violations, "height", self.height, 256, 1024);
        check_range(&mut violations, "width", self.width, 256, 1920);
        check_range(&mut violations, "num_frames", self.num_frames, 1, 240);
        check_range(
            &mut violations,
            "num_inference_steps",
            self.num_inference_steps,
            1,
            100,
        );
        if !(1.0..=20.0).contains(&self.guidance_scale) {
            violations.push(FieldViolation {
                field: "guidance_scale",
                message: "must be between 1 and 20".to_string(),
            });
        }

        let destination = match &self.gcs_destination {
            Some(raw) => match GcsDestination::parse(raw) {
                Ok(dest) => Some(dest),
                Err(err) => {
                    violations.push(FieldViolation {
                        field: "gcs_destination",
                        message: err.to_string(),
                    });
                    None
                }
            },
            None => None,
        };

        if violations.is_empty() {
            Ok(destination)
        } else {
            Err(ApiError::Validation(violations))
        }
    }

    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            prompt: self.prompt.clone(),
            negative_prompt: self.negative_prompt.clone(),
            height: self.height,
            width: self.width,
            num_frames: self.num_frames,
            num_inference_steps: self.num_inference_steps,
            guidance_scale: self.guidance_scale,
            seed: self.seed,
        }
    }
}

fn check_range(
    violations: &mut Vec<FieldViolation>,
    field: &'static str,
    value: usize,
    min: usize,
    max: usize,
) {
    if !(min..=max).contains(&value) {
        violations.push(FieldViolation {
            field,
            message: format!("must be between {min} and {max}"),
        });
    }
}

/// Response body for a completed generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResponse {
    /// Public URL of the uploaded video, or the local file path when
    /// the upload fell back.
    pub video_url: String,
    pub video_filename: String,
    pub seed: u64,
    /// Bucket the video landed in; absent when the local fallback was taken.
    pub gcs_bucket: Option<String>,
    /// Object path within the bucket, or the local path on fallback.
    pub gcs_blob: String,
    pub generation_time_seconds: f64,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    pub prompt: String,
    pub num_frames: usize,
    pub resolution: String,
    pub inference_steps: usize,
    pub guidance_scale: f64,
    pub model: String,
}
