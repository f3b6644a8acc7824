//! The generation pipeline: sample frames, encode, upload.

use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::destination::GcsDestination;
use crate::error::{ApiError, ApiResult};
use crate::request::{GenerationRequest, GenerationResponse, Metadata};
use crate::state::AppState;

/// Timestamped, collision-resistant filename for a generated video.
pub fn unique_video_filename(now: DateTime<Utc>) -> String {
    let stamp = now.format("%Y%m%d_%H%M%S");
    let tag = uuid::Uuid::new_v4().simple().to_string();
    format!("ltx_video_{stamp}_{}.mp4", &tag[..8])
}

/// Run the full pipeline for one validated request.
///
/// A failed upload is not fatal: the video stays on local disk and the
/// response points at the local path instead of a public URL.
pub async fn run_generation(
    state: &AppState,
    request: &GenerationRequest,
    destination: Option<GcsDestination>,
) -> ApiResult<GenerationResponse> {
    let model = state.model.as_ref().ok_or(ApiError::NotReady)?;

    let params = request.params();
    tracing::info!(
        prompt = %params.prompt,
        width = params.width,
        height = params.height,
        num_frames = params.num_frames,
        seed = params.seed,
        "starting generation"
    );
    let started = Instant::now();

    let frames = model.run(&params).map_err(ApiError::Generation)?;

    let filename = unique_video_filename(Utc::now());
    let local_path = std::env::temp_dir().join(&filename);
    state
        .encoder
        .encode(&frames, &local_path)
        .await
        .map_err(|e| ApiError::Generation(anyhow::Error::from(e)))?;

    // A request-level destination wins; otherwise fall back to the
    // configured bucket with the generated filename under videos/.
    let resolved = match destination {
        Some(dest) => Some(dest),
        None => state
            .config
            .default_bucket
            .as_ref()
            .map(|bucket| GcsDestination {
                bucket: bucket.clone(),
                object: format!("videos/{filename}"),
            }),
    };

    let (video_url, gcs_bucket, gcs_blob) = match (&state.store, resolved) {
        (Some(store), Some(dest)) => {
            match store
                .upload_public(&dest.bucket, &dest.object, &local_path, "video/mp4")
                .await
            {
                Ok(url) => {
                    if let Err(e) = tokio::fs::remove_file(&local_path).await {
                        tracing::warn!(path = %local_path.display(), error = %e, "failed to remove staged video");
                    }
                    (url, Some(dest.bucket), dest.object)
                }
                Err(e) => {
                    tracing::warn!(
                        uri = %dest.uri(),
                        error = %e,
                        "upload failed, serving local path"
                    );
                    let local = local_path.display().to_string();
                    (local.clone(), None, local)
                }
            }
        }
        _ => {
            tracing::warn!("no storage destination configured, serving local path");
            let local = local_path.display().to_string();
            (local.clone(), None, local)
        }
    };

    let generation_time_seconds = started.elapsed().as_secs_f64();
    tracing::info!(
        filename = %filename,
        seconds = generation_time_seconds,
        "generation finished"
    );

    Ok(GenerationResponse {
        video_url,
        video_filename: filename,
        seed: request.seed,
        gcs_bucket,
        gcs_blob,
        generation_time_seconds,
        metadata: Metadata {
            prompt: request.prompt.clone(),
            num_frames: request.num_frames,
            resolution: format!("{}x{}", request.width, request.height),
            inference_steps: request.num_inference_steps,
            guidance_scale: request.guidance_scale,
            model: state.config.model_id.clone(),
        },
    })
}
