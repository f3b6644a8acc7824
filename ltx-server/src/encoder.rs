//! Frame sequence to MP4 encoding.
//!
//! Frames are staged as numbered PNGs in a temporary directory and
//! handed to `ffmpeg`, which produces an H.264 MP4 at a fixed 24 fps.

use std::path::Path;

use async_trait::async_trait;
use image::DynamicImage;

/// Output frame rate of encoded videos.
pub const FRAME_RATE: u32 = 24;

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("no frames to encode")]
    NoFrames,
    #[error("failed to stage frames: {0}")]
    Staging(#[source] anyhow::Error),
    #[error("failed to run ffmpeg: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("ffmpeg exited with {status}: {stderr}")]
    Ffmpeg {
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Video encoder backend.
#[async_trait]
pub trait Mp4Encoder: Send + Sync {
    /// Encode `frames` into an MP4 file at `dest`.
    async fn encode(&self, frames: &[DynamicImage], dest: &Path) -> Result<(), EncodeError>;
}

pub struct FfmpegEncoder;

#[async_trait]
impl Mp4Encoder for FfmpegEncoder {
    async fn encode(&self, frames: &[DynamicImage], dest: &Path) -> Result<(), EncodeError> {
        if frames.is_empty() {
            return Err(EncodeError::NoFrames);
        }
        let staging = tempfile::tempdir()
            .map_err(|e| EncodeError::Staging(anyhow::Error::from(e)))?;
        for (index, frame) in frames.iter().enumerate() {
            let frame_path = staging.path().join(format!("frame_{index:05}.png"));
            frame
                .save(&frame_path)
                .map_err(|e| EncodeError::Staging(anyhow::Error::from(e)))?;
        }
        let pattern = staging.path().join("frame_%05d.png");

        let output = tokio::process::Command::new("ffmpeg")
            .arg("-y")
            .arg("-framerate")
            .arg(FRAME_RATE.to_string())
            .arg("-i")
            .arg(&pattern)
            .arg("-c:v")
            .arg("libx264")
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg("-crf")
            .arg("18")
            .arg(dest)
            .output()
            .await
            .map_err(EncodeError::Spawn)?;

        if !output.status.success() {
            return Err(EncodeError::Ffmpeg {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        tracing::debug!(frames = frames.len(), dest = %dest.display(), "encoded video");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_empty_frame_list() {
        let encoder = FfmpegEncoder;
        let dest = std::env::temp_dir().join("empty.mp4");
        assert!(matches!(
            encoder.encode(&[], &dest).await,
            Err(EncodeError::NoFrames)
        ));
    }
}
