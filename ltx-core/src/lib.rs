pub mod device_map;
pub mod loader;
mod loader_factory;
mod util;

mod ltx;

pub use device_map::*;
use image::DynamicImage;
pub use loader::*;
pub use loader_factory::*;
pub use ltx::{LtxLoader, LtxVariant};
use serde::{Deserialize, Serialize};
pub use util::*;

/// Sampling parameters for one video generation call. All fields are
/// required here; defaulting and range validation happen at the edge
/// that constructs this.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub prompt: String,
    pub negative_prompt: String,
    pub height: usize,
    pub width: usize,
    pub num_frames: usize,
    pub num_inference_steps: usize,
    pub guidance_scale: f64,
    pub seed: u64,
}

/// Memory-related knobs applied when a pipeline is constructed.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Compute attention over bounded query chunks instead of one matmul.
    pub attention_slicing: bool,
    /// Use the flash-attention kernel when compiled in and supported by
    /// the active device.
    pub efficient_attention: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            attention_slicing: true,
            efficient_attention: true,
        }
    }
}

pub trait VideoModel: Send + Sync {
    /// Produce the ordered frame sequence for one request.
    fn run(&self, params: &GenerationParams) -> anyhow::Result<Vec<DynamicImage>>;
}
