use anyhow::Result;
use candle_core::{Device, Tensor};

use super::model::LtxTransformer;

/// Spatial downscaling between pixel space and latent space.
pub const SPATIAL_RATIO: usize = 32;
/// Temporal downscaling between output frames and latent frames.
pub const TEMPORAL_RATIO: usize = 8;
/// Latent channel count of the 2B checkpoints.
pub const LATENT_CHANNELS: usize = 128;

/// Latent grid dimensions (frames, height, width) for a pixel-space request.
pub fn latent_dims(num_frames: usize, height: usize, width: usize) -> (usize, usize, usize) {
    (
        (num_frames - 1) / TEMPORAL_RATIO + 1,
        height / SPATIAL_RATIO,
        width / SPATIAL_RATIO,
    )
}

/// Draw the initial latent noise for one video on the given device.
pub fn get_noise(
    num_frames: usize,
    height: usize,
    width: usize,
    device: &Device,
) -> Result<Tensor> {
    let (f, h, w) = latent_dims(num_frames, height, width);
    Ok(Tensor::randn(
        0f32,
        1.,
        (1, LATENT_CHANNELS, f, h, w),
        device,
    )?)
}

/// Linear rectified-flow schedule from t=1 (pure noise) down to t=0,
/// inclusive at both ends: `steps` integration intervals need steps+1
/// timestep values.
pub fn get_schedule(steps: usize) -> Vec<f64> {
    (0..=steps)
        .map(|i| 1.0 - i as f64 / steps as f64)
        .collect()
}

/// Euler integration of the velocity field, with classifier-free
/// guidance when an unconditional embedding is supplied.
#[allow(clippy::too_many_arguments)]
pub fn denoise(
    model: &LtxTransformer,
    latent: &Tensor,
    cond: &Tensor,
    uncond: Option<&Tensor>,
    timesteps: &[f64],
    guidance_scale: f64,
) -> Result<Tensor> {
    let batch = latent.dim(0)?;
    let mut img = latent.clone();
    for window in timesteps.windows(2) {
        let (t_curr, t_prev) = (window[0], window[1]);
        let t_vec = Tensor::full(t_curr as f32, batch, latent.device())?;

        let v_cond = model.forward(&img, cond, &t_vec)?;
        let velocity = match uncond {
            Some(uncond) => {
                let v_uncond = model.forward(&img, uncond, &t_vec)?;
                let delta = ((&v_cond - &v_uncond)? * guidance_scale)?;
                (&v_uncond + &delta)?
            }
            None => v_cond,
        };

        img = (&img + &(velocity * (t_prev - t_curr))?)?;
    }
    Ok(img)
}
