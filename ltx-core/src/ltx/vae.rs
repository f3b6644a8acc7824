//! Decoder half of the LTX video autoencoder.
//!
//! Latent frames are decoded spatially with a conv/upsample stack and
//! expanded back to the requested frame count along the time axis.
//! Only the decoder is carried; encoding is never needed at inference.

use anyhow::Result;
use candle_core::Tensor;
use candle_nn::{conv2d, group_norm, Conv2d, Conv2dConfig, GroupNorm, Module, VarBuilder};

use super::sampling::TEMPORAL_RATIO;

#[derive(Debug, Clone)]
pub struct Config {
    pub latent_channels: usize,
    /// Channel widths of the upsampling stages, widest first. Each
    /// stage doubles the spatial resolution, so the list length must
    /// match the spatial compression ratio (2^len).
    pub stage_channels: Vec<usize>,
}

impl Config {
    pub fn ltx_2b() -> Self {
        Self {
            latent_channels: 128,
            stage_channels: vec![512, 256, 128, 64, 32],
        }
    }
}

struct ResnetBlock {
    norm1: GroupNorm,
    conv1: Conv2d,
    norm2: GroupNorm,
    conv2: Conv2d,
    skip: Option<Conv2d>,
}

impl ResnetBlock {
    fn new(in_c: usize, out_c: usize, vb: VarBuilder) -> Result<Self> {
        let cfg = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        let skip = if in_c != out_c {
            Some(conv2d(in_c, out_c, 1, Default::default(), vb.pp("skip"))?)
        } else {
            None
        };
        Ok(Self {
            norm1: group_norm(32, in_c, 1e-6, vb.pp("norm1"))?,
            conv1: conv2d(in_c, out_c, 3, cfg, vb.pp("conv1"))?,
            norm2: group_norm(32, out_c, 1e-6, vb.pp("norm2"))?,
            conv2: conv2d(out_c, out_c, 3, cfg, vb.pp("conv2"))?,
            skip,
        })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let residual = match &self.skip {
            Some(skip) => skip.forward(x)?,
            None => x.clone(),
        };
        let h = self.conv1.forward(&self.norm1.forward(x)?.silu()?)?;
        let h = self.conv2.forward(&self.norm2.forward(&h)?.silu()?)?;
        Ok((h + residual)?)
    }
}

struct UpStage {
    block: ResnetBlock,
    conv: Conv2d,
}

impl UpStage {
    fn new(in_c: usize, out_c: usize, vb: VarBuilder) -> Result<Self> {
        let cfg = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        Ok(Self {
            block: ResnetBlock::new(in_c, out_c, vb.pp("block"))?,
            conv: conv2d(out_c, out_c, 3, cfg, vb.pp("conv"))?,
        })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = self.block.forward(x)?;
        let (_, _, h, w) = x.dims4()?;
        let x = x.upsample_nearest2d(h * 2, w * 2)?;
        Ok(self.conv.forward(&x)?)
    }
}

pub struct VideoDecoder {
    conv_in: Conv2d,
    stages: Vec<UpStage>,
    norm_out: GroupNorm,
    conv_out: Conv2d,
}

impl VideoDecoder {
    pub fn new(cfg: &Config, vb: VarBuilder) -> Result<Self> {
        let conv_cfg = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        let widest = cfg.stage_channels[0];
        let conv_in = conv2d(cfg.latent_channels, widest, 3, conv_cfg, vb.pp("conv_in"))?;
        let mut stages = Vec::with_capacity(cfg.stage_channels.len());
        let mut in_c = widest;
        for (idx, &out_c) in cfg.stage_channels.iter().enumerate() {
            stages.push(UpStage::new(in_c, out_c, vb.pp(format!("up.{idx}")))?);
            in_c = out_c;
        }
        Ok(Self {
            conv_in,
            stages,
            norm_out: group_norm(32, in_c, 1e-6, vb.pp("norm_out"))?,
            conv_out: conv2d(in_c, 3, 3, conv_cfg, vb.pp("conv_out"))?,
        })
    }

    fn decode_frame(&self, latent_frame: &Tensor) -> Result<Tensor> {
        let mut x = self.conv_in.forward(latent_frame)?;
        for stage in &self.stages {
            x = stage.forward(&x)?;
        }
        let x = self.conv_out.forward(&self.norm_out.forward(&x)?.silu()?)?;
        // Drop the singleton batch dim: (3, height, width).
        Ok(x.squeeze(0)?)
    }

    /// Decode a latent video (1, channels, frames, height, width) into
    /// a pixel tensor (num_frames, 3, height * ratio, width * ratio) in
    /// the [-1, 1] range.
    pub fn decode(&self, latent: &Tensor, num_frames: usize) -> Result<Tensor> {
        let latent_frames = latent.dim(2)?;
        let mut decoded = Vec::with_capacity(latent_frames);
        for idx in 0..latent_frames {
            let frame = latent.narrow(2, idx, 1)?.squeeze(2)?;
            decoded.push(self.decode_frame(&frame)?);
        }
        // Nearest-neighbour expansion back to the requested frame count.
        let mut out = Vec::with_capacity(num_frames);
        for idx in 0..num_frames {
            let src = (idx / TEMPORAL_RATIO).min(latent_frames - 1);
            out.push(decoded[src].clone());
        }
        Ok(Tensor::stack(&out, 0)?)
    }
}
