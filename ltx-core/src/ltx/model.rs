//! Transformer denoiser for the LTX latent video space.
//!
//! The checkpoint stores a DiT operating on flattened latent tokens:
//! self-attention over the video tokens, cross-attention into the T5
//! caption embedding, and adaptive layer-norm modulation driven by the
//! flow timestep.

use anyhow::Result;
use candle_core::{DType, Tensor, D};
use candle_nn::{linear, rms_norm, Linear, Module, RmsNorm, VarBuilder};

use crate::PipelineOptions;

/// Query rows processed per attention chunk when slicing is enabled.
const ATTENTION_CHUNK: usize = 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub in_channels: usize,
    pub hidden_size: usize,
    pub depth: usize,
    pub num_heads: usize,
    pub caption_dim: usize,
    pub mlp_ratio: usize,
}

impl Config {
    /// Layout of the 2B checkpoints (v0.9 and v0.9.1 share it).
    pub fn ltx_2b() -> Self {
        Self {
            in_channels: 128,
            hidden_size: 2048,
            depth: 28,
            num_heads: 32,
            caption_dim: 4096,
            mlp_ratio: 4,
        }
    }
}

fn timestep_embedding(t: &Tensor, dim: usize, dtype: DType) -> Result<Tensor> {
    let half = dim / 2;
    let freqs: Vec<f32> = (0..half)
        .map(|i| (-(i as f32) * (10_000f32).ln() / half as f32).exp())
        .collect();
    let freqs = Tensor::new(freqs.as_slice(), t.device())?;
    let args = t
        .to_dtype(DType::F32)?
        .unsqueeze(1)?
        .broadcast_mul(&freqs.unsqueeze(0)?)?;
    let emb = Tensor::cat(&[args.sin()?, args.cos()?], D::Minus1)?;
    Ok(emb.to_dtype(dtype)?)
}

/// `x * (1 + scale) + shift` with per-batch modulation tensors.
fn modulate(x: &Tensor, shift: &Tensor, scale: &Tensor) -> Result<Tensor> {
    Ok(x.broadcast_mul(&(scale + 1.0)?)?.broadcast_add(shift)?)
}

struct Attention {
    wq: Linear,
    wk: Linear,
    wv: Linear,
    wo: Linear,
    num_heads: usize,
    head_dim: usize,
    sliced: bool,
    flash: bool,
}

impl Attention {
    fn new(
        dim: usize,
        kv_dim: usize,
        num_heads: usize,
        options: &PipelineOptions,
        flash: bool,
        vb: VarBuilder,
    ) -> Result<Self> {
        Ok(Self {
            wq: linear(dim, dim, vb.pp("to_q"))?,
            wk: linear(kv_dim, dim, vb.pp("to_k"))?,
            wv: linear(kv_dim, dim, vb.pp("to_v"))?,
            wo: linear(dim, dim, vb.pp("to_out"))?,
            num_heads,
            head_dim: dim / num_heads,
            sliced: options.attention_slicing,
            flash,
        })
    }

    fn forward(&self, x: &Tensor, context: &Tensor) -> Result<Tensor> {
        let (b, lq, _) = x.dims3()?;
        let lk = context.dim(1)?;
        let q = self
            .wq
            .forward(x)?
            .reshape((b, lq, self.num_heads, self.head_dim))?;
        let k = self
            .wk
            .forward(context)?
            .reshape((b, lk, self.num_heads, self.head_dim))?;
        let v = self
            .wv
            .forward(context)?
            .reshape((b, lk, self.num_heads, self.head_dim))?;
        let scale = 1.0 / (self.head_dim as f64).sqrt();

        #[cfg(feature = "flash-attn")]
        if self.flash {
            let out = candle_flash_attn::flash_attn(&q, &k, &v, scale as f32, false)?
                .reshape((b, lq, self.num_heads * self.head_dim))?;
            return Ok(self.wo.forward(&out)?);
        }
        let _ = self.flash;

        // (b, heads, len, head_dim)
        let q = q.transpose(1, 2)?.contiguous()?;
        let k = k.transpose(1, 2)?.contiguous()?;
        let v = v.transpose(1, 2)?.contiguous()?;
        let kt = k.transpose(D::Minus2, D::Minus1)?.contiguous()?;

        let chunk = if self.sliced { ATTENTION_CHUNK } else { lq };
        let mut pieces = Vec::new();
        let mut start = 0;
        while start < lq {
            let len = chunk.min(lq - start);
            let q_chunk = q.narrow(2, start, len)?;
            let scores = (q_chunk.matmul(&kt)? * scale)?;
            let weights = candle_nn::ops::softmax_last_dim(&scores)?;
            pieces.push(weights.matmul(&v)?);
            start += len;
        }
        let out = Tensor::cat(&pieces, 2)?
            .transpose(1, 2)?
            .reshape((b, lq, self.num_heads * self.head_dim))?;
        Ok(self.wo.forward(&out)?)
    }
}

struct Mlp {
    fc1: Linear,
    fc2: Linear,
}

impl Mlp {
    fn new(dim: usize, mlp_ratio: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            fc1: linear(dim, dim * mlp_ratio, vb.pp("fc1"))?,
            fc2: linear(dim * mlp_ratio, dim, vb.pp("fc2"))?,
        })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Ok(self.fc2.forward(&self.fc1.forward(x)?.gelu()?)?)
    }
}

struct Block {
    norm_attn: RmsNorm,
    attn: Attention,
    norm_cross: RmsNorm,
    cross: Attention,
    norm_mlp: RmsNorm,
    mlp: Mlp,
    ada: Linear,
}

impl Block {
    fn new(cfg: &Config, options: &PipelineOptions, flash: bool, vb: VarBuilder) -> Result<Self> {
        let dim = cfg.hidden_size;
        Ok(Self {
            norm_attn: rms_norm(dim, 1e-6, vb.pp("norm_attn"))?,
            attn: Attention::new(dim, dim, cfg.num_heads, options, flash, vb.pp("attn"))?,
            norm_cross: rms_norm(dim, 1e-6, vb.pp("norm_cross"))?,
            cross: Attention::new(dim, dim, cfg.num_heads, options, flash, vb.pp("cross_attn"))?,
            norm_mlp: rms_norm(dim, 1e-6, vb.pp("norm_mlp"))?,
            mlp: Mlp::new(dim, cfg.mlp_ratio, vb.pp("mlp"))?,
            ada: linear(dim, dim * 6, vb.pp("ada"))?,
        })
    }

    fn forward(&self, x: &Tensor, context: &Tensor, temb: &Tensor) -> Result<Tensor> {
        // (b, 1, 6 * hidden) so the chunks broadcast over tokens.
        let mods = self.ada.forward(&temb.silu()?)?.unsqueeze(1)?;
        let mods = mods.chunk(6, D::Minus1)?;
        let (shift_sa, scale_sa, gate_sa) = (&mods[0], &mods[1], &mods[2]);
        let (shift_mlp, scale_mlp, gate_mlp) = (&mods[3], &mods[4], &mods[5]);

        let normed = modulate(&self.norm_attn.forward(x)?, shift_sa, scale_sa)?;
        let x = x.broadcast_add(&self.attn.forward(&normed, &normed)?.broadcast_mul(gate_sa)?)?;

        let normed = self.norm_cross.forward(&x)?;
        let x = (&x + &self.cross.forward(&normed, context)?)?;

        let normed = modulate(&self.norm_mlp.forward(&x)?, shift_mlp, scale_mlp)?;
        let x = x.broadcast_add(&self.mlp.forward(&normed)?.broadcast_mul(gate_mlp)?)?;
        Ok(x)
    }
}

pub struct LtxTransformer {
    proj_in: Linear,
    time_fc1: Linear,
    time_fc2: Linear,
    caption_proj: Linear,
    blocks: Vec<Block>,
    norm_out: RmsNorm,
    proj_out: Linear,
    dtype: DType,
}

impl LtxTransformer {
    pub fn new(
        cfg: &Config,
        options: &PipelineOptions,
        flash: bool,
        vb: VarBuilder,
    ) -> Result<Self> {
        let dim = cfg.hidden_size;
        let mut blocks = Vec::with_capacity(cfg.depth);
        for idx in 0..cfg.depth {
            blocks.push(Block::new(
                cfg,
                options,
                flash,
                vb.pp(format!("blocks.{idx}")),
            )?);
        }
        Ok(Self {
            proj_in: linear(cfg.in_channels, dim, vb.pp("proj_in"))?,
            time_fc1: linear(256, dim, vb.pp("time_embed.fc1"))?,
            time_fc2: linear(dim, dim, vb.pp("time_embed.fc2"))?,
            caption_proj: linear(cfg.caption_dim, dim, vb.pp("caption_proj"))?,
            blocks,
            norm_out: rms_norm(dim, 1e-6, vb.pp("norm_out"))?,
            proj_out: linear(dim, cfg.in_channels, vb.pp("proj_out"))?,
            dtype: vb.dtype(),
        })
    }

    fn time_embed(&self, t: &Tensor) -> Result<Tensor> {
        let emb = timestep_embedding(t, 256, self.dtype)?;
        Ok(self.time_fc2.forward(&self.time_fc1.forward(&emb)?.silu()?)?)
    }

    /// Predict the velocity field for a latent video.
    ///
    /// `latent` is (batch, channels, frames, height, width); `context`
    /// is the projected caption embedding (batch, tokens, caption_dim);
    /// `t` holds one flow timestep per batch element. The output has
    /// the latent's shape.
    pub fn forward(&self, latent: &Tensor, context: &Tensor, t: &Tensor) -> Result<Tensor> {
        let (b, c, f, h, w) = latent.dims5()?;
        let x = latent
            .permute((0, 2, 3, 4, 1))?
            .reshape((b, f * h * w, c))?;
        let mut x = self.proj_in.forward(&x)?;
        let temb = self.time_embed(t)?;
        let context = self.caption_proj.forward(&context.to_dtype(self.dtype)?)?;

        for block in &self.blocks {
            x = block.forward(&x, &context, &temb)?;
        }

        let x = self.proj_out.forward(&self.norm_out.forward(&x)?)?;
        Ok(x.reshape((b, f, h, w, c))?.permute((0, 4, 1, 2, 3))?)
    }
}
