use std::sync::Mutex;

use anyhow::{anyhow, Context, Error, Result};
use candle_core::{DType, Device, Tensor};
use hf_hub::api::tokio::Api;
use image::DynamicImage;
use tokenizers::Tokenizer;
use tracing::{info, warn};

mod model;
mod sampling;
mod vae;

use candle_transformers::models::t5::{self, T5EncoderModel};

use crate::{
    select_best_device, tensor_to_frames, DeviceMap, GenerationParams, Loader, ModelVariant,
    PipelineOptions, VideoModel,
};

/// Fixed prompt length fed to the text encoder.
const TEXT_TOKENS: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LtxVariant {
    V09,
    V091,
}

impl LtxVariant {
    fn weights_file(&self) -> &'static str {
        match self {
            LtxVariant::V09 => "ltx-video-2b-v0.9.safetensors",
            LtxVariant::V091 => "ltx-video-2b-v0.9.1.safetensors",
        }
    }
}

pub struct LtxModel {
    device: Device,
    dtype: DType,
    // T5's forward caches internally and needs &mut, so the encoder
    // sits behind a mutex while the pipeline itself stays shareable.
    t5_model: Mutex<T5EncoderModel>,
    t5_tokenizer: Tokenizer,
    transformer: model::LtxTransformer,
    vae: vae::VideoDecoder,
}

impl LtxModel {
    fn encode_prompt(&self, prompt: &str) -> Result<Tensor> {
        let mut tokens = self
            .t5_tokenizer
            .encode(prompt, true)
            .map_err(Error::msg)?
            .get_ids()
            .to_vec();
        tokens.truncate(TEXT_TOKENS);
        tokens.resize(TEXT_TOKENS, 0);
        let input_ids = Tensor::new(&*tokens, &self.device)?.unsqueeze(0)?;
        let mut t5 = self
            .t5_model
            .lock()
            .map_err(|_| anyhow!("text encoder mutex poisoned"))?;
        Ok(t5.forward(&input_ids)?)
    }
}

impl VideoModel for LtxModel {
    fn run(&self, params: &GenerationParams) -> Result<Vec<DynamicImage>> {
        // Seed the device RNG so identical requests sample identical noise.
        self.device.set_seed(params.seed)?;

        let latent = sampling::get_noise(params.num_frames, params.height, params.width, &self.device)?
            .to_dtype(self.dtype)?;

        let cond = self.encode_prompt(&params.prompt)?;
        let uncond = if params.guidance_scale > 1.0 {
            Some(self.encode_prompt(&params.negative_prompt)?)
        } else {
            None
        };

        let timesteps = sampling::get_schedule(params.num_inference_steps);
        let latent = sampling::denoise(
            &self.transformer,
            &latent,
            &cond,
            uncond.as_ref(),
            &timesteps,
            params.guidance_scale,
        )?;
        info!("denoising complete, decoding latent video");

        let decoded = self
            .vae
            .decode(&latent, params.num_frames)?
            .to_dtype(DType::F32)?;
        let video = ((decoded.clamp(-1f32, 1f32)? + 1.0)? * 127.5)?.to_dtype(DType::U8)?;
        tensor_to_frames(&video)
    }
}

pub struct LtxLoader;

impl Loader for LtxLoader {
    type Model = LtxModel;

    async fn load(
        repo_id: &str,
        variant: ModelVariant,
        api: Api,
        device_map: DeviceMap,
        options: PipelineOptions,
    ) -> Result<Self::Model> {
        let ModelVariant::Ltx(variant) = variant;

        // Configure device. Half precision keeps the resident weights at
        // half size; the mmaped loader below avoids staging them in host
        // memory.
        let device = select_best_device(device_map).context("failed to set up device")?;
        let dtype = DType::F16;

        // --- Load T5 text encoder and tokenizer ---
        let t5_repo = api.repo(hf_hub::Repo::with_revision(
            "google/t5-v1_1-xxl".to_string(),
            hf_hub::RepoType::Model,
            "refs/pr/2".to_string(),
        ));
        let t5_model_file = t5_repo
            .get("model.safetensors")
            .await
            .context("failed to load T5 model file")?;
        let t5_vb = unsafe {
            candle_nn::VarBuilder::from_mmaped_safetensors(&[t5_model_file], dtype, &device)
                .context("failed to build T5 var builder")?
        };
        let config_filename = t5_repo
            .get("config.json")
            .await
            .context("failed to get T5 config")?;
        let config_str =
            std::fs::read_to_string(&config_filename).context("failed to read T5 config")?;
        let t5_config: t5::Config =
            serde_json::from_str(&config_str).context("failed to parse T5 config")?;
        let t5_model =
            T5EncoderModel::load(t5_vb, &t5_config).context("failed to load T5 model")?;
        let t5_tokenizer_filename = api
            .model("lmz/mt5-tokenizers".to_string())
            .get("t5-v1_1-xxl.tokenizer.json")
            .await
            .context("failed to get T5 tokenizer")?;
        let t5_tokenizer = Tokenizer::from_file(t5_tokenizer_filename)
            .map_err(Error::msg)
            .context("failed to load T5 tokenizer")?;

        // --- Load the LTX transformer and video autoencoder ---
        let ltx_repo = api.repo(hf_hub::Repo::model(repo_id.to_string()));
        let weights_file = ltx_repo
            .get(variant.weights_file())
            .await
            .context("failed to get LTX weights file")?;
        let vb = unsafe {
            candle_nn::VarBuilder::from_mmaped_safetensors(&[weights_file], dtype, &device)
                .context("failed to build LTX var builder")?
        };

        // Flash attention needs the kernel compiled in and a CUDA device;
        // falling back is logged, not fatal.
        let flash = options.efficient_attention
            && cfg!(feature = "flash-attn")
            && device.is_cuda();
        if options.efficient_attention && !flash {
            warn!("memory-efficient attention requested but unavailable, using sliced attention");
        } else if flash {
            info!("memory-efficient attention enabled");
        }

        let transformer = model::LtxTransformer::new(
            &model::Config::ltx_2b(),
            &options,
            flash,
            vb.pp("transformer"),
        )
        .context("failed to load LTX transformer")?;
        let vae = vae::VideoDecoder::new(&vae::Config::ltx_2b(), vb.pp("vae.decoder"))
            .context("failed to load video autoencoder")?;

        Ok(LtxModel {
            device,
            dtype,
            t5_model: Mutex::new(t5_model),
            t5_tokenizer,
            transformer,
            vae,
        })
    }
}
