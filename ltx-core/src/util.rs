use anyhow::Result;
use candle_core::utils::{cuda_is_available, metal_is_available};
use candle_core::{Device, IndexOp, Tensor};
use image::DynamicImage;
use tracing::warn;

use crate::DeviceMap;

/// Accelerated-hardware descriptor, surfaced by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accelerator {
    Cuda(usize),
    Metal(usize),
}

impl Accelerator {
    pub fn kind(&self) -> &'static str {
        match self {
            Accelerator::Cuda(_) => "cuda",
            Accelerator::Metal(_) => "metal",
        }
    }

    pub fn ordinal(&self) -> usize {
        match self {
            Accelerator::Cuda(ordinal) | Accelerator::Metal(ordinal) => *ordinal,
        }
    }
}

/// Probe for accelerated hardware without constructing a device.
pub fn available_accelerator() -> Option<Accelerator> {
    if cuda_is_available() {
        Some(Accelerator::Cuda(0))
    } else if metal_is_available() {
        Some(Accelerator::Metal(0))
    } else {
        None
    }
}

pub fn select_best_device(device_map: DeviceMap) -> Result<Device> {
    match device_map {
        DeviceMap::ForceCpu => Ok(Device::Cpu),
        DeviceMap::Ordinal(ordinal) if cuda_is_available() => Ok(Device::new_cuda(ordinal)?),
        DeviceMap::Ordinal(ordinal) if metal_is_available() => Ok(Device::new_metal(ordinal)?),
        DeviceMap::Ordinal(_) => {
            warn!("no accelerated hardware available, falling back to CPU (generation will be substantially slower)");
            Ok(Device::Cpu)
        }
    }
}

/// Converts a tensor with shape (3, height, width) into an RGB image.
pub fn tensor_to_frame(img: &Tensor) -> Result<DynamicImage> {
    let (channels, height, width) = img.dims3()?;
    if channels != 3 {
        anyhow::bail!("tensor_to_frame expects an image with 3 channels");
    }
    let img = img.permute((1, 2, 0))?.flatten_all()?;
    let pixels = img.to_vec1::<u8>()?;
    let buffer = image::ImageBuffer::from_raw(width as u32, height as u32, pixels)
        .ok_or_else(|| candle_core::Error::msg("error converting tensor to image buffer"))?;
    Ok(DynamicImage::ImageRgb8(buffer))
}

/// Converts a tensor with shape (frames, 3, height, width) into an
/// ordered frame sequence.
pub fn tensor_to_frames(video: &Tensor) -> Result<Vec<DynamicImage>> {
    let frames = video.dim(0)?;
    let mut out = Vec::with_capacity(frames);
    for idx in 0..frames {
        out.push(tensor_to_frame(&video.i(idx)?)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;

    #[test]
    fn tensor_to_frames_preserves_count_and_size() {
        let video = Tensor::zeros((3, 3, 4, 6), DType::U8, &Device::Cpu).unwrap();
        let frames = tensor_to_frames(&video).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].width(), 6);
        assert_eq!(frames[0].height(), 4);
    }

    #[test]
    fn tensor_to_frame_rejects_wrong_channel_count() {
        let img = Tensor::zeros((4, 4, 6), DType::U8, &Device::Cpu).unwrap();
        assert!(tensor_to_frame(&img).is_err());
    }
}
