//! Watermark raster loading. Decoding is front-loaded so render never
//! performs IO; an image watermark whose raster has not been prepared
//! paints nothing.

use std::{path::Path, sync::Arc};

use anyhow::Context;
use kurbo::Size;

use crate::error::{AquamarkError, AquamarkResult};

/// Largest raster edge the render surfaces can address.
pub const MAX_IMAGE_DIM: u32 = u16::MAX as u32;

/// Decoded watermark raster in premultiplied RGBA8 form.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl PreparedImage {
    /// Natural size scaled by a watermark's `scale` percentage, the box an
    /// anchored image watermark paints into.
    pub fn scaled_size(&self, scale_percent: f64) -> Size {
        let s = scale_percent / 100.0;
        Size::new(f64::from(self.width) * s, f64::from(self.height) * s)
    }
}

/// Read and decode a watermark or base raster from disk.
pub fn load_image(path: &Path) -> AquamarkResult<PreparedImage> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
    decode_image(&bytes)
}

/// Decode raster bytes into a [`PreparedImage`].
///
/// Rasters wider or taller than [`MAX_IMAGE_DIM`] are rejected here, at the
/// decode boundary, instead of failing later inside surface construction.
pub fn decode_image(bytes: &[u8]) -> AquamarkResult<PreparedImage> {
    let decoded = image::load_from_memory(bytes).context("decode image bytes")?;
    let (width, height) = (decoded.width(), decoded.height());
    if width > MAX_IMAGE_DIM || height > MAX_IMAGE_DIM {
        return Err(AquamarkError::validation(format!(
            "image is {width}x{height}, larger than the {MAX_IMAGE_DIM} px limit"
        )));
    }

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(premultiplied(decoded.into_rgba8().into_raw())),
    })
}

fn premultiplied(mut rgba: Vec<u8>) -> Vec<u8> {
    for px in rgba.chunks_exact_mut(4) {
        match px[3] {
            255 => {}
            0 => px[..3].fill(0),
            a => {
                for c in &mut px[..3] {
                    *c = ((u16::from(*c) * u16::from(a) + 127) / 255) as u8;
                }
            }
        }
    }
    rgba
}
