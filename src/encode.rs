//! Encoding of composited frames into the supported output formats.

use std::io::Cursor;

use anyhow::Context;
use image::{
    ExtendedColorType, ImageEncoder,
    codecs::{jpeg::JpegEncoder, png::PngEncoder, webp::WebPEncoder},
};

use crate::{
    error::AquamarkResult,
    model::{OutputFormat, OutputSettings},
    render::FrameRGBA,
};

/// Encode a frame per the output settings.
///
/// PNG and WebP keep the alpha channel; JPEG has none, so the frame is
/// flattened over white. The WebP path is lossless and ignores `quality`.
pub fn encode_frame(frame: &FrameRGBA, output: &OutputSettings) -> AquamarkResult<Vec<u8>> {
    let rgba = straight_alpha_bytes(frame);
    let mut out = Vec::new();

    match output.format {
        OutputFormat::Png => {
            PngEncoder::new(Cursor::new(&mut out))
                .write_image(&rgba, frame.width, frame.height, ExtendedColorType::Rgba8)
                .context("encode png")?;
        }
        OutputFormat::Jpeg => {
            let rgb = flatten_over_white(frame);
            JpegEncoder::new_with_quality(Cursor::new(&mut out), output.quality.clamp(1, 100))
                .write_image(&rgb, frame.width, frame.height, ExtendedColorType::Rgb8)
                .context("encode jpeg")?;
        }
        OutputFormat::Webp => {
            WebPEncoder::new_lossless(Cursor::new(&mut out))
                .write_image(&rgba, frame.width, frame.height, ExtendedColorType::Rgba8)
                .context("encode webp")?;
        }
    }

    Ok(out)
}

fn straight_alpha_bytes(frame: &FrameRGBA) -> Vec<u8> {
    let mut rgba = frame.data.clone();
    if frame.premultiplied {
        unpremultiply_rgba8_in_place(&mut rgba);
    }
    rgba
}

fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u16 * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

/// Composite the premultiplied frame over an opaque white background,
/// dropping alpha. For premultiplied pixels that is `c + (255 - a)`.
fn flatten_over_white(frame: &FrameRGBA) -> Vec<u8> {
    let px_count = frame.width as usize * frame.height as usize;
    let mut rgb = Vec::with_capacity(px_count * 3);

    if frame.premultiplied {
        for px in frame.data.chunks_exact(4) {
            let inv_a = 255 - px[3] as u16;
            rgb.push((px[0] as u16 + inv_a).min(255) as u8);
            rgb.push((px[1] as u16 + inv_a).min(255) as u8);
            rgb.push((px[2] as u16 + inv_a).min(255) as u8);
        }
    } else {
        for px in frame.data.chunks_exact(4) {
            let a = px[3] as u16;
            let inv = 255 - a;
            for c in &px[..3] {
                rgb.push(((*c as u16 * a + 255 * inv + 127) / 255) as u8);
            }
        }
    }
    rgb
}
