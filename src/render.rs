//! CPU rendering of individual watermarks onto a target surface.
//!
//! Each watermark is drawn through its own `vello_cpu` render context and
//! flushed onto the surface pixmap in one step, so a draw that errors out
//! partway never leaves half-painted state behind.

use std::{collections::HashMap, sync::Arc};

use kurbo::{Affine, Point, Vec2};

use crate::{
    assets::PreparedImage,
    error::{AquamarkError, AquamarkResult},
    layout::{Bounds, resolve_position},
    metrics::{TextBrush, TextMeasurer, layout_size},
    model::{ImageSettings, TextSettings, Watermark, parse_hex_color},
    transform::Transform,
};

/// Render target with premultiplied RGBA8 storage.
pub struct Surface {
    width: u16,
    height: u16,
    pixmap: vello_cpu::Pixmap,
}

/// Final frame pixels handed to the encoder.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8 bytes.
    pub data: Vec<u8>,
    /// Whether `data` is premultiplied by alpha.
    pub premultiplied: bool,
}

impl Surface {
    /// Transparent surface of the given size.
    pub fn new(width: u32, height: u32) -> AquamarkResult<Self> {
        let (w, h) = checked_dims(width, height)?;
        Ok(Self {
            width: w,
            height: h,
            pixmap: vello_cpu::Pixmap::new(w, h),
        })
    }

    /// Surface seeded with an already decoded base image.
    pub fn from_image(base: &PreparedImage) -> AquamarkResult<Self> {
        let (w, h) = checked_dims(base.width, base.height)?;
        let pixmap = premul_bytes_to_pixmap(base.rgba8_premul.as_slice(), base.width, base.height)?;
        Ok(Self {
            width: w,
            height: h,
            pixmap,
        })
    }

    pub fn width(&self) -> u32 {
        u32::from(self.width)
    }

    pub fn height(&self) -> u32 {
        u32::from(self.height)
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_size(f64::from(self.width), f64::from(self.height))
    }

    pub fn data(&self) -> &[u8] {
        self.pixmap.data_as_u8_slice()
    }

    pub fn into_frame(self) -> FrameRGBA {
        let (width, height) = (self.width(), self.height());
        FrameRGBA {
            width,
            height,
            data: self.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        }
    }
}

fn checked_dims(width: u32, height: u32) -> AquamarkResult<(u16, u16)> {
    if width == 0 || height == 0 {
        return Err(AquamarkError::render("surface dimensions must be non-zero"));
    }
    let w: u16 = width
        .try_into()
        .map_err(|_| AquamarkError::render("surface width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| AquamarkError::render("surface height exceeds u16"))?;
    Ok((w, h))
}

/// Draws one watermark at a time; owns the shaping contexts and paint caches
/// shared across draws.
pub struct WatermarkRenderer {
    measurer: TextMeasurer,
    image_cache: HashMap<usize, vello_cpu::Image>,
    font_cache: HashMap<usize, vello_cpu::peniko::FontData>,
}

impl Default for WatermarkRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl WatermarkRenderer {
    pub fn new() -> Self {
        Self {
            measurer: TextMeasurer::new(),
            image_cache: HashMap::new(),
            font_cache: HashMap::new(),
        }
    }

    /// Render a single watermark onto `surface`.
    ///
    /// `scale_factor` applies to the anchor-positioned path only; a
    /// transform-carrying watermark derives its scaling from the transform's
    /// preview canvas instead.
    pub fn render(
        &mut self,
        surface: &mut Surface,
        watermark: &Watermark,
        scale_factor: f64,
    ) -> AquamarkResult<()> {
        let mut ctx = vello_cpu::RenderContext::new(surface.width, surface.height);

        let drew = match &watermark.transform {
            Some(t) => self.draw_transformed(&mut ctx, watermark, *t, surface.bounds())?,
            None => self.draw_anchored(&mut ctx, watermark, surface.bounds(), scale_factor)?,
        };

        if drew {
            ctx.flush();
            ctx.render_to_pixmap(&mut surface.pixmap);
        }
        Ok(())
    }

    fn draw_transformed(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        watermark: &Watermark,
        transform: Transform,
        bounds: Bounds,
    ) -> AquamarkResult<bool> {
        let scaled = transform.scaled_to(bounds);
        if scaled.width <= 0.0 || scaled.height <= 0.0 {
            tracing::debug!(id = watermark.id.0, "skipping watermark with empty box");
            return Ok(false);
        }

        // Font size follows the preview-to-target ratio; the smaller axis
        // wins so text is never stretched.
        let font_scale = match transform.preview_canvas {
            Some(pc) if pc.width > 0.0 && pc.height > 0.0 => {
                (bounds.width / pc.width).min(bounds.height / pc.height)
            }
            _ => 1.0,
        };

        let base = scaled.to_affine();
        let mut drew = false;

        let settings = &watermark.settings;
        if settings.has_text()
            && let Some(text) = &settings.text
        {
            drew |= self.draw_text(
                ctx,
                text,
                base,
                scaled.width,
                scaled.height,
                text.size * font_scale,
            )?;
        }
        if settings.has_image()
            && let Some(image) = &settings.image
        {
            drew |= self.draw_image(ctx, image, base, scaled.width, scaled.height)?;
        }
        Ok(drew)
    }

    fn draw_anchored(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        watermark: &Watermark,
        bounds: Bounds,
        scale_factor: f64,
    ) -> AquamarkResult<bool> {
        let settings = &watermark.settings;
        let mut drew = false;

        // Unlike the transform path, anchored layers do not share a box:
        // each layer is sized, positioned and rotated on its own, so a
        // combined watermark's raster keeps its natural scaled size even
        // next to a much wider caption.
        if settings.has_text()
            && let Some(text) = &settings.text
        {
            let size = self.measurer.measure(&text.content, &text.font, text.size);
            if size.width > 0.0 && size.height > 0.0 {
                let center = resolve_position(&settings.position, bounds, size, scale_factor);
                let (w, h) = (size.width * scale_factor, size.height * scale_factor);
                let base = anchored_affine(center, text.rotation, w, h);
                drew |= self.draw_text(ctx, text, base, w, h, text.size * scale_factor)?;
            }
        }

        if settings.has_image()
            && let Some(image) = &settings.image
            && let Some(data) = &image.image_data
        {
            let size = data.scaled_size(image.scale);
            if size.width > 0.0 && size.height > 0.0 {
                let center = resolve_position(&settings.position, bounds, size, scale_factor);
                let (w, h) = (size.width * scale_factor, size.height * scale_factor);
                let base = anchored_affine(center, image.rotation, w, h);
                drew |= self.draw_image(ctx, image, base, w, h)?;
            }
        }

        if !drew {
            tracing::debug!(id = watermark.id.0, "anchored watermark painted nothing");
        }
        Ok(drew)
    }

    fn draw_text(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        text: &TextSettings,
        base: Affine,
        box_w: f64,
        box_h: f64,
        font_size: f64,
    ) -> AquamarkResult<bool> {
        if font_size <= 0.0 || text.content.trim().is_empty() {
            return Ok(false);
        }

        let [r, g, b] = parse_hex_color(&text.color)?;
        let layout = self.measurer.layout(
            &text.content,
            &text.font,
            font_size as f32,
            TextBrush { r, g, b, a: 255 },
        )?;
        let shaped = layout_size(&layout);

        // Center the shaped run inside the watermark box.
        let affine = base
            * Affine::translate(Vec2::new(
                (box_w - shaped.width) / 2.0,
                (box_h - shaped.height) / 2.0,
            ));

        let alpha = opacity_alpha(text.opacity);
        if alpha <= 0.0 {
            return Ok(false);
        }

        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        if alpha < 1.0 {
            ctx.push_opacity_layer(alpha);
        }

        // Contrast halo under the fill: a light fill gets a faint dark
        // outline, a dark fill gets a faint light one.
        let (halo_color, halo_width) = if luminance(r, g, b) > 0.7 {
            (
                vello_cpu::peniko::Color::from_rgba8(0, 0, 0, 77),
                font_size / 30.0,
            )
        } else {
            (
                vello_cpu::peniko::Color::from_rgba8(255, 255, 255, 51),
                font_size / 40.0,
            )
        };

        for (dx, dy) in halo_offsets(halo_width) {
            self.fill_layout_glyphs(
                ctx,
                &layout,
                affine * Affine::translate(Vec2::new(dx, dy)),
                Some(halo_color),
            );
        }
        self.fill_layout_glyphs(ctx, &layout, affine, None);

        if alpha < 1.0 {
            ctx.pop_layer();
        }
        Ok(true)
    }

    /// Paint every glyph run of `layout`. `override_color` replaces the run
    /// brushes when painting the contrast halo.
    fn fill_layout_glyphs(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        layout: &parley::Layout<TextBrush>,
        affine: Affine,
        override_color: Option<vello_cpu::peniko::Color>,
    ) {
        ctx.set_transform(affine_to_cpu(affine));

        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };

                let color = override_color.unwrap_or_else(|| {
                    let brush = run.style().brush;
                    vello_cpu::peniko::Color::from_rgba8(brush.r, brush.g, brush.b, brush.a)
                });
                ctx.set_paint(color);

                let font = self.font_for_run(run.run().font());
                let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(&font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
    }

    fn draw_image(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        image: &ImageSettings,
        base: Affine,
        dest_w: f64,
        dest_h: f64,
    ) -> AquamarkResult<bool> {
        // An image watermark whose raster was never decoded paints nothing.
        let Some(data) = &image.image_data else {
            tracing::debug!("image watermark has no decoded raster, skipping");
            return Ok(false);
        };
        if data.width == 0 || data.height == 0 || dest_w <= 0.0 || dest_h <= 0.0 {
            return Ok(false);
        }

        let alpha = opacity_alpha(image.opacity);
        if alpha <= 0.0 {
            return Ok(false);
        }

        let paint = self.image_paint_for(data)?;
        let affine = base
            * Affine::scale_non_uniform(
                dest_w / f64::from(data.width),
                dest_h / f64::from(data.height),
            );

        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_transform(affine_to_cpu(affine));
        ctx.set_paint(paint);
        if alpha < 1.0 {
            ctx.push_opacity_layer(alpha);
        }
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(data.width),
            f64::from(data.height),
        ));
        if alpha < 1.0 {
            ctx.pop_layer();
        }
        Ok(true)
    }

    fn image_paint_for(&mut self, image: &PreparedImage) -> AquamarkResult<vello_cpu::Image> {
        let key = Arc::as_ptr(&image.rgba8_premul) as usize;
        if let Some(paint) = self.image_cache.get(&key) {
            return Ok(paint.clone());
        }

        let pixmap =
            premul_bytes_to_pixmap(image.rgba8_premul.as_slice(), image.width, image.height)?;
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler {
                quality: vello_cpu::peniko::ImageQuality::High,
                ..Default::default()
            },
        };

        self.image_cache.insert(key, paint.clone());
        Ok(paint)
    }

    fn font_for_run(&mut self, font: &parley::FontData) -> vello_cpu::peniko::FontData {
        let key = font.data.as_ref().as_ptr() as usize;
        if let Some(cached) = self.font_cache.get(&key) {
            return cached.clone();
        }

        let data = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(font.data.as_ref().to_vec()),
            font.index,
        );
        self.font_cache.insert(key, data.clone());
        data
    }
}

/// Perceived luminance of an sRGB color, in `[0,1]`.
pub fn luminance(r: u8, g: u8, b: u8) -> f64 {
    (0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)) / 255.0
}

fn opacity_alpha(percent: f64) -> f32 {
    (percent / 100.0).clamp(0.0, 1.0) as f32
}

/// Four-direction offsets tracing a faux outline of the given width.
fn halo_offsets(width: f64) -> [(f64, f64); 4] {
    [(-width, 0.0), (width, 0.0), (0.0, -width), (0.0, width)]
}

/// Box-local affine for an anchored layer: rotate about the resolved center.
fn anchored_affine(center: Point, rotation_deg: f64, w: f64, h: f64) -> Affine {
    Affine::translate(center.to_vec2())
        * Affine::rotate(rotation_deg.to_radians())
        * Affine::translate(Vec2::new(-w / 2.0, -h / 2.0))
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn premul_bytes_to_pixmap(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> AquamarkResult<vello_cpu::Pixmap> {
    let (w, h) = checked_dims(width, height)?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(AquamarkError::render("image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}
