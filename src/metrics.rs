//! Text measurement via Parley shaping, with a coarse width heuristic as a
//! fallback when no usable font is available.

use std::borrow::Cow;

use kurbo::Size;

use crate::{
    error::{AquamarkError, AquamarkResult},
    model::WatermarkSettings,
};

/// RGBA8 brush color carried through Parley layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrush {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Stateful helper for shaping text against the system font collection.
///
/// Reused across watermarks so Parley's font and layout contexts warm up
/// once per renderer rather than once per draw.
pub struct TextMeasurer {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrush>,
}

impl Default for TextMeasurer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextMeasurer {
    pub fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    /// Shape and lay out a single run of plain text.
    ///
    /// `family` is a CSS-style family name; sans-serif is appended as a
    /// fallback so an unknown family still shapes with something.
    pub fn layout(
        &mut self,
        text: &str,
        family: &str,
        size_px: f32,
        brush: TextBrush,
    ) -> AquamarkResult<parley::Layout<TextBrush>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(AquamarkError::validation(
                "text size must be finite and > 0",
            ));
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(Cow::Owned(format!("{family}, sans-serif"))),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrush> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }

    /// Measure a text run, falling back to [`fallback_width`] when shaping
    /// fails or produces a degenerate layout.
    pub fn measure(&mut self, text: &str, family: &str, size_px: f64) -> Size {
        let shaped = self
            .layout(text, family, size_px as f32, TextBrush::default())
            .ok()
            .map(|layout| layout_size(&layout));

        match shaped {
            Some(size) if size.width > 0.0 && size.height > 0.0 => size,
            _ => Size::new(fallback_width(text, size_px), size_px * 1.2),
        }
    }
}

/// Advance-based bounding size of a built layout.
pub fn layout_size<B: parley::style::Brush>(layout: &parley::Layout<B>) -> Size {
    let mut width = 0.0f64;
    let mut height = 0.0f64;
    for line in layout.lines() {
        let m = line.metrics();
        width = width.max(f64::from(m.advance));
        height += f64::from(m.ascent) + f64::from(m.descent) + f64::from(m.leading);
    }
    Size::new(width, height)
}

/// Coarse width estimate used when no font is available: an average glyph is
/// assumed to advance 0.6em.
pub fn fallback_width(text: &str, size_px: f64) -> f64 {
    size_px * text.chars().count() as f64 * 0.6
}

/// Logical unscaled size of a watermark, used by anchor positioning.
///
/// Text is measured by shaping; images use their natural raster size times
/// the configured scale percentage. A combined watermark takes the union box
/// of both layers.
pub fn watermark_dimensions(measurer: &mut TextMeasurer, settings: &WatermarkSettings) -> Size {
    let mut size = Size::ZERO;

    if settings.has_text()
        && let Some(text) = &settings.text
    {
        let measured = measurer.measure(&text.content, &text.font, text.size);
        size.width = size.width.max(measured.width);
        size.height = size.height.max(measured.height);
    }

    if settings.has_image()
        && let Some(img) = &settings.image
        && let Some(data) = &img.image_data
    {
        let scaled = data.scaled_size(img.scale);
        size.width = size.width.max(scaled.width);
        size.height = size.height.max(scaled.height);
    }

    size
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        assets::PreparedImage,
        model::{ImageSettings, Position, WatermarkKind, WatermarkSettings},
    };

    #[test]
    fn fallback_width_scales_with_length_and_size() {
        assert_eq!(fallback_width("abcd", 10.0), 24.0);
        assert_eq!(fallback_width("", 10.0), 0.0);
        assert!(fallback_width("watermark", 32.0) > fallback_width("mark", 32.0));
    }

    #[test]
    fn measure_is_never_degenerate_for_non_empty_text() {
        let mut measurer = TextMeasurer::new();
        let size = measurer.measure("© 2026 studio", "Arial", 24.0);
        assert!(size.width > 0.0);
        assert!(size.height > 0.0);
    }

    #[test]
    fn layout_rejects_non_positive_size() {
        let mut measurer = TextMeasurer::new();
        assert!(
            measurer
                .layout("x", "Arial", 0.0, TextBrush::default())
                .is_err()
        );
        assert!(
            measurer
                .layout("x", "Arial", f32::NAN, TextBrush::default())
                .is_err()
        );
    }

    #[test]
    fn image_dimensions_use_scale_percent() {
        let settings = WatermarkSettings {
            kind: WatermarkKind::Image,
            text: None,
            image: Some(ImageSettings {
                image_data: Some(PreparedImage {
                    width: 200,
                    height: 100,
                    rgba8_premul: Arc::new(vec![0; 200 * 100 * 4]),
                }),
                source: None,
                scale: 50.0,
                opacity: 100.0,
                rotation: 0.0,
            }),
            position: Position::default(),
            output: None,
        };

        let mut measurer = TextMeasurer::new();
        let size = watermark_dimensions(&mut measurer, &settings);
        assert_eq!(size, Size::new(100.0, 50.0));
    }

    #[test]
    fn undecoded_image_has_zero_dimensions() {
        let settings = WatermarkSettings {
            kind: WatermarkKind::Image,
            text: None,
            image: Some(ImageSettings {
                scale: 100.0,
                opacity: 100.0,
                ..ImageSettings::default()
            }),
            position: Position::default(),
            output: None,
        };

        let mut measurer = TextMeasurer::new();
        assert_eq!(watermark_dimensions(&mut measurer, &settings), Size::ZERO);
    }
}
