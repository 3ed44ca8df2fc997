//! Dynamic font scaling for interactively resized text watermarks, plus the
//! aspect-ratio constraint used for image watermark boxes.

pub const DEFAULT_MIN_FONT_SIZE: f64 = 8.0;
pub const DEFAULT_MAX_FONT_SIZE: f64 = 200.0;

/// Per-watermark scaling memory, captured once at watermark creation.
///
/// `base_*` fields are the reference for proportional rescaling and are never
/// rebased on later resizes, which is what makes [`ScalingState::rescale`]
/// idempotent for a given container size.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScalingState {
    pub base_font_size: f64,
    pub base_width: f64,
    pub base_height: f64,
    #[serde(default = "default_min_font_size")]
    pub min_font_size: f64,
    #[serde(default = "default_max_font_size")]
    pub max_font_size: f64,
    #[serde(default = "default_font_scale_factor")]
    pub font_scale_factor: f64,
    #[serde(default)]
    pub aspect_ratio: Option<f64>,
    #[serde(default)]
    pub maintain_aspect_ratio: bool,
}

fn default_min_font_size() -> f64 {
    DEFAULT_MIN_FONT_SIZE
}

fn default_max_font_size() -> f64 {
    DEFAULT_MAX_FONT_SIZE
}

fn default_font_scale_factor() -> f64 {
    1.0
}

impl Default for ScalingState {
    fn default() -> Self {
        Self {
            base_font_size: 32.0,
            base_width: 0.0,
            base_height: 0.0,
            min_font_size: DEFAULT_MIN_FONT_SIZE,
            max_font_size: DEFAULT_MAX_FONT_SIZE,
            font_scale_factor: 1.0,
            aspect_ratio: None,
            maintain_aspect_ratio: false,
        }
    }
}

impl ScalingState {
    pub fn for_text(font_size: f64, width: f64, height: f64) -> Self {
        Self {
            base_font_size: font_size,
            base_width: width,
            base_height: height,
            ..Self::default()
        }
    }

    pub fn for_image(width: f64, height: f64) -> Self {
        let aspect_ratio = if height > 0.0 {
            Some(width / height)
        } else {
            None
        };
        Self {
            base_width: width,
            base_height: height,
            aspect_ratio,
            maintain_aspect_ratio: true,
            ..Self::default()
        }
    }

    /// Rescale the font for a new container size and remember the factor.
    pub fn rescale(&mut self, new_width: f64, new_height: f64) -> f64 {
        let size = rescale_font(self, new_width, new_height);
        if self.base_font_size > 0.0 {
            self.font_scale_factor = size / self.base_font_size;
        }
        size
    }
}

/// Proportional font size for a resized container.
///
/// Uniform scale: the smaller of the width/height ratios, so text is never
/// stretched anisotropically. Clamped to `[min_font_size, max_font_size]`.
pub fn rescale_font(state: &ScalingState, new_width: f64, new_height: f64) -> f64 {
    if state.base_width <= 0.0 || state.base_height <= 0.0 {
        return state
            .base_font_size
            .clamp(state.min_font_size, state.max_font_size);
    }

    let factor = (new_width / state.base_width).min(new_height / state.base_height);
    (state.base_font_size * factor).clamp(state.min_font_size, state.max_font_size)
}

/// Pull a resized image box back to the watermark's captured aspect ratio.
///
/// Shrinks the dimension that would otherwise distort the raster: width when
/// the box is too wide for its height, height when too tall. No-op unless the
/// state maintains an aspect ratio.
pub fn constrain_aspect(state: &ScalingState, new_width: f64, new_height: f64) -> (f64, f64) {
    if !state.maintain_aspect_ratio {
        return (new_width, new_height);
    }
    let Some(aspect) = state.aspect_ratio else {
        return (new_width, new_height);
    };
    if aspect <= 0.0 || new_height <= 0.0 {
        return (new_width, new_height);
    }

    if new_width / new_height > aspect {
        (new_height * aspect, new_height)
    } else {
        (new_width, new_width / aspect)
    }
}
