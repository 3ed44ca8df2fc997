use crate::{assets::PreparedImage, scaling::ScalingState, transform::Transform};

/// Which layers a watermark paints. `Combined` shares one transform between
/// a text layer and an image layer (image on top).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkKind {
    Text,
    Image,
    Combined,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TextSettings {
    pub content: String,
    pub font: String,
    /// Font size in px, valid range 8..=500.
    pub size: f64,
    /// Fill color as a hex string, e.g. "#ffffff".
    pub color: String,
    /// Percent, 0..=100.
    pub opacity: f64,
    /// Degrees; used when the watermark carries no transform.
    #[serde(default)]
    pub rotation: f64,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct ImageSettings {
    /// Decoded raster handle. Never serialized; callers decode from `source`
    /// (or their own bytes) before rendering.
    #[serde(skip)]
    pub image_data: Option<PreparedImage>,
    /// Optional source path for loaders that resolve rasters from disk.
    #[serde(default)]
    pub source: Option<String>,
    /// Percent of the raster's natural size, 1..=500.
    pub scale: f64,
    /// Percent, 0..=100.
    pub opacity: f64,
    /// Degrees; used when the watermark carries no transform.
    #[serde(default)]
    pub rotation: f64,
}

/// The nine directional anchors plus normalized free-form placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PositionPreset {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
    Custom,
}

impl PositionPreset {
    /// Parse a preset name. Unknown names fall back to `Center` rather than
    /// erroring so a stale document never aborts a render.
    pub fn parse(s: &str) -> Self {
        match s {
            "top-left" => Self::TopLeft,
            "top-center" => Self::TopCenter,
            "top-right" => Self::TopRight,
            "center-left" => Self::CenterLeft,
            "center" => Self::Center,
            "center-right" => Self::CenterRight,
            "bottom-left" => Self::BottomLeft,
            "bottom-center" => Self::BottomCenter,
            "bottom-right" => Self::BottomRight,
            "custom" => Self::Custom,
            _ => Self::Center,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopCenter => "top-center",
            Self::TopRight => "top-right",
            Self::CenterLeft => "center-left",
            Self::Center => "center",
            Self::CenterRight => "center-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomCenter => "bottom-center",
            Self::BottomRight => "bottom-right",
            Self::Custom => "custom",
        }
    }
}

impl serde::Serialize for PositionPreset {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for PositionPreset {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Where a watermark sits within its bounds.
///
/// For anchor presets `x`/`y` are pixel offsets from the anchor; for
/// `custom` they are normalized center coordinates in `[0,1000]` meaning
/// `[0.0,1.0]` of the bounds width/height.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub preset: PositionPreset,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            preset: PositionPreset::Center,
            x: 0.0,
            y: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
    Webp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OutputSettings {
    pub format: OutputFormat,
    /// 1..=100. Ignored by lossless formats.
    pub quality: u8,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Png,
            quality: 90,
        }
    }
}

/// One watermark's content and appearance configuration.
///
/// Exactly the sub-objects matching `kind` are required to be well-formed;
/// absence of the other is tolerated.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct WatermarkSettings {
    #[serde(rename = "type")]
    pub kind: WatermarkKind,
    #[serde(default)]
    pub text: Option<TextSettings>,
    #[serde(default)]
    pub image: Option<ImageSettings>,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub output: Option<OutputSettings>,
}

impl WatermarkSettings {
    pub fn has_text(&self) -> bool {
        matches!(self.kind, WatermarkKind::Text | WatermarkKind::Combined)
    }

    pub fn has_image(&self) -> bool {
        matches!(self.kind, WatermarkKind::Image | WatermarkKind::Combined)
    }

    /// Check all type-specific ranges and enumerated choices at the
    /// [`ValidationStage::Render`] stage.
    pub fn validate(&self) -> ValidationReport {
        self.validate_at(ValidationStage::Render)
    }

    /// Check all type-specific ranges and enumerated choices.
    ///
    /// Every violation is collected; nothing short-circuits and nothing
    /// panics. Render refuses nothing itself — callers gate on the report.
    /// The stage controls the one check that depends on when validation
    /// runs: whether an image watermark's raster must already be decoded.
    pub fn validate_at(&self, stage: ValidationStage) -> ValidationReport {
        let mut errors = Vec::new();

        if self.has_text() {
            match &self.text {
                None => errors.push(format!(
                    "text settings are required for type '{}'",
                    kind_name(self.kind)
                )),
                Some(t) => {
                    if t.content.trim().is_empty() {
                        errors.push("text content must be non-empty".to_string());
                    }
                    if !(8.0..=500.0).contains(&t.size) {
                        errors.push("text size must be within 8..=500 px".to_string());
                    }
                    if !(0.0..=100.0).contains(&t.opacity) {
                        errors.push("text opacity must be within 0..=100".to_string());
                    }
                    if parse_hex_color(&t.color).is_err() {
                        errors.push(format!("text color '{}' is not a valid hex color", t.color));
                    }
                }
            }
        }

        if self.has_image() {
            match &self.image {
                None => errors.push(format!(
                    "image settings are required for type '{}'",
                    kind_name(self.kind)
                )),
                Some(i) => {
                    match stage {
                        ValidationStage::Render if i.image_data.is_none() => {
                            errors.push("image data must be decoded before use".to_string());
                        }
                        ValidationStage::Document
                            if i.image_data.is_none() && i.source.is_none() =>
                        {
                            errors.push(
                                "image settings need a decoded raster or a source path"
                                    .to_string(),
                            );
                        }
                        _ => {}
                    }
                    if !(1.0..=500.0).contains(&i.scale) {
                        errors.push("image scale must be within 1..=500 percent".to_string());
                    }
                    if !(0.0..=100.0).contains(&i.opacity) {
                        errors.push("image opacity must be within 0..=100".to_string());
                    }
                }
            }
        }

        if self.position.preset == PositionPreset::Custom {
            for (axis, v) in [("x", self.position.x), ("y", self.position.y)] {
                if !v.is_finite() || !(0.0..=1000.0).contains(&v) {
                    errors.push(format!(
                        "custom position {axis} must be a number within 0..=1000"
                    ));
                }
            }
        }

        if let Some(output) = &self.output
            && !(1..=100).contains(&output.quality)
        {
            errors.push("output quality must be within 1..=100".to_string());
        }

        ValidationReport { errors }
    }
}

/// When settings validation runs relative to raster decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationStage {
    /// Checking a stored document: an image watermark may still carry an
    /// undecoded raster as long as it names a source to decode it from.
    Document,
    /// Immediately before rendering: image rasters must be decoded.
    Render,
}

fn kind_name(kind: WatermarkKind) -> &'static str {
    match kind {
        WatermarkKind::Text => "text",
        WatermarkKind::Image => "image",
        WatermarkKind::Combined => "combined",
    }
}

/// Collected validation outcome. Human-readable messages, one per violation.
#[derive(Clone, Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse `#rrggbb`, `rrggbb` or `#rgb` into RGB components.
pub fn parse_hex_color(s: &str) -> crate::error::AquamarkResult<[u8; 3]> {
    let hex = s.trim().strip_prefix('#').unwrap_or(s.trim());
    let err = || crate::error::AquamarkError::render(format!("invalid hex color '{s}'"));

    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).map_err(|_| err())?;
            let g = u8::from_str_radix(&hex[2..4], 16).map_err(|_| err())?;
            let b = u8::from_str_radix(&hex[4..6], 16).map_err(|_| err())?;
            Ok([r, g, b])
        }
        3 => {
            let component = |i: usize| {
                u8::from_str_radix(&hex[i..i + 1], 16)
                    .map(|v| v * 17)
                    .map_err(|_| err())
            };
            Ok([component(0)?, component(1)?, component(2)?])
        }
        _ => Err(err()),
    }
}

/// Stable watermark identity within an editing session. Monotonically
/// increasing, never reused.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct WatermarkId(pub u64);

/// Composition entity owned by the editing session.
///
/// `transform`, when present, is captured in preview-canvas space and drives
/// the transform-based render path; without it the legacy anchor path from
/// `settings.position` applies. `z_index` is paint order, ascending; ties
/// break by insertion order.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Watermark {
    pub id: WatermarkId,
    pub settings: WatermarkSettings,
    #[serde(default)]
    pub transform: Option<Transform>,
    #[serde(default)]
    pub z_index: i32,
    #[serde(default)]
    pub scaling: ScalingState,
}
