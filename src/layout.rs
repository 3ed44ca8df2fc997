use kurbo::{Point, Size};

use crate::model::{Position, PositionPreset};

/// Rectangle a single watermark is positioned within for one render call.
///
/// Usually the whole target surface, but nothing here assumes that.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

enum AlignKind {
    Start,
    Center,
    End,
}

impl PositionPreset {
    fn align(self) -> (AlignKind, AlignKind) {
        use AlignKind::*;
        match self {
            PositionPreset::TopLeft => (Start, Start),
            PositionPreset::TopCenter => (Center, Start),
            PositionPreset::TopRight => (End, Start),
            PositionPreset::CenterLeft => (Start, Center),
            PositionPreset::Center | PositionPreset::Custom => (Center, Center),
            PositionPreset::CenterRight => (End, Center),
            PositionPreset::BottomLeft => (Start, End),
            PositionPreset::BottomCenter => (Center, End),
            PositionPreset::BottomRight => (End, End),
        }
    }
}

/// Resolve a position to the watermark's **center point** within `bounds`.
///
/// `size` is the watermark's logical size; for anchor presets it and the
/// configured pixel offset are multiplied by `scale_factor` so one logical
/// watermark reproduces at preview and output resolutions. Normalized custom
/// coordinates already encode the final center and are not rescaled.
///
/// Position resolution must never abort a render: a non-finite result falls
/// back to the bounds center.
pub fn resolve_position(
    position: &Position,
    bounds: Bounds,
    size: Size,
    scale_factor: f64,
) -> Point {
    let p = resolve_center(position, bounds, size, scale_factor);
    if p.x.is_finite() && p.y.is_finite() {
        p
    } else {
        bounds.center()
    }
}

fn resolve_center(position: &Position, bounds: Bounds, size: Size, scale_factor: f64) -> Point {
    if position.preset == PositionPreset::Custom {
        // x/y are normalized in [0,1000] meaning a fraction of the bounds.
        let nx = position.x.clamp(0.0, 1000.0) / 1000.0;
        let ny = position.y.clamp(0.0, 1000.0) / 1000.0;
        return Point::new(bounds.x + bounds.width * nx, bounds.y + bounds.height * ny);
    }

    let w = size.width * scale_factor;
    let h = size.height * scale_factor;
    let (ax, ay) = position.preset.align();

    let cx = match ax {
        AlignKind::Start => bounds.x + w / 2.0,
        AlignKind::Center => bounds.x + bounds.width / 2.0,
        AlignKind::End => bounds.x + bounds.width - w / 2.0,
    };
    let cy = match ay {
        AlignKind::Start => bounds.y + h / 2.0,
        AlignKind::Center => bounds.y + bounds.height / 2.0,
        AlignKind::End => bounds.y + bounds.height - h / 2.0,
    };

    Point::new(
        cx + position.x * scale_factor,
        cy + position.y * scale_factor,
    )
}
