use kurbo::{Affine, Point, Vec2};

use crate::layout::Bounds;

/// Dimensions of the interactive preview canvas a [`Transform`] was captured
/// against.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PreviewCanvas {
    pub width: f64,
    pub height: f64,
}

/// A watermark's geometric box in a specific reference rectangle's
/// coordinate space.
///
/// `x`/`y` are the top-left corner, `rotation` is in degrees and applies
/// about the box's own center. When `preview_canvas` is present the box is
/// expressed in that canvas's space and must be passed through
/// [`Transform::scaled_to`] before painting onto a differently sized target;
/// without it the box is assumed already expressed in target space.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub preview_canvas: Option<PreviewCanvas>,
}

impl Transform {
    /// Rescale this box from its preview canvas into `target` space.
    ///
    /// Independent X/Y linear ratios; rotation is resolution independent and
    /// is never rescaled. Identity when no preview dims are recorded or the
    /// target already matches them.
    pub fn scaled_to(&self, target: Bounds) -> Transform {
        let Some(pc) = self.preview_canvas else {
            return *self;
        };
        if pc.width <= 0.0 || pc.height <= 0.0 {
            return *self;
        }
        if pc.width == target.width && pc.height == target.height {
            return *self;
        }

        let sx = target.width / pc.width;
        let sy = target.height / pc.height;
        Transform {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
            rotation: self.rotation,
            preview_canvas: None,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn rotation_rad(&self) -> f64 {
        self.rotation.to_radians()
    }

    /// Affine mapping the local box space `(0,0)..(width,height)` onto the
    /// target, rotated about the box center.
    ///
    /// Canonical order: T(center) * R(rotation) * T(-width/2, -height/2).
    pub fn to_affine(&self) -> Affine {
        Affine::translate(self.center().to_vec2())
            * Affine::rotate(self.rotation_rad())
            * Affine::translate(Vec2::new(-self.width / 2.0, -self.height / 2.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_is_linear_and_preserves_rotation() {
        let t = Transform {
            x: 100.0,
            y: 100.0,
            width: 200.0,
            height: 60.0,
            rotation: 15.0,
            preview_canvas: Some(PreviewCanvas {
                width: 800.0,
                height: 600.0,
            }),
        };
        let scaled = t.scaled_to(Bounds::from_size(1600.0, 1200.0));

        assert_eq!(scaled.x, 200.0);
        assert_eq!(scaled.y, 200.0);
        assert_eq!(scaled.width, 400.0);
        assert_eq!(scaled.height, 120.0);
        assert_eq!(scaled.rotation, 15.0);
    }

    #[test]
    fn identity_without_preview_dims() {
        let t = Transform {
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 40.0,
            rotation: 5.0,
            preview_canvas: None,
        };
        assert_eq!(t.scaled_to(Bounds::from_size(9999.0, 1.0)), t);
    }

    #[test]
    fn identity_when_target_matches_preview() {
        let t = Transform {
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 40.0,
            rotation: 0.0,
            preview_canvas: Some(PreviewCanvas {
                width: 400.0,
                height: 300.0,
            }),
        };
        assert_eq!(t.scaled_to(Bounds::from_size(400.0, 300.0)), t);
    }

    #[test]
    fn axes_scale_independently() {
        let t = Transform {
            x: 40.0,
            y: 30.0,
            width: 80.0,
            height: 30.0,
            rotation: 0.0,
            preview_canvas: Some(PreviewCanvas {
                width: 400.0,
                height: 300.0,
            }),
        };
        let scaled = t.scaled_to(Bounds::from_size(800.0, 1200.0));
        assert_eq!(scaled.x, 80.0);
        assert_eq!(scaled.y, 120.0);
        assert_eq!(scaled.width, 160.0);
        assert_eq!(scaled.height, 120.0);
    }

    #[test]
    fn to_affine_without_rotation_is_top_left_translation() {
        let t = Transform {
            x: 12.0,
            y: 34.0,
            width: 50.0,
            height: 20.0,
            rotation: 0.0,
            preview_canvas: None,
        };
        assert_eq!(t.to_affine(), Affine::translate(Vec2::new(12.0, 34.0)));
    }

    #[test]
    fn to_affine_rotates_about_box_center() {
        let t = Transform {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 40.0,
            rotation: 180.0,
            preview_canvas: None,
        };
        // Rotating the local center by 180 degrees keeps it in place.
        let mapped = t.to_affine() * Point::new(50.0, 20.0);
        assert!((mapped.x - 50.0).abs() < 1e-9);
        assert!((mapped.y - 20.0).abs() < 1e-9);
        // A corner swaps to the opposite corner.
        let corner = t.to_affine() * Point::new(0.0, 0.0);
        assert!((corner.x - 100.0).abs() < 1e-9);
        assert!((corner.y - 40.0).abs() < 1e-9);
    }
}
