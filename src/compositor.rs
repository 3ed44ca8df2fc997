//! Stacks every watermark of a composition onto one surface.

use crate::{
    model::{Watermark, WatermarkId},
    render::{Surface, WatermarkRenderer},
};

/// Outcome of one composite pass.
///
/// A watermark that fails to draw is reported here instead of aborting the
/// pass, so one corrupt entry never loses the rest of the composition.
#[derive(Clone, Debug, Default)]
pub struct CompositeReport {
    pub rendered: usize,
    pub failures: Vec<(WatermarkId, String)>,
}

impl CompositeReport {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Paint order for a set of watermarks: ascending `z_index`, with ties kept
/// in insertion order.
pub fn stacking_order(watermarks: &[Watermark]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..watermarks.len()).collect();
    order.sort_by_key(|&i| watermarks[i].z_index);
    order
}

/// Owns the renderer state reused across composite passes.
#[derive(Default)]
pub struct Compositor {
    renderer: WatermarkRenderer,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw all watermarks onto `surface` in stacking order.
    #[tracing::instrument(skip_all, fields(count = watermarks.len()))]
    pub fn composite(
        &mut self,
        surface: &mut Surface,
        watermarks: &[Watermark],
        scale_factor: f64,
    ) -> CompositeReport {
        let mut report = CompositeReport::default();

        for index in stacking_order(watermarks) {
            let watermark = &watermarks[index];
            match self.renderer.render(surface, watermark, scale_factor) {
                Ok(()) => report.rendered += 1,
                Err(e) => {
                    tracing::warn!(id = watermark.id.0, error = %e, "watermark failed to render");
                    report.failures.push((watermark.id, e.to_string()));
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        assets::PreparedImage,
        model::{
            ImageSettings, Position, TextSettings, WatermarkKind, WatermarkSettings,
        },
        scaling::ScalingState,
        transform::Transform,
    };

    fn solid_image(width: u32, height: u32, rgba: [u8; 4]) -> PreparedImage {
        let px_count = width as usize * height as usize;
        let mut data = Vec::with_capacity(px_count * 4);
        for _ in 0..px_count {
            data.extend_from_slice(&rgba);
        }
        PreparedImage {
            width,
            height,
            rgba8_premul: Arc::new(data),
        }
    }

    fn image_watermark(id: u64, z_index: i32, rgba: [u8; 4]) -> Watermark {
        Watermark {
            id: WatermarkId(id),
            settings: WatermarkSettings {
                kind: WatermarkKind::Image,
                text: None,
                image: Some(ImageSettings {
                    image_data: Some(solid_image(16, 16, rgba)),
                    source: None,
                    scale: 100.0,
                    opacity: 100.0,
                    rotation: 0.0,
                }),
                position: Position::default(),
                output: None,
            },
            transform: Some(Transform {
                x: 8.0,
                y: 8.0,
                width: 16.0,
                height: 16.0,
                rotation: 0.0,
                preview_canvas: None,
            }),
            z_index,
            scaling: ScalingState::default(),
        }
    }

    #[test]
    fn stacking_sorts_by_z_and_keeps_insertion_order_for_ties() {
        let marks = vec![
            image_watermark(1, 5, [255, 0, 0, 255]),
            image_watermark(2, -1, [0, 255, 0, 255]),
            image_watermark(3, 5, [0, 0, 255, 255]),
            image_watermark(4, 0, [255, 255, 0, 255]),
        ];
        assert_eq!(stacking_order(&marks), vec![1, 3, 0, 2]);
    }

    #[test]
    fn higher_z_paints_over_lower_z() {
        // Both watermarks cover the same box; the blue one has higher z and
        // must win regardless of slice order.
        let marks = vec![
            image_watermark(2, 10, [0, 0, 255, 255]),
            image_watermark(1, 1, [255, 0, 0, 255]),
        ];

        let mut surface = Surface::new(32, 32).unwrap();
        let report = Compositor::new().composite(&mut surface, &marks, 1.0);
        assert!(report.all_succeeded());
        assert_eq!(report.rendered, 2);

        // Center pixel of the shared box.
        let idx = (16 * 32 + 16) * 4;
        let px = &surface.data()[idx..idx + 4];
        assert_eq!(px, &[0, 0, 255, 255]);
    }

    #[test]
    fn one_failure_does_not_lose_the_rest() {
        let mut bad = Watermark {
            id: WatermarkId(9),
            settings: WatermarkSettings {
                kind: WatermarkKind::Text,
                text: Some(TextSettings {
                    content: "mark".to_string(),
                    font: "Arial".to_string(),
                    size: 24.0,
                    color: "#zzz".to_string(),
                    opacity: 100.0,
                    rotation: 0.0,
                }),
                image: None,
                position: Position::default(),
                output: None,
            },
            transform: None,
            z_index: 0,
            scaling: ScalingState::default(),
        };
        bad.z_index = 0;
        let good = image_watermark(1, 1, [255, 0, 0, 255]);

        let mut surface = Surface::new(32, 32).unwrap();
        let report = Compositor::new().composite(&mut surface, &[bad, good], 1.0);

        assert_eq!(report.rendered, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, WatermarkId(9));

        // The good watermark still landed.
        let idx = (16 * 32 + 16) * 4;
        assert_eq!(&surface.data()[idx..idx + 4], &[255, 0, 0, 255]);
    }
}
