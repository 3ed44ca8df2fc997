//! Editing session state: the ordered collection of watermarks a user is
//! manipulating before export.

use crate::{
    model::{Watermark, WatermarkId, WatermarkKind, WatermarkSettings},
    scaling::ScalingState,
    transform::Transform,
};

/// Mutable watermark collection with stable identities.
///
/// Ids are monotonically increasing and never reused, so a removed
/// watermark's id stays dangling rather than silently pointing at a
/// different entry. New watermarks are assigned the topmost z index.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct EditSession {
    watermarks: Vec<Watermark>,
    next_id: u64,
    #[serde(default)]
    selected: Option<WatermarkId>,
}

impl EditSession {
    pub fn new() -> Self {
        Self {
            watermarks: Vec::new(),
            next_id: 1,
            selected: None,
        }
    }

    pub fn add(&mut self, settings: WatermarkSettings) -> WatermarkId {
        self.add_with_transform(settings, None)
    }

    pub fn add_with_transform(
        &mut self,
        settings: WatermarkSettings,
        transform: Option<Transform>,
    ) -> WatermarkId {
        let id = WatermarkId(self.next_id.max(1));
        self.next_id = id.0 + 1;

        let scaling = initial_scaling(&settings, transform.as_ref());
        let z_index = self
            .watermarks
            .iter()
            .map(|w| w.z_index)
            .max()
            .map_or(0, |z| z + 1);

        self.watermarks.push(Watermark {
            id,
            settings,
            transform,
            z_index,
            scaling,
        });
        tracing::debug!(id = id.0, z_index, "watermark added");
        id
    }

    /// Remove a watermark. Returns the removed entry, or `None` for an
    /// unknown id.
    pub fn remove(&mut self, id: WatermarkId) -> Option<Watermark> {
        let index = self.watermarks.iter().position(|w| w.id == id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Some(self.watermarks.remove(index))
    }

    pub fn get(&self, id: WatermarkId) -> Option<&Watermark> {
        self.watermarks.iter().find(|w| w.id == id)
    }

    pub fn get_mut(&mut self, id: WatermarkId) -> Option<&mut Watermark> {
        self.watermarks.iter_mut().find(|w| w.id == id)
    }

    /// Select a watermark for interactive editing. Unknown ids clear the
    /// selection.
    pub fn select(&mut self, id: Option<WatermarkId>) {
        self.selected = id.filter(|id| self.get(*id).is_some());
    }

    pub fn selected(&self) -> Option<&Watermark> {
        self.selected.and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.watermarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watermarks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Watermark> {
        self.watermarks.iter()
    }

    pub fn watermarks(&self) -> &[Watermark] {
        &self.watermarks
    }

    /// Snapshot of the watermarks for an export pass, detached from the
    /// session so export never observes concurrent edits.
    pub fn clone_for_export(&self) -> Vec<Watermark> {
        self.watermarks.clone()
    }
}

/// Seed the scaling memory for a freshly added watermark.
fn initial_scaling(settings: &WatermarkSettings, transform: Option<&Transform>) -> ScalingState {
    let (width, height) = transform.map_or((0.0, 0.0), |t| (t.width, t.height));

    match settings.kind {
        WatermarkKind::Text | WatermarkKind::Combined => {
            let font_size = settings.text.as_ref().map_or(32.0, |t| t.size);
            ScalingState::for_text(font_size, width, height)
        }
        WatermarkKind::Image => ScalingState::for_image(width, height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Position, TextSettings};

    fn text_settings(size: f64) -> WatermarkSettings {
        WatermarkSettings {
            kind: WatermarkKind::Text,
            text: Some(TextSettings {
                content: "mark".to_string(),
                font: "Arial".to_string(),
                size,
                color: "#ffffff".to_string(),
                opacity: 80.0,
                rotation: 0.0,
            }),
            image: None,
            position: Position::default(),
            output: None,
        }
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut session = EditSession::new();
        let a = session.add(text_settings(24.0));
        let b = session.add(text_settings(24.0));
        assert!(b > a);

        session.remove(a);
        let c = session.add(text_settings(24.0));
        assert!(c > b);
        assert_ne!(c, a);
    }

    #[test]
    fn new_watermarks_land_on_top() {
        let mut session = EditSession::new();
        let a = session.add(text_settings(24.0));
        let b = session.add(text_settings(24.0));
        assert!(session.get(b).unwrap().z_index > session.get(a).unwrap().z_index);

        // Still on top after a removal in the middle.
        session.remove(b);
        let c = session.add(text_settings(24.0));
        assert!(session.get(c).unwrap().z_index > session.get(a).unwrap().z_index);
    }

    #[test]
    fn remove_clears_matching_selection() {
        let mut session = EditSession::new();
        let a = session.add(text_settings(24.0));
        session.select(Some(a));
        assert_eq!(session.selected().map(|w| w.id), Some(a));

        session.remove(a);
        assert!(session.selected().is_none());
    }

    #[test]
    fn select_unknown_id_clears_selection() {
        let mut session = EditSession::new();
        let a = session.add(text_settings(24.0));
        session.select(Some(a));
        session.select(Some(WatermarkId(999)));
        assert!(session.selected().is_none());
    }

    #[test]
    fn transform_seeds_scaling_bases() {
        let mut session = EditSession::new();
        let id = session.add_with_transform(
            text_settings(20.0),
            Some(Transform {
                x: 0.0,
                y: 0.0,
                width: 200.0,
                height: 100.0,
                rotation: 0.0,
                preview_canvas: None,
            }),
        );

        let scaling = &session.get(id).unwrap().scaling;
        assert_eq!(scaling.base_font_size, 20.0);
        assert_eq!(scaling.base_width, 200.0);
        assert_eq!(scaling.base_height, 100.0);
    }

    #[test]
    fn export_snapshot_is_detached() {
        let mut session = EditSession::new();
        let id = session.add(text_settings(24.0));
        let snapshot = session.clone_for_export();

        session.get_mut(id).unwrap().z_index = 99;
        assert_eq!(snapshot[0].z_index, 0);
    }
}
