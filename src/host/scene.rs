//! Scene-object and camera access.

use glam::{DMat4, DVec3};

use crate::host::curves::{AnimCurve, Axis};
use crate::host::undo::UndoRecorder;

/// One transform node whose trajectory the tool tracks.
///
/// All time-parameterized queries evaluate in the host's time context and
/// are side-effect free; extrapolation outside the keyed range is the
/// host's business.
pub trait SceneObject {
    /// Display / logging name.
    fn name(&self) -> &str;

    fn translate_curve(&self, axis: Axis) -> Option<&dyn AnimCurve>;

    fn translate_curve_mut(&mut self, axis: Axis) -> Option<&mut dyn AnimCurve>;

    fn rotate_curve(&self, axis: Axis) -> Option<&dyn AnimCurve>;

    /// Creates any missing translation curves so edits can write to all
    /// three axes. Enlists the creations as structural edits.
    fn ensure_translate_curves(&mut self, rec: &mut dyn UndoRecorder);

    /// Live local translation at `time`. For the current time this reflects
    /// an in-progress interactive drag even before a key is set.
    fn translation(&self, time: f64) -> DVec3;

    /// Parent matrix at `time`. For constrained objects this is the full
    /// world matrix, translation included.
    fn parent_matrix(&self, time: f64) -> DMat4;

    fn rotate_pivot(&self, time: f64) -> DVec3;

    fn rotate_pivot_translate(&self, time: f64) -> DVec3;

    /// True when translation is driven externally (constraint); the path is
    /// then sampled from the world matrix and never edited.
    fn is_constrained(&self) -> bool;

    /// True when the channels sit on animation layers. Layered channels are
    /// displayed but refuse edits.
    fn has_animation_layers(&self) -> bool {
        false
    }
}

/// World matrix of the active camera, evaluable at any time.
pub trait CameraSource {
    fn world_matrix(&self, time: f64) -> DMat4;
}
