//! One displayed key sample of a motion path.

use glam::DVec3;
use smallvec::SmallVec;

use crate::config::Color;
use crate::host::{AnimCurve, Axis, TangentDir};

/// Three translation axis curves jointly drive one 3D point; the host's
/// weighted tangent y-component is normalized as if it drove a single axis.
pub const WEIGHTED_TANGENT_AXES: f64 = 3.0;

/// Local tangent component of one curve key, in the representation the
/// curve's weighted state makes authoritative.
#[must_use]
pub fn tangent_component(curve: &dyn AnimCurve, id: usize, dir: TangentDir) -> f64 {
    if curve.is_weighted() {
        let (_, y) = curve.tangent_xy(id, dir);
        y / WEIGHTED_TANGENT_AXES
    } else {
        let (angle, weight) = curve.tangent_polar(id, dir);
        angle.tan() * weight
    }
}

/// A time sample with at least one translation or rotation key on any axis.
///
/// Rebuilt wholesale on every refresh; the per-axis key ids are positional
/// indices into the host curves and go stale the moment a curve is mutated,
/// which the rebuild-always policy makes harmless.
#[derive(Clone, Debug)]
pub struct Keyframe {
    /// Draw-order index within one rebuild of the cache.
    pub id: usize,
    pub time: f64,
    /// Raw per-axis curve values (zero on axes without a key).
    pub local_position: DVec3,
    pub world_position: DVec3,

    pub key_ids: [Option<usize>; 3],
    pub rot_key_ids: [Option<usize>; 3],

    /// Local tangent values accumulated per axis.
    pub in_tangent: DVec3,
    pub out_tangent: DVec3,
    /// Straight world transforms of the local tangents.
    pub in_tangent_world: DVec3,
    pub out_tangent_world: DVec3,
    /// Handle positions actually drawn; re-derived from sampled curve shape
    /// for non-weighted curves.
    pub in_tangent_world_from_curve: DVec3,
    pub out_tangent_world_from_curve: DVec3,

    pub tangents_locked: bool,
    pub show_in_tangent: bool,
    pub show_out_tangent: bool,

    /// Draw-time projection of the owning path's selected-times set.
    pub selected_from_tool: bool,
}

impl Default for Keyframe {
    fn default() -> Self {
        Self {
            id: 0,
            time: 0.0,
            local_position: DVec3::ZERO,
            world_position: DVec3::ZERO,
            key_ids: [None; 3],
            rot_key_ids: [None; 3],
            in_tangent: DVec3::ZERO,
            out_tangent: DVec3::ZERO,
            in_tangent_world: DVec3::ZERO,
            out_tangent_world: DVec3::ZERO,
            in_tangent_world_from_curve: DVec3::ZERO,
            out_tangent_world_from_curve: DVec3::ZERO,
            tangents_locked: true,
            show_in_tangent: true,
            show_out_tangent: true,
            selected_from_tool: false,
        }
    }
}

impl Keyframe {
    pub fn set_key_id(&mut self, axis: Axis, id: usize) {
        self.key_ids[axis.index()] = Some(id);
    }

    pub fn set_rot_key_id(&mut self, axis: Axis, id: usize) {
        self.rot_key_ids[axis.index()] = Some(id);
    }

    #[must_use]
    pub fn key_id(&self, axis: Axis) -> Option<usize> {
        self.key_ids[axis.index()]
    }

    /// Reads one tangent component off the curve and stores it on `axis`.
    pub fn set_tangent_from_curve(
        &mut self,
        curve: &dyn AnimCurve,
        id: usize,
        axis: Axis,
        dir: TangentDir,
    ) {
        let value = tangent_component(curve, id, dir);
        let target = match dir {
            TangentDir::In => &mut self.in_tangent,
            TangentDir::Out => &mut self.out_tangent,
        };
        target[axis.index()] = value;
    }

    #[must_use]
    pub fn has_translation_xyz(&self) -> bool {
        self.key_ids.iter().all(Option::is_some)
    }

    #[must_use]
    pub fn has_rotation_xyz(&self) -> bool {
        self.rot_key_ids.iter().all(Option::is_some)
    }

    /// Axes carrying a translation key at this time.
    #[must_use]
    pub fn key_translate_axes(&self) -> SmallVec<[Axis; 3]> {
        Axis::ALL
            .into_iter()
            .filter(|a| self.key_ids[a.index()].is_some())
            .collect()
    }

    /// Axes carrying a rotation key at this time.
    #[must_use]
    pub fn key_rotate_axes(&self) -> SmallVec<[Axis; 3]> {
        Axis::ALL
            .into_iter()
            .filter(|a| self.rot_key_ids[a.index()].is_some())
            .collect()
    }

    #[must_use]
    pub fn axis_color(axis: Axis) -> Color {
        match axis {
            Axis::X => Color::new(1.0, 0.0, 0.0, 1.0),
            Axis::Y => Color::new(0.0, 1.0, 0.0, 1.0),
            Axis::Z => Color::new(0.0, 0.0, 1.0, 1.0),
        }
    }
}
