//! Screen-space hit testing for keys, tangent handles and frames.

use glam::{DVec2, DVec3};

use crate::config::Settings;
use crate::edit::Modifiers;
use crate::host::{TangentDir, Viewport};
use crate::path::{CameraContext, MotionPath};

/// What the cursor landed on within one path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathHit {
    Keyframe { time: f64 },
    Tangent { time: f64, dir: TangentDir },
    Frame { time: f64 },
}

/// How a marquee combines with the existing selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionMode {
    #[default]
    Replace,
    Add,
    Remove,
    Xor,
}

impl SelectionMode {
    /// Keyboard modifiers held during the marquee pick the combination.
    #[must_use]
    pub fn from_modifiers(modifiers: Modifiers) -> Self {
        let shift = modifiers.contains(Modifiers::SHIFT);
        let ctrl = modifiers.contains(Modifiers::CTRL);
        match (shift, ctrl) {
            (false, false) => SelectionMode::Replace,
            (true, false) => SelectionMode::Xor,
            (false, true) => SelectionMode::Remove,
            (true, true) => SelectionMode::Add,
        }
    }
}

/// Applies a set of marqueed key times to a path's key selection.
pub fn apply_key_selection(path: &mut MotionPath, times: &[f64], mode: SelectionMode) {
    match mode {
        SelectionMode::Replace => {
            path.deselect_all_keys();
            for &t in times {
                path.select_key_at_time(t);
            }
        }
        SelectionMode::Add => {
            for &t in times {
                path.select_key_at_time(t);
            }
        }
        SelectionMode::Remove => {
            for &t in times {
                path.deselect_key_at_time(t);
            }
        }
        SelectionMode::Xor => {
            for &t in times {
                if path.is_key_at_time_selected(t) {
                    path.deselect_key_at_time(t);
                } else {
                    path.select_key_at_time(t);
                }
            }
        }
    }
}

/// Screen-aligned marquee rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Marquee {
    pub min: DVec2,
    pub max: DVec2,
}

impl Marquee {
    #[must_use]
    pub fn from_corners(a: DVec2, b: DVec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    #[must_use]
    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Hit tester over the projected display of the paths.
///
/// Keys win over tangent handles, tangent handles over frames; key picks keep
/// the last match in draw order while tangent and frame picks take the first.
pub struct HitTester<'a> {
    viewport: &'a dyn Viewport,
    settings: &'a Settings,
}

impl<'a> HitTester<'a> {
    #[must_use]
    pub fn new(viewport: &'a dyn Viewport, settings: &'a Settings) -> Self {
        Self { viewport, settings }
    }

    fn within(&self, cursor: DVec2, world: DVec3, radius: f64) -> bool {
        let screen = self.viewport.world_to_screen(world);
        cursor.distance_squared(screen) <= radius * radius
    }

    #[must_use]
    pub fn key_hit(&self, cursor: DVec2, path: &MotionPath) -> Option<f64> {
        let radius = self.settings.frame_size * 1.5 / 2.0;
        let mut hit = None;
        for key in path.keyframes() {
            if self.within(cursor, key.world_position, radius) {
                hit = Some(key.time);
            }
        }
        hit
    }

    #[must_use]
    pub fn tangent_hit(&self, cursor: DVec2, path: &MotionPath) -> Option<(f64, TangentDir)> {
        let radius = self.settings.frame_size / 2.0;
        for key in path.keyframes() {
            if key.show_in_tangent && self.within(cursor, key.in_tangent_world_from_curve, radius) {
                return Some((key.time, TangentDir::In));
            }
            if key.show_out_tangent && self.within(cursor, key.out_tangent_world_from_curve, radius)
            {
                return Some((key.time, TangentDir::Out));
            }
        }
        None
    }

    #[must_use]
    pub fn frame_hit(&self, cursor: DVec2, frames: &[(f64, DVec3)]) -> Option<f64> {
        let radius = self.settings.frame_size / 2.0;
        frames
            .iter()
            .find(|(_, world)| self.within(cursor, *world, radius))
            .map(|(time, _)| *time)
    }

    /// Full-precedence hit against one path.
    pub fn path_hit(
        &self,
        cursor: DVec2,
        path: &mut MotionPath,
        camera: Option<&mut CameraContext<'_>>,
    ) -> Option<PathHit> {
        if let Some(time) = self.key_hit(cursor, path) {
            return Some(PathHit::Keyframe { time });
        }
        if self.settings.show_tangents {
            if let Some((time, dir)) = self.tangent_hit(cursor, path) {
                return Some(PathHit::Tangent { time, dir });
            }
        }
        let frames = path.frame_positions(self.settings, camera);
        self.frame_hit(cursor, &frames).map(|time| PathHit::Frame { time })
    }

    /// First path under the cursor, with what was hit on it.
    pub fn first_path_hit(
        &self,
        cursor: DVec2,
        paths: &mut [MotionPath],
        mut camera: Option<&mut CameraContext<'_>>,
    ) -> Option<(usize, PathHit)> {
        for (index, path) in paths.iter_mut().enumerate() {
            if let Some(hit) = self.path_hit(cursor, path, camera.as_deref_mut()) {
                return Some((index, hit));
            }
        }
        None
    }

    /// Cached key times of `path` whose projections fall inside the marquee.
    #[must_use]
    pub fn keys_in_marquee(&self, marquee: Marquee, path: &MotionPath) -> Vec<f64> {
        path.keyframes()
            .filter(|k| marquee.contains(self.viewport.world_to_screen(k.world_position)))
            .map(|k| k.time)
            .collect()
    }
}
