//! Per-object animation path: keyframe cache, world-space reconstruction,
//! display sampling and direct curve edits.

pub mod keyframe;
pub mod scratch;

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound::{Excluded, Unbounded};

use glam::{DMat4, DQuat, DVec3};

use crate::buffer::BufferPath;
use crate::cache::{CameraCache, MatrixCache};
use crate::config::{Color, DrawMode, Settings};
use crate::host::{
    AnimCurve, Axis, CameraSource, DrawSurface, SceneObject, TangentDir, TangentType, UndoRecorder,
};
use crate::time::TimeKey;

pub use keyframe::{Keyframe, WEIGHTED_TANGENT_AXES, tangent_component};
pub use scratch::ScratchKey;

/// Sampling offset used to re-derive drawable tangent directions from the
/// curve shape when tangents are not weighted.
pub const TANGENT_TIME_DELTA: f64 = 0.01;

// ===== Camera-space display context =====

/// Bundles the camera cache with its source for one display pass.
///
/// `current_camera` is the camera world matrix at the current time; chained
/// after the cached inverse of the sampled time it re-expresses a world
/// position in the current camera framing.
pub struct CameraContext<'a> {
    pub cache: &'a mut CameraCache,
    pub source: &'a dyn CameraSource,
    pub current_camera: DMat4,
}

impl<'a> CameraContext<'a> {
    pub fn new(cache: &'a mut CameraCache, source: &'a dyn CameraSource, now: f64) -> Self {
        let current_camera = cache.ensure_at(source, now, false).inverse();
        Self {
            cache,
            source,
            current_camera,
        }
    }

    /// Re-expresses a world position sampled at `time` in the current camera
    /// framing.
    ///
    /// With `transient` set the camera is evaluated directly and the matrix
    /// is not retained; fractional-frame samples stay out of the long-lived
    /// whole-frame cache.
    pub fn reproject(&mut self, world: DVec3, time: f64, transient: bool) -> DVec3 {
        let inverse_at_time = if transient {
            self.source.world_matrix(time).inverse()
        } else {
            self.cache.ensure_at(self.source, time, false)
        };
        self.current_camera
            .transform_point3(inverse_at_time.transform_point3(world))
    }
}

// ===== Motion path =====

/// The animation path of a single transform.
pub struct MotionPath {
    object: Box<dyn SceneObject>,
    object_id: u64,
    constrained: bool,

    keyframes: BTreeMap<TimeKey, Keyframe>,
    selected_key_times: BTreeSet<TimeKey>,

    p_matrix_cache: MatrixCache,
    start_time: f64,
    end_time: f64,
    start_time_cached: Option<f64>,
    end_time_cached: Option<f64>,
    cache_done: bool,

    display_start_time: f64,
    display_end_time: f64,

    is_weighted: bool,
    is_drawing: bool,
    end_drawing_time: f64,
    selected_from_tool: bool,
    color_multiplier: f64,
}

impl MotionPath {
    #[must_use]
    pub fn new(object_id: u64, object: Box<dyn SceneObject>) -> Self {
        let constrained = object.is_constrained();
        Self {
            object,
            object_id,
            constrained,
            keyframes: BTreeMap::new(),
            selected_key_times: BTreeSet::new(),
            p_matrix_cache: MatrixCache::new(),
            start_time: 0.0,
            end_time: 0.0,
            start_time_cached: None,
            end_time_cached: None,
            cache_done: false,
            display_start_time: 0.0,
            display_end_time: 0.0,
            is_weighted: false,
            is_drawing: false,
            end_drawing_time: 0.0,
            selected_from_tool: false,
            color_multiplier: 1.0,
        }
    }

    // ===== Accessors =====

    #[must_use]
    pub fn object(&self) -> &dyn SceneObject {
        self.object.as_ref()
    }

    pub fn object_mut(&mut self) -> &mut dyn SceneObject {
        self.object.as_mut()
    }

    #[must_use]
    pub fn object_id(&self) -> u64 {
        self.object_id
    }

    #[must_use]
    pub fn is_constrained(&self) -> bool {
        self.constrained
    }

    #[must_use]
    pub fn is_weighted(&self) -> bool {
        self.is_weighted
    }

    #[must_use]
    pub fn is_drawing(&self) -> bool {
        self.is_drawing
    }

    pub fn set_is_drawing(&mut self, drawing: bool) {
        self.is_drawing = drawing;
    }

    #[must_use]
    pub fn end_drawing_time(&self) -> f64 {
        self.end_drawing_time
    }

    pub fn set_end_drawing_time(&mut self, time: f64) {
        self.end_drawing_time = time;
    }

    #[must_use]
    pub fn selected_from_tool(&self) -> bool {
        self.selected_from_tool
    }

    pub fn set_selected_from_tool(&mut self, selected: bool) {
        self.selected_from_tool = selected;
    }

    pub fn set_color_multiplier(&mut self, multiplier: f64) {
        self.color_multiplier = multiplier;
    }

    #[must_use]
    pub fn cache_done(&self) -> bool {
        self.cache_done
    }

    #[must_use]
    pub fn display_time_range(&self) -> (f64, f64) {
        (self.display_start_time, self.display_end_time)
    }

    #[must_use]
    pub fn keyframe(&self, time: f64) -> Option<&Keyframe> {
        self.keyframes.get(&TimeKey::new(time))
    }

    pub fn keyframes(&self) -> impl Iterator<Item = &Keyframe> {
        self.keyframes.values()
    }

    #[must_use]
    pub fn num_keyframes(&self) -> usize {
        self.keyframes.len()
    }

    // ===== Time ranges and matrix cache =====

    pub fn set_time_range(&mut self, start_time: f64, end_time: f64) {
        self.start_time = start_time;
        self.end_time = end_time;
        self.cache_done = false;
    }

    /// Sets the display window, clamped to what the matrix cache actually
    /// covers so drawing never outruns cached transforms.
    pub fn set_display_time_range(&mut self, start: f64, end: f64) {
        self.display_start_time = start;
        if let Some(cached) = self.start_time_cached {
            if self.display_start_time < cached {
                self.display_start_time = cached;
            }
        }

        self.display_end_time = end;
        if let Some(cached) = self.end_time_cached {
            if self.display_end_time > cached {
                self.display_end_time = cached;
            }
        }
    }

    pub fn clear_parent_matrix_cache(&mut self) {
        self.p_matrix_cache.clear();
        self.start_time_cached = None;
        self.end_time_cached = None;
        self.cache_done = false;
    }

    /// Parent-and-pivot matrix at `time`, computed and cached on first use.
    pub fn ensure_parent_matrix(&mut self, time: f64, settings: &Settings) -> DMat4 {
        let object = self.object.as_ref();
        let use_pivots = settings.use_pivots;
        self.p_matrix_cache
            .ensure_with(time, false, |t| eval_p_matrix(object, t, use_pivots))
    }

    /// Cached parent matrix, identity when the time was never cached.
    #[must_use]
    pub fn parent_matrix(&self, time: f64) -> DMat4 {
        self.p_matrix_cache.get(time).unwrap_or(DMat4::IDENTITY)
    }

    #[must_use]
    pub fn parent_matrix_cache_len(&self) -> usize {
        self.p_matrix_cache.len()
    }

    /// Widens the cached matrix window by `expansion` frames on both sides of
    /// `time`, clamped to the display reach and the global range.
    pub fn grow_parent_matrix_cache(&mut self, time: f64, expansion: f64, settings: &Settings) {
        let mut eval_before = time - expansion;
        if eval_before < time - settings.frames_back {
            eval_before = time - settings.frames_back;
        }

        let mut eval_after = time + expansion;
        if eval_after > time + settings.frames_front {
            eval_after = time + settings.frames_front;
        }

        if eval_before >= self.start_time {
            self.ensure_parent_matrix(eval_before, settings);
            self.start_time_cached = Some(eval_before);
        }

        if eval_after <= self.end_time {
            self.ensure_parent_matrix(eval_after, settings);
            self.end_time_cached = Some(eval_after);
        }

        if self.start_time_cached == Some(self.start_time)
            && self.end_time_cached == Some(self.end_time)
        {
            self.cache_done = true;
        }
    }

    // ===== Position sampling =====

    /// Live local translation at `time`; zero for constrained objects, whose
    /// position lives entirely in the world matrix.
    #[must_use]
    pub fn local_position(&self, time: f64) -> DVec3 {
        if self.constrained {
            DVec3::ZERO
        } else {
            self.object.translation(time)
        }
    }

    /// World position at `time`, through the cached parent matrix.
    pub fn world_position_at(&mut self, time: f64, settings: &Settings) -> DVec3 {
        let m = self.ensure_parent_matrix(time, settings);
        m.transform_point3(self.local_position(time))
    }

    fn display_position(
        &mut self,
        time: f64,
        settings: &Settings,
        camera: Option<&mut CameraContext<'_>>,
        transient_camera: bool,
    ) -> DVec3 {
        let world = self.world_position_at(time, settings);
        match camera {
            Some(cam) => cam.reproject(world, time, transient_camera),
            None => world,
        }
    }

    /// Display position of every whole frame in the display window, in draw
    /// order. Used for frame hit-testing.
    pub fn frame_positions(
        &mut self,
        settings: &Settings,
        mut camera: Option<&mut CameraContext<'_>>,
    ) -> Vec<(f64, DVec3)> {
        let mut positions = Vec::new();
        let mut t = self.display_start_time;
        while t <= self.display_end_time {
            let pos = self.display_position(t, settings, camera.as_deref_mut(), false);
            positions.push((t, pos));
            t += 1.0;
        }
        positions
    }

    // ===== Keyframe cache rebuild =====

    /// Rebuilds the keyframe cache from the host curves.
    ///
    /// The live channel value is synced into the curves for the duration of
    /// the rebuild so an in-progress drag shows up even before a key is set,
    /// then reverted without touching the undo stack.
    pub fn refresh(
        &mut self,
        settings: &Settings,
        camera: Option<&mut CameraContext<'_>>,
        now: f64,
    ) {
        let mut scratch: [Option<ScratchKey>; 3] = [None, None, None];
        if !self.constrained {
            let live = self.object.translation(now);
            for axis in Axis::ALL {
                if let Some(curve) = self.object.translate_curve_mut(axis) {
                    scratch[axis.index()] = ScratchKey::place(curve, now, live[axis.index()]);
                }
            }
        }

        self.is_weighted = Axis::ALL.iter().any(|&axis| {
            self.object
                .translate_curve(axis)
                .is_some_and(AnimCurve::is_weighted)
        });

        self.rebuild_keyframes(settings, camera, now);

        for axis in Axis::ALL {
            if let Some(key) = scratch[axis.index()].take() {
                if let Some(curve) = self.object.translate_curve_mut(axis) {
                    key.lift(curve);
                }
            }
        }
    }

    fn rebuild_keyframes(
        &mut self,
        settings: &Settings,
        mut camera: Option<&mut CameraContext<'_>>,
        _now: f64,
    ) {
        let mut map = std::mem::take(&mut self.keyframes);
        map.clear();

        let end_time = if self.is_drawing {
            self.end_drawing_time
        } else {
            self.display_end_time
        };

        for axis in Axis::ALL {
            if let Some(curve) = self.object.translate_curve(axis) {
                index_translate_curve(&mut map, curve, axis, self.display_start_time, end_time);
            }
        }

        if settings.show_rotation_key_frames {
            for axis in Axis::ALL {
                if let Some(curve) = self.object.rotate_curve(axis) {
                    index_rotate_curve(&mut map, curve, axis, self.display_start_time, end_time);
                }
            }
        }

        apply_tangent_visibility(
            &mut map,
            self.object.as_ref(),
            self.display_start_time,
            self.display_end_time,
        );

        let mut index = 0;
        let times: Vec<f64> = map.keys().copied().map(TimeKey::get).collect();
        for time in times {
            // Drawing hides tangents to keep the interactive loop cheap.
            let (selected, hide_tangents) = (
                self.selected_key_times.contains(&TimeKey::new(time)),
                self.is_drawing,
            );

            let p_matrix = self.ensure_parent_matrix(time, settings);
            let local_position = self.local_position(time);
            let mut world_position = p_matrix.transform_point3(local_position);
            if let Some(cam) = camera.as_deref_mut() {
                world_position = cam.reproject(world_position, time, false);
            }

            let Some(entry) = map.get(&TimeKey::new(time)) else {
                continue;
            };
            let (in_tangent, out_tangent, show_in, show_out) = (
                entry.in_tangent,
                entry.out_tangent,
                entry.show_in_tangent && !hide_tangents,
                entry.show_out_tangent && !hide_tangents,
            );

            let in_tangent_world = p_matrix.transform_point3(-in_tangent + local_position);
            let out_tangent_world = p_matrix.transform_point3(out_tangent + local_position);

            let in_from_curve = if show_in {
                Some(self.tangent_handle_from_curve(
                    time,
                    world_position,
                    in_tangent,
                    in_tangent_world,
                    TangentDir::In,
                    settings,
                    camera.as_deref_mut(),
                ))
            } else {
                None
            };
            let out_from_curve = if show_out {
                Some(self.tangent_handle_from_curve(
                    time,
                    world_position,
                    out_tangent,
                    out_tangent_world,
                    TangentDir::Out,
                    settings,
                    camera.as_deref_mut(),
                ))
            } else {
                None
            };

            let Some(key) = map.get_mut(&TimeKey::new(time)) else {
                continue;
            };
            key.id = index;
            index += 1;
            if selected {
                key.selected_from_tool = true;
            }
            key.show_in_tangent = show_in;
            key.show_out_tangent = show_out;
            key.local_position = local_position;
            key.world_position = world_position;
            key.in_tangent_world = in_tangent_world;
            key.out_tangent_world = out_tangent_world;
            if let Some(handle) = in_from_curve {
                key.in_tangent_world_from_curve = handle;
            }
            if let Some(handle) = out_from_curve {
                key.out_tangent_world_from_curve = handle;
            }
        }

        self.keyframes = map;
    }

    /// Drawable tangent handle. Weighted tangents are drawn where the math
    /// puts them; non-weighted handles only carry direction, so the direction
    /// is re-sampled from the curve shape just next to the key.
    #[allow(clippy::too_many_arguments)]
    fn tangent_handle_from_curve(
        &mut self,
        time: f64,
        world_position: DVec3,
        tangent: DVec3,
        tangent_world: DVec3,
        dir: TangentDir,
        settings: &Settings,
        camera: Option<&mut CameraContext<'_>>,
    ) -> DVec3 {
        if self.is_weighted {
            return tangent_world;
        }

        let sample_time = match dir {
            TangentDir::In => time - TANGENT_TIME_DELTA,
            TangentDir::Out => time + TANGENT_TIME_DELTA,
        };

        let sampled = self.display_position(sample_time, settings, camera, true);
        let direction = (sampled - world_position).normalize_or_zero();
        direction * tangent.length() + world_position
    }

    // ===== Drawing =====

    pub fn draw(
        &mut self,
        surface: &mut dyn DrawSurface,
        settings: &Settings,
        mut camera: Option<&mut CameraContext<'_>>,
        now: f64,
    ) {
        self.draw_frames(surface, settings, camera.as_deref_mut());
        self.draw_current_frame(surface, settings, camera.as_deref_mut(), now);

        if settings.show_key_frame_numbers || settings.show_frame_numbers {
            self.draw_frame_labels(surface, settings, camera.as_deref_mut());
        }

        if settings.show_key_frames && !self.keyframes.is_empty() {
            if settings.show_tangents {
                self.draw_tangents(surface, settings);
            }
            // Keyframes go on top of everything.
            self.draw_key_frames(surface, settings);
        }
    }

    fn draw_frames(
        &mut self,
        surface: &mut dyn DrawSurface,
        settings: &Settings,
        mut camera: Option<&mut CameraContext<'_>>,
    ) {
        let mut color = if self.is_weighted {
            settings.weighted_path_color
        } else {
            settings.path_color
        };
        if self.selected_from_tool {
            color *= 1.3;
        }
        color *= self.color_multiplier as f32;

        let mut previous =
            self.display_position(self.display_start_time, settings, camera.as_deref_mut(), false);

        let mut t = self.display_start_time + 1.0;
        while t <= self.display_end_time {
            let world = self.display_position(t, settings, camera.as_deref_mut(), false);

            if settings.show_path {
                let factor = if settings.alternating_frames {
                    if (t as i64) % 2 == 1 { 1.4 } else { 0.6 }
                } else {
                    1.0
                };
                surface.line(previous, world, settings.path_size, color * factor as f32);
            }

            surface.point(previous, settings.path_size, color);
            previous = world;

            if t == self.display_end_time {
                surface.point(world, settings.path_size, color);
            }
            t += 1.0;
        }
    }

    fn draw_current_frame(
        &mut self,
        surface: &mut dyn DrawSurface,
        settings: &Settings,
        camera: Option<&mut CameraContext<'_>>,
        now: f64,
    ) {
        let mut color = settings.current_frame_color;
        if self.selected_from_tool {
            color *= 1.3;
        }

        let world = self.display_position(now, settings, camera, false);
        surface.point(world, settings.frame_size * 2.2, color);
    }

    fn draw_frame_labels(
        &mut self,
        surface: &mut dyn DrawSurface,
        settings: &Settings,
        mut camera: Option<&mut CameraContext<'_>>,
    ) {
        let mut color = settings.frame_label_color;
        if self.selected_from_tool {
            color *= 1.3;
        }

        let mut t = self.display_start_time;
        while t <= self.display_end_time {
            let has_key = settings.show_key_frames && self.keyframes.contains_key(&TimeKey::new(t));
            let skip = if has_key {
                !settings.show_key_frame_numbers
            } else {
                !settings.show_frame_numbers
            };
            if !skip {
                let world = self.display_position(t, settings, camera.as_deref_mut(), false);
                surface.text(world, &format!("{t:.0}"), color);
            }
            t += 1.0;
        }
    }

    fn draw_tangents(&self, surface: &mut dyn DrawSurface, settings: &Settings) {
        if self.is_weighted && settings.draw_mode == DrawMode::CameraSpace {
            return;
        }

        for key in self.keyframes.values() {
            let color = if self.is_weighted {
                settings.weighted_path_tangent_color
            } else if key.tangents_locked {
                settings.tangent_color
            } else {
                settings.broken_tangent_color
            };

            if key.show_in_tangent {
                surface.line(key.world_position, key.in_tangent_world_from_curve, 1.0, color);
                surface.point(key.in_tangent_world_from_curve, settings.frame_size, color);
            }
            if key.show_out_tangent {
                surface.line(key.world_position, key.out_tangent_world_from_curve, 1.0, color);
                surface.point(key.out_tangent_world_from_curve, settings.frame_size, color);
            }
        }
    }

    fn draw_key_frames(&self, surface: &mut dyn DrawSurface, settings: &Settings) {
        let size = settings.frame_size * 1.5;

        for key in self.keyframes.values() {
            let translate_axes = key.key_translate_axes();
            if translate_axes.is_empty() {
                continue;
            }

            surface.point(key.world_position, size * 1.2, Color::new(0.0, 0.0, 0.0, 1.0));

            if key.selected_from_tool {
                surface.point(key.world_position, size, Color::new(1.0, 1.0, 1.0, 1.0));
            } else {
                let step = size / translate_axes.len() as f64;
                for (i, axis) in translate_axes.iter().enumerate() {
                    let color = Keyframe::axis_color(*axis) * self.color_multiplier as f32;
                    surface.point(
                        key.world_position,
                        step * (translate_axes.len() - i) as f64,
                        color,
                    );
                }
            }

            if settings.show_rotation_key_frames && !key.key_rotate_axes().is_empty() {
                surface.point(
                    key.world_position,
                    size * 0.5,
                    Color::new(0.9, 0.9, 0.2, 1.0),
                );
            }
        }
    }

    // ===== Edits =====

    /// Sets a key on all animated translate axes at `time`.
    ///
    /// With a world `position` the value is brought into local space through
    /// the parent matrix; otherwise the live translation is keyed as-is.
    /// `use_cache` routes through cached key ids so an existing key at `time`
    /// is overwritten instead of duplicated.
    pub fn add_key_at_time(
        &mut self,
        time: f64,
        position: Option<DVec3>,
        use_cache: bool,
        settings: &Settings,
        rec: &mut dyn UndoRecorder,
    ) {
        let local = match position {
            Some(world) => {
                let m = self.ensure_parent_matrix(time, settings);
                m.inverse().transform_point3(world)
            }
            None => self.local_position(time),
        };

        let cached_ids = if use_cache {
            self.keyframes.get(&TimeKey::new(time)).map(|k| k.key_ids)
        } else {
            None
        };

        for axis in Axis::ALL {
            let value = local[axis.index()];
            let Some(curve) = self.object.translate_curve_mut(axis) else {
                continue;
            };
            match cached_ids.and_then(|ids| ids[axis.index()]) {
                Some(id) => curve.set_value(id, value, rec),
                None => {
                    curve.add_key(time, value, TangentType::default(), TangentType::default(), rec);
                }
            }
        }
    }

    /// Moves the key at `time` to a world position; only axes that actually
    /// carry a key are written.
    pub fn set_frame_world_position(
        &mut self,
        position: DVec3,
        time: f64,
        settings: &Settings,
        rec: &mut dyn UndoRecorder,
    ) {
        let m = self.ensure_parent_matrix(time, settings);
        let local = m.inverse().transform_point3(position);
        let ids = self.cached_key_ids(time);

        for axis in Axis::ALL {
            if let Some(id) = ids[axis.index()] {
                if let Some(curve) = self.object.translate_curve_mut(axis) {
                    curve.set_value(id, local[axis.index()], rec);
                }
            }
        }
    }

    /// Offsets the key at `time` by a world-space delta, rotated into local
    /// space by the parent matrix.
    pub fn offset_world_position(
        &mut self,
        offset: DVec3,
        time: f64,
        settings: &Settings,
        rec: &mut dyn UndoRecorder,
    ) {
        let m = self.ensure_parent_matrix(time, settings);
        let local_offset = m.inverse().transform_vector3(offset);
        let ids = self.cached_key_ids(time);

        for axis in Axis::ALL {
            if let Some(id) = ids[axis.index()] {
                if let Some(curve) = self.object.translate_curve_mut(axis) {
                    let value = curve.evaluate(time) + local_offset[axis.index()];
                    curve.set_value(id, value, rec);
                }
            }
        }
    }

    fn cached_key_ids(&self, time: f64) -> [Option<usize>; 3] {
        self.keyframes
            .get(&TimeKey::new(time))
            .map_or([None; 3], |k| k.key_ids)
    }

    /// Removes the key at `time` from all translate axes.
    pub fn delete_key_at_time(&mut self, time: f64, use_cache: bool, rec: &mut dyn UndoRecorder) {
        let cached = if use_cache {
            self.keyframes.get(&TimeKey::new(time)).map(|k| k.key_ids)
        } else {
            None
        };

        for axis in Axis::ALL {
            let Some(curve) = self.object.translate_curve_mut(axis) else {
                continue;
            };
            let id = match cached {
                Some(ids) => ids[axis.index()],
                None => curve.find(time),
            };
            if let Some(id) = id {
                curve.remove(id, rec);
            }
        }
    }

    /// Removes every key strictly between `start` and `end` on all axes.
    pub fn delete_keys_between_times(&mut self, start: f64, end: f64, rec: &mut dyn UndoRecorder) {
        for axis in Axis::ALL {
            let Some(curve) = self.object.translate_curve_mut(axis) else {
                continue;
            };
            for id in (0..curve.num_keys()).rev() {
                let t = curve.time(id);
                if t > start && t < end {
                    curve.remove(id, rec);
                }
            }
        }
    }

    /// Removes every key strictly after `time` on all axes.
    pub fn delete_keys_after_time(&mut self, time: f64, rec: &mut dyn UndoRecorder) {
        for axis in Axis::ALL {
            let Some(curve) = self.object.translate_curve_mut(axis) else {
                continue;
            };
            for id in (0..curve.num_keys()).rev() {
                if curve.time(id) > time {
                    curve.remove(id, rec);
                }
            }
        }
    }

    /// Retimes the key at `from` to `to` on all axes, carrying values,
    /// tangents and lock state along.
    pub fn move_key_from_to(&mut self, from: f64, to: f64, rec: &mut dyn UndoRecorder) {
        for axis in Axis::ALL {
            if let Some(curve) = self.object.translate_curve_mut(axis) {
                copy_key_from_to_on_curve(curve, from, to, rec);
            }
        }
    }

    /// Moves a tangent handle of the key at `time` to a world position.
    ///
    /// `to_world` undoes the display-space transform of the cached world
    /// position (identity in world space, the camera chain in camera space).
    pub fn set_tangent_world_position(
        &mut self,
        position: DVec3,
        time: f64,
        dir: TangentDir,
        to_world: DMat4,
        settings: &Settings,
        rec: &mut dyn UndoRecorder,
    ) {
        let Some(key) = self.keyframes.get(&TimeKey::new(time)) else {
            return;
        };
        let world_position = key.world_position;
        let (handle_from_curve, tangent_world) = match dir {
            TangentDir::In => (key.in_tangent_world_from_curve, key.in_tangent_world),
            TangentDir::Out => (key.out_tangent_world_from_curve, key.out_tangent_world),
        };

        let p_inverse = self.ensure_parent_matrix(time, settings).inverse();

        let local = if self.is_weighted {
            p_inverse.transform_vector3(position - world_position)
        } else {
            // Only the handle direction is editable; rotate the true local
            // tangent by the same arc the handle was dragged through and
            // scale by the drag ratio.
            let dragged = position - world_position;
            let handle = handle_from_curve - world_position;

            let handle_len = handle.length();
            let len_multiplier = if handle_len > f64::EPSILON {
                dragged.length() / handle_len
            } else {
                0.0
            };

            let rotation =
                DQuat::from_rotation_arc(handle.normalize_or_zero(), dragged.normalize_or_zero());
            let tangent_vector = tangent_world - to_world.transform_point3(world_position);
            p_inverse.transform_vector3(rotation * tangent_vector) * len_multiplier
        };

        for axis in Axis::ALL {
            if let Some(curve) = self.object.translate_curve_mut(axis) {
                set_tangent_value_on_curve(curve, time, local[axis.index()], dir, rec);
            }
        }
    }

    // ===== Key queries =====

    /// Nearest cached key times strictly before and after `time`.
    #[must_use]
    pub fn boundaries_for_time(&self, time: f64) -> (Option<f64>, Option<f64>) {
        let key = TimeKey::new(time);
        let before = self
            .keyframes
            .range((Unbounded, Excluded(key)))
            .next_back()
            .map(|(k, _)| k.get());
        let after = self
            .keyframes
            .range((Excluded(key), Unbounded))
            .next()
            .map(|(k, _)| k.get());
        (before, after)
    }

    /// Cached world position of the key at `time`.
    #[must_use]
    pub fn key_world_position(&self, time: f64) -> Option<DVec3> {
        self.keyframe(time).map(|k| k.world_position)
    }

    /// Cached key time with the given draw-order id.
    #[must_use]
    pub fn time_from_key_id(&self, id: usize) -> Option<f64> {
        self.keyframes
            .values()
            .find(|k| k.id == id)
            .map(|k| k.time)
    }

    /// Sorted cached key times.
    #[must_use]
    pub fn key_times(&self) -> Vec<f64> {
        self.keyframes.keys().copied().map(TimeKey::get).collect()
    }

    /// Earliest key time across the three translate curves.
    #[must_use]
    pub fn min_key_time(&self) -> Option<f64> {
        let mut min = None;
        for axis in Axis::ALL {
            if let Some(curve) = self.object.translate_curve(axis) {
                if curve.num_keys() > 0 {
                    let t = curve.time(0);
                    min = Some(min.map_or(t, |m: f64| m.min(t)));
                }
            }
        }
        min
    }

    /// Latest key time across the three translate curves.
    #[must_use]
    pub fn max_key_time(&self) -> Option<f64> {
        let mut max = None;
        for axis in Axis::ALL {
            if let Some(curve) = self.object.translate_curve(axis) {
                if curve.num_keys() > 0 {
                    let t = curve.time(curve.num_keys() - 1);
                    max = Some(max.map_or(t, |m: f64| m.max(t)));
                }
            }
        }
        max
    }

    // ===== Key selection =====

    pub fn select_key_at_time(&mut self, time: f64) {
        self.selected_key_times.insert(TimeKey::new(time));
        if let Some(key) = self.keyframes.get_mut(&TimeKey::new(time)) {
            key.selected_from_tool = true;
        }
    }

    pub fn deselect_key_at_time(&mut self, time: f64) {
        self.selected_key_times.remove(&TimeKey::new(time));
        if let Some(key) = self.keyframes.get_mut(&TimeKey::new(time)) {
            key.selected_from_tool = false;
        }
    }

    #[must_use]
    pub fn is_key_at_time_selected(&self, time: f64) -> bool {
        self.selected_key_times.contains(&TimeKey::new(time))
    }

    pub fn select_all_keys(&mut self) {
        for (t, key) in &mut self.keyframes {
            key.selected_from_tool = true;
            self.selected_key_times.insert(*t);
        }
    }

    pub fn deselect_all_keys(&mut self) {
        self.selected_key_times.clear();
        for key in self.keyframes.values_mut() {
            key.selected_from_tool = false;
        }
    }

    pub fn invert_keys_selection(&mut self) {
        self.selected_key_times.clear();
        for (t, key) in &mut self.keyframes {
            key.selected_from_tool = !key.selected_from_tool;
            if key.selected_from_tool {
                self.selected_key_times.insert(*t);
            }
        }
    }

    /// Sorted selected key times.
    #[must_use]
    pub fn selected_key_times(&self) -> Vec<f64> {
        self.selected_key_times.iter().map(|t| t.get()).collect()
    }

    // ===== Buffer path =====

    /// Snapshots the current trajectory over the global time range.
    pub fn create_buffer_path(&mut self, settings: &Settings) -> BufferPath {
        if self.constrained {
            let mut frames = Vec::new();
            let mut t = self.start_time;
            while t <= self.end_time {
                let m = self.ensure_parent_matrix(t, settings);
                frames.push(m.w_axis.truncate());
                t += 1.0;
            }
            return BufferPath::new(frames, self.start_time, BTreeMap::new());
        }

        let min_time = self
            .min_key_time()
            .map_or(self.start_time, |t| t.min(self.start_time))
            .trunc();
        let max_time = self
            .max_key_time()
            .map_or(self.end_time, |t| t.max(self.end_time))
            .trunc();

        let mut frames = Vec::new();
        let mut t = min_time;
        while t <= max_time {
            let m = self.ensure_parent_matrix(t, settings);
            let mut local = DVec3::ZERO;
            for axis in Axis::ALL {
                local[axis.index()] = match self.object.translate_curve(axis) {
                    Some(curve) => curve.evaluate(t),
                    None => self.object.translation(t)[axis.index()],
                };
            }
            frames.push(m.transform_point3(local));
            t += 1.0;
        }

        let mut key_times = BTreeSet::new();
        for axis in Axis::ALL {
            if let Some(curve) = self.object.translate_curve(axis) {
                for id in 0..curve.num_keys() {
                    key_times.insert(TimeKey::new(curve.time(id)));
                }
            }
        }

        let mut key_frames = BTreeMap::new();
        for tk in key_times {
            let t = tk.get();
            let m = self.ensure_parent_matrix(t, settings);
            key_frames.insert(tk, m.transform_point3(self.local_position(t)));
        }

        BufferPath::new(frames, min_time, key_frames)
    }
}

// ===== Curve helpers =====

fn eval_p_matrix(object: &dyn SceneObject, time: f64, use_pivots: bool) -> DMat4 {
    let parent = object.parent_matrix(time);
    if use_pivots && !object.is_constrained() {
        let pivot = object.rotate_pivot(time) + object.rotate_pivot_translate(time);
        parent * DMat4::from_translation(pivot)
    } else {
        parent
    }
}

fn index_translate_curve(
    map: &mut BTreeMap<TimeKey, Keyframe>,
    curve: &dyn AnimCurve,
    axis: Axis,
    start: f64,
    end: f64,
) {
    if !curve.is_animatable() {
        return;
    }

    for id in 0..curve.num_keys() {
        let time = curve.time(id);
        if time < start {
            continue;
        }
        if time > end {
            break;
        }

        let key = map.entry(TimeKey::new(time)).or_insert_with(|| Keyframe {
            time,
            ..Keyframe::default()
        });
        key.set_tangent_from_curve(curve, id, axis, TangentDir::In);
        key.set_tangent_from_curve(curve, id, axis, TangentDir::Out);
        key.set_key_id(axis, id);
        if key.tangents_locked {
            key.tangents_locked = curve.tangents_locked(id);
        }
    }
}

/// Rotation keys never create entries of their own; a time with only
/// rotation keys is not part of the editable path.
fn index_rotate_curve(
    map: &mut BTreeMap<TimeKey, Keyframe>,
    curve: &dyn AnimCurve,
    axis: Axis,
    start: f64,
    end: f64,
) {
    if !curve.is_animatable() {
        return;
    }

    for id in 0..curve.num_keys() {
        let time = curve.time(id);
        if time < start {
            continue;
        }
        if time > end {
            break;
        }
        if let Some(key) = map.get_mut(&TimeKey::new(time)) {
            key.set_rot_key_id(axis, id);
        }
    }
}

fn show_tangent(
    time: f64,
    first_id: Option<usize>,
    first_time: Option<f64>,
    second_id: Option<usize>,
    second_time: Option<f64>,
) -> bool {
    !((first_id.is_none() && second_id.is_none())
        || (first_time == Some(time) && second_time == Some(time)))
}

/// Hides the dangling tangent at each curve's first and last displayed key,
/// unless another axis keeps the path going through that time.
fn apply_tangent_visibility(
    map: &mut BTreeMap<TimeKey, Keyframe>,
    object: &dyn SceneObject,
    start: f64,
    end: f64,
) {
    let curves = Axis::ALL.map(|axis| object.translate_curve(axis));
    if curves
        .iter()
        .all(|c| c.is_none_or(|c| c.num_keys() == 0))
    {
        return;
    }

    let bounds: [Option<(f64, f64)>; 3] = curves.map(|c| {
        c.and_then(|c| (c.num_keys() > 0).then(|| (c.time(0), c.time(c.num_keys() - 1))))
    });

    const OTHERS: [(usize, usize); 3] = [(1, 2), (0, 2), (0, 1)];

    for (axis, &(a, b)) in OTHERS.iter().enumerate() {
        if let Some((min_time, _)) = bounds[axis] {
            if min_time >= start && min_time <= end {
                if let Some(key) = map.get_mut(&TimeKey::new(min_time)) {
                    key.show_in_tangent = show_tangent(
                        min_time,
                        key.key_ids[a],
                        bounds[a].map(|x| x.0),
                        key.key_ids[b],
                        bounds[b].map(|x| x.0),
                    );
                }
            }
        }

        if let Some((_, max_time)) = bounds[axis] {
            if max_time >= start && max_time <= end {
                if let Some(key) = map.get_mut(&TimeKey::new(max_time)) {
                    key.show_out_tangent = show_tangent(
                        max_time,
                        key.key_ids[a],
                        bounds[a].map(|x| x.1),
                        key.key_ids[b],
                        bounds[b].map(|x| x.1),
                    );
                }
            }
        }
    }
}

fn copy_key_from_to_on_curve(curve: &mut dyn AnimCurve, from: f64, to: f64, rec: &mut dyn UndoRecorder) {
    let Some(id) = curve.find(from) else {
        return;
    };

    let value = curve.value(id);
    let (in_angle, in_weight) = curve.tangent_polar(id, TangentDir::In);
    let (out_angle, out_weight) = curve.tangent_polar(id, TangentDir::Out);
    let tin = curve.in_tangent_type(id);
    let tout = curve.out_tangent_type(id);
    let tangents_locked = curve.tangents_locked(id);
    let weights_locked = curve.weights_locked(id);

    curve.remove(id, rec);
    let new_id = curve.add_key(to, value, tin, tout, rec);

    curve.set_tangents_locked(new_id, tangents_locked, rec);
    curve.set_weights_locked(new_id, weights_locked, rec);
    curve.set_tangent_polar(new_id, TangentDir::In, in_angle, in_weight, rec);
    if !tangents_locked {
        curve.set_tangent_polar(new_id, TangentDir::Out, out_angle, out_weight, rec);
    }
}

/// Writes one local tangent component back through the representation the
/// curve's weighted state makes authoritative. In-tangent values point
/// backwards along the path and are negated on the way in, mirroring the
/// read in [`tangent_component`].
pub(crate) fn set_tangent_value_on_curve(
    curve: &mut dyn AnimCurve,
    time: f64,
    value: f64,
    dir: TangentDir,
    rec: &mut dyn UndoRecorder,
) {
    if curve.num_keys() <= 1 {
        return;
    }
    let Some(id) = curve.find(time) else {
        return;
    };

    let value = if dir == TangentDir::In { -value } else { value };

    if curve.is_weighted() {
        let (x, _) = curve.tangent_xy(id, dir);
        curve.set_tangent_xy(id, dir, x, value * WEIGHTED_TANGENT_AXES, rec);
    } else {
        let (_, weight) = curve.tangent_polar(id, dir);
        let angle = (value * weight).atan();
        curve.set_tangent_polar(id, dir, angle, weight, rec);
    }
}
