//! Self-contained in-memory host.
//!
//! Backs the test suite and headless consumers with plain-Rust
//! implementations of every host trait: Hermite curves with the dual
//! tangent representations, scene objects with parent matrices and pivots,
//! a counting undo recorder, an orthographic viewport and a recording draw
//! surface.

use glam::{DMat4, DVec2, DVec3};

use crate::config::Color;
use crate::host::curves::{AnimCurve, Axis, TangentDir, TangentType};
use crate::host::scene::{CameraSource, SceneObject};
use crate::host::undo::UndoRecorder;
use crate::host::viewport::{DrawSurface, Viewport};

/// Times closer than this are the same key.
const KEY_TIME_TOLERANCE: f64 = 1e-9;

/// Canonical handle length of a unit-weight tangent.
const HANDLE_SCALE: f64 = 3.0;

// ===== Curves =====

#[derive(Clone, Copy, Debug)]
struct MemoryKey {
    time: f64,
    value: f64,
    // Handle vectors in (time, value) units, both stored pointing toward
    // increasing time.
    in_xy: (f64, f64),
    out_xy: (f64, f64),
    in_type: TangentType,
    out_type: TangentType,
    tangents_locked: bool,
    weights_locked: bool,
}

impl MemoryKey {
    fn new(time: f64, value: f64, tin: TangentType, tout: TangentType) -> Self {
        Self {
            time,
            value,
            in_xy: (HANDLE_SCALE, 0.0),
            out_xy: (HANDLE_SCALE, 0.0),
            in_type: tin,
            out_type: tout,
            tangents_locked: true,
            weights_locked: false,
        }
    }

    fn xy(&self, dir: TangentDir) -> (f64, f64) {
        match dir {
            TangentDir::In => self.in_xy,
            TangentDir::Out => self.out_xy,
        }
    }

    fn xy_mut(&mut self, dir: TangentDir) -> &mut (f64, f64) {
        match dir {
            TangentDir::In => &mut self.in_xy,
            TangentDir::Out => &mut self.out_xy,
        }
    }

    fn tangent_type(&self, dir: TangentDir) -> TangentType {
        match dir {
            TangentDir::In => self.in_type,
            TangentDir::Out => self.out_type,
        }
    }

    fn set_tangent_type(&mut self, dir: TangentDir, t: TangentType) {
        match dir {
            TangentDir::In => self.in_type = t,
            TangentDir::Out => self.out_type = t,
        }
    }
}

fn slope_of(xy: (f64, f64)) -> f64 {
    if xy.0.abs() > f64::EPSILON {
        xy.1 / xy.0
    } else {
        0.0
    }
}

fn xy_from_slope(slope: f64) -> (f64, f64) {
    let angle = slope.atan();
    (HANDLE_SCALE * angle.cos(), HANDLE_SCALE * angle.sin())
}

/// A keyed Hermite curve over one channel.
///
/// Non-fixed tangents are recomputed from the neighboring keys whenever the
/// key structure or a value changes, so Auto tangents behave the way a host
/// curve engine's do. All tangents are stored as `(x, y)` handle vectors;
/// the polar form is derived on the fly.
#[derive(Clone, Debug, Default)]
pub struct MemoryCurve {
    keys: Vec<MemoryKey>,
    weighted: bool,
}

impl MemoryCurve {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insertion_index(&self, time: f64) -> usize {
        self.keys.partition_point(|k| k.time < time)
    }

    fn auto_slope(&self, id: usize, dir: TangentDir) -> f64 {
        let key = &self.keys[id];
        let prev = id.checked_sub(1).map(|i| &self.keys[i]);
        let next = self.keys.get(id + 1);

        let secant = |a: &MemoryKey, b: &MemoryKey| -> f64 {
            let dt = b.time - a.time;
            if dt.abs() > f64::EPSILON {
                (b.value - a.value) / dt
            } else {
                0.0
            }
        };

        match key.tangent_type(dir) {
            TangentType::Flat | TangentType::Step => 0.0,
            TangentType::Linear => match dir {
                TangentDir::In => prev.map_or(0.0, |p| secant(p, key)),
                TangentDir::Out => next.map_or(0.0, |n| secant(key, n)),
            },
            // Auto and Smooth span the neighbors; a boundary key flattens.
            _ => match (prev, next) {
                (Some(p), Some(n)) => secant(p, n),
                _ => 0.0,
            },
        }
    }

    /// Recomputes both non-fixed tangents of one key.
    fn retangent(&mut self, id: usize) {
        for dir in [TangentDir::In, TangentDir::Out] {
            if self.keys[id].tangent_type(dir) == TangentType::Fixed {
                continue;
            }
            let xy = xy_from_slope(self.auto_slope(id, dir));
            *self.keys[id].xy_mut(dir) = xy;
        }
    }

    /// Recomputes the key and its immediate neighbors after a structural or
    /// value change at `id`.
    fn retangent_around(&mut self, id: usize) {
        let lo = id.saturating_sub(1);
        let hi = (id + 1).min(self.keys.len().saturating_sub(1));
        for i in lo..=hi {
            if i < self.keys.len() {
                self.retangent(i);
            }
        }
    }

    fn hermite(&self, id: usize, time: f64) -> f64 {
        let k0 = &self.keys[id];
        let k1 = &self.keys[id + 1];

        if k0.out_type == TangentType::Step {
            return k0.value;
        }

        let dt = k1.time - k0.time;
        if dt.abs() <= f64::EPSILON {
            return k0.value;
        }

        let m0 = slope_of(k0.out_xy);
        let m1 = slope_of(k1.in_xy);

        let s = (time - k0.time) / dt;
        let s2 = s * s;
        let s3 = s2 * s;

        (2.0 * s3 - 3.0 * s2 + 1.0) * k0.value
            + (s3 - 2.0 * s2 + s) * dt * m0
            + (-2.0 * s3 + 3.0 * s2) * k1.value
            + (s3 - s2) * dt * m1
    }
}

impl AnimCurve for MemoryCurve {
    fn num_keys(&self) -> usize {
        self.keys.len()
    }

    fn time(&self, id: usize) -> f64 {
        self.keys[id].time
    }

    fn value(&self, id: usize) -> f64 {
        self.keys[id].value
    }

    fn evaluate(&self, time: f64) -> f64 {
        let Some(first) = self.keys.first() else {
            return 0.0;
        };
        if time <= first.time {
            return first.value;
        }
        let last = &self.keys[self.keys.len() - 1];
        if time >= last.time {
            return last.value;
        }
        // Keys are sorted; find the span containing `time`.
        let id = self.keys.partition_point(|k| k.time <= time) - 1;
        self.hermite(id, time)
    }

    fn find(&self, time: f64) -> Option<usize> {
        self.keys
            .iter()
            .position(|k| (k.time - time).abs() < KEY_TIME_TOLERANCE)
    }

    fn is_weighted(&self) -> bool {
        self.weighted
    }

    fn tangent_polar(&self, id: usize, dir: TangentDir) -> (f64, f64) {
        let (x, y) = self.keys[id].xy(dir);
        let angle = y.atan2(x);
        let weight = (x * x + y * y).sqrt() / HANDLE_SCALE;
        (angle, weight)
    }

    fn tangent_xy(&self, id: usize, dir: TangentDir) -> (f64, f64) {
        self.keys[id].xy(dir)
    }

    fn in_tangent_type(&self, id: usize) -> TangentType {
        self.keys[id].in_type
    }

    fn out_tangent_type(&self, id: usize) -> TangentType {
        self.keys[id].out_type
    }

    fn tangents_locked(&self, id: usize) -> bool {
        self.keys[id].tangents_locked
    }

    fn weights_locked(&self, id: usize) -> bool {
        self.keys[id].weights_locked
    }

    fn add_key(
        &mut self,
        time: f64,
        value: f64,
        tin: TangentType,
        tout: TangentType,
        _rec: &mut dyn UndoRecorder,
    ) -> usize {
        // A key already at this time is replaced, not duplicated.
        if let Some(id) = self.find(time) {
            self.keys[id].value = value;
            self.retangent_around(id);
            return id;
        }

        let id = self.insertion_index(time);
        self.keys.insert(id, MemoryKey::new(time, value, tin, tout));
        self.retangent_around(id);
        id
    }

    fn set_value(&mut self, id: usize, value: f64, _rec: &mut dyn UndoRecorder) {
        self.keys[id].value = value;
        self.retangent_around(id);
    }

    fn remove(&mut self, id: usize, _rec: &mut dyn UndoRecorder) {
        self.keys.remove(id);
        if !self.keys.is_empty() {
            let neighbor = id.min(self.keys.len() - 1);
            self.retangent_around(neighbor);
        }
    }

    fn set_is_weighted(&mut self, weighted: bool, _rec: &mut dyn UndoRecorder) {
        self.weighted = weighted;
    }

    fn set_tangent_polar(
        &mut self,
        id: usize,
        dir: TangentDir,
        angle: f64,
        weight: f64,
        _rec: &mut dyn UndoRecorder,
    ) {
        let xy = (
            HANDLE_SCALE * weight * angle.cos(),
            HANDLE_SCALE * weight * angle.sin(),
        );
        *self.keys[id].xy_mut(dir) = xy;
        self.keys[id].set_tangent_type(dir, TangentType::Fixed);
        self.mirror_locked(id, dir);
    }

    fn set_tangent_xy(
        &mut self,
        id: usize,
        dir: TangentDir,
        x: f64,
        y: f64,
        _rec: &mut dyn UndoRecorder,
    ) {
        *self.keys[id].xy_mut(dir) = (x, y);
        self.keys[id].set_tangent_type(dir, TangentType::Fixed);
        self.mirror_locked(id, dir);
    }

    fn set_tangents_locked(&mut self, id: usize, locked: bool, _rec: &mut dyn UndoRecorder) {
        self.keys[id].tangents_locked = locked;
    }

    fn set_weights_locked(&mut self, id: usize, locked: bool, _rec: &mut dyn UndoRecorder) {
        self.keys[id].weights_locked = locked;
    }
}

impl MemoryCurve {
    /// A locked pair stays colinear: writing one side rotates the other to
    /// the same angle while keeping its length.
    fn mirror_locked(&mut self, id: usize, dir: TangentDir) {
        if !self.keys[id].tangents_locked {
            return;
        }
        let (x, y) = self.keys[id].xy(dir);
        let len = (x * x + y * y).sqrt();
        if len <= f64::EPSILON {
            return;
        }

        let other = match dir {
            TangentDir::In => TangentDir::Out,
            TangentDir::Out => TangentDir::In,
        };
        let (ox, oy) = self.keys[id].xy(other);
        let other_len = (ox * ox + oy * oy).sqrt();

        *self.keys[id].xy_mut(other) = (x / len * other_len, y / len * other_len);
        self.keys[id].set_tangent_type(other, TangentType::Fixed);
    }
}

// ===== Scene objects =====

/// A transform node living entirely in memory.
pub struct MemoryObject {
    name: String,
    translate: [Option<MemoryCurve>; 3],
    rotate: [Option<MemoryCurve>; 3],
    base_translation: DVec3,
    parent: DMat4,
    rotate_pivot: DVec3,
    rotate_pivot_translate: DVec3,
    constrained: bool,
    layered: bool,
}

impl MemoryObject {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            translate: [None, None, None],
            rotate: [None, None, None],
            base_translation: DVec3::ZERO,
            parent: DMat4::IDENTITY,
            rotate_pivot: DVec3::ZERO,
            rotate_pivot_translate: DVec3::ZERO,
            constrained: false,
            layered: false,
        }
    }

    pub fn set_parent_matrix(&mut self, parent: DMat4) {
        self.parent = parent;
    }

    pub fn set_base_translation(&mut self, translation: DVec3) {
        self.base_translation = translation;
    }

    pub fn set_pivots(&mut self, rotate_pivot: DVec3, rotate_pivot_translate: DVec3) {
        self.rotate_pivot = rotate_pivot;
        self.rotate_pivot_translate = rotate_pivot_translate;
    }

    pub fn set_constrained(&mut self, constrained: bool) {
        self.constrained = constrained;
    }

    pub fn set_has_animation_layers(&mut self, layered: bool) {
        self.layered = layered;
    }

    pub fn translate_memory_curve_mut(&mut self, axis: Axis) -> &mut MemoryCurve {
        self.translate[axis.index()].get_or_insert_with(MemoryCurve::new)
    }

    pub fn rotate_memory_curve_mut(&mut self, axis: Axis) -> &mut MemoryCurve {
        self.rotate[axis.index()].get_or_insert_with(MemoryCurve::new)
    }

    /// Keys all three translation axes at once. Convenience for building
    /// trajectories.
    pub fn key_translation(&mut self, time: f64, position: DVec3, rec: &mut dyn UndoRecorder) {
        for axis in Axis::ALL {
            let curve = self.translate_memory_curve_mut(axis);
            curve.add_key(
                time,
                position[axis.index()],
                TangentType::default(),
                TangentType::default(),
                rec,
            );
        }
    }
}

impl SceneObject for MemoryObject {
    fn name(&self) -> &str {
        &self.name
    }

    fn translate_curve(&self, axis: Axis) -> Option<&dyn AnimCurve> {
        self.translate[axis.index()]
            .as_ref()
            .map(|c| c as &dyn AnimCurve)
    }

    fn translate_curve_mut(&mut self, axis: Axis) -> Option<&mut dyn AnimCurve> {
        self.translate[axis.index()]
            .as_mut()
            .map(|c| c as &mut dyn AnimCurve)
    }

    fn rotate_curve(&self, axis: Axis) -> Option<&dyn AnimCurve> {
        self.rotate[axis.index()]
            .as_ref()
            .map(|c| c as &dyn AnimCurve)
    }

    fn ensure_translate_curves(&mut self, rec: &mut dyn UndoRecorder) {
        let mut created = false;
        for slot in &mut self.translate {
            if slot.is_none() {
                *slot = Some(MemoryCurve::new());
                created = true;
            }
        }
        if created {
            rec.start_structural_edits();
        }
    }

    fn translation(&self, time: f64) -> DVec3 {
        let mut out = self.base_translation;
        for axis in Axis::ALL {
            if let Some(curve) = &self.translate[axis.index()] {
                if curve.num_keys() > 0 {
                    out[axis.index()] = curve.evaluate(time);
                }
            }
        }
        out
    }

    fn parent_matrix(&self, time: f64) -> DMat4 {
        if self.constrained {
            self.parent * DMat4::from_translation(self.translation(time))
        } else {
            self.parent
        }
    }

    fn rotate_pivot(&self, _time: f64) -> DVec3 {
        self.rotate_pivot
    }

    fn rotate_pivot_translate(&self, _time: f64) -> DVec3 {
        self.rotate_pivot_translate
    }

    fn is_constrained(&self) -> bool {
        self.constrained
    }

    fn has_animation_layers(&self) -> bool {
        self.layered
    }
}

// ===== Camera =====

/// A camera that sits at `base` and optionally drifts linearly over time.
#[derive(Clone, Copy, Debug)]
pub struct MemoryCamera {
    base: DMat4,
    velocity: DVec3,
}

impl MemoryCamera {
    #[must_use]
    pub fn fixed(base: DMat4) -> Self {
        Self {
            base,
            velocity: DVec3::ZERO,
        }
    }

    #[must_use]
    pub fn moving(base: DMat4, velocity: DVec3) -> Self {
        Self { base, velocity }
    }
}

impl CameraSource for MemoryCamera {
    fn world_matrix(&self, time: f64) -> DMat4 {
        DMat4::from_translation(self.velocity * time) * self.base
    }
}

// ===== Undo =====

/// Counts transactions instead of recording them.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryRecorder {
    anim_open: bool,
    structural_open: bool,
    pub anim_starts: usize,
    pub structural_starts: usize,
    pub commits: usize,
}

impl MemoryRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl UndoRecorder for MemoryRecorder {
    fn start_anim_edits(&mut self) {
        if !self.anim_open {
            self.anim_open = true;
            self.anim_starts += 1;
        }
    }

    fn start_structural_edits(&mut self) {
        if !self.structural_open {
            self.structural_open = true;
            self.structural_starts += 1;
        }
    }

    fn commit(&mut self) {
        if self.anim_open || self.structural_open {
            self.anim_open = false;
            self.structural_open = false;
            self.commits += 1;
        }
    }

    fn anim_edits_open(&self) -> bool {
        self.anim_open
    }
}

// ===== Viewport =====

/// Orthographic front viewport looking down -Z.
///
/// World XY maps linearly to pixels, so a cursor delta of `scale` pixels is
/// one world unit; handy for asserting exact drag results.
#[derive(Clone, Copy, Debug)]
pub struct OrthoViewport {
    pub scale: f64,
    pub width: u32,
    pub height: u32,
    pub camera_distance: f64,
}

impl OrthoViewport {
    #[must_use]
    pub fn new(scale: f64, width: u32, height: u32, camera_distance: f64) -> Self {
        Self {
            scale,
            width,
            height,
            camera_distance,
        }
    }
}

impl Viewport for OrthoViewport {
    fn port_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn world_to_screen(&self, world: DVec3) -> DVec2 {
        DVec2::new(
            world.x * self.scale + f64::from(self.width) / 2.0,
            f64::from(self.height) / 2.0 - world.y * self.scale,
        )
    }

    fn screen_ray(&self, screen: DVec2) -> (DVec3, DVec3) {
        let origin = DVec3::new(
            (screen.x - f64::from(self.width) / 2.0) / self.scale,
            (f64::from(self.height) / 2.0 - screen.y) / self.scale,
            self.camera_distance,
        );
        (origin, DVec3::NEG_Z)
    }

    fn camera_matrix(&self) -> DMat4 {
        DMat4::from_translation(DVec3::new(0.0, 0.0, self.camera_distance))
    }
}

// ===== Draw surface =====

/// Records draw calls for assertions.
#[derive(Clone, Debug, Default)]
pub struct RecordingSurface {
    pub lines: usize,
    pub points: usize,
    pub labels: Vec<String>,
}

impl RecordingSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.lines = 0;
        self.points = 0;
        self.labels.clear();
    }
}

impl DrawSurface for RecordingSurface {
    fn line(&mut self, _a: DVec3, _b: DVec3, _width: f64, _color: Color) {
        self.lines += 1;
    }

    fn point(&mut self, _p: DVec3, _size: f64, _color: Color) {
        self.points += 1;
    }

    fn text(&mut self, _p: DVec3, text: &str, _color: Color) {
        self.labels.push(text.to_owned());
    }
}
