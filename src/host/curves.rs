//! Animation-curve access.
//!
//! One [`AnimCurve`] is the host's keyed function of time for a single
//! channel (for this tool: one translation or rotation axis). Key ids are
//! positional indices into the curve's time-sorted key list; any structural
//! mutation may shift them, which is why the keyframe cache is always
//! rebuilt wholesale after edits rather than patched.

use crate::host::undo::UndoRecorder;

/// One of the three driven axes of a 3D point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Component index into a `DVec3`.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Which side of a key a tangent belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TangentDir {
    In,
    Out,
}

/// Host tangent type of one side of a key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TangentType {
    #[default]
    Auto,
    Fixed,
    Linear,
    Flat,
    Smooth,
    Step,
}

/// A single-channel animation curve owned by the host.
///
/// Tangents are queryable and writable in both host representations
/// regardless of the curve's weighted state:
///
/// - polar: `(angle, weight)`, the analytic form non-weighted curves edit,
/// - xy: an explicit `(x, y)` handle vector in (time, value) units.
///
/// The curve's [`is_weighted`](AnimCurve::is_weighted) flag decides which
/// representation is authoritative for display and editing.
pub trait AnimCurve {
    fn num_keys(&self) -> usize;

    /// Time of the key at `id`. Panics on an out-of-range id, like the
    /// host API underneath; callers always bound-check through `find` or
    /// `num_keys` first.
    fn time(&self, id: usize) -> f64;

    /// Value of the key at `id`.
    fn value(&self, id: usize) -> f64;

    /// Evaluates the curve at an arbitrary time, extrapolating outside the
    /// keyed range.
    fn evaluate(&self, time: f64) -> f64;

    /// Id of the key at exactly `time`, if one exists.
    fn find(&self, time: f64) -> Option<usize>;

    fn is_weighted(&self) -> bool;

    /// Whether this curve type drives a channel this tool may display.
    fn is_animatable(&self) -> bool {
        true
    }

    /// Tangent as `(angle, weight)`.
    fn tangent_polar(&self, id: usize, dir: TangentDir) -> (f64, f64);

    /// Tangent as an `(x, y)` handle vector.
    fn tangent_xy(&self, id: usize, dir: TangentDir) -> (f64, f64);

    fn in_tangent_type(&self, id: usize) -> TangentType;
    fn out_tangent_type(&self, id: usize) -> TangentType;
    fn tangents_locked(&self, id: usize) -> bool;
    fn weights_locked(&self, id: usize) -> bool;

    /// Adds a key, returning its id.
    fn add_key(
        &mut self,
        time: f64,
        value: f64,
        tin: TangentType,
        tout: TangentType,
        rec: &mut dyn UndoRecorder,
    ) -> usize;

    fn set_value(&mut self, id: usize, value: f64, rec: &mut dyn UndoRecorder);

    fn remove(&mut self, id: usize, rec: &mut dyn UndoRecorder);

    fn set_is_weighted(&mut self, weighted: bool, rec: &mut dyn UndoRecorder);

    fn set_tangent_polar(
        &mut self,
        id: usize,
        dir: TangentDir,
        angle: f64,
        weight: f64,
        rec: &mut dyn UndoRecorder,
    );

    fn set_tangent_xy(
        &mut self,
        id: usize,
        dir: TangentDir,
        x: f64,
        y: f64,
        rec: &mut dyn UndoRecorder,
    );

    fn set_tangents_locked(&mut self, id: usize, locked: bool, rec: &mut dyn UndoRecorder);
    fn set_weights_locked(&mut self, id: usize, locked: bool, rec: &mut dyn UndoRecorder);
}
