//! Key clipboard: copy and paste of selected keys across times and objects.
//!
//! Copied keys carry their tangents in both host representations so a paste
//! can target curves of either weighted state. World positions travel with
//! the keys, letting a paste re-localize them under a different parent.

use glam::DVec3;

use crate::config::Settings;
use crate::errors::{PathlineError, Result};
use crate::host::{AnimCurve, Axis, NoUndo, TangentDir, TangentType, UndoRecorder};
use crate::path::{MotionPath, WEIGHTED_TANGENT_AXES};

/// One copied key, positioned relative to the first copied key.
#[derive(Clone, Debug, Default)]
pub struct KeyCopy {
    pub delta_time: f64,
    pub world_position: DVec3,

    /// Tangent handle positions in world space, from the analytic form.
    pub in_world_tangent: DVec3,
    pub out_world_tangent: DVec3,
    /// Same handles from the weighted form.
    pub in_weighted_world_tangent: DVec3,
    pub out_weighted_world_tangent: DVec3,

    pub has_key: [bool; 3],
    pub in_types: [TangentType; 3],
    pub out_types: [TangentType; 3],
    pub tangents_locked: [bool; 3],
    pub weights_locked: [bool; 3],

    /// Stored x handle components, consumed by pastes onto weighted curves.
    pub in_x: [f64; 3],
    pub out_x: [f64; 3],
    /// Stored polar weights, consumed by pastes onto non-weighted curves.
    pub in_weight: [f64; 3],
    pub out_weight: [f64; 3],
}

#[derive(Debug, Default)]
pub struct KeyClipboard {
    keys: Vec<KeyCopy>,
    weighted: [bool; 3],
}

impl KeyClipboard {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn keys(&self) -> &[KeyCopy] {
        &self.keys
    }

    #[must_use]
    pub fn axis_weighted(&self, axis: Axis) -> bool {
        self.weighted[axis.index()]
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.weighted = [false; 3];
    }
}

// ===== Tangent snapshots =====

#[derive(Clone)]
struct SnapshotEntry {
    time: f64,
    in_xy: (f64, f64),
    out_xy: (f64, f64),
    tangents_locked: bool,
    weights_locked: bool,
}

/// Captures every tangent of a curve so temporary boundary keys can be
/// inserted and later removed without leaving a trace.
fn snapshot_tangents(curve: &dyn AnimCurve) -> Vec<SnapshotEntry> {
    (0..curve.num_keys())
        .map(|id| SnapshotEntry {
            time: curve.time(id),
            in_xy: curve.tangent_xy(id, TangentDir::In),
            out_xy: curve.tangent_xy(id, TangentDir::Out),
            tangents_locked: curve.tangents_locked(id),
            weights_locked: curve.weights_locked(id),
        })
        .collect()
}

/// Puts back every tangent that drifted. Untouched keys are left alone so
/// their tangent types are not needlessly pinned.
fn restore_tangents(curve: &mut dyn AnimCurve, snapshot: &[SnapshotEntry]) {
    let mut rec = NoUndo;
    for entry in snapshot {
        let Some(id) = curve.find(entry.time) else {
            continue;
        };
        let unchanged = curve.tangent_xy(id, TangentDir::In) == entry.in_xy
            && curve.tangent_xy(id, TangentDir::Out) == entry.out_xy
            && curve.tangents_locked(id) == entry.tangents_locked
            && curve.weights_locked(id) == entry.weights_locked;
        if unchanged {
            continue;
        }

        curve.set_tangents_locked(id, false, &mut rec);
        curve.set_weights_locked(id, false, &mut rec);
        let (x, y) = entry.in_xy;
        curve.set_tangent_xy(id, TangentDir::In, x, y, &mut rec);
        let (x, y) = entry.out_xy;
        curve.set_tangent_xy(id, TangentDir::Out, x, y, &mut rec);
        curve.set_tangents_locked(id, entry.tangents_locked, &mut rec);
        curve.set_weights_locked(id, entry.weights_locked, &mut rec);
    }
}

/// Boundary copied keys need real neighbors for their tangents to mean
/// anything; keys that do not exist are added temporarily at the curve's own
/// evaluation, leaving the shape untouched.
fn place_boundary_keys(
    curve: &mut dyn AnimCurve,
    time: f64,
    initial_key: bool,
    extra_times: &mut Vec<f64>,
) {
    let mut rec = NoUndo;

    if curve.find(time).is_none() {
        let value = curve.evaluate(time);
        curve.add_key(time, value, TangentType::default(), TangentType::default(), &mut rec);
        extra_times.push(time);
    }

    let Some(id) = curve.find(time) else {
        return;
    };

    if initial_key && id == curve.num_keys() - 1 {
        let t = time + 1.0;
        let value = curve.evaluate(t);
        curve.add_key(t, value, TangentType::default(), TangentType::default(), &mut rec);
        extra_times.push(t);
    }
    if !initial_key && id == 0 {
        let t = time - 1.0;
        let value = curve.evaluate(t);
        curve.add_key(t, value, TangentType::default(), TangentType::default(), &mut rec);
        extra_times.push(t);
    }
}

// ===== Copy =====

/// Copies the path's selected keys into a fresh clipboard.
///
/// Reads off the freshly rebuilt keyframe cache for world positions; the
/// curves themselves are only touched through self-reverting scratch writes.
pub fn copy_selected_keys(path: &mut MotionPath, settings: &Settings) -> KeyClipboard {
    let mut clipboard = KeyClipboard::default();

    let times = path.selected_key_times();
    let Some(&first_time) = times.first() else {
        return clipboard;
    };
    let last_time = *times.last().unwrap_or(&first_time);

    for axis in Axis::ALL {
        clipboard.weighted[axis.index()] = path
            .object()
            .translate_curve(axis)
            .is_some_and(AnimCurve::is_weighted);
    }

    let mut snapshots: [Vec<SnapshotEntry>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for axis in Axis::ALL {
        if let Some(curve) = path.object().translate_curve(axis) {
            snapshots[axis.index()] = snapshot_tangents(curve);
        }
    }

    let mut extra_times: [Vec<f64>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for axis in Axis::ALL {
        if let Some(curve) = path.object_mut().translate_curve_mut(axis) {
            place_boundary_keys(curve, first_time, true, &mut extra_times[axis.index()]);
            if last_time > first_time {
                place_boundary_keys(curve, last_time, false, &mut extra_times[axis.index()]);
            }
        }
    }

    for &time in &times {
        let Some(keyframe) = path.keyframe(time) else {
            continue;
        };
        let mut kc = KeyCopy {
            delta_time: time - first_time,
            world_position: keyframe.world_position,
            ..KeyCopy::default()
        };
        let local_position = keyframe.local_position;

        let mut in_tangent = DVec3::ZERO;
        let mut out_tangent = DVec3::ZERO;
        let mut in_weighted = DVec3::ZERO;
        let mut out_weighted = DVec3::ZERO;

        for axis in Axis::ALL {
            let i = axis.index();
            let Some(curve) = path.object().translate_curve(axis) else {
                continue;
            };
            let Some(id) = curve.find(time) else {
                continue;
            };
            kc.has_key[i] = true;

            let (in_angle, in_weight) = curve.tangent_polar(id, TangentDir::In);
            let (out_angle, out_weight) = curve.tangent_polar(id, TangentDir::Out);
            in_tangent[i] = in_angle.tan() * in_weight;
            out_tangent[i] = out_angle.tan() * out_weight;

            let (in_x, in_y) = curve.tangent_xy(id, TangentDir::In);
            let (out_x, out_y) = curve.tangent_xy(id, TangentDir::Out);
            in_weighted[i] = in_y / WEIGHTED_TANGENT_AXES;
            out_weighted[i] = out_y / WEIGHTED_TANGENT_AXES;

            kc.in_types[i] = curve.in_tangent_type(id);
            kc.out_types[i] = curve.out_tangent_type(id);
            kc.tangents_locked[i] = curve.tangents_locked(id);
            kc.weights_locked[i] = curve.weights_locked(id);
            kc.in_x[i] = in_x;
            kc.out_x[i] = out_x;
            kc.in_weight[i] = in_weight;
            kc.out_weight[i] = out_weight;
        }

        let p_matrix = path.ensure_parent_matrix(time, settings);
        kc.in_world_tangent = p_matrix.transform_point3(-in_tangent + local_position);
        kc.out_world_tangent = p_matrix.transform_point3(out_tangent + local_position);
        kc.in_weighted_world_tangent = p_matrix.transform_point3(-in_weighted + local_position);
        kc.out_weighted_world_tangent = p_matrix.transform_point3(out_weighted + local_position);

        clipboard.keys.push(kc);
    }

    // Take the temp boundary keys out again and undo any tangent drift the
    // insertions caused on neighboring keys.
    let mut rec = NoUndo;
    for axis in Axis::ALL {
        let i = axis.index();
        if let Some(curve) = path.object_mut().translate_curve_mut(axis) {
            for &t in extra_times[i].iter().rev() {
                if let Some(id) = curve.find(t) {
                    curve.remove(id, &mut rec);
                }
            }
            restore_tangents(curve, &snapshots[i]);
        }
    }

    clipboard
}

// ===== Paste =====

/// A pasted key inside the target curve's keyed range gets broken tangents
/// so it does not fight the surrounding shape; a paste extending the range
/// keeps the copied lock state.
fn break_tangents_for_key_copy(curve: &dyn AnimCurve, time: f64, is_last: bool) -> bool {
    if curve.num_keys() == 0 {
        return false;
    }
    let first = curve.time(0);
    let last = curve.time(curve.num_keys() - 1);
    first < time && (last > time || !is_last)
}

fn set_pasted_tangent(
    curve: &mut dyn AnimCurve,
    id: usize,
    dir: TangentDir,
    value: f64,
    stored_weight: f64,
    stored_x: f64,
    rec: &mut dyn UndoRecorder,
) {
    if curve.is_weighted() {
        curve.set_tangent_xy(id, dir, stored_x, value * WEIGHTED_TANGENT_AXES, rec);
    } else {
        let angle = (value * stored_weight).atan();
        curve.set_tangent_polar(id, dir, angle, stored_weight, rec);
    }
}

/// Pastes the clipboard onto `path` starting at `time`.
///
/// With `offset` set, the first key lands at the path's own position at
/// `time` and the rest keep their relative world deltas; otherwise all keys
/// return to their absolute copied world positions. Existing keys strictly
/// inside the pasted span are cleared first.
pub fn paste_keys(
    path: &mut MotionPath,
    clipboard: &KeyClipboard,
    time: f64,
    offset: bool,
    settings: &Settings,
    rec: &mut dyn UndoRecorder,
) -> Result<()> {
    if clipboard.is_empty() {
        return Err(PathlineError::EmptyClipboard);
    }

    let offset_vec = if offset {
        Some(path.world_position_at(time, settings))
    } else {
        None
    };

    path.object_mut().ensure_translate_curves(rec);
    rec.start_anim_edits();

    for axis in Axis::ALL {
        if clipboard.axis_weighted(axis) {
            if let Some(curve) = path.object_mut().translate_curve_mut(axis) {
                curve.set_is_weighted(true, rec);
            }
        }
    }

    let keys = clipboard.keys();
    let last_delta = keys[keys.len() - 1].delta_time;
    path.delete_keys_between_times(time, time + last_delta, rec);

    let first_world = keys[0].world_position;

    // First pass: values.
    for (i, kc) in keys.iter().enumerate() {
        let t = time + kc.delta_time;
        let p_matrix = path.ensure_parent_matrix(t, settings);

        let world = match offset_vec {
            None => kc.world_position,
            Some(off) => {
                if i == 0 {
                    off
                } else {
                    off + kc.world_position - first_world
                }
            }
        };
        let local = p_matrix.inverse().transform_point3(world);
        let boundary = i == 0 || i == keys.len() - 1;

        for axis in Axis::ALL {
            let ai = axis.index();
            // The span's endpoints land on every axis, keyed in the source
            // or not, so the pasted run stays pinned on all three channels.
            if !kc.has_key[ai] && !boundary {
                continue;
            }
            let Some(curve) = path.object_mut().translate_curve_mut(axis) else {
                continue;
            };
            let id = match curve.find(t) {
                Some(id) => {
                    curve.set_value(id, local[ai], rec);
                    id
                }
                None => curve.add_key(t, local[ai], kc.in_types[ai], kc.out_types[ai], rec),
            };
            // Unlock so the tangent pass can write each side independently.
            curve.set_tangents_locked(id, false, rec);
            curve.set_weights_locked(id, false, rec);
        }
    }

    // Second pass: tangents and lock state, once all keys exist.
    for (i, kc) in keys.iter().enumerate() {
        let t = time + kc.delta_time;
        let p_inverse = path.ensure_parent_matrix(t, settings).inverse();

        let in_vec = p_inverse.transform_vector3(kc.in_world_tangent - kc.world_position);
        let out_vec = p_inverse.transform_vector3(kc.out_world_tangent - kc.world_position);
        let in_weighted =
            p_inverse.transform_vector3(kc.in_weighted_world_tangent - kc.world_position);
        let out_weighted =
            p_inverse.transform_vector3(kc.out_weighted_world_tangent - kc.world_position);

        let modify_in = i != 0;
        let modify_out = i != keys.len() - 1;
        let is_last = i == keys.len() - 1;
        let boundary = i == 0 || is_last;

        for axis in Axis::ALL {
            let ai = axis.index();
            if !kc.has_key[ai] && !boundary {
                continue;
            }
            let Some(curve) = path.object_mut().translate_curve_mut(axis) else {
                continue;
            };
            let Some(id) = curve.find(t) else {
                continue;
            };

            let (in_value, out_value) = if curve.is_weighted() {
                (in_weighted[ai], out_weighted[ai])
            } else {
                (in_vec[ai], out_vec[ai])
            };

            if modify_in {
                set_pasted_tangent(
                    curve,
                    id,
                    TangentDir::In,
                    -in_value,
                    kc.in_weight[ai],
                    kc.in_x[ai],
                    rec,
                );
            }
            if modify_out {
                set_pasted_tangent(
                    curve,
                    id,
                    TangentDir::Out,
                    out_value,
                    kc.out_weight[ai],
                    kc.out_x[ai],
                    rec,
                );
            }

            let broken = break_tangents_for_key_copy(curve, t, is_last);
            let locked = if broken { false } else { kc.tangents_locked[ai] };
            curve.set_tangents_locked(id, locked, rec);
            curve.set_weights_locked(id, kc.weights_locked[ai], rec);
        }
    }

    rec.commit();
    Ok(())
}
