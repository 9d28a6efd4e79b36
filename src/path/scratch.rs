//! Self-reverting scratch writes onto animation curves.
//!
//! The interactive display must show the live channel value even while the
//! user drags the object without setting a key. To keep the keyframe cache
//! truthful, the live value is written into the curve for the duration of one
//! rebuild and reverted right after, bypassing undo recording entirely.

use crate::host::{AnimCurve, NoUndo};

enum Restore {
    /// A key was added at the scratch time and must be removed.
    RemoveAdded,
    /// An existing key's value was overwritten and must be put back.
    RestoreValue { id: usize, old_value: f64 },
}

/// Receipt for one scratch write; [`lift`](ScratchKey::lift) undoes it.
pub struct ScratchKey {
    time: f64,
    restore: Restore,
}

impl ScratchKey {
    /// Writes `live` into `curve` at `time` when it differs from what the
    /// curve itself evaluates to. Returns `None` when the curve already
    /// agrees and nothing was touched.
    pub fn place(curve: &mut dyn AnimCurve, time: f64, live: f64) -> Option<Self> {
        let evaluated = curve.evaluate(time);
        if (evaluated - live).abs() < f64::EPSILON {
            return None;
        }

        let mut rec = NoUndo;
        let restore = if let Some(id) = curve.find(time) {
            let old_value = curve.value(id);
            curve.set_value(id, live, &mut rec);
            Restore::RestoreValue { id, old_value }
        } else {
            curve.add_key(time, live, Default::default(), Default::default(), &mut rec);
            Restore::RemoveAdded
        };

        Some(Self { time, restore })
    }

    /// Reverts the scratch write.
    pub fn lift(self, curve: &mut dyn AnimCurve) {
        let mut rec = NoUndo;
        match self.restore {
            Restore::RemoveAdded => {
                if let Some(id) = curve.find(self.time) {
                    curve.remove(id, &mut rec);
                }
            }
            Restore::RestoreValue { id, old_value } => {
                curve.set_value(id, old_value, &mut rec);
            }
        }
    }
}
