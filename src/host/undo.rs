//! Undo transaction bundling.

/// Collects curve and structural edits into atomic, host-reversible
/// transactions.
///
/// Two transaction kinds exist: animation-curve edits and structural edits
/// (curve creation). At most one of each is open at a time; `start_*` on an
/// already-open transaction is a no-op, as is [`commit`](UndoRecorder::commit)
/// when nothing was opened. Tools open transactions lazily on the first real
/// mutation of a gesture so that a click without a drag leaves no empty undo
/// entry behind.
pub trait UndoRecorder {
    /// Opens the animation-curve transaction if not already open.
    fn start_anim_edits(&mut self);

    /// Opens the structural transaction if not already open.
    fn start_structural_edits(&mut self);

    /// Pushes whatever is open onto the host undo stack. No-op when nothing
    /// was started.
    fn commit(&mut self);

    fn anim_edits_open(&self) -> bool;
}

/// Sink for self-reverting scratch writes that must never reach the undo
/// stack (live-value sync, clipboard boundary keys).
#[derive(Clone, Copy, Debug, Default)]
pub struct NoUndo;

impl UndoRecorder for NoUndo {
    fn start_anim_edits(&mut self) {}

    fn start_structural_edits(&mut self) {}

    fn commit(&mut self) {}

    fn anim_edits_open(&self) -> bool {
        false
    }
}
