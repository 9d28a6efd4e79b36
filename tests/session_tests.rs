//! Tool gesture tests
//!
//! Tests for:
//! - Key drags with lazy undo transactions
//! - Preferred-axis constrained drags
//! - Tangent drags breaking nothing else
//! - Free-hand drawing: key stepping and trailing-key deletion
//! - Middle-click key placement at the current time
//! - Stroke reshaping onto the drawn polyline
//! - Marquee fallback over empty space

use glam::{DVec2, DVec3};
use pathline::host::memory::{MemoryObject, MemoryRecorder, OrthoViewport};
use pathline::{
    AnimCurve, Axis, EditSession, Modifiers, MouseButton, NoUndo, PathManager, SceneObject,
    SelectionMode, SessionContext, SessionOutcome, Settings, ToolKind, Viewport,
};

// ============================================================================
// Helper
// ============================================================================

const EPSILON: f64 = 1e-9;
const SCALE: f64 = 10.0;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.enabled = true;
    settings.start_time = 0.0;
    settings.end_time = 30.0;
    settings.frames_back = 100.0;
    settings.frames_front = 100.0;
    settings
}

fn viewport() -> OrthoViewport {
    OrthoViewport::new(SCALE, 400, 400, 100.0)
}

fn manager_with_keys(settings: &Settings, keys: &[(f64, DVec3)]) -> PathManager {
    let mut object = MemoryObject::new("actor");
    let mut rec = NoUndo;
    for &(t, p) in keys {
        object.key_translation(t, p, &mut rec);
    }

    let mut manager = PathManager::new();
    manager.set_selection(vec![(1, Box::new(object) as _)], settings, 1.0);
    manager.refresh(settings, None, 1.0);
    manager
}

fn ctx<'a>(vp: &'a OrthoViewport, settings: &'a Settings, now: f64) -> SessionContext<'a> {
    SessionContext {
        viewport: vp,
        camera: None,
        settings,
        now,
        timeline_max: 30.0,
    }
}

fn curve_eval(manager: &PathManager, axis: Axis, time: f64) -> f64 {
    manager
        .path(0)
        .unwrap()
        .object()
        .translate_curve(axis)
        .unwrap()
        .evaluate(time)
}

fn key_times(manager: &PathManager, axis: Axis) -> Vec<f64> {
    let curve = manager.path(0).unwrap().object().translate_curve(axis).unwrap();
    (0..curve.num_keys()).map(|id| curve.time(id)).collect()
}

// ============================================================================
// Key drags
// ============================================================================

#[test]
fn drag_moves_selected_key() {
    let settings = settings();
    let vp = viewport();
    let mut manager =
        manager_with_keys(&settings, &[(1.0, DVec3::ZERO), (10.0, DVec3::new(10.0, 0.0, 0.0))]);
    let mut rec = MemoryRecorder::new();
    let mut session = EditSession::new(ToolKind::Edit);
    let ctx = ctx(&vp, &settings, 1.0);

    let key_screen = vp.world_to_screen(DVec3::ZERO);
    assert!(session.press(key_screen, MouseButton::Left, Modifiers::empty(), &mut manager, &ctx, &mut rec));
    assert_eq!(manager.path(0).unwrap().selected_key_times(), vec![1.0]);

    // One world unit to the right.
    session.drag(key_screen + DVec2::new(SCALE, 0.0), &mut manager, &ctx, &mut rec);
    let outcome = session.release(key_screen + DVec2::new(SCALE, 0.0), &mut manager, &ctx, &mut rec);
    assert_eq!(outcome, SessionOutcome::None);

    assert!(approx_eq(curve_eval(&manager, Axis::X, 1.0), 1.0));
    assert!(approx_eq(curve_eval(&manager, Axis::Y, 1.0), 0.0));
    assert!(approx_eq(curve_eval(&manager, Axis::X, 10.0), 10.0));
}

#[test]
fn undo_transaction_opens_on_first_drag_only() {
    let settings = settings();
    let vp = viewport();
    let mut manager = manager_with_keys(&settings, &[(1.0, DVec3::ZERO)]);
    let mut rec = MemoryRecorder::new();
    let mut session = EditSession::new(ToolKind::Edit);
    let ctx = ctx(&vp, &settings, 1.0);

    let key_screen = vp.world_to_screen(DVec3::ZERO);

    // Click without movement: no transaction, nothing committed.
    session.press(key_screen, MouseButton::Left, Modifiers::empty(), &mut manager, &ctx, &mut rec);
    session.release(key_screen, &mut manager, &ctx, &mut rec);
    assert_eq!(rec.anim_starts, 0);
    assert_eq!(rec.commits, 0);

    // Click with movement: exactly one transaction.
    session.press(key_screen, MouseButton::Left, Modifiers::empty(), &mut manager, &ctx, &mut rec);
    session.drag(key_screen + DVec2::new(SCALE, 0.0), &mut manager, &ctx, &mut rec);
    session.release(key_screen + DVec2::new(SCALE, 0.0), &mut manager, &ctx, &mut rec);
    assert_eq!(rec.anim_starts, 1);
    assert_eq!(rec.commits, 1);
}

#[test]
fn middle_drag_locks_vertical_axis() {
    let settings = settings();
    let vp = viewport();
    let mut manager = manager_with_keys(&settings, &[(1.0, DVec3::ZERO)]);
    let mut rec = MemoryRecorder::new();
    let mut session = EditSession::new(ToolKind::Edit);
    let ctx = ctx(&vp, &settings, 1.0);

    let key_screen = vp.world_to_screen(DVec3::ZERO);
    session.press(key_screen, MouseButton::Middle, Modifiers::empty(), &mut manager, &ctx, &mut rec);
    // Diagonal drag; the Y component must be discarded.
    session.drag(key_screen + DVec2::new(SCALE, -SCALE), &mut manager, &ctx, &mut rec);
    session.release(key_screen + DVec2::new(SCALE, -SCALE), &mut manager, &ctx, &mut rec);

    assert!(approx_eq(curve_eval(&manager, Axis::X, 1.0), 1.0));
    assert!(approx_eq(curve_eval(&manager, Axis::Y, 1.0), 0.0));
}

#[test]
fn ctrl_middle_drag_locks_horizontal_plane() {
    let settings = settings();
    let vp = viewport();
    let mut manager = manager_with_keys(&settings, &[(1.0, DVec3::ZERO)]);
    let mut rec = MemoryRecorder::new();
    let mut session = EditSession::new(ToolKind::Edit);
    let ctx = ctx(&vp, &settings, 1.0);

    let key_screen = vp.world_to_screen(DVec3::ZERO);
    session.press(key_screen, MouseButton::Middle, Modifiers::CTRL, &mut manager, &ctx, &mut rec);
    session.drag(key_screen + DVec2::new(SCALE, -SCALE), &mut manager, &ctx, &mut rec);
    session.release(key_screen + DVec2::new(SCALE, -SCALE), &mut manager, &ctx, &mut rec);

    assert!(approx_eq(curve_eval(&manager, Axis::X, 1.0), 0.0));
    assert!(approx_eq(curve_eval(&manager, Axis::Y, 1.0), 1.0));
}

#[test]
fn drag_moves_every_selected_key() {
    let settings = settings();
    let vp = viewport();
    let mut manager = manager_with_keys(
        &settings,
        &[(1.0, DVec3::ZERO), (10.0, DVec3::new(10.0, 0.0, 0.0))],
    );
    let mut rec = MemoryRecorder::new();
    let mut session = EditSession::new(ToolKind::Edit);
    let ctx = ctx(&vp, &settings, 1.0);

    manager.path_mut(0).unwrap().select_key_at_time(10.0);

    // Shift-click extends instead of replacing.
    let key_screen = vp.world_to_screen(DVec3::ZERO);
    session.press(key_screen, MouseButton::Left, Modifiers::SHIFT, &mut manager, &ctx, &mut rec);
    assert_eq!(manager.path(0).unwrap().selected_key_times(), vec![1.0, 10.0]);

    session.drag(key_screen + DVec2::new(0.0, -SCALE), &mut manager, &ctx, &mut rec);
    session.release(key_screen + DVec2::new(0.0, -SCALE), &mut manager, &ctx, &mut rec);

    assert!(approx_eq(curve_eval(&manager, Axis::Y, 1.0), 1.0));
    assert!(approx_eq(curve_eval(&manager, Axis::Y, 10.0), 1.0));
}

#[test]
fn plain_click_on_selected_key_keeps_selection() {
    let settings = settings();
    let vp = viewport();
    let mut manager = manager_with_keys(
        &settings,
        &[(1.0, DVec3::ZERO), (10.0, DVec3::new(10.0, 0.0, 0.0))],
    );
    let mut rec = MemoryRecorder::new();
    let mut session = EditSession::new(ToolKind::Edit);
    let ctx = ctx(&vp, &settings, 1.0);

    {
        let path = manager.path_mut(0).unwrap();
        path.select_key_at_time(1.0);
        path.select_key_at_time(10.0);
    }

    let key_screen = vp.world_to_screen(DVec3::ZERO);
    session.press(key_screen, MouseButton::Left, Modifiers::empty(), &mut manager, &ctx, &mut rec);
    session.release(key_screen, &mut manager, &ctx, &mut rec);

    assert_eq!(manager.path(0).unwrap().selected_key_times(), vec![1.0, 10.0]);
}

// ============================================================================
// Tangent drags
// ============================================================================

#[test]
fn tangent_drag_retilts_the_curve() {
    let settings = settings();
    let vp = viewport();
    let mut manager = manager_with_keys(
        &settings,
        &[
            (1.0, DVec3::ZERO),
            (5.0, DVec3::new(20.0, 0.0, 0.0)),
            (10.0, DVec3::new(30.0, 0.0, 0.0)),
        ],
    );
    let mut rec = MemoryRecorder::new();
    let mut session = EditSession::new(ToolKind::Edit);
    let ctx = ctx(&vp, &settings, 1.0);

    let handle = manager
        .path(0)
        .unwrap()
        .keyframe(5.0)
        .unwrap()
        .in_tangent_world_from_curve;
    let handle_screen = vp.world_to_screen(handle);

    assert!(session.press(handle_screen, MouseButton::Left, Modifiers::empty(), &mut manager, &ctx, &mut rec));
    // Two world units up.
    session.drag(handle_screen + DVec2::new(0.0, -2.0 * SCALE), &mut manager, &ctx, &mut rec);
    session.release(handle_screen + DVec2::new(0.0, -2.0 * SCALE), &mut manager, &ctx, &mut rec);

    // The vertical drag component lands on the Y curve's in-tangent.
    let path = manager.path(0).unwrap();
    let curve = path.object().translate_curve(Axis::Y).unwrap();
    let id = curve.find(5.0).unwrap();
    let (angle, _) = curve.tangent_polar(id, pathline::TangentDir::In);
    assert!(
        approx_eq(angle, (-2.0_f64).atan()),
        "Expected {}, got {angle}",
        (-2.0_f64).atan()
    );
    assert_eq!(rec.anim_starts, 1);
    assert_eq!(rec.commits, 1);
}

// ============================================================================
// Drawing
// ============================================================================

#[test]
fn draw_gesture_steps_keys_forward() {
    let mut settings = settings();
    settings.draw_time_interval = 0.0;
    settings.draw_frame_interval = 5.0;
    let vp = viewport();
    let mut manager = manager_with_keys(
        &settings,
        &[(1.0, DVec3::ZERO), (10.0, DVec3::new(10.0, 0.0, 0.0))],
    );
    let mut rec = MemoryRecorder::new();
    let mut session = EditSession::new(ToolKind::Draw);
    let ctx = ctx(&vp, &settings, 1.0);

    let key_screen = vp.world_to_screen(DVec3::ZERO);
    assert!(session.press(key_screen, MouseButton::Left, Modifiers::empty(), &mut manager, &ctx, &mut rec));
    // The draw tool records eagerly: deleting the trailing keys must be
    // part of the transaction even if no drag follows.
    assert_eq!(rec.anim_starts, 1);
    assert!(manager.path(0).unwrap().is_drawing());

    // Everything after the grabbed key is gone.
    assert_eq!(key_times(&manager, Axis::X), vec![1.0]);

    session.drag(key_screen + DVec2::new(5.0 * SCALE, 0.0), &mut manager, &ctx, &mut rec);
    assert_eq!(key_times(&manager, Axis::X), vec![1.0, 6.0]);
    assert!(approx_eq(curve_eval(&manager, Axis::X, 6.0), 5.0));
    assert!(approx_eq(manager.path(0).unwrap().end_drawing_time(), 6.0));

    session.release(key_screen + DVec2::new(5.0 * SCALE, 0.0), &mut manager, &ctx, &mut rec);
    assert_eq!(rec.commits, 1);
    assert!(!manager.path(0).unwrap().is_drawing());
    assert!(manager.path(0).unwrap().selected_key_times().is_empty());
}

#[test]
fn middle_click_keys_the_current_time() {
    let settings = settings();
    let vp = viewport();
    let mut manager = manager_with_keys(
        &settings,
        &[(1.0, DVec3::ZERO), (10.0, DVec3::new(10.0, 0.0, 0.0))],
    );
    let mut rec = MemoryRecorder::new();
    let mut session = EditSession::new(ToolKind::Draw);
    let ctx = ctx(&vp, &settings, 5.0);

    // Cursor six world units right of the nearest earlier key.
    let cursor = vp.world_to_screen(DVec3::new(6.0, 0.0, 0.0));
    assert!(session.press(cursor, MouseButton::Middle, Modifiers::empty(), &mut manager, &ctx, &mut rec));

    assert_eq!(key_times(&manager, Axis::X), vec![1.0, 5.0, 10.0]);
    assert!(approx_eq(curve_eval(&manager, Axis::X, 5.0), 6.0));

    session.release(cursor, &mut manager, &ctx, &mut rec);
    assert_eq!(rec.commits, 1);
}

#[test]
fn stroke_reshapes_captured_keys() {
    let settings = settings();
    let vp = viewport();
    let mut manager = manager_with_keys(
        &settings,
        &[
            (1.0, DVec3::new(0.0, 0.0, 0.0)),
            (2.0, DVec3::new(1.0, 0.0, 0.0)),
            (3.0, DVec3::new(2.0, 0.0, 0.0)),
            (4.0, DVec3::new(3.0, 0.0, 0.0)),
            (5.0, DVec3::new(4.0, 0.0, 0.0)),
        ],
    );
    let mut rec = MemoryRecorder::new();
    let mut session = EditSession::new(ToolKind::Draw);
    let ctx = ctx(&vp, &settings, 1.0);

    // Ctrl-grab the first key, then stroke right and upward across the run.
    let start = vp.world_to_screen(DVec3::ZERO);
    assert!(session.press(start, MouseButton::Left, Modifiers::CTRL, &mut manager, &ctx, &mut rec));
    session.drag(start + DVec2::new(21.0, -5.0), &mut manager, &ctx, &mut rec);
    session.drag(start + DVec2::new(42.0, -10.0), &mut manager, &ctx, &mut rec);
    session.release(start + DVec2::new(42.0, -10.0), &mut manager, &ctx, &mut rec);

    // The grabbed key stays put; the captured run lifted toward the stroke.
    assert_eq!(key_times(&manager, Axis::X), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    assert!(approx_eq(curve_eval(&manager, Axis::Y, 1.0), 0.0));
    for t in [2.0, 3.0, 4.0, 5.0] {
        let y = curve_eval(&manager, Axis::Y, t);
        assert!(y > 0.0, "Expected key at {t} above the old path, got y={y}");
    }
    assert_eq!(rec.commits, 1);
}

// ============================================================================
// Marquee
// ============================================================================

#[test]
fn press_on_empty_space_starts_marquee() {
    let settings = settings();
    let vp = viewport();
    let mut manager = manager_with_keys(&settings, &[(1.0, DVec3::ZERO)]);
    let mut rec = MemoryRecorder::new();
    let mut session = EditSession::new(ToolKind::Edit);
    let ctx = ctx(&vp, &settings, 1.0);

    assert!(session.press(DVec2::new(10.0, 10.0), MouseButton::Left, Modifiers::SHIFT, &mut manager, &ctx, &mut rec));
    session.drag(DVec2::new(60.0, 90.0), &mut manager, &ctx, &mut rec);
    let outcome = session.release(DVec2::new(60.0, 90.0), &mut manager, &ctx, &mut rec);

    match outcome {
        SessionOutcome::Marquee { rect, mode } => {
            assert_eq!(mode, SelectionMode::Xor);
            assert!(rect.contains(DVec2::new(30.0, 50.0)));
            assert!(!rect.contains(DVec2::new(70.0, 50.0)));
        }
        SessionOutcome::None => panic!("Expected a marquee outcome"),
    }
    assert_eq!(rec.anim_starts, 0);
}

#[test]
fn hidden_key_frames_swallow_the_gesture() {
    let mut settings = settings();
    settings.show_key_frames = false;
    let vp = viewport();
    let mut manager = manager_with_keys(&settings, &[(1.0, DVec3::ZERO)]);
    let mut rec = MemoryRecorder::new();
    let mut session = EditSession::new(ToolKind::Edit);
    let ctx = ctx(&vp, &settings, 1.0);

    let key_screen = vp.world_to_screen(DVec3::ZERO);
    assert!(!session.press(key_screen, MouseButton::Left, Modifiers::empty(), &mut manager, &ctx, &mut rec));
    let outcome = session.release(key_screen, &mut manager, &ctx, &mut rec);
    assert_eq!(outcome, SessionOutcome::None);
}

#[test]
fn locked_mode_swallows_the_gesture() {
    let mut settings = settings();
    let vp = viewport();
    let mut manager = manager_with_keys(&settings, &[(1.0, DVec3::ZERO)]);
    settings.locked_mode = true;
    settings.locked_mode_interactive = false;
    let mut rec = MemoryRecorder::new();
    let mut session = EditSession::new(ToolKind::Edit);
    let ctx = ctx(&vp, &settings, 1.0);

    let key_screen = vp.world_to_screen(DVec3::ZERO);
    assert!(!session.press(key_screen, MouseButton::Left, Modifiers::empty(), &mut manager, &ctx, &mut rec));
    session.drag(key_screen + DVec2::new(SCALE, 0.0), &mut manager, &ctx, &mut rec);
    session.release(key_screen + DVec2::new(SCALE, 0.0), &mut manager, &ctx, &mut rec);

    assert!(approx_eq(curve_eval(&manager, Axis::X, 1.0), 0.0));
    assert_eq!(rec.anim_starts, 0);
}

#[test]
fn interactive_locked_mode_still_edits() {
    let mut settings = settings();
    let vp = viewport();
    let mut manager = manager_with_keys(&settings, &[(1.0, DVec3::ZERO)]);
    settings.locked_mode = true;
    settings.locked_mode_interactive = true;
    let mut rec = MemoryRecorder::new();
    let mut session = EditSession::new(ToolKind::Edit);
    let ctx = ctx(&vp, &settings, 1.0);

    let key_screen = vp.world_to_screen(DVec3::ZERO);
    assert!(session.press(key_screen, MouseButton::Left, Modifiers::empty(), &mut manager, &ctx, &mut rec));
    session.drag(key_screen + DVec2::new(SCALE, 0.0), &mut manager, &ctx, &mut rec);
    session.release(key_screen + DVec2::new(SCALE, 0.0), &mut manager, &ctx, &mut rec);

    assert!(approx_eq(curve_eval(&manager, Axis::X, 1.0), 1.0));
}

// ============================================================================
// Guarded paths
// ============================================================================

#[test]
fn layered_channels_refuse_edits() {
    let settings = settings();
    let vp = viewport();

    let mut object = MemoryObject::new("layered");
    let mut rec_setup = NoUndo;
    object.key_translation(1.0, DVec3::ZERO, &mut rec_setup);
    object.set_has_animation_layers(true);

    let mut manager = PathManager::new();
    manager.set_selection(vec![(1, Box::new(object) as _)], &settings, 1.0);
    manager.refresh(&settings, None, 1.0);

    let mut rec = MemoryRecorder::new();
    let mut session = EditSession::new(ToolKind::Edit);
    let ctx = ctx(&vp, &settings, 1.0);

    let key_screen = vp.world_to_screen(DVec3::ZERO);
    session.press(key_screen, MouseButton::Left, Modifiers::empty(), &mut manager, &ctx, &mut rec);
    session.drag(key_screen + DVec2::new(SCALE, 0.0), &mut manager, &ctx, &mut rec);
    session.release(key_screen + DVec2::new(SCALE, 0.0), &mut manager, &ctx, &mut rec);

    assert!(approx_eq(curve_eval(&manager, Axis::X, 1.0), 0.0));
}
