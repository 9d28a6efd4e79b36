//! Hit testing and marquee selection tests
//!
//! Tests for:
//! - Key / tangent / frame hit precedence and radii
//! - Tangent handles only hit while shown
//! - Marquee containment and selection-mode algebra

use glam::{DVec2, DVec3};
use pathline::hit::apply_key_selection;
use pathline::host::memory::{MemoryObject, OrthoViewport};
use pathline::{
    AnimCurve, Axis, HitTester, Marquee, Modifiers, MotionPath, NoUndo, PathHit, SelectionMode,
    Settings, TangentDir, Viewport,
};

// ============================================================================
// Helper
// ============================================================================

const SCALE: f64 = 10.0;

fn viewport() -> OrthoViewport {
    OrthoViewport::new(SCALE, 400, 400, 100.0)
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.start_time = 0.0;
    settings.end_time = 30.0;
    settings.frames_back = 100.0;
    settings.frames_front = 100.0;
    settings
}

/// X-only path with a bent middle key so its tangent handles sit away from
/// the key itself on screen.
fn bent_path(settings: &Settings) -> MotionPath {
    let mut object = MemoryObject::new("bent");
    let mut rec = NoUndo;
    let curve = object.translate_memory_curve_mut(Axis::X);
    for &(t, v) in &[(1.0, 0.0), (5.0, 20.0), (10.0, 30.0)] {
        curve.add_key(
            t,
            v,
            pathline::TangentType::default(),
            pathline::TangentType::default(),
            &mut rec,
        );
    }

    let mut path = MotionPath::new(1, Box::new(object));
    path.set_time_range(0.0, 30.0);
    path.set_display_time_range(0.0, 30.0);
    path.refresh(settings, None, 3.0);
    path
}

// ============================================================================
// Hit precedence
// ============================================================================

#[test]
fn cursor_on_key_hits_key() {
    let settings = settings();
    let vp = viewport();
    let mut path = bent_path(&settings);
    let tester = HitTester::new(&vp, &settings);

    let key_screen = vp.world_to_screen(DVec3::new(20.0, 0.0, 0.0));
    let hit = tester.path_hit(key_screen, &mut path, None);
    assert_eq!(hit, Some(PathHit::Keyframe { time: 5.0 }));
}

#[test]
fn key_radius_scales_with_frame_size() {
    let settings = settings();
    let vp = viewport();
    let mut path = bent_path(&settings);
    let tester = HitTester::new(&vp, &settings);

    // Radius is frame_size * 1.5 / 2 = 5.25 px for the default size.
    let key_screen = vp.world_to_screen(DVec3::new(20.0, 0.0, 0.0));
    let inside = key_screen + DVec2::new(5.0, 0.0);
    let outside = key_screen + DVec2::new(6.0, 0.0);

    assert_eq!(tester.key_hit(inside, &path), Some(5.0));
    assert_eq!(tester.key_hit(outside, &path), None);
}

#[test]
fn cursor_on_tangent_handle_hits_tangent() {
    let settings = settings();
    let vp = viewport();
    let mut path = bent_path(&settings);
    let tester = HitTester::new(&vp, &settings);

    let key = path.keyframe(5.0).unwrap();
    assert!(key.show_in_tangent);
    let handle_screen = vp.world_to_screen(key.in_tangent_world_from_curve);

    // The handle sits well clear of every key at this scale.
    let hit = tester.path_hit(handle_screen, &mut path, None);
    assert_eq!(
        hit,
        Some(PathHit::Tangent {
            time: 5.0,
            dir: TangentDir::In
        })
    );
}

#[test]
fn hidden_tangents_do_not_hit() {
    let settings = settings();
    let vp = viewport();
    let mut path = bent_path(&settings);

    // Grab the visible handle position first, then hide all tangents by
    // flipping the path into drawing mode.
    let handle = path.keyframe(5.0).unwrap().in_tangent_world_from_curve;
    path.set_is_drawing(true);
    path.set_end_drawing_time(30.0);
    path.refresh(&settings, None, 3.0);

    let tester = HitTester::new(&vp, &settings);
    assert_eq!(tester.tangent_hit(vp.world_to_screen(handle), &path), None);
}

#[test]
fn cursor_on_path_hits_frame() {
    let settings = settings();
    let vp = viewport();
    let mut path = bent_path(&settings);
    let tester = HitTester::new(&vp, &settings);

    // Display position of an unkeyed whole frame along the path.
    let frames = path.frame_positions(&settings, None);
    let (time, world) = frames
        .iter()
        .find(|(t, _)| (*t - 3.0).abs() < 1e-9)
        .copied()
        .unwrap();
    let hit = tester.path_hit(vp.world_to_screen(world), &mut path, None);
    assert_eq!(hit, Some(PathHit::Frame { time }));
}

#[test]
fn empty_space_hits_nothing() {
    let settings = settings();
    let vp = viewport();
    let mut path = bent_path(&settings);
    let tester = HitTester::new(&vp, &settings);

    assert_eq!(tester.path_hit(DVec2::new(5.0, 5.0), &mut path, None), None);
}

#[test]
fn first_path_hit_reports_path_index() {
    let settings = settings();
    let vp = viewport();
    let tester = HitTester::new(&vp, &settings);

    let mut far = MemoryObject::new("far");
    let mut rec = NoUndo;
    far.key_translation(1.0, DVec3::new(-15.0, -15.0, 0.0), &mut rec);
    far.key_translation(10.0, DVec3::new(-15.0, 15.0, 0.0), &mut rec);
    let mut far_path = MotionPath::new(2, Box::new(far));
    far_path.set_time_range(0.0, 30.0);
    far_path.set_display_time_range(0.0, 30.0);
    far_path.refresh(&settings, None, 3.0);

    let mut paths = vec![bent_path(&settings), far_path];
    let cursor = vp.world_to_screen(DVec3::new(-15.0, -15.0, 0.0));
    let hit = tester.first_path_hit(cursor, &mut paths, None);
    assert_eq!(hit, Some((1, PathHit::Keyframe { time: 1.0 })));
}

// ============================================================================
// Marquee
// ============================================================================

#[test]
fn marquee_normalizes_corners() {
    let rect = Marquee::from_corners(DVec2::new(50.0, 10.0), DVec2::new(10.0, 50.0));
    assert!(rect.contains(DVec2::new(30.0, 30.0)));
    assert!(!rect.contains(DVec2::new(5.0, 30.0)));
}

#[test]
fn keys_in_marquee_collects_contained_keys() {
    let settings = settings();
    let vp = viewport();
    let path = bent_path(&settings);
    let tester = HitTester::new(&vp, &settings);

    let a = vp.world_to_screen(DVec3::new(-1.0, -1.0, 0.0));
    let b = vp.world_to_screen(DVec3::new(21.0, 1.0, 0.0));
    let rect = Marquee::from_corners(a, b);

    let times = tester.keys_in_marquee(rect, &path);
    assert_eq!(times, vec![1.0, 5.0]);
}

// ============================================================================
// Selection modes
// ============================================================================

#[test]
fn selection_mode_from_modifiers() {
    assert_eq!(
        SelectionMode::from_modifiers(Modifiers::empty()),
        SelectionMode::Replace
    );
    assert_eq!(
        SelectionMode::from_modifiers(Modifiers::SHIFT),
        SelectionMode::Xor
    );
    assert_eq!(
        SelectionMode::from_modifiers(Modifiers::CTRL),
        SelectionMode::Remove
    );
    assert_eq!(
        SelectionMode::from_modifiers(Modifiers::SHIFT | Modifiers::CTRL),
        SelectionMode::Add
    );
}

#[test]
fn apply_selection_modes() {
    let settings = settings();
    let mut path = bent_path(&settings);

    apply_key_selection(&mut path, &[1.0, 5.0], SelectionMode::Replace);
    assert_eq!(path.selected_key_times(), vec![1.0, 5.0]);

    apply_key_selection(&mut path, &[10.0], SelectionMode::Add);
    assert_eq!(path.selected_key_times(), vec![1.0, 5.0, 10.0]);

    apply_key_selection(&mut path, &[5.0], SelectionMode::Remove);
    assert_eq!(path.selected_key_times(), vec![1.0, 10.0]);

    apply_key_selection(&mut path, &[1.0, 5.0], SelectionMode::Xor);
    assert_eq!(path.selected_key_times(), vec![5.0, 10.0]);

    apply_key_selection(&mut path, &[], SelectionMode::Replace);
    assert!(path.selected_key_times().is_empty());
}
