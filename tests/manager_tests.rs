//! Path manager tests
//!
//! Tests for:
//! - Scene selection tracking and path reuse
//! - Locked mode pinning the tracked set
//! - Global time range changes invalidating caches
//! - Host event dispatch
//! - Buffer path lifecycle and bounds errors
//! - Manager-level copy / paste
//! - Drawing through the recording surface

use glam::{DMat4, DVec3};
use pathline::host::memory::{MemoryCamera, MemoryObject, MemoryRecorder, RecordingSurface};
use pathline::{
    AnimCurve, Axis, DrawMode, HostEvent, NoUndo, PathManager, PathlineError, SceneObject,
    Settings,
};

// ============================================================================
// Helper
// ============================================================================

const EPSILON: f64 = 1e-9;

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

fn object_with_keys(name: &str, keys: &[(f64, DVec3)]) -> MemoryObject {
    let mut object = MemoryObject::new(name);
    let mut rec = NoUndo;
    for &(t, p) in keys {
        object.key_translation(t, p, &mut rec);
    }
    object
}

fn simple_manager(settings: &Settings) -> PathManager {
    let object = object_with_keys(
        "actor",
        &[(1.0, DVec3::ZERO), (10.0, DVec3::new(10.0, 0.0, 0.0))],
    );
    let mut manager = PathManager::new();
    manager.set_selection(vec![(1, Box::new(object) as _)], settings, 1.0);
    manager
}

// ============================================================================
// Selection tracking
// ============================================================================

#[test]
fn selection_rebuild_reuses_surviving_paths() {
    let settings = settings();
    let mut manager = simple_manager(&settings);
    assert!(manager.expand_matrix_caches(&settings, 1.0));
    let cached = manager.path(0).unwrap().parent_matrix_cache_len();
    assert!(cached > 0);

    // Same id again, plus a newcomer: the survivor keeps its cache.
    let survivor = object_with_keys("actor", &[(1.0, DVec3::ZERO)]);
    let newcomer = object_with_keys("extra", &[(2.0, DVec3::ONE)]);
    manager.set_selection(
        vec![(1, Box::new(survivor) as _), (2, Box::new(newcomer) as _)],
        &settings,
        1.0,
    );

    assert_eq!(manager.path_count(), 2);
    assert_eq!(manager.path(0).unwrap().parent_matrix_cache_len(), cached);
    assert_eq!(manager.path(1).unwrap().parent_matrix_cache_len(), 0);
    assert!(!manager.cache_done());
}

#[test]
fn deselected_paths_are_dropped() {
    let settings = settings();
    let mut manager = simple_manager(&settings);
    manager.set_selection(Vec::new(), &settings, 1.0);
    assert_eq!(manager.path_count(), 0);
}

#[test]
fn locked_mode_pins_the_tracked_set() {
    let mut settings = settings();
    let mut manager = simple_manager(&settings);

    settings.locked_mode = true;
    manager.set_selection(Vec::new(), &settings, 1.0);
    assert_eq!(manager.path_count(), 1);
}

#[test]
fn previous_key_selection_is_snapshotted() {
    let settings = settings();
    let mut manager = simple_manager(&settings);
    manager.refresh(&settings, None, 1.0);

    manager.path_mut(0).unwrap().select_key_at_time(1.0);
    manager.store_previous_key_selection();
    manager.path_mut(0).unwrap().select_key_at_time(10.0);

    assert_eq!(manager.previous_key_selection(), &[vec![1.0]]);
    assert_eq!(manager.current_key_selection(), vec![vec![1.0, 10.0]]);

    manager.deselect_all_keys();
    assert_eq!(manager.current_key_selection(), vec![Vec::<f64>::new()]);
}

// ============================================================================
// Time ranges and events
// ============================================================================

#[test]
fn time_range_change_drops_caches() {
    let mut settings = settings();
    let mut manager = simple_manager(&settings);
    assert!(manager.expand_matrix_caches(&settings, 1.0));

    manager.set_time_range(&mut settings, 0.0, 50.0, 1.0);

    assert!(approx_eq(settings.end_time, 50.0));
    assert!(!manager.cache_done());
    assert_eq!(manager.path(0).unwrap().parent_matrix_cache_len(), 0);
    assert!(manager.camera_cache().is_empty());
}

#[test]
fn collapsed_time_range_is_repaired() {
    let mut settings = settings();
    let mut manager = simple_manager(&settings);
    manager.set_time_range(&mut settings, 5.0, 5.0, 1.0);
    assert!(approx_eq(settings.start_time, 5.0));
    assert!(approx_eq(settings.end_time, 6.0));
}

#[test]
fn pivot_toggle_event_invalidates_matrices() {
    let mut settings = settings();
    let mut manager = simple_manager(&settings);
    assert!(manager.expand_matrix_caches(&settings, 1.0));

    manager.on_event(HostEvent::PivotModeToggled, &mut settings, 1.0);
    assert!(!manager.cache_done());
    assert_eq!(manager.path(0).unwrap().parent_matrix_cache_len(), 0);
}

#[test]
fn camera_moved_event_marks_camera_cache() {
    let mut settings = settings();
    let mut manager = simple_manager(&settings);
    let camera = MemoryCamera::fixed(DMat4::from_translation(DVec3::new(0.0, 0.0, 10.0)));
    manager
        .camera_cache_mut()
        .refresh(&camera, &settings, 1.0);
    assert!(!manager.camera_cache().needs_refresh());

    manager.on_event(HostEvent::CameraMoved, &mut settings, 1.0);
    assert!(manager.camera_cache().needs_refresh());
}

// ============================================================================
// Buffer paths
// ============================================================================

#[test]
fn buffer_path_lifecycle() {
    let settings = settings();
    let mut manager = simple_manager(&settings);
    manager.refresh(&settings, None, 1.0);

    manager.add_buffer_paths(&settings);
    manager.add_buffer_paths(&settings);
    assert_eq!(manager.buffer_path_count(), 2);

    manager.set_buffer_path_selected(0, true).unwrap();
    assert!(manager.buffer_path(0).unwrap().is_selected());
    assert!(!manager.buffer_path(1).unwrap().is_selected());

    manager.delete_buffer_path_at(0).unwrap();
    assert_eq!(manager.buffer_path_count(), 1);

    manager.delete_all_buffer_paths();
    assert_eq!(manager.buffer_path_count(), 0);
}

#[test]
fn buffer_path_bounds_are_checked() {
    let settings = settings();
    let mut manager = simple_manager(&settings);

    assert!(matches!(
        manager.buffer_path(0),
        Err(PathlineError::IndexOutOfBounds { .. })
    ));
    assert!(matches!(
        manager.delete_buffer_path_at(3),
        Err(PathlineError::IndexOutOfBounds { .. })
    ));
    assert!(matches!(
        manager.set_buffer_path_selected(0, true),
        Err(PathlineError::IndexOutOfBounds { .. })
    ));
}

// ============================================================================
// Clipboard plumbing
// ============================================================================

#[test]
fn manager_copy_paste_between_paths() {
    let settings = settings();
    let mut manager = PathManager::new();
    let source = object_with_keys(
        "source",
        &[(1.0, DVec3::ZERO), (5.0, DVec3::new(5.0, 0.0, 0.0))],
    );
    let target = MemoryObject::new("target");
    manager.set_selection(
        vec![(1, Box::new(source) as _), (2, Box::new(target) as _)],
        &settings,
        1.0,
    );
    manager.refresh(&settings, None, 1.0);

    manager.path_mut(0).unwrap().select_all_keys();
    manager.copy_selected_keys(0, &settings).unwrap();
    assert_eq!(manager.clipboard().len(), 2);

    let mut rec = MemoryRecorder::new();
    manager.paste_keys(1, 10.0, false, &settings, &mut rec).unwrap();

    let path = manager.path(1).unwrap();
    let curve = path.object().translate_curve(Axis::X).unwrap();
    assert!(approx_eq(curve.evaluate(10.0), 0.0));
    assert!(approx_eq(curve.evaluate(14.0), 5.0));

    assert!(matches!(
        manager.copy_selected_keys(9, &settings),
        Err(PathlineError::IndexOutOfBounds { .. })
    ));
}

// ============================================================================
// Drawing
// ============================================================================

#[test]
fn draw_emits_nothing_while_disabled() {
    let mut settings = settings();
    settings.enabled = false;
    let mut manager = simple_manager(&settings);

    let mut surface = RecordingSurface::new();
    manager.draw(&mut surface, &settings, None, 1.0);
    assert_eq!(surface.lines, 0);
    assert_eq!(surface.points, 0);
}

#[test]
fn draw_emits_path_and_keys() {
    let settings = settings();
    let mut manager = simple_manager(&settings);

    let mut surface = RecordingSurface::new();
    manager.draw(&mut surface, &settings, None, 1.0);
    assert!(surface.lines > 0, "Expected path segments to be drawn");
    assert!(surface.points > 0, "Expected key frame points to be drawn");
}

#[test]
fn camera_space_draw_fills_the_camera_cache() {
    let mut settings = settings();
    settings.draw_mode = DrawMode::CameraSpace;
    let mut manager = simple_manager(&settings);
    let camera = MemoryCamera::fixed(DMat4::from_translation(DVec3::new(0.0, 0.0, 10.0)));

    let mut surface = RecordingSurface::new();
    manager.draw(&mut surface, &settings, Some(&camera), 1.0);

    // Window [0, 30], one inverse matrix per whole frame. The fractional
    // samples used to re-derive tangent directions are transient and must
    // not show up here.
    assert_eq!(manager.camera_cache().len(), 31);
}

#[test]
fn port_resize_reinitializes_camera_cache() {
    let mut settings = settings();
    settings.draw_mode = DrawMode::CameraSpace;
    settings.port_width = 400;
    settings.port_height = 400;
    let mut manager = simple_manager(&settings);
    let camera = MemoryCamera::fixed(DMat4::from_translation(DVec3::new(0.0, 0.0, 10.0)));

    let mut surface = RecordingSurface::new();
    manager.draw(&mut surface, &settings, Some(&camera), 1.0);
    assert!(manager.camera_cache().is_initialized());
    assert_eq!(manager.camera_cache().port_width, 400);
    assert!(!manager.camera_cache().needs_refresh());

    settings.port_width = 800;
    settings.port_height = 600;
    manager.draw(&mut surface, &settings, Some(&camera), 1.0);
    assert_eq!(manager.camera_cache().port_width, 800);
    assert_eq!(manager.camera_cache().port_height, 600);
    assert_eq!(manager.camera_cache().len(), 31);
}
