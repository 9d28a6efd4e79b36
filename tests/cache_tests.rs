//! Matrix and camera cache tests
//!
//! Tests for:
//! - MatrixCache fill-on-demand, idempotence and forced re-evaluation
//! - CameraCache window refresh, top-up and inverse storage
//! - Camera-moved notifications and invalidation
//! - Parent matrix cache expansion to completion

use std::cell::Cell;

use glam::{DMat4, DVec3};
use pathline::cache::{CameraCache, MatrixCache};
use pathline::host::memory::{MemoryCamera, MemoryObject};
use pathline::{NoUndo, PathManager, Settings};

// ============================================================================
// Helper
// ============================================================================

const EPSILON: f64 = 1e-9;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn settings_with_window(start: f64, end: f64, frames: f64) -> Settings {
    let mut settings = Settings::default();
    settings.start_time = start;
    settings.end_time = end;
    settings.frames_back = frames;
    settings.frames_front = frames;
    settings
}

// ============================================================================
// MatrixCache
// ============================================================================

#[test]
fn matrix_cache_evaluates_once() {
    let mut cache = MatrixCache::new();
    let calls = Cell::new(0);
    let eval = |t: f64| {
        calls.set(calls.get() + 1);
        DMat4::from_translation(DVec3::new(t, 0.0, 0.0))
    };

    let a = cache.ensure_with(5.0, false, eval);
    let b = cache.ensure_with(5.0, false, eval);

    assert_eq!(calls.get(), 1);
    assert!(approx_eq(a.w_axis.x, 5.0));
    assert!(approx_eq(b.w_axis.x, 5.0));
    assert_eq!(cache.len(), 1);
    assert!(cache.contains(5.0));
}

#[test]
fn matrix_cache_force_reevaluates() {
    let mut cache = MatrixCache::new();
    cache.ensure_with(5.0, false, |_| DMat4::from_translation(DVec3::X));
    let m = cache.ensure_with(5.0, true, |_| DMat4::from_translation(DVec3::Y));
    assert!(approx_eq(m.w_axis.y, 1.0));
    assert!(approx_eq(cache.get(5.0).map_or(0.0, |m| m.w_axis.y), 1.0));
}

#[test]
fn matrix_cache_clear_empties() {
    let mut cache = MatrixCache::new();
    cache.ensure_with(1.0, false, |_| DMat4::IDENTITY);
    assert!(!cache.is_empty());
    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.get(1.0), None);
}

// ============================================================================
// CameraCache
// ============================================================================

#[test]
fn camera_cache_refresh_fills_display_window() {
    let mut cache = CameraCache::new();
    cache.initialize(640, 480);
    assert!(cache.needs_refresh());

    let camera = MemoryCamera::fixed(DMat4::from_translation(DVec3::new(0.0, 0.0, 10.0)));
    let settings = settings_with_window(0.0, 20.0, 5.0);

    cache.refresh(&camera, &settings, 10.0);
    // Window [5, 15], one entry per whole frame.
    assert_eq!(cache.len(), 11);
    assert!(!cache.needs_refresh());
}

#[test]
fn camera_cache_stores_inverse_world() {
    let mut cache = CameraCache::new();
    let world = DMat4::from_translation(DVec3::new(0.0, 0.0, 10.0));
    let camera = MemoryCamera::fixed(world);

    let m = cache.ensure_at(&camera, 3.0, false);
    assert!(approx_eq(m.w_axis.z, -10.0), "Expected -10.0, got {}", m.w_axis.z);
    assert!(approx_eq(cache.current_camera_matrix(3.0).w_axis.z, 10.0));
}

#[test]
fn camera_cache_fill_window_only_tops_up() {
    let mut cache = CameraCache::new();
    let moving = MemoryCamera::moving(DMat4::IDENTITY, DVec3::new(1.0, 0.0, 0.0));
    let settings = settings_with_window(0.0, 20.0, 2.0);

    cache.refresh(&moving, &settings, 5.0);
    let before = cache.matrix(5.0);

    // A wider window around a new time keeps the old entries as they are.
    cache.fill_window(&moving, &settings, 6.0);
    assert_eq!(cache.matrix(5.0), before);
    assert!(cache.matrix(8.0).is_some());
}

#[test]
fn camera_cache_ensure_at_force_reevaluates() {
    let mut cache = CameraCache::new();
    let a = MemoryCamera::fixed(DMat4::from_translation(DVec3::new(1.0, 0.0, 0.0)));
    let b = MemoryCamera::fixed(DMat4::from_translation(DVec3::new(2.0, 0.0, 0.0)));

    cache.ensure_at(&a, 1.0, false);
    let cached = cache.ensure_at(&b, 1.0, false);
    assert!(approx_eq(cached.w_axis.x, -1.0));

    let forced = cache.ensure_at(&b, 1.0, true);
    assert!(approx_eq(forced.w_axis.x, -2.0));
}

#[test]
fn camera_moved_marks_for_refresh() {
    let mut cache = CameraCache::new();
    cache.initialize(640, 480);
    let camera = MemoryCamera::fixed(DMat4::IDENTITY);
    let settings = settings_with_window(0.0, 10.0, 2.0);
    cache.refresh(&camera, &settings, 5.0);
    assert!(!cache.needs_refresh());

    cache.on_camera_moved();
    assert!(cache.needs_refresh());
}

#[test]
fn camera_cache_clear_requires_refresh() {
    let mut cache = CameraCache::new();
    let camera = MemoryCamera::fixed(DMat4::IDENTITY);
    cache.ensure_at(&camera, 1.0, false);
    cache.clear();
    assert!(cache.is_empty());
    assert!(cache.needs_refresh());
}

// ============================================================================
// Parent matrix cache expansion
// ============================================================================

#[test]
fn expansion_completes_within_budget() {
    let settings = settings_with_window(0.0, 20.0, 10.0);
    let mut manager = PathManager::new();

    let mut object = MemoryObject::new("mover");
    let mut rec = NoUndo;
    object.key_translation(0.0, DVec3::ZERO, &mut rec);
    object.key_translation(20.0, DVec3::new(20.0, 0.0, 0.0), &mut rec);
    manager.set_selection(vec![(1, Box::new(object) as _)], &settings, 10.0);

    assert!(!manager.cache_done());
    assert!(manager.expand_matrix_caches(&settings, 10.0));
    assert!(manager.cache_done());

    // One cached matrix per whole frame of [0, 20].
    let path = manager.path(0).unwrap();
    assert_eq!(path.parent_matrix_cache_len(), 21);
    assert!(path.cache_done());
}

#[test]
fn expansion_restart_after_clear() {
    let settings = settings_with_window(0.0, 20.0, 10.0);
    let mut manager = PathManager::new();

    let object = MemoryObject::new("still");
    manager.set_selection(vec![(1, Box::new(object) as _)], &settings, 10.0);
    assert!(manager.expand_matrix_caches(&settings, 10.0));

    manager.clear_parent_matrix_caches();
    assert!(!manager.cache_done());
    assert_eq!(manager.path(0).unwrap().parent_matrix_cache_len(), 0);

    assert!(manager.expand_matrix_caches(&settings, 10.0));
}
