//! Owner of all live paths, buffer paths, camera cache and the clipboard.

use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use rustc_hash::FxHashMap;

use crate::buffer::BufferPath;
use crate::cache::CameraCache;
use crate::clipboard::{self, KeyClipboard};
use crate::config::{DrawMode, Settings};
use crate::errors::{PathlineError, Result};
use crate::host::{CameraSource, DrawSurface, SceneObject, UndoRecorder};
use crate::path::{CameraContext, MotionPath};

/// Wall-clock budget for one round of matrix cache expansion; the embedding
/// layer re-invokes on idle until everything is cached.
pub const CACHE_EXPANSION_BUDGET: Duration = Duration::from_secs(2);

/// Host-side notifications the embedding layer forwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HostEvent {
    TimeChanged,
    CameraMoved,
    TimeRangeChanged { start: f64, end: f64 },
    PivotModeToggled,
    CurvesEdited,
}

#[derive(Default)]
pub struct PathManager {
    paths: Vec<MotionPath>,
    buffer_paths: Vec<BufferPath>,
    camera_cache: CameraCache,
    clipboard: KeyClipboard,
    previous_key_selection: Vec<Vec<f64>>,
    cache_done: bool,
}

impl PathManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Path access =====

    #[must_use]
    pub fn paths(&self) -> &[MotionPath] {
        &self.paths
    }

    pub fn paths_mut(&mut self) -> &mut [MotionPath] {
        &mut self.paths
    }

    #[must_use]
    pub fn path(&self, index: usize) -> Option<&MotionPath> {
        self.paths.get(index)
    }

    pub fn path_mut(&mut self, index: usize) -> Option<&mut MotionPath> {
        self.paths.get_mut(index)
    }

    #[must_use]
    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn camera_cache(&self) -> &CameraCache {
        &self.camera_cache
    }

    pub fn camera_cache_mut(&mut self) -> &mut CameraCache {
        &mut self.camera_cache
    }

    /// Paths and camera cache borrowed together, for callers that need a
    /// [`CameraContext`] while iterating paths.
    pub fn split_paths_and_camera(&mut self) -> (&mut [MotionPath], &mut CameraCache) {
        (&mut self.paths, &mut self.camera_cache)
    }

    // ===== Selection tracking =====

    /// Rebuilds the path list for a new scene selection, reusing surviving
    /// paths so their matrix caches and key selections carry over.
    pub fn set_selection(
        &mut self,
        objects: Vec<(u64, Box<dyn SceneObject>)>,
        settings: &Settings,
        now: f64,
    ) {
        if settings.locked_mode {
            trace!("locked mode active, keeping current paths");
            return;
        }

        let mut existing: FxHashMap<u64, MotionPath> = self
            .paths
            .drain(..)
            .map(|p| (p.object_id(), p))
            .collect();

        for (id, object) in objects {
            let path = match existing.remove(&id) {
                Some(path) => path,
                None => {
                    debug!("tracking new path for {}", object.name());
                    let mut path = MotionPath::new(id, object);
                    path.set_time_range(settings.start_time, settings.end_time);
                    self.cache_done = false;
                    path
                }
            };
            self.paths.push(path);
        }

        self.refresh_display_time_range(settings, now);
    }

    pub fn store_previous_key_selection(&mut self) {
        self.previous_key_selection = self.current_key_selection();
    }

    /// Selected key times per path, in path order.
    #[must_use]
    pub fn current_key_selection(&self) -> Vec<Vec<f64>> {
        self.paths
            .iter()
            .map(MotionPath::selected_key_times)
            .collect()
    }

    #[must_use]
    pub fn previous_key_selection(&self) -> &[Vec<f64>] {
        &self.previous_key_selection
    }

    pub fn deselect_all_keys(&mut self) {
        for path in &mut self.paths {
            path.deselect_all_keys();
        }
    }

    // ===== Time ranges =====

    /// Re-clamps each path's display window around the current time.
    pub fn refresh_display_time_range(&mut self, settings: &Settings, now: f64) {
        let (start, end) = settings.display_window(now);
        for path in &mut self.paths {
            path.set_display_time_range(start, end);
        }
    }

    /// Applies a new global time range and drops every time-keyed cache.
    pub fn set_time_range(&mut self, settings: &mut Settings, start: f64, end: f64, now: f64) {
        settings.set_time_range(start, end);
        for path in &mut self.paths {
            path.set_time_range(settings.start_time, settings.end_time);
            path.clear_parent_matrix_cache();
        }
        self.camera_cache.clear();
        self.cache_done = false;
        self.refresh_display_time_range(settings, now);
    }

    // ===== Matrix cache expansion =====

    #[must_use]
    pub fn cache_done(&self) -> bool {
        self.cache_done
    }

    pub fn clear_parent_matrix_caches(&mut self) {
        for path in &mut self.paths {
            path.clear_parent_matrix_cache();
        }
        self.cache_done = false;
    }

    /// Grows every path's matrix cache outward from `now`, one frame ring at
    /// a time, until done or the time budget runs out. Returns whether all
    /// paths finished.
    pub fn expand_matrix_caches(&mut self, settings: &Settings, now: f64) -> bool {
        if self.cache_done {
            return true;
        }

        let started = Instant::now();
        let max_expansion = settings.frames_back.max(settings.frames_front) as i64;

        for i in 0..=max_expansion {
            for path in &mut self.paths {
                path.grow_parent_matrix_cache(now, i as f64, settings);
            }
            if started.elapsed() >= CACHE_EXPANSION_BUDGET {
                warn!("matrix cache expansion out of time, will resume on idle");
                return false;
            }
        }

        self.cache_done = self.paths.iter().all(MotionPath::cache_done);
        self.cache_done
    }

    // ===== Host events =====

    pub fn on_event(&mut self, event: HostEvent, settings: &mut Settings, now: f64) {
        match event {
            HostEvent::TimeChanged => self.refresh_display_time_range(settings, now),
            HostEvent::CameraMoved => self.camera_cache.on_camera_moved(),
            HostEvent::TimeRangeChanged { start, end } => {
                self.set_time_range(settings, start, end, now);
            }
            HostEvent::PivotModeToggled => self.clear_parent_matrix_caches(),
            // Rebuild-always: the next refresh re-reads the curves anyway.
            HostEvent::CurvesEdited => trace!("curve edit noted"),
        }
    }

    // ===== Refresh and draw =====

    fn camera_context<'a>(
        camera_cache: &'a mut CameraCache,
        settings: &Settings,
        source: Option<&'a dyn CameraSource>,
        now: f64,
    ) -> Option<CameraContext<'a>> {
        if settings.draw_mode != DrawMode::CameraSpace {
            return None;
        }
        let source = source?;
        if !camera_cache.is_initialized()
            || camera_cache.port_width != settings.port_width
            || camera_cache.port_height != settings.port_height
        {
            debug!(
                "camera cache (re)initialized for a {}x{} port",
                settings.port_width, settings.port_height
            );
            camera_cache.initialize(settings.port_width, settings.port_height);
        }
        if camera_cache.needs_refresh() {
            camera_cache.refresh(source, settings, now);
        } else {
            camera_cache.fill_window(source, settings, now);
        }
        Some(CameraContext::new(camera_cache, source, now))
    }

    /// Rebuilds every path's keyframe cache.
    pub fn refresh(
        &mut self,
        settings: &Settings,
        source: Option<&dyn CameraSource>,
        now: f64,
    ) {
        let mut ctx = Self::camera_context(&mut self.camera_cache, settings, source, now);
        for path in &mut self.paths {
            path.refresh(settings, ctx.as_mut(), now);
        }
    }

    /// Rebuilds and draws all paths and buffer paths.
    pub fn draw(
        &mut self,
        surface: &mut dyn DrawSurface,
        settings: &Settings,
        source: Option<&dyn CameraSource>,
        now: f64,
    ) {
        if !settings.enabled {
            return;
        }

        let mut ctx = Self::camera_context(&mut self.camera_cache, settings, source, now);

        for path in &mut self.paths {
            path.refresh(settings, ctx.as_mut(), now);
            path.draw(surface, settings, ctx.as_mut(), now);
        }

        for buffer in &self.buffer_paths {
            buffer.draw(surface, settings, ctx.as_mut(), now);
        }
    }

    // ===== Buffer paths =====

    /// Snapshots every live path into a new buffer path.
    pub fn add_buffer_paths(&mut self, settings: &Settings) {
        let mut created = Vec::with_capacity(self.paths.len());
        for path in &mut self.paths {
            created.push(path.create_buffer_path(settings));
        }
        self.buffer_paths.extend(created);
    }

    #[must_use]
    pub fn buffer_path_count(&self) -> usize {
        self.buffer_paths.len()
    }

    pub fn buffer_path(&self, index: usize) -> Result<&BufferPath> {
        self.buffer_paths
            .get(index)
            .ok_or(PathlineError::IndexOutOfBounds {
                context: "buffer path",
                index,
            })
    }

    pub fn delete_buffer_path_at(&mut self, index: usize) -> Result<()> {
        if index >= self.buffer_paths.len() {
            return Err(PathlineError::IndexOutOfBounds {
                context: "buffer path",
                index,
            });
        }
        self.buffer_paths.remove(index);
        Ok(())
    }

    pub fn delete_all_buffer_paths(&mut self) {
        self.buffer_paths.clear();
    }

    pub fn set_buffer_path_selected(&mut self, index: usize, selected: bool) -> Result<()> {
        let buffer = self
            .buffer_paths
            .get_mut(index)
            .ok_or(PathlineError::IndexOutOfBounds {
                context: "buffer path",
                index,
            })?;
        buffer.set_selected(selected);
        Ok(())
    }

    // ===== Clipboard =====

    #[must_use]
    pub fn clipboard(&self) -> &KeyClipboard {
        &self.clipboard
    }

    /// Copies the selected keys of one path into the manager's clipboard.
    pub fn copy_selected_keys(&mut self, path_index: usize, settings: &Settings) -> Result<()> {
        let path = self
            .paths
            .get_mut(path_index)
            .ok_or(PathlineError::IndexOutOfBounds {
                context: "motion path",
                index: path_index,
            })?;
        self.clipboard = clipboard::copy_selected_keys(path, settings);
        Ok(())
    }

    /// Pastes the clipboard onto one path starting at `time`.
    pub fn paste_keys(
        &mut self,
        path_index: usize,
        time: f64,
        offset: bool,
        settings: &Settings,
        rec: &mut dyn UndoRecorder,
    ) -> Result<()> {
        let path = self
            .paths
            .get_mut(path_index)
            .ok_or(PathlineError::IndexOutOfBounds {
                context: "motion path",
                index: path_index,
            })?;
        clipboard::paste_keys(path, &self.clipboard, time, offset, settings, rec)
    }
}
