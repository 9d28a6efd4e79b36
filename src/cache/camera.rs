//! Active-camera matrix cache.
//!
//! Stores the INVERSE world matrix of the active camera per time, so
//! camera-space display can re-express world positions in the camera frame
//! of the sampled time. Refilled around the current time before scrubbing,
//! topped up on demand during draws.

use std::collections::BTreeMap;

use glam::DMat4;
use log::trace;

use crate::config::Settings;
use crate::host::CameraSource;
use crate::time::TimeKey;

#[derive(Debug, Default)]
pub struct CameraCache {
    cache: BTreeMap<TimeKey, DMat4>,
    pub port_width: u32,
    pub port_height: u32,
    // Guards against the camera-moved notification re-entering a fill in
    // progress: evaluating the camera at other times can itself raise the
    // notification.
    caching: bool,
    needs_refresh: bool,
    initialized: bool,
}

impl CameraCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(&mut self, port_width: u32, port_height: u32) {
        self.port_width = port_width;
        self.port_height = port_height;
        self.caching = false;
        self.initialized = true;
        self.needs_refresh = true;
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    /// Inverse camera world matrix at `time`, if cached.
    #[must_use]
    pub fn matrix(&self, time: f64) -> Option<DMat4> {
        self.cache.get(&TimeKey::new(time)).copied()
    }

    /// Camera world matrix at the current time, used as the "current camera"
    /// factor of the camera-space transform chain.
    #[must_use]
    pub fn current_camera_matrix(&self, now: f64) -> DMat4 {
        self.matrix(now).map_or(DMat4::IDENTITY, |m| m.inverse())
    }

    /// Drops everything and refills the display window around `now`.
    pub fn refresh(&mut self, source: &dyn CameraSource, settings: &Settings, now: f64) {
        let (start, end) = settings.display_window(now);

        self.caching = true;
        self.cache.clear();

        let mut t = start;
        while t <= end {
            self.cache
                .insert(TimeKey::new(t), source.world_matrix(t).inverse());
            t += 1.0;
        }

        self.caching = false;
        self.needs_refresh = false;
        trace!("camera cache refreshed: [{start}, {end}]");
    }

    /// Fills only the missing entries of the display window around `now`.
    pub fn fill_window(&mut self, source: &dyn CameraSource, settings: &Settings, now: f64) {
        let (start, end) = settings.display_window(now);

        self.caching = true;
        let mut t = start;
        while t <= end {
            self.cache
                .entry(TimeKey::new(t))
                .or_insert_with(|| source.world_matrix(t).inverse());
            t += 1.0;
        }
        self.caching = false;
    }

    /// Caches a single time, re-evaluating when `force` is set.
    pub fn ensure_at(&mut self, source: &dyn CameraSource, time: f64, force: bool) -> DMat4 {
        let key = TimeKey::new(time);
        if force || !self.cache.contains_key(&key) {
            let m = source.world_matrix(time).inverse();
            self.cache.insert(key, m);
            return m;
        }
        self.cache[&key]
    }

    /// Host notification: the camera transform changed. Ignored while a fill
    /// is in progress (the fill itself triggers it).
    pub fn on_camera_moved(&mut self) {
        if !self.caching {
            self.needs_refresh = true;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.needs_refresh = true;
    }
}
