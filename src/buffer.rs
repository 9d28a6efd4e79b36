//! Buffered path snapshots.
//!
//! A buffer path is a frozen copy of a trajectory, kept around as a visual
//! reference while the live animation keeps changing. It stores sampled
//! world positions only; once created it never re-evaluates the scene.

use std::collections::BTreeMap;

use glam::DVec3;

use crate::config::{Color, Settings};
use crate::host::DrawSurface;
use crate::path::CameraContext;
use crate::time::TimeKey;

pub struct BufferPath {
    /// One world position per whole frame, starting at `min_time`.
    frames: Vec<DVec3>,
    min_time: f64,
    key_frames: BTreeMap<TimeKey, DVec3>,
    selected: bool,
}

impl BufferPath {
    #[must_use]
    pub fn new(frames: Vec<DVec3>, min_time: f64, key_frames: BTreeMap<TimeKey, DVec3>) -> Self {
        Self {
            frames,
            min_time,
            key_frames,
            selected: false,
        }
    }

    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    #[must_use]
    pub fn min_time(&self) -> f64 {
        self.min_time
    }

    #[must_use]
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn frame_position(&self, time: f64) -> Option<DVec3> {
        let index = (time - self.min_time) as isize;
        if index < 0 {
            return None;
        }
        self.frames.get(index as usize).copied()
    }

    #[must_use]
    pub fn key_frame_times(&self) -> Vec<f64> {
        self.key_frames.keys().copied().map(TimeKey::get).collect()
    }

    pub fn draw(
        &self,
        surface: &mut dyn DrawSurface,
        settings: &Settings,
        mut camera: Option<&mut CameraContext<'_>>,
        now: f64,
    ) {
        let mut color = settings.buffer_path_color;
        if self.selected {
            color.x = 1.0 - color.x;
            color.y = 1.0 - color.y;
            color.z = 1.0 - color.z;
        }
        color.w = 0.5;

        let start_time = now - settings.frames_back;
        let end_time = now + settings.frames_front;

        self.draw_frames(surface, settings, camera.as_deref_mut(), start_time, end_time, color);
        if settings.show_key_frames {
            self.draw_key_frames(surface, camera.as_deref_mut(), settings, start_time, end_time, color);
        }
        self.draw_current_frame(surface, settings, camera, now);
    }

    fn draw_frames(
        &self,
        surface: &mut dyn DrawSurface,
        settings: &Settings,
        mut camera: Option<&mut CameraContext<'_>>,
        start_time: f64,
        end_time: f64,
        color: Color,
    ) {
        let frame_count = self.frames.len() as f64;

        let mut t = start_time + 1.0;
        while t <= end_time {
            if t <= self.min_time || t >= self.min_time + frame_count {
                t += 1.0;
                continue;
            }

            let index = (t - self.min_time) as usize;
            let mut pos1 = self.frames[index];
            let mut pos2 = self.frames[index - 1];
            if let Some(cam) = camera.as_deref_mut() {
                pos1 = cam.reproject(pos1, t, false);
                pos2 = cam.reproject(pos2, t - 1.0, false);
            }

            if settings.show_path {
                surface.line(pos1, pos2, settings.path_size, color);
            }
            surface.point(pos2, settings.frame_size, color);

            if t == end_time || t == self.min_time + frame_count - 1.0 {
                surface.point(pos1, settings.frame_size, color);
            }
            t += 1.0;
        }
    }

    fn draw_key_frames(
        &self,
        surface: &mut dyn DrawSurface,
        mut camera: Option<&mut CameraContext<'_>>,
        settings: &Settings,
        start_time: f64,
        end_time: f64,
        color: Color,
    ) {
        for (tk, pos) in &self.key_frames {
            let time = tk.get();
            if time < start_time || time > end_time {
                continue;
            }
            let mut pos = *pos;
            if let Some(cam) = camera.as_deref_mut() {
                pos = cam.reproject(pos, time, false);
            }
            surface.point(pos, settings.frame_size * 1.5, color);
        }
    }

    fn draw_current_frame(
        &self,
        surface: &mut dyn DrawSurface,
        settings: &Settings,
        camera: Option<&mut CameraContext<'_>>,
        now: f64,
    ) {
        if now < self.min_time || now > self.min_time + self.frames.len() as f64 {
            return;
        }

        let index = (now as i64) - (self.min_time as i64);
        if index < 0 || index as usize > self.frames.len().saturating_sub(1) {
            return;
        }

        let mut color = settings.current_frame_color * 0.8;
        color.w = 0.7;

        let mut pos = self.frames[index as usize];
        if let Some(cam) = camera {
            pos = cam.reproject(pos, now, false);
        }
        surface.point(pos, settings.frame_size * 1.6, color);
    }
}
