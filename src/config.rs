//! Display and tool configuration.
//!
//! One [`Settings`] value is owned by the embedding layer and passed by
//! reference into every component that needs it. Nothing in this crate keeps
//! global mutable state.

use glam::Vec4;

/// RGBA display color.
pub type Color = Vec4;

/// Space the paths are displayed in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DrawMode {
    /// Positions are drawn where the object actually is.
    #[default]
    WorldSpace,
    /// Positions are re-expressed in the active camera's frame at each
    /// sampled time, so the path holds still relative to camera framing.
    CameraSpace,
}

/// How a stroke gesture redistributes the keys it captures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StrokeMode {
    /// Project each key to the closest point on the stroke polyline.
    #[default]
    Closest,
    /// Distribute the keys at proportional arc length along the stroke.
    Spread,
}

/// Every tunable the display and the tools consume.
#[derive(Clone, Debug)]
pub struct Settings {
    pub enabled: bool,

    // Time window
    pub start_time: f64,
    pub end_time: f64,
    pub frames_back: f64,
    pub frames_front: f64,

    // Colors
    pub path_color: Color,
    pub current_frame_color: Color,
    pub tangent_color: Color,
    pub broken_tangent_color: Color,
    pub buffer_path_color: Color,
    pub weighted_path_color: Color,
    pub weighted_path_tangent_color: Color,
    pub frame_label_color: Color,

    // Sizes (screen-space)
    pub path_size: f64,
    pub frame_size: f64,

    // Visibility toggles
    pub show_path: bool,
    pub show_tangents: bool,
    pub show_key_frames: bool,
    pub show_key_frame_numbers: bool,
    pub show_frame_numbers: bool,
    pub show_rotation_key_frames: bool,
    pub alternating_frames: bool,

    // Draw tool
    pub draw_time_interval: f64,
    pub draw_frame_interval: f64,
    pub stroke_mode: StrokeMode,

    // Modes
    pub draw_mode: DrawMode,
    pub locked_mode: bool,
    pub locked_mode_interactive: bool,
    pub use_pivots: bool,

    // Active viewport size, refreshed by the embedding layer each tick
    pub port_width: u32,
    pub port_height: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: false,

            start_time: 0.0,
            end_time: 0.0,
            frames_back: 0.0,
            frames_front: 0.0,

            path_color: Color::new(0.5, 0.5, 0.8, 1.0),
            current_frame_color: Color::new(0.8, 0.8, 0.1, 1.0),
            tangent_color: Color::new(0.5, 0.7, 0.1, 1.0),
            broken_tangent_color: Color::new(0.1, 0.5, 0.7, 1.0),
            buffer_path_color: Color::new(0.2, 0.2, 0.2, 1.0),
            weighted_path_color: Color::new(0.2, 0.2, 0.2, 1.0),
            weighted_path_tangent_color: Color::new(0.2, 0.2, 0.2, 1.0),
            frame_label_color: Color::new(0.1, 0.1, 0.1, 1.0),

            path_size: 3.0,
            frame_size: 7.0,

            show_path: true,
            show_tangents: true,
            show_key_frames: true,
            show_key_frame_numbers: false,
            show_frame_numbers: false,
            show_rotation_key_frames: true,
            alternating_frames: false,

            draw_time_interval: 0.1,
            draw_frame_interval: 5.0,
            stroke_mode: StrokeMode::Closest,

            draw_mode: DrawMode::WorldSpace,
            locked_mode: false,
            locked_mode_interactive: true,
            use_pivots: false,

            port_width: 0,
            port_height: 0,
        }
    }
}

impl Settings {
    /// Display window for `now`, clamped to the configured global range.
    #[must_use]
    pub fn display_window(&self, now: f64) -> (f64, f64) {
        let mut start = now - self.frames_back;
        let mut end = now + self.frames_front;
        if start < self.start_time {
            start = self.start_time;
        }
        if end > self.end_time {
            end = self.end_time;
        }
        (start, end)
    }

    /// Sets the global time range, repairing a collapsed interval.
    pub fn set_time_range(&mut self, start: f64, end: f64) {
        self.start_time = start;
        self.end_time = if end <= start { start + 1.0 } else { end };
    }
}
