//! Viewport projection and drawing primitives.

use glam::{DMat4, DVec2, DVec3};

use crate::config::Color;

/// Projection services of the viewport the tool runs in.
pub trait Viewport {
    /// `(width, height)` in pixels.
    fn port_size(&self) -> (u32, u32);

    /// World position to screen pixels.
    fn world_to_screen(&self, world: DVec3) -> DVec2;

    /// Ray through a screen point: `(origin, unit direction)`.
    fn screen_ray(&self, screen: DVec2) -> (DVec3, DVec3);

    /// Inclusive world matrix of the active camera.
    fn camera_matrix(&self) -> DMat4;
}

/// Immediate-mode drawing surface the path rendering delegates to.
pub trait DrawSurface {
    fn line(&mut self, a: DVec3, b: DVec3, width: f64, color: Color);

    fn point(&mut self, p: DVec3, size: f64, color: Color);

    fn text(&mut self, p: DVec3, text: &str, color: Color);
}
