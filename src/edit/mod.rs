//! Interactive tools: direct keyframe and tangent manipulation, free-hand
//! drawing and stroke reshaping.

pub mod session;
pub mod stroke;

use bitflags::bitflags;
use glam::{DVec2, DVec3};

use crate::host::Viewport;

pub use session::{EditSession, SessionContext, SessionOutcome, ToolKind};

bitflags! {
    /// Keyboard modifiers held during a pointer event.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u32 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MouseButton {
    #[default]
    Left,
    Middle,
}

/// Moves `point_to_move` by the world-space delta the cursor traveled,
/// measured on the view plane through the point.
///
/// Rays through both screen positions are pushed out to the point's distance
/// from the camera; the difference of their endpoints is the drag delta.
#[must_use]
pub fn world_position_from_proj_point(
    viewport: &dyn Viewport,
    point_to_move: DVec3,
    initial: DVec2,
    current: DVec2,
    camera_position: DVec3,
) -> DVec3 {
    let (start_origin, start_dir) = viewport.screen_ray(initial);
    let (end_origin, end_dir) = viewport.screen_ray(current);

    let distance_to_camera = (point_to_move - camera_position).length();

    let start = start_origin + start_dir * distance_to_camera;
    let end = end_origin + end_dir * distance_to_camera;

    (end - start) + point_to_move
}
