#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Editable motion paths for keyed transforms.
//!
//! Caches each tracked object's trajectory frame by frame in world space,
//! draws it with its keys and tangent handles, and lets tools manipulate
//! the underlying animation curves directly in the viewport: dragging keys
//! and tangents, free-hand drawing ahead of the current time, reshaping a
//! run of keys along a stroke, and copy/paste of keys with their full
//! tangent state. The host application supplies curves, scene objects,
//! undo, and viewport services through the traits in [`host`].

pub mod buffer;
pub mod cache;
pub mod clipboard;
pub mod config;
pub mod edit;
pub mod errors;
pub mod hit;
pub mod host;
pub mod manager;
pub mod path;
pub mod time;

pub use buffer::BufferPath;
pub use cache::{CameraCache, MatrixCache};
pub use clipboard::{KeyClipboard, copy_selected_keys, paste_keys};
pub use config::{Color, DrawMode, Settings, StrokeMode};
pub use edit::{EditSession, Modifiers, MouseButton, SessionContext, SessionOutcome, ToolKind};
pub use errors::{PathlineError, Result};
pub use hit::{HitTester, Marquee, PathHit, SelectionMode};
pub use host::{
    AnimCurve, Axis, CameraSource, DrawSurface, NoUndo, SceneObject, TangentDir, TangentType,
    UndoRecorder, Viewport,
};
pub use manager::{HostEvent, PathManager};
pub use path::{CameraContext, Keyframe, MotionPath};
pub use time::TimeKey;
