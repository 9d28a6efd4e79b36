//! Contracts with the embedding host application.
//!
//! The core never talks to a scene graph, curve engine, undo stack or
//! viewport directly; it goes through the traits in this module. The
//! [`memory`] submodule provides a self-contained in-memory host used by the
//! test suite and by headless consumers.

pub mod curves;
pub mod memory;
pub mod scene;
pub mod undo;
pub mod viewport;

pub use curves::{AnimCurve, Axis, TangentDir, TangentType};
pub use scene::{CameraSource, SceneObject};
pub use undo::{NoUndo, UndoRecorder};
pub use viewport::{DrawSurface, Viewport};
