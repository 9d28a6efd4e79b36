//! Time-indexed matrix caches.

pub mod camera;
pub mod matrix;

pub use camera::CameraCache;
pub use matrix::MatrixCache;
