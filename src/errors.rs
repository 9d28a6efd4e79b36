//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`PathlineError`] covers all failure modes including:
//! - Out-of-range path and buffer-path indices
//! - Clipboard misuse (paste with nothing copied)
//! - Edit requests on objects the tool cannot write to
//!
//! Per-axis "no curve on this attribute" situations are deliberately NOT
//! errors: all axis logic degrades by skipping the axis.
//!
//! # Usage
//!
//! Fallible public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, PathlineError>`.

use thiserror::Error;

/// The main error type for pathline operations.
///
/// Each variant corresponds to a user-visible command failure; the requested
/// operation is aborted without mutating host state.
#[derive(Error, Debug)]
pub enum PathlineError {
    // ========================================================================
    // Index Errors
    // ========================================================================
    /// A tracked-path or buffer-path index was out of range.
    #[error("Index out of bounds: {context} (index: {index})")]
    IndexOutOfBounds {
        /// Description of what was being accessed
        context: &'static str,
        /// The invalid index
        index: usize,
    },

    /// No keyframe exists at the requested time.
    #[error("No keyframe at time {0}")]
    KeyNotFound(f64),

    // ========================================================================
    // Clipboard Errors
    // ========================================================================
    /// Paste was requested but nothing has been copied.
    #[error("Key clipboard is empty")]
    EmptyClipboard,

    // ========================================================================
    // Edit Errors
    // ========================================================================
    /// The object's channels are driven by animation layers, which this
    /// tool does not edit.
    #[error("Cannot edit '{0}': channels are driven by animation layers")]
    LayeredChannels(String),

    /// The object's translation is constraint-driven and read-only here.
    #[error("Cannot edit '{0}': translation is constraint-driven")]
    ConstrainedObject(String),
}

/// Alias for `Result<T, PathlineError>`.
pub type Result<T> = std::result::Result<T, PathlineError>;
