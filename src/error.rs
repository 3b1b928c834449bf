//! Error types for maskwarp.
//!
//! This module defines all error types used throughout the library.
//!
//! Note that per-frame conditions are deliberately *not* errors: a
//! degenerate triangle is skipped, and a missing mask or missing landmark
//! frame makes the compositor a no-op. Errors here cover construction,
//! asset loading, and GPU acquisition — things that happen at the
//! boundary, before the frame loop.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`WarpError`].
pub type Result<T> = std::result::Result<T, WarpError>;

/// Errors that can occur while building the engine or loading assets.
#[derive(Error, Debug)]
pub enum WarpError {
    /// The topology has no vertices or no triangles.
    #[error("topology is empty")]
    EmptyTopology,

    /// A triangle references an invalid vertex index.
    #[error("triangle {triangle} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The triangle index.
        triangle: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A UV coordinate lies outside the unit square.
    #[error("UV coordinate {vertex} is outside [0,1]x[0,1]: ({u}, {v})")]
    UvOutOfRange {
        /// The vertex index.
        vertex: usize,
        /// The u coordinate.
        u: f64,
        /// The v coordinate.
        v: f64,
    },

    /// A landmark frame does not match the topology's vertex count.
    #[error("landmark frame has {actual} points, topology expects {expected}")]
    LandmarkCountMismatch {
        /// The vertex count the topology expects.
        expected: usize,
        /// The number of landmarks supplied.
        actual: usize,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error loading an asset file (UV table, triangulation, landmarks).
    #[error("failed to load {path}: {message}")]
    LoadError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// A mask image failed to decode. The session stays in its previous
    /// mask state when this is returned.
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    /// No suitable GPU adapter was found.
    #[error("no suitable GPU adapter available")]
    NoAdapter,

    /// The GPU device request failed.
    #[error("GPU device request failed: {0}")]
    DeviceRequest(String),

    /// Reading the rendered frame back from the GPU failed.
    #[error("GPU frame readback failed: {message}")]
    Readback {
        /// Error message.
        message: String,
    },
}
