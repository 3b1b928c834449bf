//! Texture warping: the compositor contract and the raster strategy.
//!
//! # Overview
//!
//! A [`Compositor`] produces one rendered frame from a landmark frame, a
//! mask texture, and a [`RenderState`]. Two interchangeable strategies
//! implement the contract:
//!
//! - [`RasterCompositor`] — CPU path: per-triangle piecewise-affine warp
//!   through clip scopes. Adjacent triangles are rasterized
//!   independently, so sub-pixel rounding can produce faint seams.
//! - [`crate::gpu::GpuCompositor`] — GPU path: one indexed mesh whose
//!   position buffer is rewritten per frame; the rasterizer interpolates
//!   UVs continuously across shared edges, which removes the seam
//!   artifact by construction.
//!
//! Both strategies read the same explicit [`RenderState`] value each
//! frame; there is no hidden shared state.

pub mod affine;
pub mod raster;

pub use affine::{AffineMap, DEGENERACY_EPS};
pub use raster::{RasterCompositor, RasterSurface};

use image::RgbaImage;

use crate::error::Result;
use crate::mesh::LandmarkFrame;

/// Per-frame render flags, passed by value into every render call.
///
/// Built by [`crate::session::Session::render_state`]; the mirror flag is
/// decided once per capture source and feeds both the landmark projector
/// and the texture U mapping, never toggled mid-frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderState {
    /// Whether a mask texture has been loaded this session.
    pub mask_present: bool,
    /// Whether the wireframe layer is drawn.
    pub wireframe_visible: bool,
    /// Whether the capture source is horizontally mirrored.
    pub mirror: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            mask_present: false,
            wireframe_visible: true,
            mirror: false,
        }
    }
}

/// A rendering strategy: project landmarks, composite the mask texture.
///
/// With no mask loaded (or `mask_present` false) a render call draws no
/// texture pixels; a degenerate triangle is skipped silently. Neither is
/// an error — the engine degrades to drawing nothing.
pub trait Compositor {
    /// Replace the mask texture. Takes effect on the very next frame;
    /// vertex positions and topology are untouched.
    fn set_mask(&mut self, mask: &RgbaImage) -> Result<()>;

    /// Produce one frame from a landmark frame and the current state.
    fn render(&mut self, landmarks: &LandmarkFrame, state: &RenderState) -> Result<()>;

    /// The most recently rendered frame as RGBA pixels.
    fn frame(&mut self) -> Result<RgbaImage>;
}
