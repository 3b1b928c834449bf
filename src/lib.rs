//! # Maskwarp
//!
//! A face-mesh texture warping engine: overlays an arbitrary 2D texture
//! ("mask") onto a tracked human face so that the texture deforms with
//! facial motion.
//!
//! The engine consumes per-frame landmark positions (normalized to
//! [0,1]² by an external face tracker) over a fixed triangulated UV
//! topology, and composites a source texture onto the destination
//! landmark positions under one of two interchangeable strategies:
//!
//! - **Raster** ([`warp::RasterCompositor`]): a CPU piecewise-affine
//!   compositor that warps the texture triangle by triangle;
//! - **GPU** ([`gpu::GpuCompositor`]): a single indexed mesh whose
//!   position buffer is rewritten per frame, with the rasterizer
//!   interpolating texture coordinates continuously across triangles.
//!
//! Both implement the [`warp::Compositor`] trait and read the same
//! explicit [`warp::RenderState`], so a test suite can validate them
//! against the same landmark fixtures.
//!
//! Face detection, capture, and UI are out of scope: landmarks arrive
//! from an opaque collaborator, and frames leave as RGBA images.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use maskwarp::prelude::*;
//! use image::{Rgba, RgbaImage};
//! use nalgebra::Point2;
//!
//! // A tiny synthetic topology; the canonical 468-point face asset is
//! // loaded with `maskwarp::io::load_topology`.
//! let topology = Arc::new(
//!     FaceTopology::new(
//!         vec![
//!             Point2::new(0.0, 0.0),
//!             Point2::new(1.0, 0.0),
//!             Point2::new(0.0, 1.0),
//!         ],
//!         vec![[0, 1, 2]],
//!     )
//!     .unwrap(),
//! );
//!
//! let mut session = Session::new();
//! let mut compositor = RasterCompositor::new(topology, 320, 240);
//!
//! // Mask upload (NoMask -> MaskLoaded).
//! let mask = RgbaImage::from_pixel(64, 64, Rgba([255, 0, 0, 255]));
//! session.mask_loaded(&mask);
//! compositor.set_mask(&mask).unwrap();
//!
//! // Per frame: landmarks in, composited frame out.
//! let landmarks = LandmarkFrame::from_pairs([(0.2, 0.2), (0.8, 0.2), (0.2, 0.8)]);
//! compositor.render(&landmarks, &session.render_state()).unwrap();
//! let frame = compositor.frame().unwrap();
//! assert_eq!(frame.dimensions(), (320, 240));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod gpu;
pub mod io;
pub mod mesh;
pub mod session;
pub mod warp;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use maskwarp::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Result, WarpError};
    pub use crate::mesh::{project, FaceTopology, LandmarkFrame, LANDMARK_COUNT};
    pub use crate::session::{DetectorMode, MaskState, Session};
    pub use crate::warp::{AffineMap, Compositor, RasterCompositor, RenderState};
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::prelude::*;
    use image::{Rgba, RgbaImage};
    use nalgebra::Point2;

    // Session-driven video loop over the raster strategy: dedupe, mask
    // upload mid-session, mirror policy.
    #[test]
    fn test_video_session_end_to_end() {
        let topology = Arc::new(
            FaceTopology::new(
                vec![
                    Point2::new(0.0, 0.0),
                    Point2::new(1.0, 0.0),
                    Point2::new(0.0, 1.0),
                ],
                vec![[0, 1, 2]],
            )
            .unwrap(),
        );
        let mut session = Session::new();
        session.set_wireframe_visible(false);
        let mut compositor = RasterCompositor::new(topology, 200, 200);
        let landmarks = LandmarkFrame::from_pairs([(0.05, 0.05), (0.55, 0.05), (0.05, 0.55)]);

        // Frame 1: video mode, no mask yet -> nothing drawn.
        assert!(session.begin_video_frame(1.0));
        assert!(session.render_state().mirror);
        compositor.render(&landmarks, &session.render_state()).unwrap();
        assert_eq!(compositor.draw_count(), 0);

        // Stalled video element: same timestamp is not reprocessed.
        assert!(!session.begin_video_frame(1.0));

        // Mask arrives mid-session; the next frame composites it.
        let mask = RgbaImage::from_pixel(64, 64, Rgba([0, 255, 0, 255]));
        session.mask_loaded(&mask);
        compositor.set_mask(&mask).unwrap();

        assert!(session.begin_video_frame(2.0));
        compositor.render(&landmarks, &session.render_state()).unwrap();
        assert_eq!(compositor.draw_count(), 1);

        // Mirrored: the triangle lands on the right half of the frame.
        let frame = compositor.frame().unwrap();
        assert_eq!(*frame.get_pixel(170, 30), Rgba([0, 255, 0, 255]));
        assert_eq!(*frame.get_pixel(30, 30), Rgba([0, 0, 0, 0]));
    }
}
