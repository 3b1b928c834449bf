//! GPU rendering strategy.
//!
//! One static indexed mesh carries the whole face: the position buffer is
//! rewritten from the projected landmarks every frame, while the UV and
//! index buffers are populated once from the topology and never touched
//! again. The rasterizer interpolates UVs continuously across shared
//! edges, so the raster path's triangle-seam artifact cannot occur here.
//!
//! The renderer is headless: frames go to an offscreen color target that
//! can be read back as an [`image::RgbaImage`].

mod mesh;
mod renderer;

pub use mesh::{stage_positions, FaceMeshGpu, PositionVertex, UvVertex};
pub use renderer::GpuCompositor;
