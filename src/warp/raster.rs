//! CPU piecewise-affine warp compositor.
//!
//! For each triangle of the topology the unique affine map from the
//! source (texture-space) triangle to the destination (pixel-space)
//! triangle is derived in closed form, and the whole source texture is
//! drawn through it with the destination clipped to the triangle's
//! interior. Iterating over all triangles tiles the destination region.
//!
//! The clip and transform are scoped per triangle: a [`ClipScope`] saves
//! the surface's draw state on acquisition and restores the unclipped,
//! identity-transformed state when dropped, on every exit path including
//! the degenerate-triangle skip.
//!
//! Known limitation, carried forward: triangles are rasterized
//! independently, so sub-pixel rounding can leave faint seams along
//! shared edges. The GPU strategy does not have this artifact.

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use nalgebra::Point2;

use crate::error::{Result, WarpError};
use crate::mesh::{project_frame, FaceTopology, LandmarkFrame};
use crate::warp::affine::AffineMap;
use crate::warp::{Compositor, RenderState};

/// Stroke color for the wireframe overlay (semi-transparent silver).
const WIREFRAME_COLOR: Rgba<u8> = Rgba([192, 192, 192, 112]);

/// An RGBA raster surface with a scoped transform/clip draw state.
///
/// Between scopes the surface is always unclipped with the identity
/// transform; [`RasterSurface::clip_scope`] is the only way to change
/// that, and the returned guard restores the default state when dropped.
#[derive(Debug)]
pub struct RasterSurface {
    pixels: RgbaImage,
    transform: AffineMap,
    clip: Option<[Point2<f64>; 3]>,
    draw_calls: usize,
}

impl RasterSurface {
    /// Create a transparent surface of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_image(RgbaImage::new(width, height))
    }

    /// Create a surface over existing pixels.
    pub fn from_image(pixels: RgbaImage) -> Self {
        Self {
            pixels,
            transform: AffineMap::IDENTITY,
            clip: None,
            draw_calls: 0,
        }
    }

    /// Surface width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Surface height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// The surface pixels.
    #[inline]
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Number of texture draws since the last [`RasterSurface::reset`].
    #[inline]
    pub fn draw_calls(&self) -> usize {
        self.draw_calls
    }

    /// Reset the surface to the given contents (or transparent) and zero
    /// the draw counter.
    pub fn reset(&mut self, base: Option<&RgbaImage>) {
        match base {
            Some(img) => self.pixels.copy_from_slice(img),
            None => self.pixels.fill(0),
        }
        self.draw_calls = 0;
    }

    /// Open a draw scope clipped to a destination triangle.
    pub fn clip_scope(&mut self, clip: [Point2<f64>; 3]) -> ClipScope<'_> {
        self.clip = Some(clip);
        ClipScope { surface: self }
    }

    /// Stroke a line segment with src-over blending.
    pub fn stroke_line(&mut self, a: Point2<f64>, b: Point2<f64>, color: Rgba<u8>) {
        let steps = (b.x - a.x).abs().max((b.y - a.y).abs()).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let x = a.x + (b.x - a.x) * t;
            let y = a.y + (b.y - a.y) * t;
            if x < 0.0 || y < 0.0 {
                continue;
            }
            let (xi, yi) = (x.round() as u32, y.round() as u32);
            if xi < self.pixels.width() && yi < self.pixels.height() {
                let dst = *self.pixels.get_pixel(xi, yi);
                self.pixels.put_pixel(xi, yi, blend_over(color, dst));
            }
        }
    }

    /// Draw the whole source image through the current transform, clipped
    /// to the current clip triangle. Pixels map back to source space via
    /// the inverse transform and are sampled bilinearly.
    fn draw_image(&mut self, src: &RgbaImage) {
        let Some(clip) = self.clip else { return };
        let Some(inv) = self.transform.inverse() else {
            return;
        };
        self.draw_calls += 1;

        let (sw, sh) = (src.width() as f64, src.height() as f64);
        let (w, h) = (self.pixels.width() as i64, self.pixels.height() as i64);

        let min_x = clip.iter().fold(f64::INFINITY, |m, p| m.min(p.x));
        let max_x = clip.iter().fold(f64::NEG_INFINITY, |m, p| m.max(p.x));
        let min_y = clip.iter().fold(f64::INFINITY, |m, p| m.min(p.y));
        let max_y = clip.iter().fold(f64::NEG_INFINITY, |m, p| m.max(p.y));

        let x0 = (min_x.floor() as i64).max(0);
        let x1 = (max_x.ceil() as i64).min(w);
        let y0 = (min_y.floor() as i64).max(0);
        let y1 = (max_y.ceil() as i64).min(h);

        for y in y0..y1 {
            for x in x0..x1 {
                let p = Point2::new(x as f64 + 0.5, y as f64 + 0.5);
                if !point_in_triangle(p, &clip) {
                    continue;
                }
                let s = inv.apply(p);
                if s.x < 0.0 || s.x >= sw || s.y < 0.0 || s.y >= sh {
                    continue;
                }
                let texel = sample_bilinear(src, s.x, s.y);
                if texel[3] == 0 {
                    continue;
                }
                let dst = *self.pixels.get_pixel(x as u32, y as u32);
                self.pixels.put_pixel(x as u32, y as u32, blend_over(texel, dst));
            }
        }
    }
}

/// Scoped clip + transform on a [`RasterSurface`].
///
/// Dropping the scope restores the unclipped identity draw state.
#[derive(Debug)]
pub struct ClipScope<'a> {
    surface: &'a mut RasterSurface,
}

impl ClipScope<'_> {
    /// Set the active source-to-destination transform.
    pub fn set_transform(&mut self, transform: AffineMap) {
        self.surface.transform = transform;
    }

    /// Draw the source image under the scope's clip and transform.
    pub fn draw_image(&mut self, src: &RgbaImage) {
        self.surface.draw_image(src);
    }
}

impl Drop for ClipScope<'_> {
    fn drop(&mut self) {
        self.surface.transform = AffineMap::IDENTITY;
        self.surface.clip = None;
    }
}

/// Pixel-center inside test via edge functions, accepting either winding.
/// Centers exactly on a shared edge pass for both neighbors; the overlap
/// is tolerated rather than corrected.
fn point_in_triangle(p: Point2<f64>, tri: &[Point2<f64>; 3]) -> bool {
    let edge = |a: Point2<f64>, b: Point2<f64>| (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    let e0 = edge(tri[0], tri[1]);
    let e1 = edge(tri[1], tri[2]);
    let e2 = edge(tri[2], tri[0]);
    (e0 >= 0.0 && e1 >= 0.0 && e2 >= 0.0) || (e0 <= 0.0 && e1 <= 0.0 && e2 <= 0.0)
}

/// Bilinear sample at pixel-space coordinates, clamped at the borders.
fn sample_bilinear(img: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let fx = x - 0.5;
    let fy = y - 0.5;
    let ix = fx.floor() as i64;
    let iy = fy.floor() as i64;
    let tx = fx - ix as f64;
    let ty = fy - iy as f64;

    let clamp = |v: i64, max: i64| v.clamp(0, max - 1) as u32;
    let p00 = img.get_pixel(clamp(ix, w), clamp(iy, h));
    let p10 = img.get_pixel(clamp(ix + 1, w), clamp(iy, h));
    let p01 = img.get_pixel(clamp(ix, w), clamp(iy + 1, h));
    let p11 = img.get_pixel(clamp(ix + 1, w), clamp(iy + 1, h));

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] as f64 * (1.0 - tx) + p10[c] as f64 * tx;
        let bot = p01[c] as f64 * (1.0 - tx) + p11[c] as f64 * tx;
        out[c] = (top * (1.0 - ty) + bot * ty).round() as u8;
    }
    Rgba(out)
}

/// Source-over alpha blending.
fn blend_over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as f64 / 255.0;
    let da = dst[3] as f64 / 255.0;
    let oa = sa + da * (1.0 - sa);
    if oa <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let s = src[c] as f64;
        let d = dst[c] as f64;
        out[c] = ((s * sa + d * da * (1.0 - sa)) / oa).round() as u8;
    }
    out[3] = (oa * 255.0).round() as u8;
    Rgba(out)
}

/// The CPU raster rendering strategy.
///
/// Owns the destination surface and its own copy of the mask texture.
/// Each render call resets the surface to the base image (or
/// transparent), warps the mask triangle by triangle, and optionally
/// strokes the wireframe on top.
pub struct RasterCompositor {
    topology: Arc<FaceTopology>,
    edges: Vec<[usize; 2]>,
    surface: RasterSurface,
    base: Option<RgbaImage>,
    mask: Option<RgbaImage>,
}

impl RasterCompositor {
    /// Create a compositor drawing over a transparent surface.
    pub fn new(topology: Arc<FaceTopology>, width: u32, height: u32) -> Self {
        let edges = topology.edges();
        Self {
            topology,
            edges,
            surface: RasterSurface::new(width, height),
            base: None,
            mask: None,
        }
    }

    /// Create a compositor drawing over a base image (e.g. the captured
    /// frame the face was detected in).
    pub fn with_base(topology: Arc<FaceTopology>, base: RgbaImage) -> Self {
        let edges = topology.edges();
        let surface = RasterSurface::from_image(base.clone());
        Self {
            topology,
            edges,
            surface,
            base: Some(base),
            mask: None,
        }
    }

    /// Number of texture draws performed by the last render call.
    pub fn draw_count(&self) -> usize {
        self.surface.draw_calls()
    }

    /// The destination surface.
    pub fn surface(&self) -> &RasterSurface {
        &self.surface
    }
}

impl Compositor for RasterCompositor {
    fn set_mask(&mut self, mask: &RgbaImage) -> Result<()> {
        self.mask = Some(mask.clone());
        Ok(())
    }

    fn render(&mut self, landmarks: &LandmarkFrame, state: &RenderState) -> Result<()> {
        if landmarks.len() != self.topology.num_vertices() {
            return Err(WarpError::LandmarkCountMismatch {
                expected: self.topology.num_vertices(),
                actual: landmarks.len(),
            });
        }

        self.surface.reset(self.base.as_ref());

        let (w, h) = (self.surface.width() as f64, self.surface.height() as f64);
        let dst = project_frame(landmarks, w, h, state.mirror);

        if state.mask_present {
            if let Some(mask) = self.mask.as_ref() {
                // One source point set per frame, flipped with the same
                // flag that mirrored the projector.
                let src = self.topology.source_points(
                    mask.width() as f64,
                    mask.height() as f64,
                    state.mirror,
                );

                let mut skipped = 0usize;
                for tri in self.topology.triangles() {
                    let s = [src[tri[0]], src[tri[1]], src[tri[2]]];
                    let d = [dst[tri[0]], dst[tri[1]], dst[tri[2]]];

                    let mut scope = self.surface.clip_scope(d);
                    if let Some(t) = AffineMap::from_triangles(&s, &d) {
                        scope.set_transform(t);
                        scope.draw_image(mask);
                    } else {
                        skipped += 1;
                    }
                    // Scope drop restores the unclipped identity state.
                }

                if skipped > 0 {
                    log::debug!("skipped {skipped} degenerate triangles");
                }
            }
        }

        if state.wireframe_visible {
            for &[a, b] in &self.edges {
                self.surface.stroke_line(dst[a], dst[b], WIREFRAME_COLOR);
            }
        }

        Ok(())
    }

    fn frame(&mut self) -> Result<RgbaImage> {
        Ok(self.surface.pixels().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn single_triangle_topology() -> Arc<FaceTopology> {
        Arc::new(
            FaceTopology::new(
                vec![
                    Point2::new(0.0, 0.0),
                    Point2::new(1.0, 0.0),
                    Point2::new(0.0, 1.0),
                ],
                vec![[0, 1, 2]],
            )
            .unwrap(),
        )
    }

    fn solid_mask(w: u32, h: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(color))
    }

    fn state(mask: bool, wire: bool, mirror: bool) -> RenderState {
        RenderState {
            mask_present: mask,
            wireframe_visible: wire,
            mirror,
        }
    }

    // Landmarks projecting to the pixel triangle (10,10),(110,10),(10,110)
    // on a 200x200 surface.
    fn translated_frame() -> LandmarkFrame {
        LandmarkFrame::from_pairs([(0.05, 0.05), (0.55, 0.05), (0.05, 0.55)])
    }

    #[test]
    fn test_warp_fills_triangle_interior() {
        let mut comp = RasterCompositor::new(single_triangle_topology(), 200, 200);
        comp.set_mask(&solid_mask(100, 100, [255, 0, 0, 255])).unwrap();
        comp.render(&translated_frame(), &state(true, false, false))
            .unwrap();

        let frame = comp.frame().unwrap();
        assert_eq!(comp.draw_count(), 1);
        // Interior pixel receives the mask.
        assert_eq!(*frame.get_pixel(30, 30), Rgba([255, 0, 0, 255]));
        // Outside the destination triangle nothing is drawn.
        assert_eq!(*frame.get_pixel(150, 150), Rgba([0, 0, 0, 0]));
        assert_eq!(*frame.get_pixel(5, 5), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_no_mask_draws_nothing() {
        let mut comp = RasterCompositor::new(single_triangle_topology(), 200, 200);
        comp.render(&translated_frame(), &state(true, false, false))
            .unwrap();
        assert_eq!(comp.draw_count(), 0);
        let frame = comp.frame().unwrap();
        assert!(frame.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_mask_present_false_draws_nothing() {
        let mut comp = RasterCompositor::new(single_triangle_topology(), 200, 200);
        comp.set_mask(&solid_mask(100, 100, [255, 0, 0, 255])).unwrap();
        comp.render(&translated_frame(), &state(false, false, false))
            .unwrap();
        assert_eq!(comp.draw_count(), 0);
    }

    #[test]
    fn test_degenerate_triangle_skipped() {
        // First triangle has collinear UVs; second is valid.
        let topology = Arc::new(
            FaceTopology::new(
                vec![
                    Point2::new(0.0, 0.0),
                    Point2::new(0.5, 0.5),
                    Point2::new(1.0, 1.0),
                    Point2::new(1.0, 0.0),
                ],
                vec![[0, 1, 2], [0, 3, 2]],
            )
            .unwrap(),
        );
        let mut comp = RasterCompositor::new(topology, 200, 200);
        comp.set_mask(&solid_mask(100, 100, [0, 255, 0, 255])).unwrap();
        let frame = LandmarkFrame::from_pairs([(0.1, 0.1), (0.5, 0.5), (0.9, 0.9), (0.9, 0.1)]);
        comp.render(&frame, &state(true, false, false)).unwrap();
        // Only the non-degenerate triangle was drawn.
        assert_eq!(comp.draw_count(), 1);
    }

    #[test]
    fn test_mask_hot_swap_visible_next_frame() {
        let mut comp = RasterCompositor::new(single_triangle_topology(), 200, 200);
        let frame = translated_frame();
        let st = state(true, false, false);

        comp.set_mask(&solid_mask(100, 100, [255, 0, 0, 255])).unwrap();
        comp.render(&frame, &st).unwrap();
        assert_eq!(*comp.frame().unwrap().get_pixel(30, 30), Rgba([255, 0, 0, 255]));

        comp.set_mask(&solid_mask(64, 64, [0, 0, 255, 255])).unwrap();
        comp.render(&frame, &st).unwrap();
        assert_eq!(*comp.frame().unwrap().get_pixel(30, 30), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_wireframe_without_mask() {
        let mut comp = RasterCompositor::new(single_triangle_topology(), 200, 200);
        comp.render(&translated_frame(), &state(false, true, false))
            .unwrap();
        let frame = comp.frame().unwrap();
        // The edge from (10,10) to (110,10) leaves a stroke.
        assert!(frame.get_pixel(60, 10)[3] > 0);
        assert_eq!(comp.draw_count(), 0);
    }

    #[test]
    fn test_mirrored_render_flips_destination() {
        let mut comp = RasterCompositor::new(single_triangle_topology(), 200, 200);
        comp.set_mask(&solid_mask(100, 100, [255, 0, 0, 255])).unwrap();
        comp.render(&translated_frame(), &state(true, false, true))
            .unwrap();
        let frame = comp.frame().unwrap();
        // Destination triangle is now (190,10),(90,10),(190,110).
        assert_eq!(*frame.get_pixel(170, 30), Rgba([255, 0, 0, 255]));
        assert_eq!(*frame.get_pixel(30, 30), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_landmark_count_mismatch() {
        let mut comp = RasterCompositor::new(single_triangle_topology(), 200, 200);
        let err = comp
            .render(
                &LandmarkFrame::from_pairs([(0.1, 0.1)]),
                &state(false, false, false),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            WarpError::LandmarkCountMismatch {
                expected: 3,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_base_image_restored_each_frame() {
        let base = solid_mask(200, 200, [10, 20, 30, 255]);
        let mut comp = RasterCompositor::with_base(single_triangle_topology(), base);
        comp.set_mask(&solid_mask(100, 100, [255, 0, 0, 255])).unwrap();
        comp.render(&translated_frame(), &state(true, false, false))
            .unwrap();
        let frame = comp.frame().unwrap();
        // Base shows outside the face, mask inside.
        assert_eq!(*frame.get_pixel(150, 150), Rgba([10, 20, 30, 255]));
        assert_eq!(*frame.get_pixel(30, 30), Rgba([255, 0, 0, 255]));
    }
}
