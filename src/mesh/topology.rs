//! The fixed triangulated UV topology.

use std::collections::BTreeSet;

use nalgebra::Point2;

use crate::error::{Result, WarpError};

/// Number of vertices in the canonical face topology asset.
pub const LANDMARK_COUNT: usize = 468;

/// An immutable triangulated UV layout over a fixed set of vertices.
///
/// The topology pairs a UV coordinate table (one entry per vertex, each in
/// [0,1]²) with an ordered list of triangle index triples. It is loaded
/// once at startup and shared read-only by both compositors; the engine
/// validates index and UV ranges at construction but assumes the
/// triangulation itself is consistent by construction of the asset.
#[derive(Debug, Clone)]
pub struct FaceTopology {
    /// UV coordinates indexed by vertex.
    uv: Vec<Point2<f64>>,
    /// Triangle index triples into the UV table.
    triangles: Vec<[usize; 3]>,
}

impl FaceTopology {
    /// Create a topology from a UV table and a triangle list.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::EmptyTopology`] if either input is empty,
    /// [`WarpError::InvalidVertexIndex`] if a triangle references a vertex
    /// outside the UV table, and [`WarpError::UvOutOfRange`] if a UV
    /// coordinate lies outside the unit square.
    pub fn new(uv: Vec<Point2<f64>>, triangles: Vec<[usize; 3]>) -> Result<Self> {
        if uv.is_empty() || triangles.is_empty() {
            return Err(WarpError::EmptyTopology);
        }

        for (i, p) in uv.iter().enumerate() {
            if !(0.0..=1.0).contains(&p.x) || !(0.0..=1.0).contains(&p.y) {
                return Err(WarpError::UvOutOfRange {
                    vertex: i,
                    u: p.x,
                    v: p.y,
                });
            }
        }

        for (t, tri) in triangles.iter().enumerate() {
            for &v in tri {
                if v >= uv.len() {
                    return Err(WarpError::InvalidVertexIndex {
                        triangle: t,
                        vertex: v,
                    });
                }
            }
        }

        Ok(Self { uv, triangles })
    }

    /// Number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.uv.len()
    }

    /// Number of triangles.
    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Whether this is the canonical 468-vertex face asset.
    #[inline]
    pub fn is_canonical(&self) -> bool {
        self.uv.len() == LANDMARK_COUNT
    }

    /// UV coordinate of a vertex.
    #[inline]
    pub fn uv(&self, vertex: usize) -> Point2<f64> {
        self.uv[vertex]
    }

    /// The full UV table.
    #[inline]
    pub fn uvs(&self) -> &[Point2<f64>] {
        &self.uv
    }

    /// The triangle list.
    #[inline]
    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Map the UV table into texture pixel space for a texture of the
    /// given size, optionally flipped horizontally.
    ///
    /// The flipped set (`u -> 1 - u`) is what the raster path samples when
    /// the capture source is mirrored; it is selected once per frame,
    /// never per triangle.
    pub fn source_points(&self, tex_width: f64, tex_height: f64, flip: bool) -> Vec<Point2<f64>> {
        self.uv
            .iter()
            .map(|p| {
                let u = if flip { 1.0 - p.x } else { p.x };
                Point2::new(u * tex_width, p.y * tex_height)
            })
            .collect()
    }

    /// Unique undirected edges of the triangulation, each as an index
    /// pair with the smaller index first.
    ///
    /// Used to build the companion wireframe (line list on the GPU path,
    /// stroked overlay on the raster path).
    pub fn edges(&self) -> Vec<[usize; 2]> {
        let mut set = BTreeSet::new();
        for tri in &self.triangles {
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                set.insert([a.min(b), a.max(b)]);
            }
        }
        set.into_iter().collect()
    }
}
