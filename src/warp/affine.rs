//! Closed-form affine maps between triangles.
//!
//! Three non-collinear point correspondences uniquely determine a 2D
//! affine map. [`AffineMap::from_triangles`] solves for the six
//! coefficients directly from the determinant of the source triangle; a
//! near-zero determinant means the source points are collinear and the
//! triangle is skipped by the caller.

use nalgebra::Point2;

/// Source triangles with `|determinant|` below this are degenerate.
pub const DEGENERACY_EPS: f64 = 1e-8;

/// A 2D affine transform `(x, y) -> (a11·x + a12·y + a13, a21·x + a22·y + a23)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineMap {
    /// Row 1, x coefficient.
    pub a11: f64,
    /// Row 1, y coefficient.
    pub a12: f64,
    /// Row 1, translation.
    pub a13: f64,
    /// Row 2, x coefficient.
    pub a21: f64,
    /// Row 2, y coefficient.
    pub a22: f64,
    /// Row 2, translation.
    pub a23: f64,
}

impl AffineMap {
    /// The identity transform.
    pub const IDENTITY: AffineMap = AffineMap {
        a11: 1.0,
        a12: 0.0,
        a13: 0.0,
        a21: 0.0,
        a22: 1.0,
        a23: 0.0,
    };

    /// Determinant of the source triangle used as the solve denominator.
    #[inline]
    pub fn source_determinant(src: &[Point2<f64>; 3]) -> f64 {
        let [s0, s1, s2] = src;
        s0.x * (s1.y - s2.y) + s1.x * (s2.y - s0.y) + s2.x * (s0.y - s1.y)
    }

    /// Compute the unique affine map sending each `src` vertex onto the
    /// corresponding `dst` vertex.
    ///
    /// Returns `None` when the source triangle is degenerate (collinear
    /// points, `|determinant| < `[`DEGENERACY_EPS`]).
    pub fn from_triangles(src: &[Point2<f64>; 3], dst: &[Point2<f64>; 3]) -> Option<AffineMap> {
        let denom = Self::source_determinant(src);
        if denom.abs() < DEGENERACY_EPS {
            return None;
        }

        let [s0, s1, s2] = src;
        let [d0, d1, d2] = dst;

        let a11 = (d0.x * (s1.y - s2.y) + d1.x * (s2.y - s0.y) + d2.x * (s0.y - s1.y)) / denom;
        let a12 = (d0.x * (s2.x - s1.x) + d1.x * (s0.x - s2.x) + d2.x * (s1.x - s0.x)) / denom;
        let a13 = (d0.x * (s1.x * s2.y - s2.x * s1.y)
            + d1.x * (s2.x * s0.y - s0.x * s2.y)
            + d2.x * (s0.x * s1.y - s1.x * s0.y))
            / denom;

        let a21 = (d0.y * (s1.y - s2.y) + d1.y * (s2.y - s0.y) + d2.y * (s0.y - s1.y)) / denom;
        let a22 = (d0.y * (s2.x - s1.x) + d1.y * (s0.x - s2.x) + d2.y * (s1.x - s0.x)) / denom;
        let a23 = (d0.y * (s1.x * s2.y - s2.x * s1.y)
            + d1.y * (s2.x * s0.y - s0.x * s2.y)
            + d2.y * (s0.x * s1.y - s1.x * s0.y))
            / denom;

        Some(AffineMap {
            a11,
            a12,
            a13,
            a21,
            a22,
            a23,
        })
    }

    /// Apply the transform to a point.
    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::new(
            self.a11 * p.x + self.a12 * p.y + self.a13,
            self.a21 * p.x + self.a22 * p.y + self.a23,
        )
    }

    /// Invert the transform.
    ///
    /// Returns `None` when the linear part is singular. Maps produced by
    /// [`AffineMap::from_triangles`] between non-degenerate triangles are
    /// always invertible.
    pub fn inverse(&self) -> Option<AffineMap> {
        let det = self.a11 * self.a22 - self.a12 * self.a21;
        if det.abs() < DEGENERACY_EPS {
            return None;
        }

        let b11 = self.a22 / det;
        let b12 = -self.a12 / det;
        let b21 = -self.a21 / det;
        let b22 = self.a11 / det;

        Some(AffineMap {
            a11: b11,
            a12: b12,
            a13: -(b11 * self.a13 + b12 * self.a23),
            a21: b21,
            a22: b22,
            a23: -(b21 * self.a13 + b22 * self.a23),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_texture_translation() {
        // UV (0,0),(1,0),(0,1) on a 100x100 texture, destinations offset
        // by (10,10): expect a pure translation at unit scale.
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(100.0, 0.0),
            Point2::new(0.0, 100.0),
        ];
        let dst = [
            Point2::new(10.0, 10.0),
            Point2::new(110.0, 10.0),
            Point2::new(10.0, 110.0),
        ];

        assert_eq!(AffineMap::source_determinant(&src).abs(), 10000.0);

        let t = AffineMap::from_triangles(&src, &dst).unwrap();
        assert_eq!(t.a11, 1.0);
        assert_eq!(t.a12, 0.0);
        assert_eq!(t.a13, 10.0);
        assert_eq!(t.a21, 0.0);
        assert_eq!(t.a22, 1.0);
        assert_eq!(t.a23, 10.0);
    }

    #[test]
    fn test_maps_vertices_exactly() {
        let src = [
            Point2::new(3.0, 7.0),
            Point2::new(91.5, 12.25),
            Point2::new(40.0, 88.0),
        ];
        let dst = [
            Point2::new(120.0, 33.0),
            Point2::new(17.5, 290.0),
            Point2::new(305.25, 140.5),
        ];

        let t = AffineMap::from_triangles(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(&dst) {
            let p = t.apply(*s);
            assert!((p.x - d.x).abs() < 1e-9, "x residual: {}", p.x - d.x);
            assert!((p.y - d.y).abs() < 1e-9, "y residual: {}", p.y - d.y);
        }
    }

    #[test]
    fn test_collinear_source_is_degenerate() {
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(0.5, 0.5),
            Point2::new(1.0, 1.0),
        ];
        let dst = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 10.0),
        ];
        assert!(AffineMap::from_triangles(&src, &dst).is_none());
    }

    #[test]
    fn test_inverse_round_trip() {
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(50.0, 5.0),
            Point2::new(10.0, 60.0),
        ];
        let dst = [
            Point2::new(200.0, 100.0),
            Point2::new(260.0, 130.0),
            Point2::new(190.0, 180.0),
        ];

        let t = AffineMap::from_triangles(&src, &dst).unwrap();
        let inv = t.inverse().unwrap();
        let p = Point2::new(21.0, 34.5);
        let back = inv.apply(t.apply(p));
        assert!((back.x - p.x).abs() < 1e-9);
        assert!((back.y - p.y).abs() < 1e-9);
    }

    #[test]
    fn test_identity() {
        let p = Point2::new(13.0, -4.0);
        assert_eq!(AffineMap::IDENTITY.apply(p), p);
    }
}
