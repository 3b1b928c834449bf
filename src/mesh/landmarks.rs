//! Landmark frames and the landmark-to-pixel projector.

use nalgebra::Point2;

/// One frame of tracked landmark positions.
///
/// Each point is normalized to [0,1]² by the external detector and is
/// addressed by the same vertex index as the topology's UV table. A frame
/// is immutable once created and owned by the caller for the duration of
/// one render call.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFrame {
    points: Vec<Point2<f64>>,
}

impl LandmarkFrame {
    /// Create a frame from normalized landmark positions.
    pub fn new(points: Vec<Point2<f64>>) -> Self {
        Self { points }
    }

    /// Create a frame from `(x, y)` pairs.
    pub fn from_pairs<I: IntoIterator<Item = (f64, f64)>>(pairs: I) -> Self {
        Self {
            points: pairs
                .into_iter()
                .map(|(x, y)| Point2::new(x, y))
                .collect(),
        }
    }

    /// Number of landmarks in the frame.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the frame is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The landmark at a vertex index.
    #[inline]
    pub fn get(&self, vertex: usize) -> Point2<f64> {
        self.points[vertex]
    }

    /// All landmarks, in vertex order.
    #[inline]
    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }
}

/// Project a normalized landmark to destination pixel coordinates.
///
/// `px = mirror ? width - x·width : x·width`, `py = y·height`. Pure and
/// total; the mirror flag must be identical for every vertex of a frame
/// so relative triangle shapes stay correct.
#[inline]
pub fn project(landmark: Point2<f64>, width: f64, height: f64, mirror: bool) -> Point2<f64> {
    let px = if mirror {
        width - landmark.x * width
    } else {
        landmark.x * width
    };
    Point2::new(px, landmark.y * height)
}

/// Project every landmark of a frame with one shared mirror flag.
pub fn project_frame(
    frame: &LandmarkFrame,
    width: f64,
    height: f64,
    mirror: bool,
) -> Vec<Point2<f64>> {
    frame
        .points()
        .iter()
        .map(|&p| project(p, width, height, mirror))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_unmirrored() {
        let p = project(Point2::new(0.25, 0.5), 640.0, 480.0, false);
        assert_eq!(p, Point2::new(160.0, 240.0));
    }

    #[test]
    fn test_project_mirrored() {
        // x = 0.25, W = 480 -> 480 - 120 = 360.
        let p = project(Point2::new(0.25, 0.5), 480.0, 270.0, true);
        assert_eq!(p.x, 360.0);
        assert_eq!(p.y, 135.0);
    }

    #[test]
    fn test_mirror_relates_x_by_width() {
        let frame = LandmarkFrame::from_pairs([(0.0, 0.1), (0.3, 0.4), (0.95, 0.9)]);
        let normal = project_frame(&frame, 640.0, 480.0, false);
        let mirrored = project_frame(&frame, 640.0, 480.0, true);
        for (n, m) in normal.iter().zip(&mirrored) {
            assert!((m.x - (640.0 - n.x)).abs() < 1e-12);
            assert_eq!(m.y, n.y);
        }
    }

    #[test]
    fn test_frame_accessors() {
        let frame = LandmarkFrame::from_pairs([(0.1, 0.2), (0.3, 0.4)]);
        assert_eq!(frame.len(), 2);
        assert!(!frame.is_empty());
        assert_eq!(frame.get(1), Point2::new(0.3, 0.4));
    }
}
