//! Asset file I/O.
//!
//! The canonical face topology is shipped as data, not code: a UV table
//! file and a triangulation file, loaded once at startup. Landmark
//! fixture files use the same format as the UV table and exist for
//! tooling and tests — live landmarks come from the external detector,
//! not from disk.
//!
//! # Formats
//!
//! All files are plain text with `#` line comments:
//!
//! - UV table / landmarks: one `u v` (or `x y`) pair per line;
//! - triangulation: whitespace-separated vertex indices, consumed in
//!   triples (a flat index stream and a triple-per-line layout are both
//!   accepted).
//!
//! # Usage
//!
//! ```no_run
//! use maskwarp::io::load_topology;
//!
//! let topology = load_topology("uv_coords.txt", "triangulation.txt").unwrap();
//! assert!(topology.is_canonical());
//! ```

use std::fs;
use std::path::Path;

use nalgebra::Point2;

use crate::error::{Result, WarpError};
use crate::mesh::{FaceTopology, LandmarkFrame};

/// Strip a `#` comment and surrounding whitespace from a line.
fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => line[..pos].trim(),
        None => line.trim(),
    }
}

fn parse_pairs(content: &str) -> std::result::Result<Vec<Point2<f64>>, String> {
    let mut points = Vec::new();
    for (lineno, raw) in content.lines().enumerate() {
        let line = strip_comment(raw);
        if line.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 2 {
            return Err(format!(
                "line {}: expected 2 values, found {}",
                lineno + 1,
                tokens.len()
            ));
        }
        let x: f64 = tokens[0]
            .parse()
            .map_err(|e| format!("line {}: {}", lineno + 1, e))?;
        let y: f64 = tokens[1]
            .parse()
            .map_err(|e| format!("line {}: {}", lineno + 1, e))?;
        points.push(Point2::new(x, y));
    }
    Ok(points)
}

fn parse_triangles(content: &str) -> std::result::Result<Vec<[usize; 3]>, String> {
    let mut indices = Vec::new();
    for (lineno, raw) in content.lines().enumerate() {
        for token in strip_comment(raw).split_whitespace() {
            let v: usize = token
                .parse()
                .map_err(|e| format!("line {}: {}", lineno + 1, e))?;
            indices.push(v);
        }
    }
    if indices.len() % 3 != 0 {
        return Err(format!(
            "index count {} is not a multiple of 3",
            indices.len()
        ));
    }
    Ok(indices.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

/// Load a UV coordinate table.
pub fn load_uv_coords<P: AsRef<Path>>(path: P) -> Result<Vec<Point2<f64>>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    parse_pairs(&content).map_err(|message| WarpError::LoadError {
        path: path.to_path_buf(),
        message,
    })
}

/// Load a triangle index list.
pub fn load_triangulation<P: AsRef<Path>>(path: P) -> Result<Vec<[usize; 3]>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    parse_triangles(&content).map_err(|message| WarpError::LoadError {
        path: path.to_path_buf(),
        message,
    })
}

/// Load and validate a topology from a UV table file and a triangulation
/// file.
pub fn load_topology<P: AsRef<Path>, Q: AsRef<Path>>(
    uv_path: P,
    triangulation_path: Q,
) -> Result<FaceTopology> {
    let uv = load_uv_coords(uv_path)?;
    let triangles = load_triangulation(triangulation_path)?;
    FaceTopology::new(uv, triangles)
}

/// Load a landmark fixture file.
pub fn load_landmarks<P: AsRef<Path>>(path: P) -> Result<LandmarkFrame> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    parse_pairs(&content)
        .map(LandmarkFrame::new)
        .map_err(|message| WarpError::LoadError {
            path: path.to_path_buf(),
            message,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs_with_comments() {
        let content = "# canonical UVs\n0.5 0.25\n\n0.0 1.0 # corner\n";
        let points = parse_pairs(content).unwrap();
        assert_eq!(points, vec![Point2::new(0.5, 0.25), Point2::new(0.0, 1.0)]);
    }

    #[test]
    fn test_parse_pairs_rejects_bad_arity() {
        let err = parse_pairs("0.5 0.25 0.75\n").unwrap_err();
        assert!(err.contains("line 1"), "unexpected message: {err}");
    }

    #[test]
    fn test_parse_pairs_rejects_non_numeric() {
        assert!(parse_pairs("0.5 abc\n").is_err());
    }

    #[test]
    fn test_parse_triangles_flat_and_per_line() {
        let flat = parse_triangles("0 1 2 0 2 3\n").unwrap();
        let lines = parse_triangles("0 1 2\n0 2 3\n").unwrap();
        assert_eq!(flat, lines);
        assert_eq!(flat, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_parse_triangles_rejects_ragged_stream() {
        let err = parse_triangles("0 1 2 3\n").unwrap_err();
        assert!(err.contains("multiple of 3"), "unexpected message: {err}");
    }

    #[test]
    fn test_load_topology_round_trip() {
        let dir = std::env::temp_dir();
        let uv_path = dir.join("maskwarp_test_uv.txt");
        let tri_path = dir.join("maskwarp_test_tri.txt");
        fs::write(&uv_path, "0 0\n1 0\n0 1\n").unwrap();
        fs::write(&tri_path, "0 1 2\n").unwrap();

        let topology = load_topology(&uv_path, &tri_path).unwrap();
        assert_eq!(topology.num_vertices(), 3);
        assert_eq!(topology.num_triangles(), 1);

        fs::remove_file(uv_path).ok();
        fs::remove_file(tri_path).ok();
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = load_uv_coords("/nonexistent/maskwarp_uv.txt").unwrap_err();
        assert!(matches!(err, WarpError::Io(_)));
    }
}
