//! Benchmarks for warp operations.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use image::{Rgba, RgbaImage};
use maskwarp::prelude::*;
use nalgebra::Point2;

/// Build an n x n grid topology over the unit square, with landmarks
/// laid out on a slightly shrunken copy of the same grid.
fn grid_fixture(n: usize) -> (Arc<FaceTopology>, LandmarkFrame) {
    let mut uv = Vec::with_capacity((n + 1) * (n + 1));
    let mut landmarks = Vec::with_capacity((n + 1) * (n + 1));
    let mut triangles = Vec::with_capacity(n * n * 2);

    for j in 0..=n {
        for i in 0..=n {
            let u = i as f64 / n as f64;
            let v = j as f64 / n as f64;
            uv.push(Point2::new(u, v));
            landmarks.push(Point2::new(0.1 + 0.8 * u, 0.1 + 0.8 * v));
        }
    }

    for j in 0..n {
        for i in 0..n {
            let v00 = j * (n + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + (n + 1);
            let v11 = v01 + 1;

            triangles.push([v00, v10, v11]);
            triangles.push([v00, v11, v01]);
        }
    }

    (
        Arc::new(FaceTopology::new(uv, triangles).unwrap()),
        LandmarkFrame::new(landmarks),
    )
}

fn bench_affine_solve(c: &mut Criterion) {
    let (topology, landmarks) = grid_fixture(16);
    let src = topology.source_points(256.0, 256.0, false);
    let dst: Vec<Point2<f64>> = landmarks
        .points()
        .iter()
        .map(|&p| project(p, 512.0, 512.0, false))
        .collect();

    c.bench_function("affine_solve_grid_16", |b| {
        b.iter(|| {
            let mut maps = 0usize;
            for tri in topology.triangles() {
                let s = [src[tri[0]], src[tri[1]], src[tri[2]]];
                let d = [dst[tri[0]], dst[tri[1]], dst[tri[2]]];
                if AffineMap::from_triangles(&s, &d).is_some() {
                    maps += 1;
                }
            }
            maps
        })
    });
}

fn bench_raster_composite(c: &mut Criterion) {
    let (topology, landmarks) = grid_fixture(16);
    let mask = RgbaImage::from_pixel(256, 256, Rgba([200, 60, 60, 255]));
    let mut compositor = RasterCompositor::new(topology, 512, 512);
    compositor.set_mask(&mask).unwrap();
    let state = RenderState {
        mask_present: true,
        wireframe_visible: false,
        mirror: false,
    };

    c.bench_function("raster_composite_512", |b| {
        b.iter(|| {
            compositor.render(&landmarks, &state).unwrap();
            compositor.draw_count()
        })
    });
}

criterion_group!(benches, bench_affine_solve, bench_raster_composite);
criterion_main!(benches);
