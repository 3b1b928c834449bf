//! Face mesh data: the fixed triangulated UV topology and per-frame
//! landmark positions.
//!
//! # Overview
//!
//! The primary types are [`FaceTopology`], the immutable triangulated UV
//! layout shared by every face, and [`LandmarkFrame`], one frame of
//! normalized landmark positions produced by an external face tracker.
//!
//! The topology is loaded once (see [`crate::io::load_topology`]) and
//! never mutated. The canonical face asset has [`LANDMARK_COUNT`]
//! vertices, but the types are deliberately count-agnostic so that small
//! synthetic topologies can be built for tests and tooling.
//!
//! # Construction
//!
//! ```
//! use maskwarp::mesh::FaceTopology;
//! use nalgebra::Point2;
//!
//! let topology = FaceTopology::new(
//!     vec![
//!         Point2::new(0.0, 0.0),
//!         Point2::new(1.0, 0.0),
//!         Point2::new(0.0, 1.0),
//!     ],
//!     vec![[0, 1, 2]],
//! )
//! .unwrap();
//!
//! assert_eq!(topology.num_vertices(), 3);
//! assert_eq!(topology.num_triangles(), 1);
//! ```

mod landmarks;
mod topology;

pub use landmarks::{project, project_frame, LandmarkFrame};
pub use topology::{FaceTopology, LANDMARK_COUNT};
