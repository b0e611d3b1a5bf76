//! # trigen
//!
//! 2D mesh generation behind an explicit-ownership geometry buffer API
//! in the style of classic mesh engines: Delaunay, constrained and
//! conforming Delaunay, and Voronoi diagrams.
//!
//! # Features
//!
//! - Delaunay triangulation of planar point sets
//! - Constrained and conforming Delaunay triangulation of PSLGs
//!   (segments, holes, boundary markers)
//! - Voronoi diagrams with explicit unbounded rays
//! - Quality refinement: minimum angle, maximum area, Steiner point
//!   cap, segment-splitting policy
//! - An explicit-ownership [`MeshBuffer`](buffer::MeshBuffer) that
//!   mirrors the engine's I/O record field-for-field, driven by a
//!   switch-string protocol (`"pq30a0.1zQ"` and friends)
//! - Serialization of the public value types with [serde](https://serde.rs)
//!
//! # Basic Usage
//!
//! The four named operations take and return plain slices and structs:
//!
//! ```rust
//! use trigen::prelude::*;
//!
//! // A square ring: outer boundary, inner boundary, hole seed between.
//! let points = [
//!     [0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0],
//!     [1.0, 1.0], [3.0, 1.0], [3.0, 3.0], [1.0, 3.0],
//! ];
//! let segments = [
//!     [0, 1], [1, 2], [2, 3], [3, 0],
//!     [4, 5], [5, 6], [6, 7], [7, 4],
//! ];
//! let mesh = constrained_delaunay(&points, &segments, &[[2.0, 2.0]]).unwrap();
//!
//! // A constrained triangulation adds no vertices, so the counts are
//! // forced by the topology alone.
//! assert_eq!(mesh.vertices.len(), 8);
//! assert_eq!(mesh.triangles.len(), 8);
//! ```
//!
//! ```rust
//! use trigen::prelude::*;
//!
//! let diagram = voronoi(&[[0.0, 0.0], [4.0, 0.0], [2.0, 3.0]]).unwrap();
//!
//! // One triangle dualizes to its circumcenter and three rays.
//! assert_eq!(diagram.vertices.len(), 1);
//! assert!(diagram.edges.is_empty());
//! assert_eq!(diagram.ray_origins.len(), 3);
//! ```
//!
//! # Buffer-level Usage
//!
//! [`triangulate`](ops::triangulate) exposes the engine's native I/O
//! discipline: the caller owns both buffers and releases them
//! explicitly (release consumes the buffer, so releasing twice is a
//! compile error, not a double free):
//!
//! ```rust
//! use trigen::prelude::*;
//!
//! let mut input = MeshBuffer::new();
//! input.set_points(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]).unwrap();
//!
//! let output = triangulate(&input, &Options::default(), false).unwrap();
//! assert_eq!(output.triangle_count(), 2);
//!
//! input.release();
//! output.release();
//! ```
//!
//! # Failure Model
//!
//! Caller errors are recoverable: buffer misuse surfaces as
//! [`BufferError`](buffer::BufferError), and bad geometry (too few
//! points, duplicates, collinear input, crossing segments, indices out
//! of range) surfaces as [`TriangulateError`] before or during the run,
//! never as undefined behavior. Allocation failure is the one
//! non-catchable condition: the global allocator aborts the process,
//! and this crate does not pretend otherwise.
//!
//! Buffers are single-owner and not thread-safe; share results, not
//! buffers, across threads.

#![forbid(unsafe_code)]

#[macro_use]
extern crate derive_builder;

/// Explicit-ownership mesh I/O buffers and their errors.
pub mod buffer;
/// Collection types tuned for the engine's hot paths.
pub mod collections;
mod mesher;
/// The high-level meshing operations and their result types.
pub mod ops;
/// Quality/constraint configuration and switch-string encoding.
pub mod options;

pub use buffer::{BufferError, MeshBuffer};
pub use mesher::{Behavior, FALLBACK_STEINER_LIMIT, SplitPolicy, TriangulateError, invoke};
pub use ops::{
    Mesh, VoronoiDiagram, conforming_delaunay, constrained_delaunay, delaunay, triangulate,
    voronoi,
};
pub use options::{Options, OptionsBuilder, SegmentSplitting};

/// A prelude module that re-exports the commonly used types and
/// operations, so most callers need a single import.
pub mod prelude {
    pub use crate::buffer::{BufferError, MeshBuffer};
    pub use crate::collections::{
        FastHashMap, FastHashSet, SmallBuffer, fast_hash_map_with_capacity,
        fast_hash_set_with_capacity,
    };
    pub use crate::mesher::{
        Behavior, FALLBACK_STEINER_LIMIT, SplitPolicy, TriangulateError, invoke,
    };
    pub use crate::ops::{
        Mesh, VoronoiDiagram, conforming_delaunay, constrained_delaunay, delaunay, triangulate,
        voronoi,
    };
    pub use crate::options::{Options, OptionsBuilder, SegmentSplitting};
}

/// The function `is_normal` checks that structs implement `auto` traits.
/// Traits are checked at compile time, so this function is only used for
/// testing.
#[must_use]
pub const fn is_normal<T: Sized + Send + Sync + Unpin>() -> bool {
    true
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::is_normal;
    use crate::{Behavior, Mesh, Options, SegmentSplitting, TriangulateError, VoronoiDiagram};

    #[test]
    fn normal_types() {
        assert!(is_normal::<Options>());
        assert!(is_normal::<SegmentSplitting>());
        assert!(is_normal::<Mesh>());
        assert!(is_normal::<VoronoiDiagram>());
        assert!(is_normal::<Behavior>());
        assert!(is_normal::<TriangulateError>());
    }

    #[test]
    fn prelude_exports_cover_the_whole_surface() {
        use crate::prelude::*;

        let mut map: FastHashMap<u64, usize> = FastHashMap::default();
        map.insert(123, 456);
        assert_eq!(map.get(&123), Some(&456));

        let mut buffer = MeshBuffer::new();
        buffer
            .set_points(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]])
            .unwrap();
        let triangles = delaunay(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]).unwrap();
        assert_eq!(triangles.len(), 1);

        let options = OptionsBuilder::default().build().unwrap();
        assert_eq!(options.to_switches(), "zq0a0");
        assert_eq!(Behavior::parse("YY").splitting, SplitPolicy::Never);
        buffer.release();
    }
}
