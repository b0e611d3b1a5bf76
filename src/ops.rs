//! High-level meshing operations.
//!
//! Each operation is a fixed pipeline over the same bones: populate an
//! input [`MeshBuffer`], pick a switch string, [`invoke`](crate::invoke)
//! the engine, read the output buffers, release everything this side
//! owns. [`triangulate`] is the general escape hatch that exposes the
//! buffers and [`Options`] directly; the four named operations wrap the
//! common cases in plain slices and typed results.

use serde::{Deserialize, Serialize};

use crate::buffer::MeshBuffer;
use crate::mesher::{self, TriangulateError};
use crate::options::Options;

/// A triangulated mesh: vertex coordinates plus corner index triples.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Mesh {
    /// Vertex coordinates; input vertices first, engine-inserted after.
    pub vertices: Vec<[f64; 2]>,
    /// Triangles as counterclockwise corner indices into `vertices`.
    pub triangles: Vec<[usize; 3]>,
}

/// A Voronoi diagram split into finite edges and unbounded rays.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct VoronoiDiagram {
    /// Voronoi vertices (circumcenters of the dual triangulation).
    pub vertices: Vec<[f64; 2]>,
    /// Finite edges as index pairs into `vertices`.
    pub edges: Vec<[usize; 2]>,
    /// Starting vertex of each unbounded ray.
    pub ray_origins: Vec<usize>,
    /// Unit direction of each unbounded ray, co-indexed with `ray_origins`.
    pub ray_directions: Vec<[f64; 2]>,
}

/// Delaunay triangulation of a point set.
///
/// # Errors
///
/// Fails on an empty or degenerate point set (fewer than 3 points,
/// duplicates, or all points collinear).
pub fn delaunay(points: &[[f64; 2]]) -> Result<Vec<[usize; 3]>, TriangulateError> {
    let mut input = MeshBuffer::new();
    input.set_points(points)?;
    input.set_point_markers(&vec![0; points.len()])?;

    let mut output = MeshBuffer::new();
    mesher::invoke("Qz", &input, &mut output, None)?;
    let triangles = corner_triples(&output);
    input.release();
    output.release();
    Ok(triangles)
}

/// Voronoi diagram of a point set.
///
/// The raw dual edge list is walked in order: an edge whose second
/// endpoint is the `-1` sentinel becomes a ray (its first endpoint the
/// origin, the co-indexed normal its direction); every other edge is
/// kept as a finite edge.
///
/// # Errors
///
/// Fails on an empty or degenerate point set.
pub fn voronoi(points: &[[f64; 2]]) -> Result<VoronoiDiagram, TriangulateError> {
    let mut input = MeshBuffer::new();
    input.set_points(points)?;
    input.set_point_markers(&vec![0; points.len()])?;

    let mut output = MeshBuffer::new();
    let mut dual = MeshBuffer::new();
    mesher::invoke("Qzv", &input, &mut output, Some(&mut dual))?;

    let vertices = dual.points();
    let mut edges = Vec::new();
    let mut ray_origins = Vec::new();
    let mut ray_directions = Vec::new();
    for (edge, normal) in dual.edges().into_iter().zip(dual.normals()) {
        if edge[1] == -1 {
            ray_origins.push(edge[0] as usize);
            ray_directions.push(normal);
        } else {
            edges.push([edge[0] as usize, edge[1] as usize]);
        }
    }
    input.release();
    output.release();
    dual.release();
    Ok(VoronoiDiagram {
        vertices,
        edges,
        ray_origins,
        ray_directions,
    })
}

/// Constrained Delaunay triangulation of a PSLG.
///
/// Every input segment appears as an edge of the result; no vertices are
/// added beyond the input (existing vertices lying on a segment do
/// subdivide it). Holes are carved away from their seed points.
///
/// # Errors
///
/// Fails on degenerate points, segment indices out of range, or
/// segments that properly cross.
pub fn constrained_delaunay(
    points: &[[f64; 2]],
    segments: &[[usize; 2]],
    holes: &[[f64; 2]],
) -> Result<Mesh, TriangulateError> {
    pslg_mesh(points, segments, holes, false)
}

/// Conforming Delaunay triangulation of a PSLG.
///
/// Like [`constrained_delaunay`], but the engine may insert Steiner
/// vertices on segments until the mesh is Delaunay everywhere; the
/// output vertex count is therefore generally larger than the input.
///
/// # Errors
///
/// As [`constrained_delaunay`].
pub fn conforming_delaunay(
    points: &[[f64; 2]],
    segments: &[[usize; 2]],
    holes: &[[f64; 2]],
) -> Result<Mesh, TriangulateError> {
    pslg_mesh(points, segments, holes, true)
}

/// General triangulation over caller-managed buffers.
///
/// Encodes `options`, appends `p` when `input` carries segments or
/// holes and `Q` unless `verbose`, and invokes the engine. The caller
/// keeps ownership of `input` throughout and owns the returned output
/// buffer, releasing both when done.
///
/// # Errors
///
/// Propagates every engine and validation error unchanged.
pub fn triangulate(
    input: &MeshBuffer,
    options: &Options,
    verbose: bool,
) -> Result<MeshBuffer, TriangulateError> {
    let mut switches = options.to_switches();
    if input.segment_count() > 0 || input.hole_count() > 0 {
        switches.push('p');
    }
    if !verbose {
        switches.push('Q');
    }
    let mut output = MeshBuffer::new();
    mesher::invoke(&switches, input, &mut output, None)?;
    Ok(output)
}

fn pslg_mesh(
    points: &[[f64; 2]],
    segments: &[[usize; 2]],
    holes: &[[f64; 2]],
    conforming: bool,
) -> Result<Mesh, TriangulateError> {
    let mut input = MeshBuffer::new();
    input.set_points(points)?;
    input.set_point_markers(&vec![0; points.len()])?;
    if !segments.is_empty() {
        input.set_segments(&checked_pairs(segments, points.len())?)?;
        input.set_segment_markers(&vec![0; segments.len()])?;
    }
    if !holes.is_empty() {
        input.set_holes(holes)?;
    }

    let options = Options {
        conforming_delaunay: conforming,
        ..Options::default()
    };
    let mut switches = options.to_switches();
    switches.push_str("pQ");

    let mut output = MeshBuffer::new();
    mesher::invoke(&switches, &input, &mut output, None)?;
    let mesh = Mesh {
        vertices: output.points(),
        triangles: corner_triples(&output),
    };
    input.release();
    output.release();
    Ok(mesh)
}

fn corner_triples(output: &MeshBuffer) -> Vec<[usize; 3]> {
    output
        .triangles()
        .into_iter()
        .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
        .collect()
}

fn checked_pairs(
    segments: &[[usize; 2]],
    limit: usize,
) -> Result<Vec<[i32; 2]>, TriangulateError> {
    let mut out = Vec::with_capacity(segments.len());
    for segment in segments {
        let mut pair = [0_i32; 2];
        for (slot, &index) in pair.iter_mut().zip(segment.iter()) {
            if index >= limit {
                return Err(TriangulateError::IndexOutOfRange {
                    kind: "segment endpoint",
                    index: index as i64,
                    limit,
                });
            }
            // The point setter already bounds the count to i32 range.
            *slot = index as i32;
        }
        out.push(pair);
    }
    Ok(out)
}

// =============================================================================
// TESTS
// =============================================================================
