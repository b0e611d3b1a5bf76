//! Voronoi dual of a Delaunay triangulation.
//!
//! Each triangle contributes one Voronoi vertex, its circumcenter,
//! co-indexed with the caller's triangle emission order. Each interior
//! triangulation edge contributes one finite Voronoi edge joining the
//! circumcenters of its two flanking triangles; each boundary edge
//! contributes an unbounded ray, encoded as `[origin, -1]` with the
//! outward unit normal of the boundary edge in the parallel `normals`
//! list. Finite edges carry a zero normal.

use super::TriangulateError;
use super::predicates::{circumcenter, distance};
use super::triangulation::{TriKey, Triangulation};
use crate::collections::{FastHashMap, fast_hash_map_with_capacity};

/// The dual diagram, in raw engine form.
#[derive(Clone, Debug, Default)]
pub struct VoronoiDual {
    /// One circumcenter per triangle, in `order` order.
    pub vertices: Vec<[f64; 2]>,
    /// Vertex index pairs; a second index of `-1` marks a ray.
    pub edges: Vec<[i32; 2]>,
    /// Ray directions co-indexed with `edges`, zero for finite edges.
    pub normals: Vec<[f64; 2]>,
}

/// Build the Voronoi dual, with triangles numbered by `order`.
///
/// # Errors
///
/// Returns `Internal` if a triangle is too close to degenerate for its
/// circumcenter to be computed.
pub fn dual(t: &Triangulation, order: &[TriKey]) -> Result<VoronoiDual, TriangulateError> {
    debug_assert_eq!(order.len(), t.triangle_count());

    let mut index_of: FastHashMap<TriKey, usize> = fast_hash_map_with_capacity(order.len());
    for (index, &key) in order.iter().enumerate() {
        index_of.insert(key, index);
    }

    let mut diagram = VoronoiDual {
        vertices: Vec::with_capacity(order.len()),
        edges: Vec::new(),
        normals: Vec::new(),
    };

    for &key in order {
        let [a, b, c] = t.corners(key);
        let Some(center) = circumcenter(a, b, c) else {
            return Err(TriangulateError::Internal {
                message: "degenerate triangle has no circumcenter".to_string(),
            });
        };
        diagram.vertices.push(center);
    }

    for (index, &key) in order.iter().enumerate() {
        for e in 0..3 {
            match t.tri(key).neighbors[e] {
                Some(nb) => {
                    let other = index_of[&nb];
                    // Interior edges are emitted once, from the lower side.
                    if index < other {
                        diagram.edges.push([index as i32, other as i32]);
                        diagram.normals.push([0.0, 0.0]);
                    }
                }
                None => {
                    let (u, v) = t.edge_vertices(key, e);
                    let pu = t.position(u);
                    let pv = t.position(v);
                    let length = distance(pu, pv);
                    // The edge runs counterclockwise around the mesh, so
                    // its right-hand normal points outward.
                    let normal = [(pv[1] - pu[1]) / length, (pu[0] - pv[0]) / length];
                    diagram.edges.push([index as i32, -1]);
                    diagram.normals.push(normal);
                }
            }
        }
    }

    tracing::debug!(
        vertices = diagram.vertices.len(),
        edges = diagram.edges.len(),
        "voronoi dual emitted"
    );
    Ok(diagram)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ray_normals(diagram: &VoronoiDual) -> Vec<[f64; 2]> {
        diagram
            .edges
            .iter()
            .zip(&diagram.normals)
            .filter(|(edge, _)| edge[1] == -1)
            .map(|(_, &normal)| normal)
            .collect()
    }

    #[test]
    fn single_triangle_dual_is_one_center_and_three_rays() {
        let t = Triangulation::new(&[[0.0, 0.0], [4.0, 0.0], [2.0, 3.0]], &[], &[], 0).unwrap();
        let order = t.tri_keys();
        let diagram = dual(&t, &order).unwrap();

        assert_eq!(diagram.vertices.len(), 1);
        assert_relative_eq!(diagram.vertices[0][0], 2.0);
        assert_relative_eq!(diagram.vertices[0][1], 5.0 / 6.0);

        assert_eq!(diagram.edges.len(), 3);
        assert!(diagram.edges.iter().all(|edge| edge == &[0, -1]));
        for normal in ray_normals(&diagram) {
            assert_relative_eq!(normal[0].hypot(normal[1]), 1.0, epsilon = 1e-12);
        }
        // The bottom edge's ray points straight down.
        assert!(
            ray_normals(&diagram)
                .iter()
                .any(|n| n[0].abs() < 1e-12 && (n[1] + 1.0).abs() < 1e-12)
        );
    }

    #[test]
    fn square_dual_joins_the_two_circumcenters() {
        let t = Triangulation::new(
            &[[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]],
            &[],
            &[],
            0,
        )
        .unwrap();
        let order = t.tri_keys();
        let diagram = dual(&t, &order).unwrap();

        // Both halves of the square have their circumcenter at the middle.
        assert_eq!(diagram.vertices.len(), 2);
        for vertex in &diagram.vertices {
            assert_relative_eq!(vertex[0], 2.0);
            assert_relative_eq!(vertex[1], 2.0);
        }

        assert_eq!(diagram.edges.len(), 5);
        let finite: Vec<_> = diagram.edges.iter().filter(|edge| edge[1] != -1).collect();
        assert_eq!(finite, vec![&[0, 1]]);

        let rays = ray_normals(&diagram);
        assert_eq!(rays.len(), 4);
        for expected in [[0.0, -1.0], [1.0, 0.0], [0.0, 1.0], [-1.0, 0.0]] {
            assert!(rays.iter().any(|n| {
                (n[0] - expected[0]).abs() < 1e-12 && (n[1] - expected[1]).abs() < 1e-12
            }));
        }
    }

    #[test]
    fn finite_edge_normals_are_zero() {
        let t = Triangulation::new(
            &[[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]],
            &[],
            &[],
            0,
        )
        .unwrap();
        let diagram = dual(&t, &t.tri_keys()).unwrap();
        for (edge, normal) in diagram.edges.iter().zip(&diagram.normals) {
            if edge[1] != -1 {
                assert_eq!(normal, &[0.0, 0.0]);
            }
        }
    }
}
