#![allow(missing_docs)]

//! Property-based checks over the public operations: random point
//! clouds triangulate to meshes that cover their convex hull, and the
//! Voronoi diagram stays in step with its Delaunay dual.

use approx::relative_eq;
use proptest::collection::vec;
use proptest::prelude::*;
use trigen::prelude::*;

// =============================================================================
// STRATEGIES AND HELPERS
// =============================================================================

fn finite_coordinate() -> impl Strategy<Value = f64> {
    (-100.0..100.0).prop_filter("coordinate must be finite", |x: &f64| x.is_finite())
}

fn point() -> impl Strategy<Value = [f64; 2]> {
    (finite_coordinate(), finite_coordinate()).prop_map(|(x, y)| [x, y])
}

/// Drop points that collide bit-for-bit, keeping first occurrences.
fn dedup_points(raw: Vec<[f64; 2]>) -> Vec<[f64; 2]> {
    let mut seen: FastHashSet<(u64, u64)> = FastHashSet::default();
    raw.into_iter()
        .filter(|p| seen.insert((p[0].to_bits(), p[1].to_bits())))
        .collect()
}

fn cross(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// Convex hull by Andrew's monotone chain, counterclockwise, strict.
fn convex_hull(points: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
    let mut hull: Vec<[f64; 2]> = Vec::new();
    for pass in 0..2 {
        let start = hull.len();
        let walk: Box<dyn Iterator<Item = &[f64; 2]>> = if pass == 0 {
            Box::new(sorted.iter())
        } else {
            Box::new(sorted.iter().rev())
        };
        for &p in walk {
            while hull.len() > start + 1
                && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
            {
                hull.pop();
            }
            hull.push(p);
        }
        hull.pop();
    }
    hull
}

fn polygon_area(ring: &[[f64; 2]]) -> f64 {
    let mut doubled = 0.0;
    for (i, p) in ring.iter().enumerate() {
        let q = ring[(i + 1) % ring.len()];
        doubled += p[0] * q[1] - p[1] * q[0];
    }
    0.5 * doubled.abs()
}

fn mesh_area(vertices: &[[f64; 2]], triangles: &[[usize; 3]]) -> f64 {
    triangles
        .iter()
        .map(|t| 0.5 * cross(vertices[t[0]], vertices[t[1]], vertices[t[2]]).abs())
        .sum()
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn delaunay_covers_the_hull_of_any_point_cloud(raw in vec(point(), 3..24)) {
        let points = dedup_points(raw);
        prop_assume!(points.len() >= 3);

        match delaunay(&points) {
            Ok(triangles) => {
                for t in &triangles {
                    for &corner in t {
                        prop_assert!(corner < points.len());
                    }
                }
                let hull = convex_hull(&points);
                prop_assert!(relative_eq!(
                    mesh_area(&points, &triangles),
                    polygon_area(&hull),
                    epsilon = 1e-9,
                    max_relative = 1e-9
                ));
            }
            // Collinear clouds, and pairs coinciding up to the sign of
            // zero, are rejected rather than mistriangulated.
            Err(TriangulateError::DegenerateInput { .. }) => {}
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }

    #[test]
    fn voronoi_stays_in_step_with_its_delaunay_dual(raw in vec(point(), 3..24)) {
        let points = dedup_points(raw);
        prop_assume!(points.len() >= 3);

        if let Ok(triangles) = delaunay(&points) {
            let diagram = voronoi(&points);
            prop_assert!(diagram.is_ok());
            let diagram = diagram.unwrap();

            prop_assert_eq!(diagram.vertices.len(), triangles.len());
            prop_assert_eq!(diagram.ray_origins.len(), diagram.ray_directions.len());
            for edge in &diagram.edges {
                prop_assert!(edge[0] < diagram.vertices.len());
                prop_assert!(edge[1] < diagram.vertices.len());
            }
            for &origin in &diagram.ray_origins {
                prop_assert!(origin < diagram.vertices.len());
            }
            for direction in &diagram.ray_directions {
                let norm = (direction[0] * direction[0] + direction[1] * direction[1]).sqrt();
                prop_assert!((norm - 1.0).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn a_convex_ring_triangulates_without_steiner_points(raw in vec(point(), 4..32)) {
        let points = dedup_points(raw);
        let hull = convex_hull(&points);
        prop_assume!(hull.len() >= 3);

        let ring: Vec<[usize; 2]> = (0..hull.len())
            .map(|i| [i, (i + 1) % hull.len()])
            .collect();
        let mesh = constrained_delaunay(&hull, &ring, &[]);
        prop_assert!(mesh.is_ok());
        let mesh = mesh.unwrap();

        // A convex polygon with no interior points triangulates into
        // exactly n - 2 triangles on the original vertices.
        prop_assert_eq!(&mesh.vertices, &hull);
        prop_assert_eq!(mesh.triangles.len(), hull.len() - 2);
        prop_assert!(relative_eq!(
            mesh_area(&mesh.vertices, &mesh.triangles),
            polygon_area(&hull),
            epsilon = 1e-9,
            max_relative = 1e-9
        ));
    }
}
