#![allow(missing_docs)]

//! Quality refinement through the public options surface: area bounds,
//! angle bounds, Steiner caps, and the segment splitting policy.

use approx::assert_relative_eq;
use trigen::prelude::*;

fn square() -> [[f64; 2]; 4] {
    [[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]]
}

fn ring() -> [[i32; 2]; 4] {
    [[0, 1], [1, 2], [2, 3], [3, 0]]
}

fn square_buffer() -> MeshBuffer {
    let mut input = MeshBuffer::new();
    input.set_points(&square()).unwrap();
    input
}

fn triangle_area(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    0.5 * ((b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])).abs()
}

fn corner_angle(at: [f64; 2], p: [f64; 2], q: [f64; 2]) -> f64 {
    let u = [p[0] - at[0], p[1] - at[1]];
    let v = [q[0] - at[0], q[1] - at[1]];
    let dot = u[0] * v[0] + u[1] * v[1];
    let nu = (u[0] * u[0] + u[1] * u[1]).sqrt();
    let nv = (v[0] * v[0] + v[1] * v[1]).sqrt();
    (dot / (nu * nv)).clamp(-1.0, 1.0).acos().to_degrees()
}

fn min_angle_degrees(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    corner_angle(a, b, c)
        .min(corner_angle(b, c, a))
        .min(corner_angle(c, a, b))
}

fn triangle_areas(output: &MeshBuffer) -> Vec<f64> {
    let points = output.points();
    output
        .triangles()
        .iter()
        .map(|t| {
            triangle_area(
                points[t[0] as usize],
                points[t[1] as usize],
                points[t[2] as usize],
            )
        })
        .collect()
}

#[test]
fn default_options_leave_the_mesh_unrefined() {
    let input = square_buffer();
    let output = triangulate(&input, &Options::default(), false).unwrap();

    assert_eq!(output.point_count(), 4);
    assert_eq!(output.triangle_count(), 2);
    assert_eq!(output.segment_count(), 0);

    input.release();
    output.release();
}

#[test]
fn an_area_bound_subdivides_the_square() {
    let input = square_buffer();
    let options = OptionsBuilder::default().max_area(1.0).build().unwrap();
    let output = triangulate(&input, &options, false).unwrap();

    let areas = triangle_areas(&output);
    assert!(areas.len() >= 16, "16 square units at 1.0 apiece");
    for &area in &areas {
        assert!(area <= 1.0 + 1e-9);
    }
    assert_relative_eq!(areas.iter().sum::<f64>(), 16.0, epsilon = 1e-9);

    input.release();
    output.release();
}

#[test]
fn an_angle_bound_removes_thin_triangles() {
    let mut input = MeshBuffer::new();
    input
        .set_points(&[[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [2.0, 0.2]])
        .unwrap();
    let options = OptionsBuilder::default().min_angle(20.0).build().unwrap();
    let output = triangulate(&input, &options, false).unwrap();

    let points = output.points();
    for t in output.triangles() {
        let angle = min_angle_degrees(
            points[t[0] as usize],
            points[t[1] as usize],
            points[t[2] as usize],
        );
        assert!(angle >= 20.0, "triangle {t:?} has a {angle:.2} degree corner");
    }
    assert_relative_eq!(triangle_areas(&output).iter().sum::<f64>(), 16.0, epsilon = 1e-9);

    input.release();
    output.release();
}

#[test]
fn a_steiner_cap_limits_added_points() {
    let input = square_buffer();
    let options = OptionsBuilder::default()
        .max_area(0.5)
        .steiner_limit(3)
        .build()
        .unwrap();
    let output = triangulate(&input, &options, false).unwrap();

    // The bound wants around 32 triangles, the cap stops it first.
    assert!(output.point_count() > 4);
    assert!(output.point_count() <= 4 + 3);

    input.release();
    output.release();
}

#[test]
fn forbidding_splits_keeps_every_segment_whole() {
    let mut input = square_buffer();
    input.set_segments(&ring()).unwrap();
    let options = OptionsBuilder::default()
        .max_area(1.0)
        .segment_splitting(SegmentSplitting::NoSplitting)
        .build()
        .unwrap();
    let output = triangulate(&input, &options, false).unwrap();

    // Interior insertion still happens, the ring is left alone.
    assert!(output.triangle_count() > 2);
    assert_eq!(output.segment_count(), 4);
    let mut pairs: Vec<[i32; 2]> = output
        .segments()
        .iter()
        .map(|s| [s[0].min(s[1]), s[0].max(s[1])])
        .collect();
    pairs.sort_unstable();
    assert_eq!(pairs, vec![[0, 1], [0, 3], [1, 2], [2, 3]]);
    assert_relative_eq!(triangle_areas(&output).iter().sum::<f64>(), 16.0, epsilon = 1e-9);

    input.release();
    output.release();
}

#[test]
fn conforming_splits_follow_the_splitting_policy() {
    // The interior point encroaches the bottom segment, so conforming
    // mode wants to split it. One Y forbids exactly that.
    let points = [[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [2.0, 0.2]];

    let mut split_input = MeshBuffer::new();
    split_input.set_points(&points).unwrap();
    split_input.set_segments(&ring()).unwrap();
    let split = triangulate(
        &split_input,
        &OptionsBuilder::default()
            .conforming_delaunay(true)
            .build()
            .unwrap(),
        false,
    )
    .unwrap();
    assert!(split.point_count() > 5);

    let mut kept_input = MeshBuffer::new();
    kept_input.set_points(&points).unwrap();
    kept_input.set_segments(&ring()).unwrap();
    let kept = triangulate(
        &kept_input,
        &OptionsBuilder::default()
            .conforming_delaunay(true)
            .segment_splitting(SegmentSplitting::NoBoundarySplitting)
            .build()
            .unwrap(),
        false,
    )
    .unwrap();
    assert_eq!(kept.point_count(), 5);

    split_input.release();
    split.release();
    kept_input.release();
    kept.release();
}
