#![allow(missing_docs)]

//! Ownership and lifecycle behavior of [`MeshBuffer`] as seen through
//! the public triangulation surface.

use trigen::prelude::*;

fn ring_with_inner_hole() -> MeshBuffer {
    let mut input = MeshBuffer::new();
    input
        .set_points(&[
            [0.0, 0.0],
            [4.0, 0.0],
            [4.0, 4.0],
            [0.0, 4.0],
            [1.5, 1.5],
            [2.5, 1.5],
            [2.5, 2.5],
            [1.5, 2.5],
        ])
        .unwrap();
    input
        .set_segments(&[
            [0, 1],
            [1, 2],
            [2, 3],
            [3, 0],
            [4, 5],
            [5, 6],
            [6, 7],
            [7, 4],
        ])
        .unwrap();
    input.set_holes(&[[2.0, 2.0]]).unwrap();
    input
}

#[test]
fn a_released_input_keeps_the_output_alive() {
    let input = ring_with_inner_hole();
    let output = triangulate(&input, &Options::default(), false).unwrap();
    input.release();

    // The hole list was shared with the input, releasing one owner
    // leaves the other intact.
    assert_eq!(output.holes(), vec![[2.0, 2.0]]);
    assert_eq!(output.point_count(), 8);
    assert_eq!(output.triangle_count(), 8);
    output.release();
}

#[test]
fn an_input_buffer_serves_repeated_runs() {
    let mut input = MeshBuffer::new();
    input
        .set_points(&[[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]])
        .unwrap();
    let first = triangulate(&input, &Options::default(), false).unwrap();
    assert_eq!(first.triangle_count(), 2);
    first.release();

    // Replacing the point list rebinds the buffer to a new problem.
    input
        .set_points(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]])
        .unwrap();
    let second = triangulate(&input, &Options::default(), false).unwrap();
    assert_eq!(second.point_count(), 3);
    assert_eq!(second.triangle_count(), 1);

    input.release();
    second.release();
}

#[test]
fn a_fresh_buffer_reports_itself_unpopulated() {
    let input = MeshBuffer::new();
    assert!(input.is_unpopulated());

    let mut populated = MeshBuffer::new();
    populated.set_points(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]).unwrap();
    assert!(!populated.is_unpopulated());
    populated.release();
}

#[test]
fn empty_sequences_are_rejected_with_the_field_name() {
    let mut input = MeshBuffer::new();
    let error = input.set_points(&[]).unwrap_err();
    assert_eq!(error, BufferError::EmptyField { field: "point list" });
    assert_eq!(error.to_string(), "point list was given an empty sequence");
    input.release();
}

#[test]
fn mismatched_marker_lengths_report_both_sizes() {
    let mut input = MeshBuffer::new();
    input
        .set_points(&[[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]])
        .unwrap();
    let error = input.set_point_markers(&[1, 1, 1]).unwrap_err();
    assert_eq!(
        error,
        BufferError::LengthMismatch {
            field: "point marker list",
            expected: 4,
            actual: 3,
        }
    );
    assert_eq!(
        error.to_string(),
        "point marker list expects 4 values, got 3"
    );
    input.release();
}

#[test]
fn point_attributes_pass_through_a_plain_run() {
    let mut input = MeshBuffer::new();
    input
        .set_points(&[[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]])
        .unwrap();
    input
        .set_point_attributes(&[10.0, 20.0, 30.0, 40.0], 1)
        .unwrap();
    let output = triangulate(&input, &Options::default(), false).unwrap();

    assert_eq!(output.attributes_per_point(), 1);
    assert_eq!(output.point_attributes(), &[10.0, 20.0, 30.0, 40.0]);

    input.release();
    output.release();
}
