//! Explicit-ownership mesh I/O buffers.
//!
//! [`MeshBuffer`] mirrors the engine's I/O record field-for-field: flat
//! arrays of point, segment, triangle, hole, region and edge data, each
//! paired with a count field. A buffer starts zero-initialized (every
//! array absent, every count zero) because the engine distinguishes an
//! absent array from an empty one. Setters install a freshly allocated
//! array, dropping whatever the field held before, so repeated mutation
//! never leaks; readers project the flat arrays into fixed-arity items,
//! reading exactly `count * arity` values and never trusting an array
//! beyond its declared count.
//!
//! Ownership is single and explicit. Passing a buffer to the engine
//! borrows it; [`MeshBuffer::release`] consumes the buffer, so a second
//! release is a compile error rather than a double free. The one
//! sanctioned exception to single ownership is the hole and region
//! lists, which the engine shares between input and output buffer
//! (`Rc`, immutable) instead of copying.
//!
//! Allocation failure is not a recoverable condition: the global
//! allocator aborts the process, and callers should treat out-of-memory
//! as fatal.

use std::rc::Rc;

use thiserror::Error;

/// Errors raised by buffer setters before any array is touched.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// An array setter was handed an empty sequence.
    #[error("{field} was given an empty sequence")]
    EmptyField {
        /// Which buffer field the setter targets.
        field: &'static str,
    },
    /// A dependent array disagrees with its controlling count.
    #[error("{field} expects {expected} values, got {actual}")]
    LengthMismatch {
        /// Which buffer field the setter targets.
        field: &'static str,
        /// Length implied by the controlling count.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },
    /// A sequence is too long for the foreign `i32` count field.
    #[error("{field} with {len} items exceeds the engine count range")]
    CountOverflow {
        /// Which buffer field the setter targets.
        field: &'static str,
        /// Offending length.
        len: usize,
    },
}

/// The engine's I/O record.
///
/// Counts are kept in `i32`, matching the foreign layout the record
/// mirrors; setters reject lengths that do not fit.
#[derive(Debug, Default)]
pub struct MeshBuffer {
    point_list: Option<Box<[f64]>>,
    point_attribute_list: Option<Box<[f64]>>,
    point_marker_list: Option<Box<[i32]>>,
    number_of_points: i32,
    number_of_point_attributes: i32,

    triangle_list: Option<Box<[i32]>>,
    triangle_attribute_list: Option<Box<[f64]>>,
    triangle_area_list: Option<Box<[f64]>>,
    neighbor_list: Option<Box<[i32]>>,
    number_of_triangles: i32,
    number_of_corners: i32,
    number_of_triangle_attributes: i32,

    segment_list: Option<Box<[i32]>>,
    segment_marker_list: Option<Box<[i32]>>,
    number_of_segments: i32,

    hole_list: Option<Rc<[f64]>>,
    number_of_holes: i32,

    region_list: Option<Rc<[f64]>>,
    number_of_regions: i32,

    edge_list: Option<Box<[i32]>>,
    edge_marker_list: Option<Box<[i32]>>,
    normal_list: Option<Box<[f64]>>,
    number_of_edges: i32,
}

impl MeshBuffer {
    /// A zero-initialized buffer: every array absent, every count zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // SETTERS
    // =========================================================================

    /// Install the point list.
    ///
    /// # Errors
    ///
    /// `EmptyField` for an empty sequence, `CountOverflow` past the
    /// engine count range.
    pub fn set_points(&mut self, points: &[[f64; 2]]) -> Result<(), BufferError> {
        let count = checked_count("point list", points.len())?;
        self.point_list = Some(flatten2(points));
        self.number_of_points = count;
        Ok(())
    }

    /// Install one marker per point.
    ///
    /// # Errors
    ///
    /// `EmptyField`, or `LengthMismatch` against the point count.
    pub fn set_point_markers(&mut self, markers: &[i32]) -> Result<(), BufferError> {
        require_non_empty("point marker list", markers.len())?;
        require_length(
            "point marker list",
            self.number_of_points as usize,
            markers.len(),
        )?;
        self.point_marker_list = Some(markers.into());
        Ok(())
    }

    /// Install `per_point` attribute values per point.
    ///
    /// # Errors
    ///
    /// `EmptyField` for an empty sequence or zero arity, `LengthMismatch`
    /// when the sequence is not `point count * per_point` long.
    pub fn set_point_attributes(
        &mut self,
        attributes: &[f64],
        per_point: usize,
    ) -> Result<(), BufferError> {
        require_non_empty("point attribute list", attributes.len().min(per_point))?;
        require_length(
            "point attribute list",
            self.number_of_points as usize * per_point,
            attributes.len(),
        )?;
        let arity = checked_count("point attribute list", per_point)?;
        self.point_attribute_list = Some(attributes.into());
        self.number_of_point_attributes = arity;
        Ok(())
    }

    /// Install the segment list (pairs of point indices).
    ///
    /// # Errors
    ///
    /// `EmptyField` or `CountOverflow`.
    pub fn set_segments(&mut self, segments: &[[i32; 2]]) -> Result<(), BufferError> {
        let count = checked_count("segment list", segments.len())?;
        self.segment_list = Some(flatten2(segments));
        self.number_of_segments = count;
        Ok(())
    }

    /// Install one marker per segment.
    ///
    /// # Errors
    ///
    /// `EmptyField`, or `LengthMismatch` against the segment count.
    pub fn set_segment_markers(&mut self, markers: &[i32]) -> Result<(), BufferError> {
        require_non_empty("segment marker list", markers.len())?;
        require_length(
            "segment marker list",
            self.number_of_segments as usize,
            markers.len(),
        )?;
        self.segment_marker_list = Some(markers.into());
        Ok(())
    }

    /// Install the hole seed list.
    ///
    /// # Errors
    ///
    /// `EmptyField` or `CountOverflow`.
    pub fn set_holes(&mut self, holes: &[[f64; 2]]) -> Result<(), BufferError> {
        let count = checked_count("hole list", holes.len())?;
        self.hole_list = Some(Rc::from(flatten2(holes)));
        self.number_of_holes = count;
        Ok(())
    }

    /// Install the region list (seed x, seed y, attribute, area bound).
    ///
    /// # Errors
    ///
    /// `EmptyField` or `CountOverflow`.
    pub fn set_regions(&mut self, regions: &[[f64; 4]]) -> Result<(), BufferError> {
        let count = checked_count("region list", regions.len())?;
        let mut flat = Vec::with_capacity(regions.len() * 4);
        for region in regions {
            flat.extend_from_slice(region);
        }
        self.region_list = Some(Rc::from(flat.into_boxed_slice()));
        self.number_of_regions = count;
        Ok(())
    }

    /// Install the triangle list (corner index triples).
    ///
    /// # Errors
    ///
    /// `EmptyField` or `CountOverflow`.
    pub fn set_triangles(&mut self, triangles: &[[i32; 3]]) -> Result<(), BufferError> {
        let count = checked_count("triangle list", triangles.len())?;
        let mut flat = Vec::with_capacity(triangles.len() * 3);
        for triangle in triangles {
            flat.extend_from_slice(triangle);
        }
        self.triangle_list = Some(flat.into_boxed_slice());
        self.number_of_triangles = count;
        self.number_of_corners = 3;
        Ok(())
    }

    /// Install one area constraint per triangle.
    ///
    /// # Errors
    ///
    /// `EmptyField`, or `LengthMismatch` against the triangle count.
    pub fn set_triangle_areas(&mut self, areas: &[f64]) -> Result<(), BufferError> {
        require_non_empty("triangle area list", areas.len())?;
        require_length(
            "triangle area list",
            self.number_of_triangles as usize,
            areas.len(),
        )?;
        self.triangle_area_list = Some(areas.into());
        Ok(())
    }

    /// Install the edge list (pairs of point indices).
    ///
    /// # Errors
    ///
    /// `EmptyField` or `CountOverflow`.
    pub fn set_edges(&mut self, edges: &[[i32; 2]]) -> Result<(), BufferError> {
        let count = checked_count("edge list", edges.len())?;
        self.edge_list = Some(flatten2(edges));
        self.number_of_edges = count;
        Ok(())
    }

    // =========================================================================
    // READERS
    // =========================================================================

    /// Points as coordinate pairs.
    #[must_use]
    pub fn points(&self) -> Vec<[f64; 2]> {
        chunked(self.point_list.as_deref(), self.number_of_points)
    }

    /// One marker per point (empty when markers were never installed).
    #[must_use]
    pub fn point_markers(&self) -> &[i32] {
        bounded(
            self.point_marker_list.as_deref(),
            self.number_of_points as usize,
        )
    }

    /// Flat attribute rows, `attributes_per_point` values per point.
    #[must_use]
    pub fn point_attributes(&self) -> &[f64] {
        bounded(
            self.point_attribute_list.as_deref(),
            self.number_of_points as usize * self.number_of_point_attributes as usize,
        )
    }

    /// Segments as index pairs.
    #[must_use]
    pub fn segments(&self) -> Vec<[i32; 2]> {
        chunked(self.segment_list.as_deref(), self.number_of_segments)
    }

    /// One marker per segment (empty when never installed).
    #[must_use]
    pub fn segment_markers(&self) -> &[i32] {
        bounded(
            self.segment_marker_list.as_deref(),
            self.number_of_segments as usize,
        )
    }

    /// Hole seed points.
    #[must_use]
    pub fn holes(&self) -> Vec<[f64; 2]> {
        chunked(self.hole_list.as_deref(), self.number_of_holes)
    }

    /// Regions as (seed x, seed y, attribute, area bound) rows.
    #[must_use]
    pub fn regions(&self) -> Vec<[f64; 4]> {
        chunked(self.region_list.as_deref(), self.number_of_regions)
    }

    /// Triangles as corner index triples.
    #[must_use]
    pub fn triangles(&self) -> Vec<[i32; 3]> {
        chunked(self.triangle_list.as_deref(), self.number_of_triangles)
    }

    /// Flat triangle attribute rows (never engine-populated here).
    #[must_use]
    pub fn triangle_attributes(&self) -> &[f64] {
        bounded(
            self.triangle_attribute_list.as_deref(),
            self.number_of_triangles as usize * self.number_of_triangle_attributes as usize,
        )
    }

    /// One area constraint per triangle (empty when never installed).
    #[must_use]
    pub fn triangle_areas(&self) -> &[f64] {
        bounded(
            self.triangle_area_list.as_deref(),
            self.number_of_triangles as usize,
        )
    }

    /// Neighbor triples, `-1` marking a missing neighbor.
    #[must_use]
    pub fn neighbors(&self) -> Vec<[i32; 3]> {
        chunked(self.neighbor_list.as_deref(), self.number_of_triangles)
    }

    /// Edges as index pairs; in Voronoi output a second index of `-1`
    /// marks an unbounded ray.
    #[must_use]
    pub fn edges(&self) -> Vec<[i32; 2]> {
        chunked(self.edge_list.as_deref(), self.number_of_edges)
    }

    /// One marker per edge (empty when never installed).
    #[must_use]
    pub fn edge_markers(&self) -> &[i32] {
        bounded(
            self.edge_marker_list.as_deref(),
            self.number_of_edges as usize,
        )
    }

    /// Ray directions co-indexed with [`Self::edges`].
    #[must_use]
    pub fn normals(&self) -> Vec<[f64; 2]> {
        chunked(self.normal_list.as_deref(), self.number_of_edges)
    }

    // =========================================================================
    // COUNTS
    // =========================================================================

    /// Number of points.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.number_of_points.max(0) as usize
    }

    /// Attribute values stored per point.
    #[must_use]
    pub fn attributes_per_point(&self) -> usize {
        self.number_of_point_attributes.max(0) as usize
    }

    /// Number of triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.number_of_triangles.max(0) as usize
    }

    /// Corner entries stored per triangle (3 in every output here).
    #[must_use]
    pub fn corners_per_triangle(&self) -> usize {
        self.number_of_corners.max(0) as usize
    }

    /// Number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.number_of_segments.max(0) as usize
    }

    /// Number of hole seeds.
    #[must_use]
    pub fn hole_count(&self) -> usize {
        self.number_of_holes.max(0) as usize
    }

    /// Number of regions.
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.number_of_regions.max(0) as usize
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.number_of_edges.max(0) as usize
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// True while no field has been populated.
    #[must_use]
    pub fn is_unpopulated(&self) -> bool {
        self.point_list.is_none()
            && self.triangle_list.is_none()
            && self.segment_list.is_none()
            && self.hole_list.is_none()
            && self.region_list.is_none()
            && self.edge_list.is_none()
            && self.number_of_points == 0
            && self.number_of_triangles == 0
    }

    /// Free every owned array and the record itself.
    ///
    /// Consuming `self` makes a second release a compile error, which is
    /// how this layer rules out the foreign double-free.
    pub fn release(self) {
        drop(self);
    }

    // =========================================================================
    // ENGINE-SIDE INSTALLS
    // =========================================================================

    pub(crate) fn install_points(
        &mut self,
        flat: Vec<f64>,
        markers: Vec<i32>,
        attributes: Vec<f64>,
        per_point: usize,
    ) -> Result<(), BufferError> {
        let count = checked_count("point list", flat.len() / 2)?;
        debug_assert_eq!(markers.len(), flat.len() / 2);
        self.point_list = Some(flat.into_boxed_slice());
        self.point_marker_list = Some(markers.into_boxed_slice());
        self.number_of_points = count;
        if per_point > 0 {
            self.point_attribute_list = Some(attributes.into_boxed_slice());
            self.number_of_point_attributes = checked_count("point attribute list", per_point)?;
        }
        Ok(())
    }

    pub(crate) fn install_triangles(&mut self, flat: Vec<i32>) -> Result<(), BufferError> {
        let count = checked_count("triangle list", flat.len() / 3)?;
        self.triangle_list = Some(flat.into_boxed_slice());
        self.number_of_triangles = count;
        self.number_of_corners = 3;
        Ok(())
    }

    pub(crate) fn install_neighbors(&mut self, flat: Vec<i32>) {
        debug_assert_eq!(flat.len(), self.number_of_triangles as usize * 3);
        self.neighbor_list = Some(flat.into_boxed_slice());
    }

    pub(crate) fn install_segments(
        &mut self,
        flat: Vec<i32>,
        markers: Vec<i32>,
    ) -> Result<(), BufferError> {
        let count = checked_count("segment list", flat.len() / 2)?;
        debug_assert_eq!(markers.len(), flat.len() / 2);
        self.segment_list = Some(flat.into_boxed_slice());
        self.segment_marker_list = Some(markers.into_boxed_slice());
        self.number_of_segments = count;
        Ok(())
    }

    pub(crate) fn install_edges(
        &mut self,
        flat: Vec<i32>,
        markers: Option<Vec<i32>>,
    ) -> Result<(), BufferError> {
        let count = checked_count("edge list", flat.len() / 2)?;
        self.edge_list = Some(flat.into_boxed_slice());
        self.edge_marker_list = markers.map(Vec::into_boxed_slice);
        self.number_of_edges = count;
        Ok(())
    }

    pub(crate) fn install_normals(&mut self, flat: Vec<f64>) {
        debug_assert_eq!(flat.len(), self.number_of_edges as usize * 2);
        self.normal_list = Some(flat.into_boxed_slice());
    }

    /// Share the input buffer's hole list instead of copying it.
    pub(crate) fn share_holes_from(&mut self, input: &MeshBuffer) {
        self.hole_list = input.hole_list.clone();
        self.number_of_holes = input.number_of_holes;
    }

    /// Share the input buffer's region list instead of copying it.
    pub(crate) fn share_regions_from(&mut self, input: &MeshBuffer) {
        self.region_list = input.region_list.clone();
        self.number_of_regions = input.number_of_regions;
    }
}

fn require_non_empty(field: &'static str, len: usize) -> Result<(), BufferError> {
    if len == 0 {
        return Err(BufferError::EmptyField { field });
    }
    Ok(())
}

fn require_length(field: &'static str, expected: usize, actual: usize) -> Result<(), BufferError> {
    if expected != actual {
        return Err(BufferError::LengthMismatch {
            field,
            expected,
            actual,
        });
    }
    Ok(())
}

fn checked_count(field: &'static str, len: usize) -> Result<i32, BufferError> {
    require_non_empty(field, len)?;
    i32::try_from(len).map_err(|_| BufferError::CountOverflow { field, len })
}

fn flatten2<T: Copy>(items: &[[T; 2]]) -> Box<[T]> {
    let mut flat = Vec::with_capacity(items.len() * 2);
    for item in items {
        flat.extend_from_slice(item);
    }
    flat.into_boxed_slice()
}

fn bounded<'a, T>(list: Option<&'a [T]>, count: usize) -> &'a [T] {
    match list {
        Some(data) => &data[..count.min(data.len())],
        None => &[],
    }
}

fn chunked<T: Copy + Default, const N: usize>(list: Option<&[T]>, count: i32) -> Vec<[T; N]> {
    let Some(data) = list else {
        return Vec::new();
    };
    let wanted = count.max(0) as usize * N;
    data[..wanted.min(data.len())]
        .chunks_exact(N)
        .map(|chunk| {
            let mut item = [T::default(); N];
            item.copy_from_slice(chunk);
            item
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_new_buffer_is_unpopulated() {
        let buffer = MeshBuffer::new();
        assert!(buffer.is_unpopulated());
        assert_eq!(buffer.point_count(), 0);
        assert!(buffer.points().is_empty());
        assert!(buffer.point_markers().is_empty());
        assert!(buffer.triangles().is_empty());
        assert!(buffer.segments().is_empty());
        assert!(buffer.edges().is_empty());
    }

    #[test]
    fn points_round_trip_and_reread_equal() {
        let mut buffer = MeshBuffer::new();
        let points = [[0.0, 1.0], [2.0, 3.0], [4.0, 5.0]];
        buffer.set_points(&points).unwrap();

        assert_eq!(buffer.point_count(), 3);
        assert_eq!(buffer.points(), points.to_vec());
        // Extraction is idempotent.
        assert_eq!(buffer.points(), buffer.points());
    }

    #[test]
    fn an_empty_point_sequence_is_rejected() {
        let mut buffer = MeshBuffer::new();
        assert_eq!(
            buffer.set_points(&[]),
            Err(BufferError::EmptyField {
                field: "point list"
            })
        );
        assert!(buffer.is_unpopulated());
    }

    #[test]
    fn replacing_points_keeps_only_the_second_sequence() {
        let mut buffer = MeshBuffer::new();
        buffer.set_points(&[[0.0, 0.0], [1.0, 1.0]]).unwrap();
        buffer.set_points(&[[9.0, 9.0], [8.0, 8.0], [7.0, 7.0]]).unwrap();

        assert_eq!(buffer.point_count(), 3);
        assert_eq!(
            buffer.points(),
            vec![[9.0, 9.0], [8.0, 8.0], [7.0, 7.0]]
        );
    }

    #[test]
    fn marker_length_must_match_the_point_count() {
        let mut buffer = MeshBuffer::new();
        buffer.set_points(&[[0.0, 0.0], [1.0, 1.0]]).unwrap();

        assert_eq!(
            buffer.set_point_markers(&[1, 2, 3]),
            Err(BufferError::LengthMismatch {
                field: "point marker list",
                expected: 2,
                actual: 3,
            })
        );
        buffer.set_point_markers(&[1, 2]).unwrap();
        assert_eq!(buffer.point_markers(), &[1, 2]);
    }

    #[test]
    fn attribute_rows_follow_their_arity() {
        let mut buffer = MeshBuffer::new();
        buffer.set_points(&[[0.0, 0.0], [1.0, 1.0]]).unwrap();
        buffer
            .set_point_attributes(&[10.0, 11.0, 20.0, 21.0], 2)
            .unwrap();

        assert_eq!(buffer.attributes_per_point(), 2);
        assert_eq!(buffer.point_attributes(), &[10.0, 11.0, 20.0, 21.0]);

        assert_eq!(
            buffer.set_point_attributes(&[1.0, 2.0, 3.0], 2),
            Err(BufferError::LengthMismatch {
                field: "point attribute list",
                expected: 4,
                actual: 3,
            })
        );
    }

    #[test]
    fn segment_markers_are_checked_against_the_segment_count() {
        let mut buffer = MeshBuffer::new();
        buffer.set_segments(&[[0, 1], [1, 2]]).unwrap();

        assert_eq!(buffer.segments(), vec![[0, 1], [1, 2]]);
        assert!(buffer.set_segment_markers(&[5]).is_err());
        buffer.set_segment_markers(&[5, 6]).unwrap();
        assert_eq!(buffer.segment_markers(), &[5, 6]);
    }

    #[test]
    fn triangle_areas_are_checked_against_the_triangle_count() {
        let mut buffer = MeshBuffer::new();
        buffer.set_triangles(&[[0, 1, 2], [1, 2, 3]]).unwrap();

        assert_eq!(buffer.corners_per_triangle(), 3);
        assert_eq!(buffer.triangles(), vec![[0, 1, 2], [1, 2, 3]]);
        assert!(buffer.set_triangle_areas(&[0.5]).is_err());
        buffer.set_triangle_areas(&[0.5, 0.25]).unwrap();
        assert_eq!(buffer.triangle_areas(), &[0.5, 0.25]);
    }

    #[test]
    fn hole_lists_share_one_allocation_when_aliased() {
        let mut input = MeshBuffer::new();
        input.set_holes(&[[0.5, 0.5]]).unwrap();

        let mut output = MeshBuffer::new();
        output.share_holes_from(&input);

        assert_eq!(output.holes(), input.holes());
        let a = input.hole_list.as_ref().expect("input holes set");
        let b = output.hole_list.as_ref().expect("output holes aliased");
        assert!(Rc::ptr_eq(a, b));

        // Releasing one owner leaves the other fully usable.
        input.release();
        assert_eq!(output.holes(), vec![[0.5, 0.5]]);
    }

    #[test]
    fn edges_and_normals_project_in_step() {
        let mut buffer = MeshBuffer::new();
        buffer.set_edges(&[[0, 1], [2, -1]]).unwrap();
        buffer.install_normals(vec![0.0, 0.0, 0.6, 0.8]);

        assert_eq!(buffer.edges(), vec![[0, 1], [2, -1]]);
        assert_eq!(buffer.normals(), vec![[0.0, 0.0], [0.6, 0.8]]);
    }
}
