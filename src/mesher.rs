//! The meshing engine behind the buffer boundary.
//!
//! [`invoke`] is the single entry point: it reads a populated input
//! [`MeshBuffer`], runs the pipeline selected by a switch string, and
//! installs the results into caller-provided output buffers. The
//! submodules hold the machinery: robust [`predicates`], the
//! incremental Delaunay kernel in [`triangulation`], segment recovery
//! and hole carving in [`constraint`], conforming and quality
//! refinement in [`refine`], and the Voronoi dual in [`voronoi`].
//!
//! Switches follow the classic command-line vocabulary: `p` reads a
//! segment-bounded geometry, `q`/`a` set quality bounds, `D` makes the
//! result conforming Delaunay, `c` keeps the convex hull, `S` caps
//! Steiner points, `Y` restricts segment splitting, `v` produces the
//! Voronoi diagram, `z` numbers output from zero, `e`/`n` emit edge and
//! neighbor lists, and `Q` silences the run summary. Unrecognized
//! letters are ignored.

pub mod constraint;
pub mod predicates;
pub mod refine;
pub mod triangulation;
pub mod voronoi;

use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

use self::constraint::{Subsegment, carve, constrain_hull, force_segments, prune_dead_subsegments};
use self::refine::{SteinerBudget, conform, ruppert};
use self::triangulation::{TriKey, Triangulation};
use self::voronoi::dual;
use crate::buffer::{BufferError, MeshBuffer};
use crate::collections::{FastHashMap, fast_hash_map_with_capacity};

pub use self::refine::{FALLBACK_STEINER_LIMIT, SplitPolicy};

/// Errors surfaced by the engine and the marshalling layer around it.
#[derive(Debug, Error)]
pub enum TriangulateError {
    /// A buffer setter rejected its input.
    #[error(transparent)]
    Buffer(#[from] BufferError),
    /// The input buffer carries no points at all.
    #[error("input buffer has no points")]
    MissingPoints,
    /// An index in the input refers outside the point list.
    #[error("{kind} index {index} is out of range for {limit} points")]
    IndexOutOfRange {
        /// Which input array held the bad index.
        kind: &'static str,
        /// The offending value as given.
        index: i64,
        /// Number of points the index had to address.
        limit: usize,
    },
    /// The input geometry admits no triangulation.
    #[error("degenerate input: {message}")]
    DegenerateInput {
        /// Human-readable description of the defect.
        message: String,
    },
    /// An internal invariant failed; the mesh state is unusable.
    #[error("internal invariant broken: {message}")]
    Internal {
        /// Human-readable description of the breakage.
        message: String,
    },
}

/// Switch string decoded into engine behavior.
#[derive(Clone, Debug, PartialEq)]
pub struct Behavior {
    /// `z`: number output vertices, triangles and edges from zero.
    pub zero_indexed: bool,
    /// `q<angle>`: minimum interior angle in degrees; 0 disables the bound.
    pub min_angle: f64,
    /// `a<area>`: maximum triangle area; 0 disables the bound.
    pub max_area: f64,
    /// `D`: split subsegments until the mesh is conforming Delaunay.
    pub conforming: bool,
    /// `c`: enclose the convex hull instead of eating the exterior.
    pub convex_hull: bool,
    /// `S<count>`: cap on inserted Steiner points, -1 for no explicit cap.
    pub steiner_limit: i32,
    /// `Y`/`YY`: which edges refinement may split.
    pub splitting: SplitPolicy,
    /// `p`: the input is a segment-bounded geometry.
    pub pslg: bool,
    /// `v`: also produce the Voronoi diagram.
    pub voronoi: bool,
    /// `Q`: suppress the run summary.
    pub quiet: bool,
    /// `e`: emit the edge list.
    pub edge_list: bool,
    /// `n`: emit the neighbor list.
    pub neighbor_list: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            zero_indexed: false,
            min_angle: 0.0,
            max_area: 0.0,
            conforming: false,
            convex_hull: false,
            steiner_limit: -1,
            splitting: SplitPolicy::Allowed,
            pslg: false,
            voronoi: false,
            quiet: false,
            edge_list: false,
            neighbor_list: false,
        }
    }
}

impl Behavior {
    /// Decode a switch string.
    ///
    /// A bare `q` asks for 20 degrees, a bare `a` leaves the area bound
    /// disabled (per-triangle bounds are not consulted here), and a bare
    /// `S` forbids Steiner points entirely. Unknown letters are skipped.
    #[must_use]
    pub fn parse(switches: &str) -> Self {
        let mut behavior = Self::default();
        let mut chars = switches.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                'z' => behavior.zero_indexed = true,
                'q' => behavior.min_angle = take_number(&mut chars).unwrap_or(20.0),
                'a' => behavior.max_area = take_number(&mut chars).unwrap_or(0.0),
                'D' => behavior.conforming = true,
                'c' => behavior.convex_hull = true,
                'S' => {
                    behavior.steiner_limit =
                        take_number(&mut chars).map_or(0, |n| n as i32);
                }
                'Y' => {
                    behavior.splitting = match behavior.splitting {
                        SplitPolicy::Allowed => SplitPolicy::NoBoundary,
                        _ => SplitPolicy::Never,
                    };
                }
                'p' => behavior.pslg = true,
                'v' => behavior.voronoi = true,
                'Q' => behavior.quiet = true,
                'e' => behavior.edge_list = true,
                'n' => behavior.neighbor_list = true,
                other => {
                    tracing::debug!(switch = %other, "ignoring unrecognized switch");
                }
            }
        }
        behavior
    }

    /// Whether an angle or area bound makes quality refinement run.
    #[must_use]
    pub fn quality_active(&self) -> bool {
        self.min_angle > 0.0 || self.max_area > 0.0
    }
}

/// Read the digits (and decimal point) following a value-carrying switch.
fn take_number(chars: &mut Peekable<Chars<'_>>) -> Option<f64> {
    let mut digits = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() || c == '.' {
            digits.push(c);
            chars.next();
        } else {
            break;
        }
    }
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// Run the engine.
///
/// `input` is borrowed and left untouched; results land in `output`,
/// which should be freshly created. When the switch string contains `v`,
/// the Voronoi diagram lands in `voronoi_output` (a caller passing `v`
/// without a buffer gets the mesh but no diagram).
///
/// # Errors
///
/// `MissingPoints` for an empty input, `IndexOutOfRange` for segment
/// endpoints outside the point list, `DegenerateInput` for point sets
/// that admit no triangulation or segments that cross, and `Internal`
/// if the mesh invariants break mid-run.
pub fn invoke(
    switches: &str,
    input: &MeshBuffer,
    output: &mut MeshBuffer,
    voronoi_output: Option<&mut MeshBuffer>,
) -> Result<(), TriangulateError> {
    let behavior = Behavior::parse(switches);
    debug_assert!(output.is_unpopulated(), "output buffer must start empty");

    let points = input.points();
    if points.is_empty() {
        return Err(TriangulateError::MissingPoints);
    }
    let markers = input.point_markers().to_vec();
    let attributes = input.point_attributes().to_vec();
    let per_point = input.attributes_per_point();
    let base = i32::from(!behavior.zero_indexed);

    let mut t = Triangulation::new(&points, &markers, &attributes, per_point)?;

    let mut subsegments: Vec<Subsegment> = Vec::new();
    if behavior.pslg {
        let segments = checked_segments(input, points.len(), base)?;
        if segments.is_empty() {
            subsegments = constrain_hull(&mut t);
        } else {
            subsegments = force_segments(&mut t, &segments, input.segment_markers())?;
            t.lawson_pass();
            if behavior.convex_hull {
                subsegments.extend(constrain_hull(&mut t));
            }
        }
        let holes = input.holes();
        carve(&mut t, &holes, behavior.convex_hull);
        prune_dead_subsegments(&t, &mut subsegments);
    } else if behavior.convex_hull || behavior.conforming || behavior.quality_active() {
        // Refinement and conforming splits must not walk off the hull,
        // so the hull becomes part of the subsegment registry.
        subsegments = constrain_hull(&mut t);
    }

    if behavior.conforming || behavior.quality_active() {
        let mut budget = SteinerBudget::new(behavior.steiner_limit);
        if behavior.conforming {
            conform(&mut t, &mut subsegments, behavior.splitting, &mut budget)?;
        }
        if behavior.quality_active() {
            ruppert(
                &mut t,
                &mut subsegments,
                behavior.min_angle,
                behavior.max_area,
                behavior.splitting,
                &mut budget,
            )?;
        }
        tracing::debug!(
            steiner_left = budget.remaining(),
            vertices = t.vertex_count(),
            "refinement finished"
        );
    }

    t.validate()?;

    let order = emit_mesh(&t, &subsegments, &behavior, output)?;
    if behavior.pslg {
        output.share_holes_from(input);
        output.share_regions_from(input);
    }
    if behavior.voronoi {
        if let Some(voronoi_buffer) = voronoi_output {
            debug_assert!(
                voronoi_buffer.is_unpopulated(),
                "voronoi buffer must start empty"
            );
            emit_voronoi(&t, &order, &behavior, voronoi_buffer)?;
        }
    }

    if !behavior.quiet {
        tracing::info!(
            vertices = t.vertex_count(),
            triangles = t.triangle_count(),
            subsegments = subsegments.len(),
            "triangulation complete"
        );
    }
    Ok(())
}

/// Resolve input segments to zero-based endpoint ids, honoring the
/// input numbering base.
fn checked_segments(
    input: &MeshBuffer,
    limit: usize,
    base: i32,
) -> Result<Vec<[u32; 2]>, TriangulateError> {
    let raw = input.segments();
    let mut out = Vec::with_capacity(raw.len());
    for pair in raw {
        let mut ends = [0_u32; 2];
        for (slot, &value) in ends.iter_mut().zip(pair.iter()) {
            let shifted = i64::from(value) - i64::from(base);
            if shifted < 0 || shifted >= limit as i64 {
                return Err(TriangulateError::IndexOutOfRange {
                    kind: "segment endpoint",
                    index: i64::from(value),
                    limit,
                });
            }
            *slot = shifted as u32;
        }
        out.push(ends);
    }
    Ok(out)
}

/// Install the mesh into the output buffer and return the triangle
/// emission order for reuse by the Voronoi writer.
fn emit_mesh(
    t: &Triangulation,
    subsegments: &[Subsegment],
    behavior: &Behavior,
    output: &mut MeshBuffer,
) -> Result<Vec<TriKey>, TriangulateError> {
    let base = i32::from(!behavior.zero_indexed);
    let order = t.tri_keys();
    let mut index_of: FastHashMap<TriKey, usize> = fast_hash_map_with_capacity(order.len());
    for (i, &key) in order.iter().enumerate() {
        index_of.insert(key, i);
    }

    // Vertices. Markers of boundary vertices are raised to 1 where the
    // input left them at 0, matching the engine's output convention.
    let n = t.vertex_count();
    let mut flat_points = Vec::with_capacity(n * 2);
    let mut flat_markers = Vec::with_capacity(n);
    for id in 0..n as u32 {
        let vertex = t.vertex(id);
        flat_points.extend_from_slice(&vertex.position);
        flat_markers.push(vertex.marker);
    }
    for &key in &order {
        let tri = t.tri(key);
        for e in 0..3 {
            if tri.neighbors[e].is_none() {
                let (a, b) = t.edge_vertices(key, e);
                for id in [a, b] {
                    if flat_markers[id as usize] == 0 {
                        flat_markers[id as usize] = 1;
                    }
                }
            }
        }
    }
    let per = t.attributes_per_vertex();
    let mut flat_attributes = Vec::with_capacity(n * per);
    for id in 0..n as u32 {
        flat_attributes.extend_from_slice(t.vertex_attributes(id));
    }
    output.install_points(flat_points, flat_markers, flat_attributes, per)?;

    // Triangles, corner ids counterclockwise.
    let mut flat_triangles = Vec::with_capacity(order.len() * 3);
    for &key in &order {
        for v in t.tri(key).vertices {
            flat_triangles.push(v as i32 + base);
        }
    }
    if !flat_triangles.is_empty() {
        output.install_triangles(flat_triangles)?;
    }

    // Neighbor j sits across from corner j, -1 on the boundary.
    if behavior.neighbor_list && !order.is_empty() {
        let mut flat = Vec::with_capacity(order.len() * 3);
        for &key in &order {
            let tri = t.tri(key);
            for j in 0..3 {
                let e = (j + 1) % 3;
                let entry = tri.neighbors[e]
                    .and_then(|other| index_of.get(&other))
                    .map_or(-1, |&i| i as i32 + base);
                flat.push(entry);
            }
        }
        output.install_neighbors(flat);
    }

    // Subsegments, post splitting.
    if behavior.pslg || behavior.convex_hull {
        let mut flat = Vec::with_capacity(subsegments.len() * 2);
        let mut markers = Vec::with_capacity(subsegments.len());
        for piece in subsegments {
            flat.push(piece.a as i32 + base);
            flat.push(piece.b as i32 + base);
            markers.push(piece.marker);
        }
        if !flat.is_empty() {
            output.install_segments(flat, markers)?;
        }
    }

    if behavior.edge_list {
        emit_edges(t, subsegments, &order, &index_of, base, output)?;
    }
    Ok(order)
}

/// Install the undirected edge list with markers: the subsegment marker
/// on constrained edges, 1 on unconstrained boundary edges, 0 inside.
fn emit_edges(
    t: &Triangulation,
    subsegments: &[Subsegment],
    order: &[TriKey],
    index_of: &FastHashMap<TriKey, usize>,
    base: i32,
    output: &mut MeshBuffer,
) -> Result<(), TriangulateError> {
    let registry: FastHashMap<(u32, u32), i32> = subsegments
        .iter()
        .map(|piece| (piece.key(), piece.marker))
        .collect();

    let mut flat = Vec::new();
    let mut markers = Vec::new();
    for &key in order {
        let me = index_of.get(&key).copied().unwrap_or(usize::MAX);
        let tri = t.tri(key);
        for e in 0..3 {
            // Each interior edge belongs to two triangles; the one with
            // the smaller output index writes it.
            let mine = match tri.neighbors[e].and_then(|other| index_of.get(&other)) {
                Some(&other_index) => me < other_index,
                None => true,
            };
            if !mine {
                continue;
            }
            let (a, b) = t.edge_vertices(key, e);
            flat.push(a as i32 + base);
            flat.push(b as i32 + base);
            let marker = if tri.constrained[e] {
                registry
                    .get(&(a.min(b), a.max(b)))
                    .copied()
                    .unwrap_or(1)
            } else if tri.neighbors[e].is_none() {
                1
            } else {
                0
            };
            markers.push(marker);
        }
    }
    if !flat.is_empty() {
        output.install_edges(flat, Some(markers))?;
    }
    Ok(())
}

/// Install the Voronoi diagram: one vertex per triangle, finite edges
/// between adjacent triangles, unbounded rays (second endpoint -1) with
/// their outward directions in the normal list.
fn emit_voronoi(
    t: &Triangulation,
    order: &[TriKey],
    behavior: &Behavior,
    output: &mut MeshBuffer,
) -> Result<(), TriangulateError> {
    let diagram = dual(t, order)?;
    if diagram.vertices.is_empty() {
        return Ok(());
    }
    let base = i32::from(!behavior.zero_indexed);

    let n = diagram.vertices.len();
    let mut flat_points = Vec::with_capacity(n * 2);
    for vertex in &diagram.vertices {
        flat_points.extend_from_slice(vertex);
    }
    output.install_points(flat_points, vec![0; n], Vec::new(), 0)?;

    let mut flat_edges = Vec::with_capacity(diagram.edges.len() * 2);
    for edge in &diagram.edges {
        flat_edges.push(edge[0] + base);
        flat_edges.push(if edge[1] < 0 { -1 } else { edge[1] + base });
    }
    let mut flat_normals = Vec::with_capacity(diagram.normals.len() * 2);
    for normal in &diagram.normals {
        flat_normals.extend_from_slice(normal);
    }
    if !flat_edges.is_empty() {
        output.install_edges(flat_edges, None)?;
        output.install_normals(flat_normals);
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
