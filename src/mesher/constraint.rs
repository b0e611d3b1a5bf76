//! Constraint enforcement and region carving.
//!
//! Two responsibilities: forcing every input PSLG segment to appear as an
//! edge of the triangulation, and removing the triangles outside the region
//! of interest (the exterior, plus everything reachable from a hole seed).
//!
//! Segments are recovered by edge flipping: any triangulation edge that
//! properly crosses a pending segment and has a strictly convex surrounding
//! quad can be flipped, and repeating this until no crossing remains makes
//! the segment an edge of the mesh. A vertex lying on the open segment
//! subdivides it, and both pieces are forced independently. Crossing a
//! constrained edge means two input segments intersect, which this engine
//! reports instead of inserting an intersection vertex.

use smallvec::SmallVec;

use super::TriangulateError;
use super::predicates::{on_segment, segments_cross, squared_distance};
use super::triangulation::{Located, TriKey, Triangulation};
use crate::collections::{FastHashSet, SmallBuffer};

/// One piece of an input segment present in the mesh as a constrained edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Subsegment {
    /// First endpoint vertex id.
    pub a: u32,
    /// Second endpoint vertex id.
    pub b: u32,
    /// Marker inherited from the input segment (or 1 for hull edges).
    pub marker: i32,
}

impl Subsegment {
    /// Endpoints in a direction-independent order, for deduplication.
    #[must_use]
    pub fn key(&self) -> (u32, u32) {
        (self.a.min(self.b), self.a.max(self.b))
    }
}

/// Force every input segment into the triangulation.
///
/// `markers` may be empty (defaulting to 0) or one per segment. Returns the
/// recovered subsegments: one per input segment, or several when existing
/// vertices subdivide a segment. Zero-length segments are skipped with a
/// warning.
///
/// # Errors
///
/// Returns `DegenerateInput` when two constrained segments properly cross,
/// and `Internal` if a segment cannot be recovered within the flip budget.
pub fn force_segments(
    t: &mut Triangulation,
    segments: &[[u32; 2]],
    markers: &[i32],
) -> Result<Vec<Subsegment>, TriangulateError> {
    let mut out = Vec::with_capacity(segments.len());
    let mut seen: FastHashSet<(u32, u32)> = FastHashSet::default();
    for (i, segment) in segments.iter().enumerate() {
        let (u, v) = (segment[0], segment[1]);
        if u == v {
            tracing::warn!(index = i, "segment endpoints coincide, skipping");
            continue;
        }
        let marker = markers.get(i).copied().unwrap_or(0);
        force_one(t, u, v, marker, &mut out, &mut seen)?;
    }
    tracing::debug!(
        segments = segments.len(),
        subsegments = out.len(),
        "constraint segments recovered"
    );
    Ok(out)
}

/// Force a single segment, subdividing at any vertex on its interior.
fn force_one(
    t: &mut Triangulation,
    u: u32,
    v: u32,
    marker: i32,
    out: &mut Vec<Subsegment>,
    seen: &mut FastHashSet<(u32, u32)>,
) -> Result<(), TriangulateError> {
    let mut chain: SmallBuffer<(u32, u32), 8> = SmallVec::new();
    chain.push((u, v));
    let mut budget = 4 * t.triangle_count() + 256;

    while let Some((a, b)) = chain.pop() {
        if a == b {
            continue;
        }
        if budget == 0 {
            return Err(TriangulateError::Internal {
                message: format!("segment ({u}, {v}) not recovered within the flip budget"),
            });
        }
        budget -= 1;

        if let Some((key, e)) = t.find_edge(a, b) {
            t.set_constrained(key, e, true);
            let piece = Subsegment { a, b, marker };
            if seen.insert(piece.key()) {
                out.push(piece);
            }
            continue;
        }

        if let Some(w) = vertex_on_open_segment(t, a, b) {
            chain.push((w, b));
            chain.push((a, w));
            continue;
        }

        if sweep_crossings(t, a, b)? {
            chain.push((a, b));
        } else {
            return Err(TriangulateError::Internal {
                message: format!("segment ({a}, {b}) is absent yet nothing crosses it"),
            });
        }
    }
    Ok(())
}

/// Drop subsegments whose carrying edge no longer exists.
///
/// Carving can erase both triangles flanking a subsegment that lies
/// entirely inside a removed region; the emitted segment list must not
/// mention those edges.
pub fn prune_dead_subsegments(t: &Triangulation, subsegments: &mut Vec<Subsegment>) {
    let before = subsegments.len();
    subsegments.retain(|piece| t.find_edge(piece.a, piece.b).is_some());
    if subsegments.len() < before {
        tracing::debug!(
            removed = before - subsegments.len(),
            "dropped subsegments erased by hole carving"
        );
    }
}

/// The vertex on the open segment `(a, b)` closest to `a`, if any.
fn vertex_on_open_segment(t: &Triangulation, a: u32, b: u32) -> Option<u32> {
    let pa = t.position(a);
    let pb = t.position(b);
    let mut best: Option<(u32, f64)> = None;
    for vid in 0..t.vertex_count() as u32 {
        if vid == a || vid == b {
            continue;
        }
        let p = t.position(vid);
        if on_segment(pa, pb, p) {
            let d = squared_distance(pa, p);
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((vid, d));
            }
        }
    }
    best.map(|(vid, _)| vid)
}

/// Try to flip one triangulation edge that properly crosses `(a, b)`.
///
/// Returns whether any proper crossing was seen. When every crossing edge
/// had a non-convex quad this sweep, the caller retries: flips elsewhere
/// along the segment eventually make one of them convex.
fn sweep_crossings(t: &mut Triangulation, a: u32, b: u32) -> Result<bool, TriangulateError> {
    let pa = t.position(a);
    let pb = t.position(b);
    let mut saw_crossing = false;

    for key in t.tri_keys() {
        if !t.contains_tri(key) {
            continue;
        }
        for e in 0..3 {
            let tri = *t.tri(key);
            let (p, q) = (tri.vertices[e], tri.vertices[(e + 1) % 3]);
            if p == a || p == b || q == a || q == b {
                continue;
            }
            if !segments_cross(pa, pb, t.position(p), t.position(q)) {
                continue;
            }
            if tri.constrained[e] {
                return Err(TriangulateError::DegenerateInput {
                    message: format!("segment ({a}, {b}) crosses another constrained segment"),
                });
            }
            saw_crossing = true;
            if t.try_flip(key, e) {
                return Ok(true);
            }
        }
    }
    Ok(saw_crossing)
}

/// Mark every hull edge (edge without a neighbor) as a constrained
/// subsegment with marker 1, as the engine does when enclosing the convex
/// hull or when a PSLG arrives without segments.
pub fn constrain_hull(t: &mut Triangulation) -> Vec<Subsegment> {
    let mut out = Vec::new();
    for key in t.tri_keys() {
        for e in 0..3 {
            let tri = t.tri(key);
            if tri.neighbors[e].is_none() && !tri.constrained[e] {
                let (a, b) = t.edge_vertices(key, e);
                t.set_constrained(key, e, true);
                out.push(Subsegment { a, b, marker: 1 });
            }
        }
    }
    out
}

/// Remove the triangles outside the region of interest.
///
/// Infection spreads across unconstrained edges, starting from the exterior
/// (every unconstrained hull edge) unless the convex hull is being kept, and
/// from each hole seed point. Constrained edges block the spread, so a PSLG
/// boundary contains it.
pub fn carve(t: &mut Triangulation, holes: &[[f64; 2]], keep_hull: bool) {
    let mut infected: FastHashSet<TriKey> = FastHashSet::default();
    let mut queue: Vec<TriKey> = Vec::new();

    if !keep_hull {
        for key in t.tri_keys() {
            let tri = t.tri(key);
            let exposed =
                (0..3).any(|e| tri.neighbors[e].is_none() && !tri.constrained[e]);
            if exposed && infected.insert(key) {
                queue.push(key);
            }
        }
    }

    for &hole in holes {
        match t.locate(hole) {
            Located::Triangle(key) | Located::Edge(key, _) => {
                if infected.insert(key) {
                    queue.push(key);
                }
            }
            Located::Vertex(_) | Located::Outside => {
                tracing::warn!(x = hole[0], y = hole[1], "hole seed is not interior to any triangle");
            }
        }
    }

    while let Some(key) = queue.pop() {
        let tri = *t.tri(key);
        for e in 0..3 {
            if tri.constrained[e] {
                continue;
            }
            let Some(next) = tri.neighbors[e] else {
                continue;
            };
            if infected.insert(next) {
                queue.push(next);
            }
        }
    }

    if infected.is_empty() {
        return;
    }
    tracing::debug!(removed = infected.len(), "carved exterior and hole triangles");
    t.remove_triangles(&infected);
}

// =============================================================================
// TESTS
// =============================================================================
