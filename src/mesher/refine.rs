//! Steiner-point refinement: conforming splits and quality improvement.
//!
//! Two passes build on the constrained kernel. [`conform`] splits every
//! subsegment whose diametral circle strictly contains a mesh vertex;
//! once no such subsegment remains, every subsegment is Gabriel and the
//! constrained Delaunay triangulation is truly Delaunay. [`ruppert`]
//! interleaves those splits with circumcenter insertion for triangles
//! violating the requested angle or area bounds, redirecting a
//! circumcenter that would encroach a subsegment into a midpoint split of
//! that subsegment instead.
//!
//! Every Steiner point is charged against a shared [`SteinerBudget`], so
//! refinement terminates even on inputs outside the theoretical
//! guarantees.

use super::TriangulateError;
use super::constraint::Subsegment;
use super::predicates::{
    circumcenter, encroaches, midpoint, min_angle_degrees, squared_distance, triangle_area,
};
use super::triangulation::{Inserted, Located, Tri, TriKey, Triangulation};
use crate::collections::{FastHashSet, SmallBuffer};

/// Cap applied when the caller requested no Steiner limit of its own.
pub const FALLBACK_STEINER_LIMIT: u32 = 100_000;

/// Upper bound on refinement rounds, reached only if bookkeeping breaks.
const ROUND_LIMIT: usize = 1_000_000;

/// Subsegments shorter than this fraction of the mesh span are never split.
const MIN_SPLIT_FRACTION: f64 = 1e-12;

/// Where Steiner points may land on constrained edges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SplitPolicy {
    /// Any subsegment may be split.
    #[default]
    Allowed,
    /// Subsegments on the mesh boundary must not be split.
    NoBoundary,
    /// No subsegment may be split.
    Never,
}

/// Running count of Steiner points the refinement phases may still add.
#[derive(Debug)]
pub struct SteinerBudget {
    remaining: u32,
    user_limit: bool,
    warned: bool,
}

impl SteinerBudget {
    /// A non-negative `limit` caps insertions exactly. A negative limit
    /// means the caller asked for no cap, which falls back to
    /// [`FALLBACK_STEINER_LIMIT`] so refinement always terminates.
    #[must_use]
    pub fn new(limit: i32) -> Self {
        if limit >= 0 {
            Self {
                remaining: limit as u32,
                user_limit: true,
                warned: false,
            }
        } else {
            Self {
                remaining: FALLBACK_STEINER_LIMIT,
                user_limit: false,
                warned: false,
            }
        }
    }

    /// True once no further Steiner point may be inserted.
    pub fn exhausted(&mut self) -> bool {
        if self.remaining > 0 {
            return false;
        }
        if !self.user_limit && !self.warned {
            tracing::warn!(
                limit = FALLBACK_STEINER_LIMIT,
                "refinement stopped at the internal Steiner point guard"
            );
            self.warned = true;
        }
        true
    }

    /// Charge one inserted Steiner point.
    fn commit(&mut self) {
        debug_assert!(self.remaining > 0);
        self.remaining = self.remaining.saturating_sub(1);
    }

    /// Insertions still allowed.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

fn min_split_length_squared(span: f64) -> f64 {
    let length = span * MIN_SPLIT_FRACTION;
    length * length
}

/// Split subsegments until no vertex encroaches any of them.
///
/// Splitting happens at the midpoint; the new vertex takes the
/// subsegment's marker and the mean of the endpoint attributes, and both
/// halves replace the original entry in `subsegments`.
///
/// # Errors
///
/// Returns `Internal` if a registered subsegment is no longer an edge of
/// the mesh.
pub fn conform(
    t: &mut Triangulation,
    subsegments: &mut Vec<Subsegment>,
    policy: SplitPolicy,
    budget: &mut SteinerBudget,
) -> Result<(), TriangulateError> {
    let min_len2 = min_split_length_squared(t.span());
    let mut warned_short = false;
    loop {
        let mut split_any = false;
        let mut index = 0;
        while index < subsegments.len() {
            if budget.exhausted() {
                return Ok(());
            }
            let piece = subsegments[index];
            let (key, e) = registered_edge(t, &piece)?;
            if !subsegment_encroached(t, key, e) || !may_split(t, key, e, policy) {
                index += 1;
                continue;
            }
            if squared_distance(t.position(piece.a), t.position(piece.b)) <= min_len2 {
                if !warned_short {
                    tracing::warn!(
                        a = piece.a,
                        b = piece.b,
                        "encroached subsegment too short to split"
                    );
                    warned_short = true;
                }
                index += 1;
                continue;
            }
            split_subsegment(t, subsegments, index, key, e, budget);
            split_any = true;
            // Re-examine the first half before moving on.
        }
        if !split_any {
            return Ok(());
        }
    }
}

/// Delaunay quality refinement with angle and area bounds.
///
/// A bound of zero (or less) disables the corresponding criterion.
/// Encroached subsegments are split first in every round; a circumcenter
/// that would encroach a subsegment is redirected into midpoint splits of
/// the subsegments it encroaches. Triangles whose circumcenter cannot be
/// placed (outside the region, coincident with a vertex, or blocked by
/// the splitting policy) are set aside and left as they are.
///
/// # Errors
///
/// Propagates kernel failures and registry inconsistencies.
pub fn ruppert(
    t: &mut Triangulation,
    subsegments: &mut Vec<Subsegment>,
    min_angle: f64,
    max_area: f64,
    policy: SplitPolicy,
    budget: &mut SteinerBudget,
) -> Result<(), TriangulateError> {
    let min_len2 = min_split_length_squared(t.span());
    let mut skipped: FastHashSet<(u32, u32, u32)> = FastHashSet::default();

    for _ in 0..ROUND_LIMIT {
        conform(t, subsegments, policy, budget)?;
        if budget.exhausted() {
            return Ok(());
        }

        let Some((key, triple)) = next_poor_triangle(t, min_angle, max_area, min_len2, &skipped)
        else {
            tracing::debug!(
                vertices = t.vertex_count(),
                triangles = t.triangle_count(),
                "quality refinement converged"
            );
            return Ok(());
        };

        let [pa, pb, pc] = t.corners(key);
        let Some(center) = circumcenter(pa, pb, pc) else {
            skipped.insert(triple);
            continue;
        };

        // Redirect onto any subsegment whose diametral circle the center
        // invades; inserting the center there would damage the boundary.
        let mut redirected = false;
        let mut blocked = false;
        let mut index = 0;
        while index < subsegments.len() {
            let piece = subsegments[index];
            if !encroaches(t.position(piece.a), t.position(piece.b), center) {
                index += 1;
                continue;
            }
            let (skey, se) = registered_edge(t, &piece)?;
            let too_short =
                squared_distance(t.position(piece.a), t.position(piece.b)) <= min_len2;
            if !may_split(t, skey, se, policy) || too_short {
                blocked = true;
                index += 1;
                continue;
            }
            if budget.exhausted() {
                return Ok(());
            }
            split_subsegment(t, subsegments, index, skey, se, budget);
            redirected = true;
            index += 1;
        }
        if redirected {
            continue;
        }
        if blocked {
            skipped.insert(triple);
            continue;
        }

        if budget.exhausted() {
            return Ok(());
        }
        match t.locate(center) {
            Located::Vertex(_) | Located::Outside => {
                skipped.insert(triple);
            }
            Located::Edge(ekey, ee) if t.tri(ekey).constrained[ee] => {
                // The center sits on a subsegment the encroachment test
                // just missed; split that subsegment through the registry
                // so the bookkeeping stays exact.
                let (u, v) = t.edge_vertices(ekey, ee);
                let needle = (u.min(v), u.max(v));
                let Some(seg_index) = subsegments.iter().position(|s| s.key() == needle) else {
                    return Err(TriangulateError::Internal {
                        message: format!(
                            "constrained edge ({u}, {v}) missing from the subsegment registry"
                        ),
                    });
                };
                if may_split(t, ekey, ee, policy) {
                    split_subsegment(t, subsegments, seg_index, ekey, ee, budget);
                } else {
                    skipped.insert(triple);
                }
            }
            Located::Triangle(_) | Located::Edge(_, _) => {
                let attributes = corner_mean_attributes(t, key);
                match t.insert_point(center, 0, &attributes)? {
                    Inserted::New(_) => budget.commit(),
                    Inserted::Existing(_) | Inserted::Outside => {
                        skipped.insert(triple);
                    }
                }
            }
        }
    }

    tracing::warn!("quality refinement hit the round limit");
    Ok(())
}

/// Resolve a registered subsegment to its mesh edge.
fn registered_edge(
    t: &Triangulation,
    piece: &Subsegment,
) -> Result<(TriKey, usize), TriangulateError> {
    t.find_edge(piece.a, piece.b)
        .ok_or_else(|| TriangulateError::Internal {
            message: format!("subsegment ({}, {}) vanished from the mesh", piece.a, piece.b),
        })
}

/// Does any mesh vertex lie strictly inside the edge's diametral circle?
///
/// Checking only the two flanking apexes would suffice in a full Delaunay
/// mesh, but after hole carving the invader can sit across a carved region
/// without flanking the edge, so every vertex is examined.
fn subsegment_encroached(t: &Triangulation, key: TriKey, e: usize) -> bool {
    let (u, v) = t.edge_vertices(key, e);
    let pu = t.position(u);
    let pv = t.position(v);
    (0..t.vertex_count() as u32).any(|w| w != u && w != v && encroaches(pu, pv, t.position(w)))
}

fn may_split(t: &Triangulation, key: TriKey, e: usize, policy: SplitPolicy) -> bool {
    match policy {
        SplitPolicy::Allowed => true,
        SplitPolicy::Never => false,
        SplitPolicy::NoBoundary => t.tri(key).neighbors[e].is_some(),
    }
}

/// Split `subsegments[index]` at its midpoint, replacing the entry with
/// the first half and appending the second.
fn split_subsegment(
    t: &mut Triangulation,
    subsegments: &mut Vec<Subsegment>,
    index: usize,
    key: TriKey,
    e: usize,
    budget: &mut SteinerBudget,
) -> u32 {
    let piece = subsegments[index];
    let mid = midpoint(t.position(piece.a), t.position(piece.b));
    let attributes: SmallBuffer<f64, 4> = t
        .vertex_attributes(piece.a)
        .iter()
        .zip(t.vertex_attributes(piece.b))
        .map(|(&x, &y)| 0.5 * (x + y))
        .collect();
    let vid = t.split_edge(key, e, mid, piece.marker, &attributes);
    budget.commit();
    subsegments[index] = Subsegment {
        a: piece.a,
        b: vid,
        marker: piece.marker,
    };
    subsegments.push(Subsegment {
        a: vid,
        b: piece.b,
        marker: piece.marker,
    });
    vid
}

/// First triangle violating a quality bound, with its sorted corner ids.
fn next_poor_triangle(
    t: &Triangulation,
    min_angle: f64,
    max_area: f64,
    min_len2: f64,
    skipped: &FastHashSet<(u32, u32, u32)>,
) -> Option<(TriKey, (u32, u32, u32))> {
    for key in t.tri_keys() {
        let triple = corner_triple(t.tri(key));
        if skipped.contains(&triple) {
            continue;
        }
        let [a, b, c] = t.corners(key);
        let shortest = squared_distance(a, b)
            .min(squared_distance(b, c))
            .min(squared_distance(c, a));
        if shortest <= min_len2 {
            continue;
        }
        let too_large = max_area > 0.0 && triangle_area(a, b, c) > max_area;
        let too_thin = min_angle > 0.0 && min_angle_degrees(a, b, c) < min_angle;
        if too_large || too_thin {
            return Some((key, triple));
        }
    }
    None
}

fn corner_triple(tri: &Tri) -> (u32, u32, u32) {
    let mut ids = tri.vertices;
    ids.sort_unstable();
    (ids[0], ids[1], ids[2])
}

fn corner_mean_attributes(t: &Triangulation, key: TriKey) -> SmallBuffer<f64, 4> {
    let mut attributes: SmallBuffer<f64, 4> =
        SmallBuffer::from_elem(0.0, t.attributes_per_vertex());
    for &v in &t.tri(key).vertices {
        for (slot, &value) in attributes.iter_mut().zip(t.vertex_attributes(v)) {
            *slot += value / 3.0;
        }
    }
    attributes
}

// =============================================================================
// TESTS
// =============================================================================
