//! Triangle-mesh kernel for the engine.
//!
//! This module owns the mutable triangulation state: a slotmap of triangles
//! over a flat vertex array, with neighbor links and per-edge constraint
//! flags. On top of that it provides the primitive operations every engine
//! phase is built from:
//!
//! - point location (walk with a scan fallback),
//! - incremental cavity insertion (Bowyer-Watson) that never crosses a
//!   constrained edge,
//! - edge splitting for points that land on an existing edge,
//! - edge flips and a global Lawson repair pass,
//! - structural validation.
//!
//! Orientation invariant: every stored triangle is counterclockwise. Edge `i`
//! of a triangle joins corners `i` and `(i + 1) % 3`; `neighbors[i]` and
//! `constrained[i]` describe that edge. Neighbor links are symmetric.

use slotmap::{Key, SlotMap, new_key_type};
use smallvec::SmallVec;

use super::TriangulateError;
use super::predicates::{
    InCircle, Orientation, in_circle, orient2d, orient2d_toward, squared_distance,
};
use crate::collections::{FastHashMap, FastHashSet};

new_key_type! {
    /// Key for triangles stored in the kernel's slotmap.
    pub struct TriKey;
}

/// A mesh vertex: position plus the caller-visible boundary marker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    /// Coordinates in the plane.
    pub position: [f64; 2],
    /// Boundary marker carried through from the input (0 for interior points).
    pub marker: i32,
}

/// One triangle of the mesh.
///
/// Corners are counterclockwise. Edge `i` joins `vertices[i]` and
/// `vertices[(i + 1) % 3]`.
#[derive(Clone, Copy, Debug)]
pub struct Tri {
    /// Corner vertex ids, counterclockwise.
    pub vertices: [u32; 3],
    /// Neighbor across edge `i`, `None` on the mesh boundary.
    pub neighbors: [Option<TriKey>; 3],
    /// Whether edge `i` is a constrained (PSLG) edge.
    pub constrained: [bool; 3],
}

impl Tri {
    /// Index of the edge from `a` to `b`, if this triangle has it in that
    /// direction.
    #[must_use]
    pub fn directed_edge(&self, a: u32, b: u32) -> Option<usize> {
        (0..3).find(|&i| self.vertices[i] == a && self.vertices[(i + 1) % 3] == b)
    }

    /// Index of the corner holding vertex `v`.
    #[must_use]
    pub fn corner_of(&self, v: u32) -> Option<usize> {
        (0..3).find(|&i| self.vertices[i] == v)
    }

    /// Corner opposite edge `e`.
    #[inline]
    #[must_use]
    pub fn apex(&self, e: usize) -> u32 {
        self.vertices[(e + 2) % 3]
    }
}

/// Where a query point landed during location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Located {
    /// Strictly inside the triangle.
    Triangle(TriKey),
    /// On edge `1` of the triangle (collinear and between the endpoints).
    Edge(TriKey, usize),
    /// Coincident with an existing vertex.
    Vertex(u32),
    /// Not inside any triangle of the current mesh.
    Outside,
}

/// Result of inserting a point into the mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inserted {
    /// A new vertex was created with this id.
    New(u32),
    /// The point coincides with an existing vertex; nothing was inserted.
    Existing(u32),
    /// The point lies outside the current mesh; nothing was inserted.
    Outside,
}

/// Cap on legalization work after a single insertion, scaled by mesh size.
fn legalize_budget(triangle_count: usize) -> usize {
    triangle_count.saturating_mul(8) + 64
}

/// Unit directions of the three bounding-triangle corners, counterclockwise.
const HELPER_DIRECTIONS: [[f64; 2]; 3] = [
    [-std::f64::consts::FRAC_1_SQRT_2, -std::f64::consts::FRAC_1_SQRT_2],
    [std::f64::consts::FRAC_1_SQRT_2, -std::f64::consts::FRAC_1_SQRT_2],
    [0.0, 1.0],
];

/// A predicate operand: an ordinary point, or a bounding corner treated as a
/// point at infinity along a direction.
#[derive(Clone, Copy)]
enum Site {
    At([f64; 2]),
    Toward([f64; 2]),
}

impl Site {
    fn is_toward(self) -> bool {
        matches!(self, Self::Toward(_))
    }
}

/// Sign of the cross product of two directions.
fn direction_orientation(di: [f64; 2], dj: [f64; 2]) -> Orientation {
    let det = di[0] * dj[1] - di[1] * dj[0];
    if det > 0.0 {
        Orientation::POSITIVE
    } else if det < 0.0 {
        Orientation::NEGATIVE
    } else {
        Orientation::DEGENERATE
    }
}

/// [`orient2d`] over sites, taken in the limit for corners at infinity.
///
/// With one infinite corner the triple's turn is decided by the finite edge
/// against the corner's direction; with two, by the two directions alone (any
/// finite point sits between them).
fn orient_sites(mut sites: [Site; 3]) -> Orientation {
    match sites.iter().filter(|s| s.is_toward()).count() {
        0 => {
            let [Site::At(a), Site::At(b), Site::At(c)] = sites else {
                unreachable!()
            };
            orient2d(a, b, c)
        }
        1 => {
            // Cyclic rotation preserves the orientation sign.
            while !sites[2].is_toward() {
                sites.rotate_left(1);
            }
            let [Site::At(a), Site::At(b), Site::Toward(d)] = sites else {
                unreachable!()
            };
            orient2d_toward(a, b, d)
        }
        2 => {
            while sites[0].is_toward() {
                sites.rotate_left(1);
            }
            let [Site::At(_), Site::Toward(di), Site::Toward(dj)] = sites else {
                unreachable!()
            };
            direction_orientation(di, dj)
        }
        _ => direction_orientation(HELPER_DIRECTIONS[0], HELPER_DIRECTIONS[1]),
    }
}

/// [`in_circle`] over sites, for a finite query point `p`.
///
/// The circumdisc of a triangle with one corner at infinity degenerates to
/// the open half-plane left of its finite edge; with two corners at infinity,
/// to the half-plane swept by translating the finite corner along the
/// difference of the two directions. The initial bounding triangle's disc
/// covers the whole plane.
fn in_circle_sites(mut sites: [Site; 3], p: [f64; 2]) -> InCircle {
    match sites.iter().filter(|s| s.is_toward()).count() {
        0 => {
            let [Site::At(a), Site::At(b), Site::At(c)] = sites else {
                unreachable!()
            };
            in_circle(a, b, c, p)
        }
        1 => {
            while !sites[2].is_toward() {
                sites.rotate_left(1);
            }
            let [Site::At(a), Site::At(b), Site::Toward(_)] = sites else {
                unreachable!()
            };
            match orient2d(a, b, p) {
                Orientation::POSITIVE => InCircle::INSIDE,
                Orientation::NEGATIVE => InCircle::OUTSIDE,
                Orientation::DEGENERATE => InCircle::BOUNDARY,
            }
        }
        2 => {
            while sites[0].is_toward() {
                sites.rotate_left(1);
            }
            let [Site::At(u), Site::Toward(di), Site::Toward(dj)] = sites else {
                unreachable!()
            };
            let d = [di[0] - dj[0], di[1] - dj[1]];
            match orient2d_toward(p, u, d) {
                Orientation::POSITIVE => InCircle::INSIDE,
                Orientation::NEGATIVE => InCircle::OUTSIDE,
                // On the dividing line the next-order term decides: the
                // side the wedge between the directions opens toward.
                Orientation::DEGENERATE => match direction_orientation(di, dj) {
                    Orientation::POSITIVE => InCircle::INSIDE,
                    _ => InCircle::OUTSIDE,
                },
            }
        }
        _ => InCircle::INSIDE,
    }
}

/// The triangulation kernel.
///
/// Vertices are stored in insertion order, so the ids of the caller's input
/// points are stable; engine-inserted (Steiner) vertices are appended after
/// them. Per-vertex attributes are kept in a parallel flat array with
/// `attributes_per_vertex` values per vertex.
#[derive(Debug)]
pub struct Triangulation {
    vertices: Vec<Vertex>,
    attributes: Vec<f64>,
    attributes_per_vertex: usize,
    tris: SlotMap<TriKey, Tri>,
    /// Walk start hint from the previous location query.
    last_located: Option<TriKey>,
    /// First helper-corner id while the bounding triangle is installed.
    helper_base: Option<u32>,
}

impl Triangulation {
    /// Build the Delaunay triangulation of `points`.
    ///
    /// `markers` may be empty (all markers default to 0) or one per point.
    /// `attributes` must hold `attributes_per_vertex` values per point.
    ///
    /// # Errors
    ///
    /// Returns `DegenerateInput` for fewer than 3 points, duplicate points,
    /// or an entirely collinear point set.
    pub fn new(
        points: &[[f64; 2]],
        markers: &[i32],
        attributes: &[f64],
        attributes_per_vertex: usize,
    ) -> Result<Self, TriangulateError> {
        if points.len() < 3 {
            return Err(TriangulateError::DegenerateInput {
                message: format!("need at least 3 points, got {}", points.len()),
            });
        }
        Self::reject_duplicates(points)?;
        Self::reject_collinear(points)?;

        let mut triangulation = Self {
            vertices: Vec::with_capacity(points.len() + 3),
            attributes: Vec::with_capacity((points.len() + 3) * attributes_per_vertex),
            attributes_per_vertex,
            tris: SlotMap::with_key(),
            last_located: None,
            helper_base: None,
        };

        for (i, &position) in points.iter().enumerate() {
            let marker = markers.get(i).copied().unwrap_or(0);
            triangulation.vertices.push(Vertex { position, marker });
        }
        triangulation.attributes.extend_from_slice(attributes);

        let super_ids = triangulation.install_super_triangle(points);
        for vid in 0..points.len() as u32 {
            triangulation.insert_existing_vertex(vid)?;
        }
        triangulation.remove_super_triangle(super_ids);
        triangulation.lawson_pass();

        tracing::debug!(
            vertices = triangulation.vertices.len(),
            triangles = triangulation.tris.len(),
            "initial Delaunay triangulation built"
        );
        Ok(triangulation)
    }

    fn reject_duplicates(points: &[[f64; 2]]) -> Result<(), TriangulateError> {
        // Bit-level identity after normalizing -0.0 to +0.0.
        let normalize = |c: f64| (c + 0.0).to_bits();
        let mut seen: FastHashSet<(u64, u64)> = FastHashSet::default();
        for (i, p) in points.iter().enumerate() {
            if !seen.insert((normalize(p[0]), normalize(p[1]))) {
                return Err(TriangulateError::DegenerateInput {
                    message: format!("duplicate point ({}, {}) at index {i}", p[0], p[1]),
                });
            }
        }
        Ok(())
    }

    fn reject_collinear(points: &[[f64; 2]]) -> Result<(), TriangulateError> {
        let a = points[0];
        let b = points[1];
        if points[2..]
            .iter()
            .all(|&c| orient2d(a, b, c) == Orientation::DEGENERATE)
        {
            return Err(TriangulateError::DegenerateInput {
                message: "all input points are collinear".to_string(),
            });
        }
        Ok(())
    }

    /// Append the three helper corners and the one triangle spanning them.
    ///
    /// The predicates treat helper corners as points at infinity along
    /// [`HELPER_DIRECTIONS`], so every finite point lies inside the bounding
    /// triangle and no finite circumcircle can swallow a helper. The stored
    /// coordinates only exist to satisfy code that reads positions
    /// unconditionally; nothing geometric depends on them.
    fn install_super_triangle(&mut self, points: &[[f64; 2]]) -> [u32; 3] {
        let mut min = [f64::INFINITY; 2];
        let mut max = [f64::NEG_INFINITY; 2];
        for p in points {
            for axis in 0..2 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        let span = (max[0] - min[0]).max(max[1] - min[1]).max(1.0);
        let cx = 0.5 * (min[0] + max[0]);
        let cy = 0.5 * (min[1] + max[1]);
        let m = 32.0 * span;

        let base = self.vertices.len() as u32;
        self.helper_base = Some(base);
        for position in [[cx - m, cy - m], [cx + m, cy - m], [cx, cy + m]] {
            self.vertices.push(Vertex {
                position,
                marker: 0,
            });
        }
        self.attributes
            .extend(std::iter::repeat(0.0).take(3 * self.attributes_per_vertex));
        let key = self.tris.insert(Tri {
            vertices: [base, base + 1, base + 2],
            neighbors: [None; 3],
            constrained: [false; 3],
        });
        self.last_located = Some(key);
        [base, base + 1, base + 2]
    }

    /// Delete every triangle touching a helper corner, then drop the helper
    /// vertices themselves (they are the last three, and no Steiner vertex
    /// exists yet).
    fn remove_super_triangle(&mut self, super_ids: [u32; 3]) {
        let doomed: Vec<TriKey> = self
            .tris
            .iter()
            .filter(|(_, tri)| tri.vertices.iter().any(|v| super_ids.contains(v)))
            .map(|(key, _)| key)
            .collect();
        for key in doomed {
            self.tris.remove(key);
        }
        self.clear_dangling_neighbors();
        self.vertices.truncate(self.vertices.len() - 3);
        self.attributes
            .truncate(self.vertices.len() * self.attributes_per_vertex);
        self.helper_base = None;
        self.last_located = None;
    }

    /// Reset neighbor links that point at removed triangles.
    fn clear_dangling_neighbors(&mut self) {
        let live: Vec<TriKey> = self.tris.keys().collect();
        for key in live {
            for e in 0..3 {
                if let Some(n) = self.tris[key].neighbors[e] {
                    if !self.tris.contains_key(n) {
                        self.tris[key].neighbors[e] = None;
                    }
                }
            }
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Number of vertices, engine-inserted ones included.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of live triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.tris.len()
    }

    #[must_use]
    pub fn vertex(&self, id: u32) -> &Vertex {
        &self.vertices[id as usize]
    }

    #[must_use]
    pub fn position(&self, id: u32) -> [f64; 2] {
        self.vertices[id as usize].position
    }

    /// Attribute row of one vertex (empty when the mesh carries none).
    #[must_use]
    pub fn vertex_attributes(&self, id: u32) -> &[f64] {
        let start = id as usize * self.attributes_per_vertex;
        &self.attributes[start..start + self.attributes_per_vertex]
    }

    #[must_use]
    pub fn attributes_per_vertex(&self) -> usize {
        self.attributes_per_vertex
    }

    #[must_use]
    pub fn tri(&self, key: TriKey) -> &Tri {
        &self.tris[key]
    }

    #[must_use]
    pub fn contains_tri(&self, key: TriKey) -> bool {
        self.tris.contains_key(key)
    }

    /// Triangle keys in the store's deterministic iteration order.
    #[must_use]
    pub fn tri_keys(&self) -> Vec<TriKey> {
        self.tris.keys().collect()
    }

    /// Corner positions of a triangle.
    #[must_use]
    pub fn corners(&self, key: TriKey) -> [[f64; 2]; 3] {
        let tri = &self.tris[key];
        [
            self.position(tri.vertices[0]),
            self.position(tri.vertices[1]),
            self.position(tri.vertices[2]),
        ]
    }

    /// Find the triangle carrying the directed edge `a -> b`.
    #[must_use]
    pub fn find_directed_edge(&self, a: u32, b: u32) -> Option<(TriKey, usize)> {
        self.tris
            .iter()
            .find_map(|(key, tri)| tri.directed_edge(a, b).map(|e| (key, e)))
    }

    /// Find the edge between `a` and `b` in either direction.
    #[must_use]
    pub fn find_edge(&self, a: u32, b: u32) -> Option<(TriKey, usize)> {
        self.find_directed_edge(a, b)
            .or_else(|| self.find_directed_edge(b, a))
    }

    /// Largest bounding-box extent of the vertex set, at least 1.
    ///
    /// Used to scale length guards in the refinement phases.
    #[must_use]
    pub fn span(&self) -> f64 {
        let mut min = [f64::INFINITY; 2];
        let mut max = [f64::NEG_INFINITY; 2];
        for vertex in &self.vertices {
            for axis in 0..2 {
                min[axis] = min[axis].min(vertex.position[axis]);
                max[axis] = max[axis].max(vertex.position[axis]);
            }
        }
        (max[0] - min[0]).max(max[1] - min[1]).max(1.0)
    }

    /// Mark edge `e` of `key` (and its mirror on the neighbor) as constrained
    /// or not.
    pub fn set_constrained(&mut self, key: TriKey, e: usize, flag: bool) {
        self.tris[key].constrained[e] = flag;
        let (a, b) = self.edge_vertices(key, e);
        if let Some(n) = self.tris[key].neighbors[e] {
            if let Some(mirror) = self.tris[n].directed_edge(b, a) {
                self.tris[n].constrained[mirror] = flag;
            }
        }
    }

    /// Endpoints of edge `e` of triangle `key`, in the triangle's direction.
    #[must_use]
    pub fn edge_vertices(&self, key: TriKey, e: usize) -> (u32, u32) {
        let tri = &self.tris[key];
        (tri.vertices[e], tri.vertices[(e + 1) % 3])
    }

    /// Direction of a bounding helper corner, `None` for ordinary vertices.
    fn helper_direction(&self, v: u32) -> Option<[f64; 2]> {
        let base = self.helper_base?;
        (v >= base).then(|| HELPER_DIRECTIONS[(v - base) as usize])
    }

    fn site(&self, v: u32) -> Site {
        match self.helper_direction(v) {
            Some(direction) => Site::Toward(direction),
            None => Site::At(self.position(v)),
        }
    }

    fn has_helper_corner(&self, key: TriKey) -> bool {
        self.tris[key]
            .vertices
            .iter()
            .any(|&v| self.helper_direction(v).is_some())
    }

    /// Orientation of three vertices, helper corners handled symbolically.
    fn orient_ids(&self, a: u32, b: u32, c: u32) -> Orientation {
        orient_sites([self.site(a), self.site(b), self.site(c)])
    }

    /// Test `p` against the (possibly degenerate) circumdisc of `key`.
    fn in_circle_key(&self, key: TriKey, p: [f64; 2]) -> InCircle {
        let [a, b, c] = self.tris[key].vertices;
        in_circle_sites([self.site(a), self.site(b), self.site(c)], p)
    }

    /// Remove a set of triangles at once, then clear links into them.
    pub fn remove_triangles(&mut self, doomed: &FastHashSet<TriKey>) {
        for &key in doomed {
            self.tris.remove(key);
        }
        self.clear_dangling_neighbors();
        self.last_located = None;
    }

    // =========================================================================
    // POINT LOCATION
    // =========================================================================

    /// Locate `p` in the current mesh.
    ///
    /// Walks from the last located triangle toward `p`, falling back to a
    /// full scan when the walk leaves the mesh or stalls (the mesh is not
    /// convex after carving, so the walk alone is not conclusive).
    pub fn locate(&mut self, p: [f64; 2]) -> Located {
        let Some(start) = self
            .last_located
            .filter(|k| self.tris.contains_key(*k))
            .or_else(|| self.tris.keys().next())
        else {
            return Located::Outside;
        };

        let mut current = start;
        let budget = self.tris.len() + 16;
        for _ in 0..budget {
            match self.classify(current, p) {
                WalkStep::Here(located) => {
                    self.last_located = Some(current);
                    return located;
                }
                WalkStep::Toward(next) => current = next,
                WalkStep::Blocked => break,
            }
        }
        self.locate_by_scan(p)
    }

    fn locate_by_scan(&mut self, p: [f64; 2]) -> Located {
        let keys: Vec<TriKey> = self.tris.keys().collect();
        for key in keys {
            if let WalkStep::Here(located) = self.classify(key, p) {
                self.last_located = Some(key);
                return located;
            }
        }
        Located::Outside
    }

    /// Classify `p` against one triangle, or pick the next triangle to walk to.
    fn classify(&self, key: TriKey, p: [f64; 2]) -> WalkStep {
        if self.has_helper_corner(key) {
            return self.classify_with_helpers(key, p);
        }
        let tri = &self.tris[key];
        let corners = [
            self.position(tri.vertices[0]),
            self.position(tri.vertices[1]),
            self.position(tri.vertices[2]),
        ];

        // Coincidence with a corner ends the walk immediately.
        for (i, &corner) in corners.iter().enumerate() {
            if squared_distance(corner, p) <= 1.0e-24 {
                return WalkStep::Here(Located::Vertex(tri.vertices[i]));
            }
        }

        let mut orientations = [Orientation::POSITIVE; 3];
        let mut worst: Option<(usize, f64)> = None;
        for e in 0..3 {
            let a = corners[e];
            let b = corners[(e + 1) % 3];
            orientations[e] = orient2d(a, b, p);
            if orientations[e] == Orientation::NEGATIVE {
                let value = super::predicates::orient2d_value(a, b, p);
                if worst.is_none_or(|(_, w)| value < w) {
                    worst = Some((e, value));
                }
            }
        }

        if let Some((e, _)) = worst {
            return match tri.neighbors[e] {
                Some(next) => WalkStep::Toward(next),
                None => WalkStep::Blocked,
            };
        }

        let degenerate: SmallVec<[usize; 2]> = (0..3)
            .filter(|&e| orientations[e] == Orientation::DEGENERATE)
            .collect();
        match degenerate.len() {
            0 => WalkStep::Here(Located::Triangle(key)),
            1 => WalkStep::Here(Located::Edge(key, degenerate[0])),
            _ => {
                // Collinear with two edges: p sits at their shared corner.
                let nearest = (0..3)
                    .min_by(|&i, &j| {
                        squared_distance(corners[i], p)
                            .total_cmp(&squared_distance(corners[j], p))
                    })
                    .unwrap_or(0);
                WalkStep::Here(Located::Vertex(tri.vertices[nearest]))
            }
        }
    }

    /// [`Self::classify`] for triangles with a corner at infinity, using the
    /// limit predicates instead of stored coordinates.
    fn classify_with_helpers(&self, key: TriKey, p: [f64; 2]) -> WalkStep {
        let tri = &self.tris[key];
        for &v in &tri.vertices {
            if self.helper_direction(v).is_none()
                && squared_distance(self.position(v), p) <= 1.0e-24
            {
                return WalkStep::Here(Located::Vertex(v));
            }
        }

        let mut orientations = [Orientation::POSITIVE; 3];
        for e in 0..3 {
            let a = self.site(tri.vertices[e]);
            let b = self.site(tri.vertices[(e + 1) % 3]);
            orientations[e] = orient_sites([a, b, Site::At(p)]);
        }
        for e in 0..3 {
            if orientations[e] == Orientation::NEGATIVE {
                return match tri.neighbors[e] {
                    Some(next) => WalkStep::Toward(next),
                    None => WalkStep::Blocked,
                };
            }
        }
        // Only a fully finite edge can carry an on-edge hit; a point
        // collinear with an infinite edge counts as interior.
        let on_finite_edge = (0..3).find(|&e| {
            orientations[e] == Orientation::DEGENERATE
                && self.helper_direction(tri.vertices[e]).is_none()
                && self.helper_direction(tri.vertices[(e + 1) % 3]).is_none()
        });
        match on_finite_edge {
            Some(e) => WalkStep::Here(Located::Edge(key, e)),
            None => WalkStep::Here(Located::Triangle(key)),
        }
    }

    // =========================================================================
    // INSERTION
    // =========================================================================

    /// Insert a new point into the mesh.
    ///
    /// The caller supplies the marker and attribute row for the would-be
    /// vertex; they are only consumed when a vertex is actually created.
    ///
    /// # Errors
    ///
    /// Propagates internal invariant failures from cavity construction.
    pub fn insert_point(
        &mut self,
        position: [f64; 2],
        marker: i32,
        attributes: &[f64],
    ) -> Result<Inserted, TriangulateError> {
        match self.locate(position) {
            Located::Vertex(v) => Ok(Inserted::Existing(v)),
            Located::Outside => Ok(Inserted::Outside),
            Located::Triangle(t) => {
                let vid = self.add_vertex(position, marker, attributes);
                self.insert_in_cavity(vid, t)?;
                Ok(Inserted::New(vid))
            }
            Located::Edge(t, e) => {
                let vid = self.add_vertex(position, marker, attributes);
                self.split_edge_with_vertex(t, e, vid);
                Ok(Inserted::New(vid))
            }
        }
    }

    /// Split edge `e` of triangle `key` at a new vertex.
    ///
    /// Returns the id of the created vertex. Constraint flags carry over to
    /// both halves of the split edge, so subdividing a PSLG segment keeps it
    /// constrained.
    pub fn split_edge(
        &mut self,
        key: TriKey,
        e: usize,
        position: [f64; 2],
        marker: i32,
        attributes: &[f64],
    ) -> u32 {
        let vid = self.add_vertex(position, marker, attributes);
        self.split_edge_with_vertex(key, e, vid);
        vid
    }

    fn add_vertex(&mut self, position: [f64; 2], marker: i32, attributes: &[f64]) -> u32 {
        debug_assert_eq!(attributes.len(), self.attributes_per_vertex);
        let vid = self.vertices.len() as u32;
        self.vertices.push(Vertex { position, marker });
        self.attributes.extend_from_slice(attributes);
        vid
    }

    /// Insert vertex `vid` (already stored) by carving and refilling its
    /// Delaunay cavity, starting from the triangle that contains it.
    fn insert_existing_vertex(&mut self, vid: u32) -> Result<(), TriangulateError> {
        let position = self.position(vid);
        match self.locate(position) {
            Located::Triangle(t) => self.insert_in_cavity(vid, t),
            Located::Edge(t, e) => {
                self.split_edge_with_vertex(t, e, vid);
                Ok(())
            }
            Located::Vertex(other) => Err(TriangulateError::DegenerateInput {
                message: format!(
                    "point ({}, {}) coincides with point {other}",
                    position[0], position[1]
                ),
            }),
            Located::Outside => Err(TriangulateError::Internal {
                message: "point escaped the bounding triangle".to_string(),
            }),
        }
    }

    /// Grow the cavity of triangles whose circumcircle strictly contains `p`,
    /// never crossing a constrained edge, then refill it as a fan around
    /// `vid`.
    fn insert_in_cavity(&mut self, vid: u32, seed: TriKey) -> Result<(), TriangulateError> {
        let p = self.position(vid);

        let mut cavity: FastHashSet<TriKey> = FastHashSet::default();
        let mut stack: SmallVec<[TriKey; 16]> = SmallVec::new();
        cavity.insert(seed);
        stack.push(seed);
        while let Some(key) = stack.pop() {
            let tri = self.tris[key];
            for e in 0..3 {
                if tri.constrained[e] {
                    continue;
                }
                let Some(next) = tri.neighbors[e] else {
                    continue;
                };
                if cavity.contains(&next) {
                    continue;
                }
                if self.in_circle_key(next, p) == InCircle::INSIDE {
                    cavity.insert(next);
                    stack.push(next);
                }
            }
        }

        // Directed boundary edges of the cavity, keyed by start vertex. The
        // cavity of a point is an edge-connected disk, so the boundary is one
        // simple cycle.
        struct Rim {
            end: u32,
            outside: Option<TriKey>,
            constrained: bool,
        }
        let mut rim: FastHashMap<u32, Rim> = FastHashMap::default();
        for &key in &cavity {
            let tri = self.tris[key];
            for e in 0..3 {
                let outside = tri.neighbors[e];
                if outside.is_some_and(|n| cavity.contains(&n)) {
                    continue;
                }
                let (a, b) = (tri.vertices[e], tri.vertices[(e + 1) % 3]);
                if rim
                    .insert(
                        a,
                        Rim {
                            end: b,
                            outside,
                            constrained: tri.constrained[e],
                        },
                    )
                    .is_some()
                {
                    return Err(TriangulateError::Internal {
                        message: "cavity boundary is not a simple cycle".to_string(),
                    });
                }
            }
        }

        for &key in &cavity {
            self.tris.remove(key);
        }

        // Refill: one counterclockwise triangle (a, b, vid) per rim edge.
        let start = *rim.keys().next().ok_or_else(|| TriangulateError::Internal {
            message: "cavity has no boundary".to_string(),
        })?;
        let mut fan: SmallVec<[(u32, TriKey); 16]> = SmallVec::new();
        let mut fan_by_start: FastHashMap<u32, TriKey> = FastHashMap::default();
        let mut a = start;
        loop {
            let edge = rim.get(&a).ok_or_else(|| TriangulateError::Internal {
                message: "cavity boundary cycle is broken".to_string(),
            })?;
            let (b, outside, constrained) = (edge.end, edge.outside, edge.constrained);
            let key = self.tris.insert(Tri {
                vertices: [a, b, vid],
                neighbors: [outside, None, None],
                constrained: [constrained, false, false],
            });
            if let Some(out) = outside {
                self.relink_neighbor(out, b, a, key);
            }
            fan.push((a, key));
            fan_by_start.insert(a, key);
            a = b;
            if a == start {
                break;
            }
            if fan.len() > rim.len() {
                return Err(TriangulateError::Internal {
                    message: "cavity boundary cycle is broken".to_string(),
                });
            }
        }

        // Stitch consecutive fan triangles together.
        for &(_, key) in &fan {
            let b = self.tris[key].vertices[1];
            let next = fan_by_start[&b];
            self.tris[key].neighbors[1] = Some(next);
            self.tris[next].neighbors[2] = Some(key);
        }

        self.last_located = fan.first().map(|&(_, key)| key);
        let seeds: SmallVec<[TriKey; 16]> = fan.iter().map(|&(_, key)| key).collect();
        self.legalize_around(vid, seeds);
        Ok(())
    }

    /// Point the edge `a -> b` of triangle `key` at a new neighbor.
    fn relink_neighbor(&mut self, key: TriKey, a: u32, b: u32, new_neighbor: TriKey) {
        if let Some(e) = self.tris[key].directed_edge(a, b) {
            self.tris[key].neighbors[e] = Some(new_neighbor);
        }
    }

    /// Replace the one or two triangles adjacent to edge `e` of `key` with
    /// two (or four) triangles fanning around `vid`, which must lie on the
    /// open edge.
    fn split_edge_with_vertex(&mut self, key: TriKey, e: usize, vid: u32) {
        let tri = self.tris[key];
        let u = tri.vertices[e];
        let v = tri.vertices[(e + 1) % 3];
        let w = tri.apex(e);
        let flag = tri.constrained[e];
        let n_wu = tri.neighbors[(e + 2) % 3];
        let f_wu = tri.constrained[(e + 2) % 3];
        let n_vw = tri.neighbors[(e + 1) % 3];
        let f_vw = tri.constrained[(e + 1) % 3];
        let other = tri.neighbors[e];

        self.tris.remove(key);

        // Near side: (u, p, w) and (p, v, w).
        let a1 = self.tris.insert(Tri {
            vertices: [u, vid, w],
            neighbors: [None, None, n_wu],
            constrained: [flag, false, f_wu],
        });
        let a2 = self.tris.insert(Tri {
            vertices: [vid, v, w],
            neighbors: [None, n_vw, Some(a1)],
            constrained: [flag, f_vw, false],
        });
        self.tris[a1].neighbors[1] = Some(a2);
        if let Some(n) = n_wu {
            self.relink_neighbor(n, u, w, a1);
        }
        if let Some(n) = n_vw {
            self.relink_neighbor(n, w, v, a2);
        }

        let mut seeds: SmallVec<[TriKey; 16]> = SmallVec::new();
        seeds.push(a1);
        seeds.push(a2);

        if let Some(other_key) = other {
            let mirror = self.tris[other_key];
            // The far triangle holds the directed edge (v, u).
            debug_assert!(mirror.directed_edge(v, u).is_some());
            let eb = mirror.directed_edge(v, u).unwrap_or_default();
            let x = mirror.apex(eb);
            let n_xv = mirror.neighbors[(eb + 2) % 3];
            let f_xv = mirror.constrained[(eb + 2) % 3];
            let n_ux = mirror.neighbors[(eb + 1) % 3];
            let f_ux = mirror.constrained[(eb + 1) % 3];

            self.tris.remove(other_key);

            // Far side: (v, p, x) and (p, u, x).
            let b1 = self.tris.insert(Tri {
                vertices: [v, vid, x],
                neighbors: [Some(a2), None, n_xv],
                constrained: [flag, false, f_xv],
            });
            let b2 = self.tris.insert(Tri {
                vertices: [vid, u, x],
                neighbors: [Some(a1), n_ux, Some(b1)],
                constrained: [flag, f_ux, false],
            });
            self.tris[b1].neighbors[1] = Some(b2);
            self.tris[a2].neighbors[0] = Some(b1);
            self.tris[a1].neighbors[0] = Some(b2);
            if let Some(n) = n_xv {
                self.relink_neighbor(n, v, x, b1);
            }
            if let Some(n) = n_ux {
                self.relink_neighbor(n, x, u, b2);
            }
            seeds.push(b1);
            seeds.push(b2);
        }

        self.last_located = Some(a1);
        self.legalize_around(vid, seeds);
    }

    // =========================================================================
    // FLIPS AND REPAIR
    // =========================================================================

    /// Flip the edge `e` of triangle `key` with its neighbor `kb`.
    ///
    /// Both triangle keys survive the flip with new contents. `try_flip`
    /// establishes the preconditions (interior, unconstrained, strictly
    /// convex quad).
    fn flip(&mut self, key: TriKey, e: usize, kb: TriKey, eb: usize) {
        let a_tri = self.tris[key];
        let u = a_tri.vertices[e];
        let v = a_tri.vertices[(e + 1) % 3];
        let w = a_tri.apex(e);
        let b_tri = self.tris[kb];
        let x = b_tri.apex(eb);

        let n_wu = a_tri.neighbors[(e + 2) % 3];
        let f_wu = a_tri.constrained[(e + 2) % 3];
        let n_vw = a_tri.neighbors[(e + 1) % 3];
        let f_vw = a_tri.constrained[(e + 1) % 3];
        let n_ux = b_tri.neighbors[(eb + 1) % 3];
        let f_ux = b_tri.constrained[(eb + 1) % 3];
        let n_xv = b_tri.neighbors[(eb + 2) % 3];
        let f_xv = b_tri.constrained[(eb + 2) % 3];

        // (u, v, w) + (v, u, x) become (u, x, w) + (x, v, w).
        self.tris[key] = Tri {
            vertices: [u, x, w],
            neighbors: [n_ux, Some(kb), n_wu],
            constrained: [f_ux, false, f_wu],
        };
        self.tris[kb] = Tri {
            vertices: [x, v, w],
            neighbors: [n_xv, n_vw, Some(key)],
            constrained: [f_xv, f_vw, false],
        };
        if let Some(n) = n_ux {
            self.relink_neighbor(n, x, u, key);
        }
        if let Some(n) = n_vw {
            self.relink_neighbor(n, w, v, kb);
        }
    }

    /// Flip edge `e` of `key` if it is interior, unconstrained, and the
    /// surrounding quad is strictly convex. Returns whether a flip happened.
    pub fn try_flip(&mut self, key: TriKey, e: usize) -> bool {
        let tri = self.tris[key];
        if tri.constrained[e] {
            return false;
        }
        let Some(kb) = tri.neighbors[e] else {
            return false;
        };
        let u = tri.vertices[e];
        let v = tri.vertices[(e + 1) % 3];
        let w = tri.apex(e);
        let b_tri = self.tris[kb];
        let Some(eb) = b_tri.directed_edge(v, u) else {
            return false;
        };
        let x = b_tri.apex(eb);

        if self.orient_ids(u, x, w) != Orientation::POSITIVE
            || self.orient_ids(x, v, w) != Orientation::POSITIVE
        {
            return false;
        }
        self.flip(key, e, kb, eb);
        true
    }

    /// Restore the Delaunay property around a freshly inserted vertex by
    /// recursively flipping the edges opposite it.
    fn legalize_around(&mut self, vid: u32, seeds: SmallVec<[TriKey; 16]>) {
        let mut stack: SmallVec<[TriKey; 16]> = seeds;
        let mut budget = legalize_budget(self.tris.len());
        let p = self.position(vid);

        while let Some(key) = stack.pop() {
            if budget == 0 {
                tracing::warn!("legalization budget exhausted, leaving repair to the global pass");
                break;
            }
            budget -= 1;

            let Some(tri) = self.tris.get(key).copied() else {
                continue;
            };
            let Some(corner) = tri.corner_of(vid) else {
                continue;
            };
            let e = (corner + 1) % 3;
            if tri.constrained[e] {
                continue;
            }
            let Some(nk) = tri.neighbors[e] else {
                continue;
            };
            if self.in_circle_key(nk, p) == InCircle::INSIDE && self.try_flip(key, e) {
                stack.push(key);
                stack.push(nk);
            }
        }
    }

    /// Global Lawson repair: flip every unconstrained interior edge that
    /// violates the strict circumcircle test, until a full pass is clean.
    pub fn lawson_pass(&mut self) {
        let mut passes = 0usize;
        loop {
            passes += 1;
            let mut changed = false;
            let keys: Vec<TriKey> = self.tris.keys().collect();
            for key in keys {
                for e in 0..3 {
                    let Some(tri) = self.tris.get(key).copied() else {
                        break;
                    };
                    if tri.constrained[e] {
                        continue;
                    }
                    let Some(nk) = tri.neighbors[e] else {
                        continue;
                    };
                    // Visit each undirected edge from one side only.
                    if key.data().as_ffi() > nk.data().as_ffi() {
                        continue;
                    }
                    let (a, b) = (tri.vertices[e], tri.vertices[(e + 1) % 3]);
                    let n_tri = self.tris[nk];
                    let Some(eb) = n_tri.directed_edge(b, a) else {
                        continue;
                    };
                    let apex = n_tri.apex(eb);
                    // A helper apex is outside every finite circumdisc.
                    if self.helper_direction(apex).is_some() {
                        continue;
                    }
                    let q = self.position(apex);
                    if self.in_circle_key(key, q) == InCircle::INSIDE && self.try_flip(key, e) {
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
            if passes >= 100 {
                tracing::warn!(passes, "Lawson repair did not settle, stopping");
                break;
            }
        }
    }

    // =========================================================================
    // VALIDATION
    // =========================================================================

    /// Check structural invariants: corner ids in range, counterclockwise
    /// orientation, symmetric neighbor links with matching constraint flags.
    ///
    /// # Errors
    ///
    /// Returns `Internal` describing the first violated invariant.
    pub fn validate(&self) -> Result<(), TriangulateError> {
        let vertex_count = self.vertices.len() as u32;
        for (key, tri) in &self.tris {
            for &v in &tri.vertices {
                if v >= vertex_count {
                    return Err(TriangulateError::Internal {
                        message: format!("triangle references missing vertex {v}"),
                    });
                }
            }
            let [a, b, c] = [
                self.position(tri.vertices[0]),
                self.position(tri.vertices[1]),
                self.position(tri.vertices[2]),
            ];
            if orient2d(a, b, c) != Orientation::POSITIVE {
                return Err(TriangulateError::Internal {
                    message: format!("triangle {:?} is not counterclockwise", tri.vertices),
                });
            }
            for e in 0..3 {
                let Some(nk) = tri.neighbors[e] else {
                    continue;
                };
                let Some(n_tri) = self.tris.get(nk) else {
                    return Err(TriangulateError::Internal {
                        message: "neighbor link points at a removed triangle".to_string(),
                    });
                };
                let (u, v) = (tri.vertices[e], tri.vertices[(e + 1) % 3]);
                let Some(eb) = n_tri.directed_edge(v, u) else {
                    return Err(TriangulateError::Internal {
                        message: format!("neighbor across ({u}, {v}) does not share the edge"),
                    });
                };
                if n_tri.neighbors[eb] != Some(key) {
                    return Err(TriangulateError::Internal {
                        message: format!("asymmetric neighbor link across ({u}, {v})"),
                    });
                }
                if n_tri.constrained[eb] != tri.constrained[e] {
                    return Err(TriangulateError::Internal {
                        message: format!("constraint flag mismatch across ({u}, {v})"),
                    });
                }
            }
        }
        Ok(())
    }
}

enum WalkStep {
    Here(Located),
    Toward(TriKey),
    Blocked,
}

// =============================================================================
// TESTS
// =============================================================================
