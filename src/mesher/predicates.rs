//! Planar geometric predicates and measures for the mesh engine.
//!
//! This module contains the fundamental geometric tests the triangulation kernel
//! is built on: orientation, circumcircle membership, segment incidence, and the
//! quality measures (area, minimum angle) used by refinement.
//!
//! All predicates use adaptive tolerances that scale with the magnitude of the
//! operands, so the same code behaves sensibly on coordinates of order `1e-3`
//! and `1e+6`. They are floating-point filters, not exact arithmetic; inputs
//! closer to degeneracy than the tolerance are reported as `DEGENERATE` /
//! `BOUNDARY` and handled conservatively by the callers.

/// Base absolute tolerance for near-zero determinant tests.
const BASE_TOLERANCE: f64 = 1e-12;

/// Relative tolerance factor, multiplied by the magnitude of the operands.
const RELATIVE_TOLERANCE_FACTOR: f64 = 1e-12;

/// Compute an adaptive tolerance from the magnitude of the determinant terms.
#[inline]
#[must_use]
fn adaptive_tolerance(magnitude: f64) -> f64 {
    RELATIVE_TOLERANCE_FACTOR.mul_add(magnitude, BASE_TOLERANCE)
}

/// Represents the orientation of a point triple in the plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// The triple turns clockwise (determinant < 0)
    NEGATIVE,
    /// The triple is collinear (determinant ≈ 0)
    DEGENERATE,
    /// The triple turns counterclockwise (determinant > 0)
    POSITIVE,
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NEGATIVE => write!(f, "NEGATIVE"),
            Self::DEGENERATE => write!(f, "DEGENERATE"),
            Self::POSITIVE => write!(f, "POSITIVE"),
        }
    }
}

/// Represents the position of a point relative to a triangle's circumcircle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InCircle {
    /// The point is outside the circumcircle
    OUTSIDE,
    /// The point is on the circumcircle (within numerical tolerance)
    BOUNDARY,
    /// The point is strictly inside the circumcircle
    INSIDE,
}

impl std::fmt::Display for InCircle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OUTSIDE => write!(f, "OUTSIDE"),
            Self::BOUNDARY => write!(f, "BOUNDARY"),
            Self::INSIDE => write!(f, "INSIDE"),
        }
    }
}

/// Signed double area of the triangle `(a, b, c)`.
///
/// Positive for a counterclockwise triple, negative for clockwise.
#[inline]
#[must_use]
pub fn orient2d_value(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// Determine the orientation of the point triple `(a, b, c)`.
///
/// Computes the sign of the 2x2 determinant
///
/// ```text
/// | bx-ax  by-ay |
/// | cx-ax  cy-ay |
/// ```
///
/// with a tolerance scaled to the magnitude of the two products, so nearly
/// collinear triples are reported as `DEGENERATE` rather than resolved by
/// rounding noise.
#[inline]
#[must_use]
pub fn orient2d(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> Orientation {
    let lhs = (b[0] - a[0]) * (c[1] - a[1]);
    let rhs = (b[1] - a[1]) * (c[0] - a[0]);
    let det = lhs - rhs;
    let tolerance = adaptive_tolerance(lhs.abs() + rhs.abs());
    if det > tolerance {
        Orientation::POSITIVE
    } else if det < -tolerance {
        Orientation::NEGATIVE
    } else {
        Orientation::DEGENERATE
    }
}

/// Orientation of `(a, b, p)` in the limit where `p` recedes to infinity
/// along `direction`.
///
/// Equivalent to the sign of `(b - a) × direction`. The kernel uses this for
/// the bounding-triangle corners, which are directions rather than positions.
#[inline]
#[must_use]
pub fn orient2d_toward(a: [f64; 2], b: [f64; 2], direction: [f64; 2]) -> Orientation {
    let lhs = (b[0] - a[0]) * direction[1];
    let rhs = (b[1] - a[1]) * direction[0];
    let det = lhs - rhs;
    let tolerance = adaptive_tolerance(lhs.abs() + rhs.abs());
    if det > tolerance {
        Orientation::POSITIVE
    } else if det < -tolerance {
        Orientation::NEGATIVE
    } else {
        Orientation::DEGENERATE
    }
}

/// Test `p` against the circumcircle of the counterclockwise triangle `(a, b, c)`.
///
/// Uses the standard lifted 3x3 determinant; the result is only meaningful when
/// `(a, b, c)` is counterclockwise, which the kernel maintains as an invariant.
#[must_use]
pub fn in_circle(a: [f64; 2], b: [f64; 2], c: [f64; 2], p: [f64; 2]) -> InCircle {
    let adx = a[0] - p[0];
    let ady = a[1] - p[1];
    let bdx = b[0] - p[0];
    let bdy = b[1] - p[1];
    let cdx = c[0] - p[0];
    let cdy = c[1] - p[1];

    let alift = adx * adx + ady * ady;
    let blift = bdx * bdx + bdy * bdy;
    let clift = cdx * cdx + cdy * cdy;

    let bcdet = bdx * cdy - cdx * bdy;
    let cadet = cdx * ady - adx * cdy;
    let abdet = adx * bdy - bdx * ady;

    let det = alift * bcdet + blift * cadet + clift * abdet;
    let magnitude =
        alift * (bcdet.abs()) + blift * (cadet.abs()) + clift * (abdet.abs());
    let tolerance = adaptive_tolerance(magnitude);

    if det > tolerance {
        InCircle::INSIDE
    } else if det < -tolerance {
        InCircle::OUTSIDE
    } else {
        InCircle::BOUNDARY
    }
}

/// Circumcenter of the triangle `(a, b, c)`.
///
/// Returns `None` when the triangle is degenerate (collinear corners), since
/// the circumcenter is then undefined.
#[must_use]
pub fn circumcenter(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> Option<[f64; 2]> {
    let d = 2.0 * orient2d_value(a, b, c);
    let magnitude = (b[0] - a[0]).abs().max((c[0] - a[0]).abs())
        + (b[1] - a[1]).abs().max((c[1] - a[1]).abs());
    if d.abs() <= adaptive_tolerance(magnitude * magnitude) {
        return None;
    }
    let a2 = a[0] * a[0] + a[1] * a[1];
    let b2 = b[0] * b[0] + b[1] * b[1];
    let c2 = c[0] * c[0] + c[1] * c[1];
    let ux = a2 * (b[1] - c[1]) + b2 * (c[1] - a[1]) + c2 * (a[1] - b[1]);
    let uy = a2 * (c[0] - b[0]) + b2 * (a[0] - c[0]) + c2 * (b[0] - a[0]);
    Some([ux / d, uy / d])
}

/// Squared Euclidean distance between `a` and `b`.
#[inline]
#[must_use]
pub fn squared_distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    dx * dx + dy * dy
}

/// Euclidean distance between `a` and `b`.
#[inline]
#[must_use]
pub fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    squared_distance(a, b).sqrt()
}

/// Unsigned area of the triangle `(a, b, c)`.
#[inline]
#[must_use]
pub fn triangle_area(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    0.5 * orient2d_value(a, b, c).abs()
}

/// Smallest interior angle of the triangle `(a, b, c)`, in degrees.
///
/// Returns `0.0` for degenerate triangles.
#[must_use]
pub fn min_angle_degrees(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    let la = squared_distance(b, c);
    let lb = squared_distance(c, a);
    let lc = squared_distance(a, b);
    if la == 0.0 || lb == 0.0 || lc == 0.0 {
        return 0.0;
    }
    // The smallest angle is opposite the shortest side.
    let (opposite, s1, s2) = if la <= lb && la <= lc {
        (la, lb, lc)
    } else if lb <= lc {
        (lb, lc, la)
    } else {
        (lc, la, lb)
    };
    let cosine = (s1 + s2 - opposite) / (2.0 * (s1 * s2).sqrt());
    cosine.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Test whether `p` lies on the open segment `(a, b)`.
///
/// True when `p` is collinear with the segment within tolerance and strictly
/// between the endpoints. The endpoints themselves do not count.
#[must_use]
pub fn on_segment(a: [f64; 2], b: [f64; 2], p: [f64; 2]) -> bool {
    if orient2d(a, b, p) != Orientation::DEGENERATE {
        return false;
    }
    let dot = (p[0] - a[0]) * (b[0] - a[0]) + (p[1] - a[1]) * (b[1] - a[1]);
    let len2 = squared_distance(a, b);
    let tolerance = adaptive_tolerance(len2);
    dot > tolerance && dot < len2 - tolerance
}

/// Test whether segments `(p0, p1)` and `(q0, q1)` cross at a single interior
/// point of both.
///
/// Shared endpoints, touching, and collinear overlap all return `false`; the
/// constraint-forcing pass treats those cases separately.
#[must_use]
pub fn segments_cross(p0: [f64; 2], p1: [f64; 2], q0: [f64; 2], q1: [f64; 2]) -> bool {
    let o1 = orient2d(p0, p1, q0);
    let o2 = orient2d(p0, p1, q1);
    let o3 = orient2d(q0, q1, p0);
    let o4 = orient2d(q0, q1, p1);
    o1 != Orientation::DEGENERATE
        && o2 != Orientation::DEGENERATE
        && o3 != Orientation::DEGENERATE
        && o4 != Orientation::DEGENERATE
        && o1 != o2
        && o3 != o4
}

/// Test whether `p` lies strictly inside the diametral circle of segment `(a, b)`.
///
/// The diametral circle is the smallest circle through both endpoints; `p` is
/// inside it exactly when the angle `a-p-b` is obtuse.
#[must_use]
pub fn encroaches(a: [f64; 2], b: [f64; 2], p: [f64; 2]) -> bool {
    let dot = (a[0] - p[0]) * (b[0] - p[0]) + (a[1] - p[1]) * (b[1] - p[1]);
    let magnitude = ((a[0] - p[0]) * (b[0] - p[0])).abs() + ((a[1] - p[1]) * (b[1] - p[1])).abs();
    dot < -adaptive_tolerance(magnitude)
}

/// Midpoint of segment `(a, b)`.
#[inline]
#[must_use]
pub fn midpoint(a: [f64; 2], b: [f64; 2]) -> [f64; 2] {
    [0.5 * (a[0] + b[0]), 0.5 * (a[1] + b[1])]
}

// =============================================================================
// TESTS
// =============================================================================
