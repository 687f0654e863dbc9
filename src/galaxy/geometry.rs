//! Planar geometry for connection validation.
//!
//! All comparisons go through [`GEOMETRY_EPSILON`]; shared endpoints are
//! decided by location identity, never by comparing coordinates.

use serde::{Deserialize, Serialize};

/// Tolerance for orientation and distance tests.
pub const GEOMETRY_EPSILON: f64 = 1e-9;

/// A point in normalized galaxy space (both axes in `[0, 1]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Position {
    /// Create a new position.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Sign of the turn `a -> b -> c`: 1 counter-clockwise, -1 clockwise, 0 collinear.
fn orientation(a: Position, b: Position, c: Position) -> i8 {
    let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
    if cross > GEOMETRY_EPSILON {
        1
    } else if cross < -GEOMETRY_EPSILON {
        -1
    } else {
        0
    }
}

/// Whether `p` lies within the bounding box of segment `a-b` (collinear case).
fn within_box(a: Position, b: Position, p: Position) -> bool {
    p.x <= a.x.max(b.x) + GEOMETRY_EPSILON
        && p.x >= a.x.min(b.x) - GEOMETRY_EPSILON
        && p.y <= a.y.max(b.y) + GEOMETRY_EPSILON
        && p.y >= a.y.min(b.y) - GEOMETRY_EPSILON
}

/// Whether segments `p1-p2` and `q1-q2` intersect anywhere, endpoints included.
#[must_use]
pub fn segments_intersect(p1: Position, p2: Position, q1: Position, q2: Position) -> bool {
    let o1 = orientation(p1, p2, q1);
    let o2 = orientation(p1, p2, q2);
    let o3 = orientation(q1, q2, p1);
    let o4 = orientation(q1, q2, p2);

    if o1 != o2 && o3 != o4 && o1 != 0 && o2 != 0 && o3 != 0 && o4 != 0 {
        return true;
    }

    (o1 == 0 && within_box(p1, p2, q1))
        || (o2 == 0 && within_box(p1, p2, q2))
        || (o3 == 0 && within_box(q1, q2, p1))
        || (o4 == 0 && within_box(q1, q2, p2))
}

/// Whether two segments sharing exactly one endpoint overlap beyond it.
///
/// `shared` is the common endpoint, `a` and `b` the two far endpoints.
#[must_use]
pub fn shared_endpoint_overlaps(shared: Position, a: Position, b: Position) -> bool {
    if orientation(shared, a, b) != 0 {
        return false;
    }
    // Collinear: overlap iff both far ends sit on the same side of `shared`
    let dot = (a.x - shared.x) * (b.x - shared.x) + (a.y - shared.y) * (b.y - shared.y);
    dot > GEOMETRY_EPSILON
}

/// Shortest distance from point `p` to segment `a-b`.
#[must_use]
pub fn point_segment_distance(p: Position, a: Position, b: Position) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx * dx + dy * dy;
    if length_sq <= GEOMETRY_EPSILON * GEOMETRY_EPSILON {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / length_sq).clamp(0.0, 1.0);
    p.distance(Position::new(a.x + t * dx, a.y + t * dy))
}
