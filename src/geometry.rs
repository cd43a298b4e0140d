//! Planar predicates shared by zone and line analytics.
//!
//! All coordinates are pixels with a top-left origin, so `y` grows downwards.

use nalgebra as na;

use crate::Float;

/// Ray-casting parity test with a ray cast towards `+x`.
///
/// An edge counts when it strictly straddles `point.y` and its x-intercept lies
/// to the right of `point.x`. The denominator carries a tiny epsilon, so points
/// lying exactly on the boundary get an answer that depends on which edge they
/// touch. Callers must not rely on boundary points either way.
pub fn point_in_polygon<T: Float>(point: &na::Point2<T>, poly: &[na::Point2<T>]) -> bool {
    let n = poly.len();
    let eps = <T as num_traits::NumCast>::from(1e-9).unwrap_or_else(T::epsilon);
    let mut inside = false;

    for i in 0..n {
        let p1 = &poly[i];
        let p2 = &poly[(i + 1) % n];

        if (p1.y > point.y) != (p2.y > point.y) {
            let xint = (p2.x - p1.x) * (point.y - p1.y) / (p2.y - p1.y + eps) + p1.x;

            if point.x < xint {
                inside = !inside;
            }
        }
    }

    inside
}

/// Twice the signed area of the triangle `abc`. Positive when `c` lies
/// clockwise of `a -> b` on screen (counter-clockwise in y-up axes).
#[inline]
pub fn orientation<T: Float>(a: &na::Point2<T>, b: &na::Point2<T>, c: &na::Point2<T>) -> T {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

#[inline]
fn within_bounds<T: Float>(a: &na::Point2<T>, b: &na::Point2<T>, c: &na::Point2<T>) -> bool {
    a.x.min(b.x) <= c.x && c.x <= a.x.max(b.x) && a.y.min(b.y) <= c.y && c.y <= a.y.max(b.y)
}

#[inline]
fn sign<T: Float>(v: T) -> i8 {
    if v > T::zero() {
        1
    } else if v < T::zero() {
        -1
    } else {
        0
    }
}

/// True if segments `p1-p2` and `q1-q2` share at least one point.
///
/// Shared endpoints, T-junctions and collinear overlap all count as intersections.
pub fn segments_intersect<T: Float>(
    p1: &na::Point2<T>,
    p2: &na::Point2<T>,
    q1: &na::Point2<T>,
    q2: &na::Point2<T>,
) -> bool {
    let o1 = sign(orientation(p1, p2, q1));
    let o2 = sign(orientation(p1, p2, q2));
    let o3 = sign(orientation(q1, q2, p1));
    let o4 = sign(orientation(q1, q2, p2));

    if o1 * o2 < 0 && o3 * o4 < 0 {
        return true;
    }

    (o1 == 0 && within_bounds(p1, p2, q1))
        || (o2 == 0 && within_bounds(p1, p2, q2))
        || (o3 == 0 && within_bounds(q1, q2, p1))
        || (o4 == 0 && within_bounds(q1, q2, p2))
}

/// Sign of the 2-D cross product `line x motion`: `+1`, `-1`, or `0` when parallel.
#[inline]
pub fn crossing_sign<T: Float>(line: &na::Vector2<T>, motion: &na::Vector2<T>) -> i8 {
    sign(line.x * motion.y - line.y * motion.x)
}
