//! Geometry helpers for the repair heuristics.
//!
//! Contains helper functions for:
//! - Distance calculations (squared distance to avoid sqrt when comparing)
//! - Centroids of node groups
//! - Closest node pair between two groups

use super::types::{NodeId, Point};

/// Squared Euclidean distance in world units.
///
/// Comparing squared distances gives the same ordering as comparing
/// distances, without the square root.
///
/// # Parameters
///
/// * `a` - First point
/// * `b` - Second point
///
/// # Returns
///
/// The squared distance (dx² + dy²).
pub fn distance2(a: &Point, b: &Point) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

/// Euclidean distance in world units.
pub fn distance(a: &Point, b: &Point) -> f64 {
    distance2(a, b).sqrt()
}

/// Arithmetic mean of a set of points, `None` when the set is empty.
pub fn centroid<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Point> {
    let mut count = 0usize;
    let mut sum = Point::new(0.0, 0.0);
    for point in points {
        sum.x += point.x;
        sum.y += point.y;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(Point::new(sum.x / count as f64, sum.y / count as f64))
}

/// Closest pair `(from, to)` with `from` taken in `left` and `to` in `right`.
///
/// Ties keep the first pair met, scanning `left` then `right` in the given
/// order, so the result is deterministic for sorted inputs.
///
/// # Parameters
///
/// * `left` - First group of node ids
/// * `right` - Second group of node ids
/// * `position` - Position lookup for a node id
///
/// # Returns
///
/// The closest pair, or `None` when either group is empty.
pub fn closest_pair<F>(left: &[NodeId], right: &[NodeId], position: F) -> Option<(NodeId, NodeId)>
where
    F: Fn(NodeId) -> Point,
{
    let mut best: Option<((NodeId, NodeId), f64)> = None;
    for &from in left {
        let from_position = position(from);
        for &to in right {
            let d2 = distance2(&from_position, &position(to));
            match best {
                Some((_, best_d2)) if d2 >= best_d2 => {}
                _ => best = Some(((from, to), d2)),
            }
        }
    }
    best.map(|(pair, _)| pair)
}

/// Id in `candidates` whose position is closest to `target`.
pub fn nearest_to<F>(target: &Point, candidates: &[NodeId], position: F) -> Option<NodeId>
where
    F: Fn(NodeId) -> Point,
{
    let mut best: Option<(NodeId, f64)> = None;
    for &id in candidates {
        let d2 = distance2(target, &position(id));
        match best {
            Some((_, best_d2)) if d2 >= best_d2 => {}
            _ => best = Some((id, d2)),
        }
    }
    best.map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    #[test]
    fn distances_agree() {
        assert_eq!(distance2(&p(0.0, 0.0), &p(3.0, 4.0)), 25.0);
        assert_eq!(distance(&p(0.0, 0.0), &p(3.0, 4.0)), 5.0);
    }

    #[test]
    fn centroid_of_square_is_its_center() {
        let square = [p(0.0, 0.0), p(2.0, 0.0), p(2.0, 2.0), p(0.0, 2.0)];
        assert_eq!(centroid(square.iter()), Some(p(1.0, 1.0)));
        assert_eq!(centroid(std::iter::empty()), None);
    }

    #[test]
    fn closest_pair_scans_both_groups() {
        let positions = [p(0.0, 0.0), p(1.0, 0.0), p(5.0, 0.0), p(3.0, 0.0)];
        let pair = closest_pair(&[0, 1], &[2, 3], |id| positions[id]);
        assert_eq!(pair, Some((1, 3)));
        assert_eq!(closest_pair(&[], &[2, 3], |id| positions[id]), None);
    }

    #[test]
    fn nearest_to_keeps_first_on_ties() {
        let positions = [p(-1.0, 0.0), p(1.0, 0.0), p(4.0, 0.0)];
        assert_eq!(nearest_to(&p(0.0, 0.0), &[0, 1, 2], |id| positions[id]), Some(0));
    }
}
