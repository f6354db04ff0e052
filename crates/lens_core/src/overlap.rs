//! Greedy deduplication of refined image positions.

use crate::types::Point2D;
use log::debug;

/// Keeps the first item of every cluster: an item is dropped when it lies closer
/// than `min_distance` to an item already kept. Pairwise O(n^2), which is fine
/// for image counts.
pub fn merge_by<T, F>(items: Vec<T>, min_distance: f64, position: F) -> Vec<T>
where
    F: Fn(&T) -> Point2D,
{
    let before = items.len();
    let mut kept: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        let point = position(&item);
        let overlaps = kept
            .iter()
            .any(|existing| position(existing).distance(&point) < min_distance);
        if !overlaps {
            kept.push(item);
        }
    }
    if kept.len() < before {
        debug!(
            "Merged {} positions into {} within {}",
            before,
            kept.len(),
            min_distance
        );
    }
    kept
}

pub fn merge_points(points: Vec<Point2D>, min_distance: f64) -> Vec<Point2D> {
    merge_by(points, min_distance, |point| *point)
}
