//! Zero-level contours of a sampled scalar field.
//!
//! Cells are marched independently into directed segments, then the segments
//! are chained into polylines. Every segment keeps the positive side of the
//! field on its right, which lets neighbouring segments join head to tail.

use crate::error::LensError;
use crate::types::{Contour, Point2D, Segment};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Contour level; the field is shifted by the caller so crossings sit at zero.
const LEVEL: f64 = 0.0;

/// Coordinates are snapped to this quantum before they are used as map keys.
pub const KEY_QUANTUM: f64 = 1e-9;

/// Scalar values at the four corners of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CornerValues {
    pub ll: f64,
    pub ul: f64,
    pub lr: f64,
    pub ur: f64,
}

impl CornerValues {
    pub fn has_nan(&self) -> bool {
        self.ll.is_nan() || self.ul.is_nan() || self.lr.is_nan() || self.ur.is_nan()
    }

    pub fn min_abs(&self) -> f64 {
        self.ll
            .abs()
            .min(self.ul.abs())
            .min(self.lr.abs())
            .min(self.ur.abs())
    }

    /// True when the corners do not all share one sign.
    pub fn changes_sign(&self) -> bool {
        let positive = [self.ll, self.ul, self.lr, self.ur]
            .iter()
            .filter(|value| **value > LEVEL)
            .count();
        positive != 0 && positive != 4
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            ll: f(self.ll),
            ul: f(self.ul),
            lr: f(self.lr),
            ur: f(self.ur),
        }
    }

    /// Bit 0 `ul`, bit 1 `ur`, bit 2 `ll`, bit 3 `lr`, each set above the level.
    fn case_index(&self) -> u8 {
        let mut case_index = 0u8;
        if self.ul > LEVEL {
            case_index |= 1;
        }
        if self.ur > LEVEL {
            case_index |= 2;
        }
        if self.ll > LEVEL {
            case_index |= 4;
        }
        if self.lr > LEVEL {
            case_index |= 8;
        }
        case_index
    }
}

/// Axis-aligned grid cell spanning `lower_left` to `upper_right`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub lower_left: Point2D,
    pub upper_right: Point2D,
    pub values: CornerValues,
}

impl Cell {
    pub fn center(&self) -> Point2D {
        Point2D::new(
            0.5 * (self.lower_left.x + self.upper_right.x),
            0.5 * (self.lower_left.y + self.upper_right.y),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Top,
    Bottom,
    Left,
    Right,
}

/// Oriented edge pair per case; `None` marks the empty and saddle cases.
fn case_edges(case_index: u8) -> Option<(Edge, Edge)> {
    use Edge::*;
    match case_index {
        1 => Some((Top, Left)),
        2 => Some((Right, Top)),
        3 => Some((Right, Left)),
        4 => Some((Left, Bottom)),
        5 => Some((Top, Bottom)),
        7 => Some((Right, Bottom)),
        8 => Some((Bottom, Right)),
        10 => Some((Bottom, Top)),
        11 => Some((Bottom, Left)),
        12 => Some((Left, Right)),
        13 => Some((Top, Right)),
        14 => Some((Left, Top)),
        _ => None,
    }
}

/// Linear-interpolation fraction of `level` between `from` and `to`, or 0 when
/// the two values coincide.
pub fn fraction(from: f64, to: f64, level: f64) -> f64 {
    if from == to {
        0.0
    } else {
        (level - from) / (to - from)
    }
}

fn edge_crossing(cell: &Cell, edge: Edge) -> Point2D {
    let Cell {
        lower_left: Point2D { x: x0, y: y0 },
        upper_right: Point2D { x: x1, y: y1 },
        values,
    } = *cell;
    let dx = x1 - x0;
    let dy = y1 - y0;
    match edge {
        Edge::Top => Point2D::new(x0 + fraction(values.ul, values.ur, LEVEL) * dx, y1),
        Edge::Bottom => Point2D::new(x0 + fraction(values.ll, values.lr, LEVEL) * dx, y0),
        Edge::Left => Point2D::new(x0, y0 + fraction(values.ll, values.ul, LEVEL) * dy),
        Edge::Right => Point2D::new(x1, y0 + fraction(values.lr, values.ur, LEVEL) * dy),
    }
}

/// Marches every cell and returns the directed zero-crossing segments in cell
/// order.
///
/// Cells with a NaN corner are skipped. The saddle cases 6 and 9 cannot be
/// resolved from four corner samples and abort with [`LensError::Topology`].
pub fn extract_segments(cells: &[Cell]) -> Result<Vec<Segment>, LensError> {
    let mut segments = Vec::new();
    for (index, cell) in cells.iter().enumerate() {
        if cell.values.has_nan() {
            continue;
        }
        let case_index = cell.values.case_index();
        if case_index == 6 || case_index == 9 {
            return Err(LensError::Topology {
                case: case_index,
                cell: index,
            });
        }
        if let Some((from, to)) = case_edges(case_index) {
            segments.push(Segment::new(
                edge_crossing(cell, from),
                edge_crossing(cell, to),
            ));
        }
    }
    Ok(segments)
}

type PointKey = (i64, i64);

fn point_key(point: &Point2D) -> PointKey {
    (
        (point.x / KEY_QUANTUM).round() as i64,
        (point.y / KEY_QUANTUM).round() as i64,
    )
}

/// Chains directed segments into polylines, returned in creation order.
///
/// A segment whose end starts a live chain and whose start ends a live chain
/// either closes that chain or splices the later-created chain into the
/// earlier one. Closed contours repeat their first point exactly.
pub fn assemble(segments: &[Segment]) -> Vec<Contour> {
    let mut chains: BTreeMap<usize, VecDeque<Point2D>> = BTreeMap::new();
    let mut starts: HashMap<PointKey, usize> = HashMap::new();
    let mut ends: HashMap<PointKey, usize> = HashMap::new();
    let mut next_id = 0usize;

    for segment in segments {
        let from_key = point_key(&segment.from);
        let to_key = point_key(&segment.to);
        if from_key == to_key {
            continue;
        }

        let tail = starts.remove(&to_key);
        let head = ends.remove(&from_key);
        match (tail, head) {
            (Some(tail_id), Some(head_id)) if tail_id == head_id => {
                if let Some(chain) = chains.get_mut(&tail_id) {
                    if let Some(first) = chain.front().copied() {
                        chain.push_back(first);
                    }
                }
            }
            (Some(tail_id), Some(head_id)) if tail_id > head_id => {
                let Some(tail_chain) = chains.remove(&tail_id) else {
                    continue;
                };
                if let Some(last) = tail_chain.back() {
                    ends.remove(&point_key(last));
                }
                if let Some(head_chain) = chains.get_mut(&head_id) {
                    head_chain.extend(tail_chain);
                    if let Some(last) = head_chain.back() {
                        ends.insert(point_key(last), head_id);
                    }
                }
            }
            (Some(tail_id), Some(head_id)) => {
                let Some(head_chain) = chains.remove(&head_id) else {
                    continue;
                };
                if let Some(first) = head_chain.front() {
                    starts.remove(&point_key(first));
                }
                if let Some(tail_chain) = chains.get_mut(&tail_id) {
                    for point in head_chain.into_iter().rev() {
                        tail_chain.push_front(point);
                    }
                    if let Some(first) = tail_chain.front() {
                        starts.insert(point_key(first), tail_id);
                    }
                }
            }
            (Some(tail_id), None) => {
                if let Some(chain) = chains.get_mut(&tail_id) {
                    chain.push_front(segment.from);
                    starts.insert(from_key, tail_id);
                }
            }
            (None, Some(head_id)) => {
                if let Some(chain) = chains.get_mut(&head_id) {
                    chain.push_back(segment.to);
                    ends.insert(to_key, head_id);
                }
            }
            (None, None) => {
                chains.insert(next_id, VecDeque::from([segment.from, segment.to]));
                starts.insert(from_key, next_id);
                ends.insert(to_key, next_id);
                next_id += 1;
            }
        }
    }

    let contours: Vec<Contour> = chains
        .into_values()
        .map(|chain| Contour {
            points: chain.into(),
        })
        .collect();
    debug!(
        "Assembled {} segments into {} contours ({} closed)",
        segments.len(),
        contours.len(),
        contours.iter().filter(|contour| contour.is_closed()).count()
    );
    contours
}

/// Extracts and assembles the zero contours of `cells`.
pub fn trace_contours(cells: &[Cell]) -> Result<Vec<Contour>, LensError> {
    let segments = extract_segments(cells)?;
    Ok(assemble(&segments))
}
