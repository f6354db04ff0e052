//! Value types shared by the image-position solver and the contour tracer.
//!
//! Every type here is constructed per solver invocation and discarded once the
//! caller has consumed the result.

use serde::{Deserialize, Serialize};

/// An angular coordinate in either the image or the source plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<Point2D> for (f64, f64) {
    fn from(point: Point2D) -> Self {
        (point.x, point.y)
    }
}

/// A coarse image-position guess produced by the grid scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub position: Point2D,
    /// Source-plane distance between the ray-shot grid point and the source.
    pub residual: f64,
    /// Spacing of the grid the candidate was picked from.
    pub spacing: f64,
}

/// Outcome of refining a single candidate.
///
/// Either `precision` is within the requested tolerance or `iterations` reached
/// the iteration bound; callers filter on `precision`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefinedSolution {
    pub position: Point2D,
    pub precision: f64,
    pub iterations: usize,
}

impl RefinedSolution {
    pub fn converged(&self, tolerance: f64) -> bool {
        self.precision <= tolerance
    }
}

/// Final, deduplicated image positions for one source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageSet {
    pub images: Vec<RefinedSolution>,
    /// Refinements that never reached the precision limit.
    #[serde(default)]
    pub dropped: usize,
}

impl ImageSet {
    pub fn positions(&self) -> Vec<Point2D> {
        self.images.iter().map(|image| image.position).collect()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Directed piece of a level-set contour through one cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub from: Point2D,
    pub to: Point2D,
}

impl Segment {
    pub const fn new(from: Point2D, to: Point2D) -> Self {
        Self { from, to }
    }

    pub fn is_degenerate(&self) -> bool {
        self.from == self.to
    }
}

/// Polyline assembled from chained segments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    pub points: Vec<Point2D>,
}

impl Contour {
    pub fn is_closed(&self) -> bool {
        self.points.len() > 2 && self.points.first() == self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A critical curve in the image plane paired, point by point, with its caustic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalCurve {
    pub critical: Contour,
    pub caustic: Contour,
}
