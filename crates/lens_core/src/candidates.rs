//! Coarse image-position candidates from a regular grid scan.

use crate::traits::LensMapping;
use crate::types::{Candidate, Point2D};
use log::{debug, warn};

/// Offsets of the 8-neighbourhood used for the local-minimum test, in scan
/// order: the first `PRECEDING` are visited before the centre sample.
const NEIGHBOURS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

const PRECEDING: usize = 4;

/// Largest number of grid samples along one axis of a search or critical-curve
/// grid.
pub const MAX_SAMPLES_PER_AXIS: usize = 2048;

/// Factor applied to `min_distance * max(1, |mu|)` by the plausibility cut.
pub const PLAUSIBILITY_FACTOR: f64 = 5.0;

/// Regular square grid of `samples x samples` points spaced `spacing` apart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchGrid {
    pub center: Point2D,
    pub spacing: f64,
    pub samples: usize,
}

impl SearchGrid {
    /// Covers a square of side `window_size` with `ceil(window_size / spacing)`
    /// points per axis, symmetric about `center`.
    pub fn covering(center: Point2D, window_size: f64, spacing: f64) -> Self {
        let samples = (window_size / spacing).ceil().max(1.0) as usize;
        Self {
            center,
            spacing,
            samples,
        }
    }

    pub fn point(&self, ix: usize, iy: usize) -> Point2D {
        let offset = (self.samples as f64 - 1.0) / 2.0;
        Point2D::new(
            self.center.x + (ix as f64 - offset) * self.spacing,
            self.center.y + (iy as f64 - offset) * self.spacing,
        )
    }

    fn index(&self, ix: usize, iy: usize) -> usize {
        ix + iy * self.samples
    }
}

/// Scans the grid and returns every point whose source-plane residual is a
/// minimum over its 8 neighbours.
///
/// A residual must be strictly below every neighbour scanned before it and no
/// larger than those scanned after it, so a tie (common for sources on a
/// symmetry axis of an even grid) goes to the first sample of the pair. Points
/// on the outer rim of the grid have an incomplete neighbourhood and are never
/// reported, so images must lie strictly inside the search window.
///
/// Grids wider than [`MAX_SAMPLES_PER_AXIS`] are not scanned and yield no
/// candidates; callers validate their settings first.
pub fn find_candidates<L: LensMapping>(
    lens: &L,
    source: Point2D,
    window_center: Point2D,
    window_size: f64,
    min_distance: f64,
) -> Vec<Candidate> {
    let grid = SearchGrid::covering(window_center, window_size, min_distance);
    let n = grid.samples;
    let total = match n.checked_mul(n) {
        Some(total) if n <= MAX_SAMPLES_PER_AXIS => total,
        _ => {
            warn!(
                "Candidate grid of {} samples per axis exceeds the limit of {}",
                n, MAX_SAMPLES_PER_AXIS
            );
            return Vec::new();
        }
    };
    let mut residuals = vec![f64::NAN; total];
    for iy in 0..n {
        for ix in 0..n {
            let point = grid.point(ix, iy);
            let (beta_x, beta_y) = lens.ray_shooting(point.x, point.y);
            residuals[grid.index(ix, iy)] = (beta_x - source.x).hypot(beta_y - source.y);
        }
    }

    let mut candidates = Vec::new();
    for iy in 1..n.saturating_sub(1) {
        for ix in 1..n.saturating_sub(1) {
            let value = residuals[grid.index(ix, iy)];
            if !value.is_finite() {
                continue;
            }
            let is_minimum = NEIGHBOURS.iter().enumerate().all(|(k, &(dx, dy))| {
                let nx = (ix as isize + dx) as usize;
                let ny = (iy as isize + dy) as usize;
                let other = residuals[grid.index(nx, ny)];
                // NaN neighbours compare false and veto the minimum
                if k < PRECEDING {
                    value < other
                } else {
                    value <= other
                }
            });
            if is_minimum {
                candidates.push(Candidate {
                    position: grid.point(ix, iy),
                    residual: value,
                    spacing: grid.spacing,
                });
            }
        }
    }

    debug!(
        "Candidate scan: {}x{} grid, spacing {}, {} local minima",
        n,
        n,
        grid.spacing,
        candidates.len()
    );
    candidates
}

/// Drops candidates whose residual is implausibly large for their local
/// magnification: keeps `residual <= min_distance * max(1, |mu|) * 5`.
pub fn plausibility_cut<L: LensMapping>(
    lens: &L,
    candidates: Vec<Candidate>,
    min_distance: f64,
) -> Vec<Candidate> {
    let before = candidates.len();
    let kept: Vec<Candidate> = candidates
        .into_iter()
        .filter(|candidate| {
            let mu = lens
                .magnification(candidate.position.x, candidate.position.y)
                .abs();
            let mu = if mu.is_nan() { 1.0 } else { mu.max(1.0) };
            candidate.residual <= min_distance * mu * PLAUSIBILITY_FACTOR
        })
        .collect();
    debug!(
        "Plausibility cut kept {} of {} candidates",
        kept.len(),
        before
    );
    kept
}
