//! Critical curves of a lens mapping and their caustics.
//!
//! Magnification is sampled once per vertex of a square lattice. Cells whose
//! corners straddle a sign change are kept when every corner is strongly
//! magnified, ordered by azimuth, and marched on the inverse magnification.

use crate::candidates::MAX_SAMPLES_PER_AXIS;
use crate::contour::{trace_contours, Cell, CornerValues};
use crate::error::LensError;
use crate::traits::LensMapping;
use crate::types::{Contour, CriticalCurve, Point2D};
use anyhow::{ensure, Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Square sampling lattice for the magnification field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSpec {
    pub center_x: f64,
    pub center_y: f64,
    /// Side length of the sampled square.
    pub window: f64,
    pub spacing: f64,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            center_x: 0.0,
            center_y: 0.0,
            window: 8.0,
            spacing: 8.0 / 160.0,
        }
    }
}

impl GridSpec {
    /// Number of cells per axis.
    pub fn cells_per_axis(&self) -> usize {
        (self.window / self.spacing).ceil().max(1.0) as usize
    }

    /// Vertex coordinates along one axis, shared by every cell touching them.
    fn axis(&self, center: f64) -> Vec<f64> {
        let cells = self.cells_per_axis();
        let start = center - 0.5 * cells as f64 * self.spacing;
        (0..=cells)
            .map(|i| start + i as f64 * self.spacing)
            .collect()
    }

    pub fn validate(&self) -> Result<(), LensError> {
        let invalid = |message: String| Err(LensError::InvalidSettings(message));
        if !self.center_x.is_finite() || !self.center_y.is_finite() {
            return invalid("grid centre must be finite".to_string());
        }
        if !self.window.is_finite() || self.window <= 0.0 {
            return invalid(format!(
                "grid window must be finite and positive, got {}",
                self.window
            ));
        }
        if !self.spacing.is_finite() || self.spacing <= 0.0 {
            return invalid(format!(
                "grid spacing must be finite and positive, got {}",
                self.spacing
            ));
        }
        // vertices per axis are one more than cells
        let vertices = (self.window / self.spacing).ceil() + 1.0;
        if vertices > MAX_SAMPLES_PER_AXIS as f64 {
            return invalid(format!(
                "window / spacing needs {vertices} lattice vertices per axis, \
                 more than the limit of {MAX_SAMPLES_PER_AXIS}"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriticalCurveSettings {
    pub grid: GridSpec,
    /// Cells with any corner magnification at or below this are discarded.
    pub magnification_threshold: f64,
    /// Centre for the azimuthal cell ordering, usually the main deflector's.
    /// Falls back to the mean centre of the critical cells.
    pub lens_center: Option<Point2D>,
}

impl Default for CriticalCurveSettings {
    fn default() -> Self {
        Self {
            grid: GridSpec::default(),
            magnification_threshold: 1.0,
            lens_center: None,
        }
    }
}

/// Builds every lattice cell with its corner magnifications.
pub fn magnification_cells<L: LensMapping>(lens: &L, grid: &GridSpec) -> Vec<Cell> {
    let xs = grid.axis(grid.center_x);
    let ys = grid.axis(grid.center_y);
    let nx = xs.len();
    let mut magnification = Vec::with_capacity(nx * ys.len());
    for &y in &ys {
        for &x in &xs {
            magnification.push(lens.magnification(x, y));
        }
    }
    let at = |ix: usize, iy: usize| magnification[ix + iy * nx];

    let mut cells = Vec::with_capacity((nx - 1) * (ys.len() - 1));
    for iy in 0..ys.len() - 1 {
        for ix in 0..nx - 1 {
            cells.push(Cell {
                lower_left: Point2D::new(xs[ix], ys[iy]),
                upper_right: Point2D::new(xs[ix + 1], ys[iy + 1]),
                values: CornerValues {
                    ll: at(ix, iy),
                    ul: at(ix, iy + 1),
                    lr: at(ix + 1, iy),
                    ur: at(ix + 1, iy + 1),
                },
            });
        }
    }
    cells
}

/// Cells crossed by a critical curve, strongly magnified at every corner and
/// ordered by azimuth around `center`, or around their mean centre without one.
pub fn critical_cells(
    cells: Vec<Cell>,
    magnification_threshold: f64,
    center: Option<Point2D>,
) -> Vec<Cell> {
    let crossing = cells
        .iter()
        .filter(|cell| cell.values.changes_sign())
        .count();
    let mut kept: Vec<Cell> = cells
        .into_iter()
        .filter(|cell| cell.values.changes_sign())
        .filter(|cell| cell.values.min_abs() > magnification_threshold)
        .collect();
    debug!(
        "Critical cells: {} sign changes, {} above threshold {}",
        crossing,
        kept.len(),
        magnification_threshold
    );
    if kept.is_empty() {
        if crossing > 0 {
            warn!(
                "All {} critical cells fall below magnification threshold {}",
                crossing, magnification_threshold
            );
        }
        return kept;
    }

    let origin = center.unwrap_or_else(|| {
        let count = kept.len() as f64;
        let (sum_x, sum_y) = kept.iter().fold((0.0, 0.0), |(sx, sy), cell| {
            let c = cell.center();
            (sx + c.x, sy + c.y)
        });
        Point2D::new(sum_x / count, sum_y / count)
    });
    let azimuth = |cell: &Cell| {
        let c = cell.center();
        (c.y - origin.y).atan2(c.x - origin.x).rem_euclid(TAU)
    };
    kept.sort_by(|a, b| azimuth(a).total_cmp(&azimuth(b)));
    kept
}

/// Traces every critical curve inside the grid and maps it to the source plane.
///
/// Fails with [`crate::LensError::Topology`] (reachable through
/// `downcast_ref`) when a cell straddles a saddle of the magnification field.
pub fn trace_critical_curves_and_caustics<L: LensMapping>(
    lens: &L,
    settings: &CriticalCurveSettings,
) -> Result<Vec<CriticalCurve>> {
    settings.grid.validate()?;
    ensure!(
        settings.magnification_threshold.is_finite() && settings.magnification_threshold >= 0.0,
        "Magnification threshold must be finite and non-negative, got {}.",
        settings.magnification_threshold
    );
    ensure!(
        settings.lens_center.map_or(true, |center| center.is_finite()),
        "Lens centre must be finite."
    );

    let cells = critical_cells(
        magnification_cells(lens, &settings.grid),
        settings.magnification_threshold,
        settings.lens_center,
    );
    let inverse: Vec<Cell> = cells
        .into_iter()
        .map(|cell| Cell {
            values: cell.values.map(f64::recip),
            ..cell
        })
        .collect();
    let curves = trace_contours(&inverse).context("Critical curve extraction failed")?;

    let pairs: Vec<CriticalCurve> = curves
        .into_iter()
        .map(|critical| {
            let caustic = Contour {
                points: critical
                    .points
                    .iter()
                    .map(|point| Point2D::from(lens.ray_shooting(point.x, point.y)))
                    .collect(),
            };
            CriticalCurve { critical, caustic }
        })
        .collect();
    debug!("Traced {} critical curves", pairs.len());
    Ok(pairs)
}
