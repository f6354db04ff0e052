//! Iterative refinement of a coarse candidate into a root of the lens equation.
//!
//! The default mode takes Newton steps built from the local Jacobian, clamped to
//! `max_step`. A step that does not lower the source-plane residual is redrawn by
//! rescaling each component with an independent Gaussian factor and retried,
//! all within one shared iteration budget. The non-linear mode runs a
//! Nelder-Mead simplex on the squared residual instead.

use crate::traits::{Hessian, LensMapping};
use crate::types::{Point2D, RefinedSolution};
use log::debug;
use nalgebra::{Matrix2, Vector2};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Standard deviation of the per-component factor applied on backtracking.
pub const BACKTRACK_SIGMA: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefineSettings {
    /// Required source-plane residual.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Longest image-plane correction applied in one step.
    pub max_step: f64,
    /// Use the derivative-free simplex instead of Newton steps.
    pub non_linear: bool,
}

impl Default for RefineSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 100,
            max_step: 0.1,
            non_linear: false,
        }
    }
}

/// Refines one starting position. Never fails: a solution that misses the
/// tolerance is returned with its last residual and `iterations == max_iterations`.
pub fn refine_candidate<L, R>(
    lens: &L,
    start: Point2D,
    source: Point2D,
    settings: &RefineSettings,
    rng: &mut R,
) -> RefinedSolution
where
    L: LensMapping,
    R: Rng + ?Sized,
{
    if settings.non_linear {
        nelder_mead(lens, start, source, settings)
    } else {
        newton_descent(lens, start, source, settings, rng)
    }
}

/// Refines every starting position independently, preserving input order.
pub fn refine_all<L, R>(
    lens: &L,
    starts: &[Point2D],
    source: Point2D,
    settings: &RefineSettings,
    rng: &mut R,
) -> Vec<RefinedSolution>
where
    L: LensMapping,
    R: Rng + ?Sized,
{
    let solutions: Vec<RefinedSolution> = starts
        .iter()
        .map(|&start| refine_candidate(lens, start, source, settings, rng))
        .collect();
    let converged = solutions
        .iter()
        .filter(|s| s.converged(settings.tolerance))
        .count();
    debug!(
        "Refined {} starting points: {} converged, {} missed tolerance {:e}",
        solutions.len(),
        converged,
        solutions.len() - converged,
        settings.tolerance
    );
    solutions
}

fn newton_descent<L, R>(
    lens: &L,
    start: Point2D,
    source: Point2D,
    settings: &RefineSettings,
    rng: &mut R,
) -> RefinedSolution
where
    L: LensMapping,
    R: Rng + ?Sized,
{
    let mut guess = start;
    let mut offset = source_offset(lens, guess, source);
    let mut residual = offset.norm();
    let mut iterations = 0usize;

    'descent: while (residual.is_nan() || residual > settings.tolerance)
        && iterations < settings.max_iterations
    {
        let hessian = lens.hessian(guess.x, guess.y);
        let matrix = hessian_matrix(&hessian);
        let mut step = match newton_step(&matrix, hessian.jacobian_determinant(), &offset) {
            Some(step) => clamp_length(step, settings.max_step),
            None => {
                // singular Jacobian: start from a randomized max-length step
                let mut step = singular_fallback(&matrix, &offset, settings.max_step);
                perturb_step(&mut step, rng);
                step
            }
        };

        loop {
            iterations += 1;
            let trial = Point2D::new(guess.x - step.x, guess.y - step.y);
            let trial_offset = source_offset(lens, trial, source);
            let trial_residual = trial_offset.norm();
            if trial_residual < residual {
                guess = trial;
                offset = trial_offset;
                residual = trial_residual;
                break;
            }
            if iterations >= settings.max_iterations {
                break 'descent;
            }
            perturb_step(&mut step, rng);
        }
    }

    RefinedSolution {
        position: guess,
        precision: residual,
        iterations,
    }
}

/// Adjugate of the lens Jacobian, `[[1 - f_yy, f_yx], [f_xy, 1 - f_xx]]`.
fn hessian_matrix(hessian: &Hessian) -> Matrix2<f64> {
    Matrix2::new(
        1.0 - hessian.f_yy,
        hessian.f_yx,
        hessian.f_xy,
        1.0 - hessian.f_xx,
    )
}

/// Newton correction `M (beta - source) / det`; `None` when the determinant
/// underflows or is not finite.
fn newton_step(matrix: &Matrix2<f64>, det: f64, offset: &Vector2<f64>) -> Option<Vector2<f64>> {
    if !det.is_finite() || det.abs() <= f64::MIN_POSITIVE {
        return None;
    }
    let step = matrix * offset / det;
    step.iter().all(|v| v.is_finite()).then_some(step)
}

fn singular_fallback(matrix: &Matrix2<f64>, offset: &Vector2<f64>, max_step: f64) -> Vector2<f64> {
    let direction = matrix * offset;
    let direction = if direction.iter().all(|v| v.is_finite()) && direction.norm() > 0.0 {
        direction
    } else {
        *offset
    };
    let length = direction.norm();
    if length > 0.0 && length.is_finite() {
        direction * (max_step / length)
    } else {
        direction
    }
}

fn clamp_length(step: Vector2<f64>, max_step: f64) -> Vector2<f64> {
    let length = step.norm();
    if length > max_step {
        step * (max_step / length)
    } else {
        step
    }
}

fn perturb_step<R: Rng + ?Sized>(step: &mut Vector2<f64>, rng: &mut R) {
    step.x *= gaussian(rng, BACKTRACK_SIGMA);
    step.y *= gaussian(rng, BACKTRACK_SIGMA);
}

/// Zero-mean normal deviate via the Box-Muller transform.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, sigma: f64) -> f64 {
    // 1 - u keeps the logarithm argument in (0, 1]
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    sigma * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

fn source_offset<L: LensMapping>(lens: &L, point: Point2D, source: Point2D) -> Vector2<f64> {
    let (beta_x, beta_y) = lens.ray_shooting(point.x, point.y);
    Vector2::new(beta_x - source.x, beta_y - source.y)
}

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Derivative-free refinement on the squared source-plane residual.
///
/// The initial simplex spans `max_step` along each axis. Iteration stops once the
/// best vertex meets the tolerance or the iteration bound is reached; a simplex
/// that collapses to machine precision first is reported as exhausted.
fn nelder_mead<L: LensMapping>(
    lens: &L,
    start: Point2D,
    source: Point2D,
    settings: &RefineSettings,
) -> RefinedSolution {
    let objective =
        |p: Vector2<f64>| source_offset(lens, Point2D::new(p.x, p.y), source).norm_squared();
    let target = settings.tolerance * settings.tolerance;
    let origin = Vector2::new(start.x, start.y);
    let h = settings.max_step;
    let mut simplex = [origin, origin + Vector2::new(h, 0.0), origin + Vector2::new(0.0, h)]
        .map(|vertex| (vertex, objective(vertex)));
    let mut iterations = 0usize;

    loop {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (best, best_value) = simplex[0];
        if best_value <= target || iterations >= settings.max_iterations {
            break;
        }
        let size = (simplex[1].0 - best).norm().max((simplex[2].0 - best).norm());
        if size <= f64::EPSILON * (1.0 + best.norm()) {
            // a collapsed simplex cannot make further progress
            iterations = settings.max_iterations;
            break;
        }
        iterations += 1;

        let (worst, worst_value) = simplex[2];
        let centroid = (simplex[0].0 + simplex[1].0) * 0.5;
        let reflected = centroid + (centroid - worst) * REFLECTION;
        let reflected_value = objective(reflected);

        if reflected_value < best_value {
            let expanded = centroid + (centroid - worst) * EXPANSION;
            let expanded_value = objective(expanded);
            simplex[2] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
        } else if reflected_value < simplex[1].1 {
            simplex[2] = (reflected, reflected_value);
        } else {
            let contracted = if reflected_value < worst_value {
                centroid + (reflected - centroid) * CONTRACTION
            } else {
                centroid + (worst - centroid) * CONTRACTION
            };
            let contracted_value = objective(contracted);
            if contracted_value < reflected_value.min(worst_value) {
                simplex[2] = (contracted, contracted_value);
            } else {
                for vertex in simplex.iter_mut().skip(1) {
                    let shrunk = best + (vertex.0 - best) * SHRINK;
                    *vertex = (shrunk, objective(shrunk));
                }
            }
        }
    }

    let (best, best_value) = simplex[0];
    RefinedSolution {
        position: Point2D::new(best.x, best.y),
        precision: best_value.sqrt(),
        iterations,
    }
}
