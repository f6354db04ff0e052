//! Image positions of a point source: grid candidates, refinement,
//! deduplication and arrival-time ordering.

use crate::arrival::sort_by_arrival_time;
use crate::candidates::{find_candidates, plausibility_cut, MAX_SAMPLES_PER_AXIS};
use crate::error::LensError;
use crate::overlap::merge_by;
use crate::refine::{refine_all, RefineSettings};
use crate::traits::LensMapping;
use crate::types::{Candidate, ImageSet, Point2D, RefinedSolution};
use anyhow::{Context, Result};
use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Grid spacing, merge separation and largest refinement step.
    pub min_distance: f64,
    /// Side length of the square searched for images.
    pub search_window: f64,
    pub x_center: f64,
    pub y_center: f64,
    /// Required source-plane residual of a reported image.
    pub precision_limit: f64,
    pub max_iterations: usize,
    pub arrival_time_sort: bool,
    /// Drop grid candidates whose residual is implausible for their magnification.
    pub initial_guess_cut: bool,
    /// Report only images with at least this absolute magnification.
    pub magnification_limit: Option<f64>,
    pub non_linear: bool,
    /// Uniform random starting points added to the grid candidates.
    pub num_random_restarts: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            min_distance: 0.1,
            search_window: 10.0,
            x_center: 0.0,
            y_center: 0.0,
            precision_limit: 1e-10,
            max_iterations: 100,
            arrival_time_sort: true,
            initial_guess_cut: true,
            magnification_limit: None,
            non_linear: false,
            num_random_restarts: 0,
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> Result<(), LensError> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(LensError::InvalidSettings(format!(
                    "{name} must be finite and positive, got {value}"
                )))
            }
        };
        positive("min_distance", self.min_distance)?;
        positive("search_window", self.search_window)?;
        positive("precision_limit", self.precision_limit)?;
        if !self.x_center.is_finite() || !self.y_center.is_finite() {
            return Err(LensError::InvalidSettings(
                "search window centre must be finite".to_string(),
            ));
        }
        let samples = (self.search_window / self.min_distance).ceil();
        if samples > MAX_SAMPLES_PER_AXIS as f64 {
            return Err(LensError::InvalidSettings(format!(
                "search_window / min_distance needs {samples} grid samples per axis, \
                 more than the limit of {MAX_SAMPLES_PER_AXIS}"
            )));
        }
        if self.max_iterations == 0 {
            return Err(LensError::InvalidSettings(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if let Some(limit) = self.magnification_limit {
            if limit.is_nan() {
                return Err(LensError::InvalidSettings(
                    "magnification_limit must not be NaN".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn window_center(&self) -> Point2D {
        Point2D::new(self.x_center, self.y_center)
    }

    pub fn refine_settings(&self) -> RefineSettings {
        RefineSettings {
            tolerance: self.precision_limit,
            max_iterations: self.max_iterations,
            max_step: self.min_distance,
            non_linear: self.non_linear,
        }
    }
}

/// Grid candidates for `source`, after the plausibility cut when enabled.
pub fn candidate_solutions<L: LensMapping>(
    lens: &L,
    source: Point2D,
    settings: &SolverSettings,
) -> Result<Vec<Candidate>> {
    settings.validate()?;
    let candidates = find_candidates(
        lens,
        source,
        settings.window_center(),
        settings.search_window,
        settings.min_distance,
    );
    Ok(if settings.initial_guess_cut {
        plausibility_cut(lens, candidates, settings.min_distance)
    } else {
        candidates
    })
}

fn random_starts<R: Rng + ?Sized>(
    settings: &SolverSettings,
    count: usize,
    rng: &mut R,
) -> Vec<Point2D> {
    let half = 0.5 * settings.search_window;
    (0..count)
        .map(|_| {
            Point2D::new(
                settings.x_center + rng.random_range(-half..=half),
                settings.y_center + rng.random_range(-half..=half),
            )
        })
        .collect()
}

/// Keeps images with `|mu| >= limit`.
fn apply_magnification_limit<L: LensMapping>(
    lens: &L,
    images: Vec<RefinedSolution>,
    limit: f64,
) -> Vec<RefinedSolution> {
    let before = images.len();
    let kept: Vec<RefinedSolution> = images
        .into_iter()
        .filter(|image| lens.magnification(image.position.x, image.position.y).abs() >= limit)
        .collect();
    debug!(
        "Magnification limit {} kept {} of {} images",
        limit,
        kept.len(),
        before
    );
    kept
}

/// Full image solve for one source position.
///
/// Refinements that miss `precision_limit` are counted in `ImageSet::dropped`
/// rather than reported as errors. An empty set is a valid result.
pub fn solve<L, R>(
    lens: &L,
    source: Point2D,
    settings: &SolverSettings,
    rng: &mut R,
) -> Result<ImageSet>
where
    L: LensMapping,
    R: Rng + ?Sized,
{
    if !source.is_finite() {
        return Err(LensError::InvalidSettings(format!(
            "source position {source:?} is not finite"
        ))
        .into());
    }
    let candidates = candidate_solutions(lens, source, settings)?;
    let mut starts: Vec<Point2D> = candidates
        .iter()
        .map(|candidate| candidate.position)
        .collect();
    starts.extend(random_starts(settings, settings.num_random_restarts, rng));
    if starts.is_empty() {
        warn!("No image candidates for source ({}, {})", source.x, source.y);
    }

    let refined = refine_all(lens, &starts, source, &settings.refine_settings(), rng);
    let (converged, missed): (Vec<RefinedSolution>, Vec<RefinedSolution>) = refined
        .into_iter()
        .partition(|solution| solution.converged(settings.precision_limit));

    let mut images = merge_by(converged, settings.min_distance, |solution| solution.position);
    if settings.arrival_time_sort {
        images = sort_by_arrival_time(lens, images, |solution| solution.position)
            .context("Arrival-time ordering failed")?;
    }
    if let Some(limit) = settings.magnification_limit {
        images = apply_magnification_limit(lens, images, limit);
    }

    debug!(
        "Source ({}, {}): {} images, {} refinements dropped",
        source.x,
        source.y,
        images.len(),
        missed.len()
    );
    Ok(ImageSet {
        images,
        dropped: missed.len(),
    })
}

/// Image positions of `source`, first-arriving first when sorting is enabled.
pub fn solve_image_positions<L, R>(
    lens: &L,
    source: Point2D,
    settings: &SolverSettings,
    rng: &mut R,
) -> Result<Vec<Point2D>>
where
    L: LensMapping,
    R: Rng + ?Sized,
{
    Ok(solve(lens, source, settings, rng)?.positions())
}

/// Solves from `num_random` uniform starting points with the derivative-free
/// minimizer only, skipping the grid scan.
pub fn image_position_stochastic<L, R>(
    lens: &L,
    source: Point2D,
    settings: &SolverSettings,
    num_random: usize,
    rng: &mut R,
) -> Result<Vec<RefinedSolution>>
where
    L: LensMapping,
    R: Rng + ?Sized,
{
    settings.validate()?;
    let starts = random_starts(settings, num_random, rng);
    let refine = RefineSettings {
        non_linear: true,
        ..settings.refine_settings()
    };
    let solutions: Vec<RefinedSolution> = refine_all(lens, &starts, source, &refine, rng)
        .into_iter()
        .filter(|solution| solution.precision < settings.precision_limit)
        .collect();
    let mut images = merge_by(solutions, settings.min_distance, |solution| solution.position);
    if settings.arrival_time_sort {
        images = sort_by_arrival_time(lens, images, |solution| solution.position)
            .context("Arrival-time ordering failed")?;
    }
    debug!(
        "Stochastic solve from {} seeds: {} images",
        num_random,
        images.len()
    );
    Ok(images)
}

/// The `num_images` most magnified images, first-arriving first when sorting
/// is enabled and otherwise brightest first.
pub fn find_bright_images<L, R>(
    lens: &L,
    source: Point2D,
    num_images: usize,
    settings: &SolverSettings,
    rng: &mut R,
) -> Result<Vec<RefinedSolution>>
where
    L: LensMapping,
    R: Rng + ?Sized,
{
    let mut images = solve(lens, source, settings, rng)?.images;
    let brightness = |image: &RefinedSolution| {
        lens.magnification(image.position.x, image.position.y).abs()
    };
    images.sort_by(|a, b| brightness(b).total_cmp(&brightness(a)));
    images.truncate(num_images);
    if settings.arrival_time_sort {
        images = sort_by_arrival_time(lens, images, |image| image.position)
            .context("Arrival-time ordering failed")?;
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fold, Identity, NoPotential};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn default_settings_are_valid() {
        assert_eq!(SolverSettings::default().validate(), Ok(()));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let cases = [
            SolverSettings {
                min_distance: 0.0,
                ..SolverSettings::default()
            },
            SolverSettings {
                search_window: f64::INFINITY,
                ..SolverSettings::default()
            },
            SolverSettings {
                precision_limit: -1.0,
                ..SolverSettings::default()
            },
            SolverSettings {
                max_iterations: 0,
                ..SolverSettings::default()
            },
            SolverSettings {
                magnification_limit: Some(f64::NAN),
                ..SolverSettings::default()
            },
        ];
        for settings in cases {
            assert!(
                matches!(settings.validate(), Err(LensError::InvalidSettings(_))),
                "{settings:?} accepted"
            );
        }
    }

    #[test]
    fn oversized_search_grid_is_rejected_before_scanning() {
        let settings = SolverSettings {
            min_distance: 1e-10,
            ..SolverSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(LensError::InvalidSettings(_))
        ));
        let mut rng = StdRng::seed_from_u64(6);
        let err = solve_image_positions(&Identity, Point2D::new(0.1, 0.0), &settings, &mut rng)
            .expect_err("grid too large");
        assert!(matches!(
            err.downcast_ref::<LensError>(),
            Some(LensError::InvalidSettings(_))
        ));

        let largest = SolverSettings {
            search_window: MAX_SAMPLES_PER_AXIS as f64,
            min_distance: 1.0,
            ..SolverSettings::default()
        };
        assert_eq!(largest.validate(), Ok(()));
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: SolverSettings =
            serde_json::from_str(r#"{"min_distance": 0.05, "non_linear": true}"#)
                .expect("valid json");
        assert_eq!(settings.min_distance, 0.05);
        assert!(settings.non_linear);
        assert_eq!(settings.search_window, 10.0);
        assert_eq!(settings.magnification_limit, None);
    }

    #[test]
    fn refine_settings_use_min_distance_as_step() {
        let settings = SolverSettings {
            min_distance: 0.25,
            max_iterations: 7,
            ..SolverSettings::default()
        };
        let refine = settings.refine_settings();
        assert_eq!(refine.max_step, 0.25);
        assert_eq!(refine.max_iterations, 7);
        assert_eq!(refine.tolerance, settings.precision_limit);
    }

    #[test]
    fn random_starts_stay_inside_window() {
        let settings = SolverSettings {
            search_window: 2.0,
            x_center: 5.0,
            y_center: -1.0,
            ..SolverSettings::default()
        };
        let mut rng = StdRng::seed_from_u64(11);
        for start in random_starts(&settings, 500, &mut rng) {
            assert!((4.0..=6.0).contains(&start.x), "{start:?}");
            assert!((-2.0..=0.0).contains(&start.y), "{start:?}");
        }
    }

    #[test]
    fn identity_mapping_returns_the_source() {
        let settings = SolverSettings {
            arrival_time_sort: false,
            ..SolverSettings::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let source = Point2D::new(0.42, -1.37);
        let images = solve(&Identity, source, &settings, &mut rng).expect("solvable");
        assert_eq!(images.len(), 1);
        assert!(images.images[0].position.distance(&source) <= 1e-9);
    }

    #[test]
    fn fold_images_sit_on_both_sides() {
        let settings = SolverSettings {
            arrival_time_sort: false,
            ..SolverSettings::default()
        };
        let mut rng = StdRng::seed_from_u64(2);
        let positions =
            solve_image_positions(&Fold, Point2D::new(0.21, 0.0), &settings, &mut rng)
                .expect("solvable");
        assert_eq!(positions.len(), 2, "got {positions:?}");
        let expected = 1.21f64.sqrt();
        for position in positions {
            assert!((position.x.abs() - expected).abs() < 1e-8, "{position:?}");
            assert!(position.y.abs() < 1e-8, "{position:?}");
        }
    }

    #[test]
    fn sorting_without_potential_is_a_capability_error() {
        let mut rng = StdRng::seed_from_u64(3);
        let err = solve(&NoPotential, Point2D::new(0.1, 0.1), &SolverSettings::default(), &mut rng)
            .expect_err("sorting requested");
        assert_eq!(err.downcast_ref::<LensError>(), Some(&LensError::Capability));
    }

    #[test]
    fn non_finite_source_is_rejected() {
        let mut rng = StdRng::seed_from_u64(4);
        let source = Point2D::new(f64::NAN, 0.0);
        let err = solve(&Identity, source, &SolverSettings::default(), &mut rng)
            .expect_err("nan source");
        assert!(matches!(
            err.downcast_ref::<LensError>(),
            Some(LensError::InvalidSettings(_))
        ));
    }

    #[test]
    fn bright_images_are_truncated() {
        let settings = SolverSettings {
            arrival_time_sort: false,
            ..SolverSettings::default()
        };
        let mut rng = StdRng::seed_from_u64(5);
        let images = find_bright_images(&Fold, Point2D::new(0.3, 0.0), 1, &settings, &mut rng)
            .expect("solvable");
        assert_eq!(images.len(), 1);
    }
}
