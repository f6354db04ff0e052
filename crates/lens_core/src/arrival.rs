//! Ordering of images by light-travel time.

use crate::error::LensError;
use crate::traits::{LensMapping, TimeDelayCapability};
use crate::types::Point2D;

/// Time-ordering key of a single image position.
fn delay_key<L: LensMapping>(
    lens: &L,
    capability: TimeDelayCapability,
    point: Point2D,
) -> Result<f64, LensError> {
    let value = match capability {
        TimeDelayCapability::Unsupported => None,
        TimeDelayCapability::FermatPotential => lens.fermat_potential(point.x, point.y),
        TimeDelayCapability::ArrivalTime => lens.arrival_time(point.x, point.y),
    };
    value.ok_or(LensError::Capability)
}

/// Stable-sorts items by ascending Fermat potential (or arrival time, for
/// mappings that report it), so the first-arriving image comes first.
///
/// The capability check runs before anything else, so even empty or single-item
/// inputs fail on a mapping without a potential.
pub fn sort_by_arrival_time<L, T, F>(
    lens: &L,
    items: Vec<T>,
    position: F,
) -> Result<Vec<T>, LensError>
where
    L: LensMapping,
    F: Fn(&T) -> Point2D,
{
    let capability = lens.time_delay_capability();
    if capability == TimeDelayCapability::Unsupported {
        return Err(LensError::Capability);
    }
    if items.len() <= 1 {
        return Ok(items);
    }

    let mut keyed = items
        .into_iter()
        .map(|item| delay_key(lens, capability, position(&item)).map(|key| (key, item)))
        .collect::<Result<Vec<_>, _>>()?;
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(keyed.into_iter().map(|(_, item)| item).collect())
}

pub fn sort_points_by_arrival_time<L: LensMapping>(
    lens: &L,
    points: Vec<Point2D>,
) -> Result<Vec<Point2D>, LensError> {
    sort_by_arrival_time(lens, points, |point| *point)
}

/// Arrival-time keys for already-ordered positions.
pub fn arrival_times<L: LensMapping>(lens: &L, points: &[Point2D]) -> Result<Vec<f64>, LensError> {
    let capability = lens.time_delay_capability();
    points
        .iter()
        .map(|&point| delay_key(lens, capability, point))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::{LensModel, LensProfile, Sis};
    use crate::test_support::{ArrivalTimeByX, NoPotential};

    #[test]
    fn sorts_by_fermat_potential() {
        let lens = LensModel::single(LensProfile::Sis(Sis {
            theta_e: 1.0,
            center_x: 0.0,
            center_y: 0.0,
        }));
        // images of the source (0.2, 0): minimum outside, saddle inside
        let points = vec![Point2D::new(-0.8, 0.0), Point2D::new(1.2, 0.0)];
        let sorted = sort_points_by_arrival_time(&lens, points).expect("sis has a potential");
        assert_eq!(sorted, vec![Point2D::new(1.2, 0.0), Point2D::new(-0.8, 0.0)]);

        let times = arrival_times(&lens, &sorted).expect("sis has a potential");
        assert!(times.windows(2).all(|w| w[0] <= w[1]), "times {times:?}");
    }

    #[test]
    fn uses_arrival_time_when_reported() {
        let points = vec![
            Point2D::new(-1.0, 0.0),
            Point2D::new(2.0, 0.0),
            Point2D::new(0.5, 0.0),
        ];
        let sorted = sort_points_by_arrival_time(&ArrivalTimeByX, points).expect("sortable");
        let xs: Vec<f64> = sorted.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![2.0, 0.5, -1.0]);
    }

    #[test]
    fn sort_is_stable_for_equal_times() {
        let points = vec![
            Point2D::new(1.0, 3.0),
            Point2D::new(1.0, -3.0),
            Point2D::new(1.0, 0.0),
        ];
        let sorted =
            sort_points_by_arrival_time(&ArrivalTimeByX, points.clone()).expect("sortable");
        assert_eq!(sorted, points);
    }

    #[test]
    fn missing_potential_is_a_capability_error() {
        let err = sort_points_by_arrival_time(&NoPotential, vec![Point2D::default()])
            .expect_err("no potential available");
        assert_eq!(err, LensError::Capability);
        assert!(sort_points_by_arrival_time(&NoPotential, Vec::new()).is_err());
    }
}
