//! Closed-form mappings used by unit tests.

use crate::traits::{Hessian, LensMapping, TimeDelayCapability};

/// No deflection: every image position maps onto itself.
pub struct Identity;

impl LensMapping for Identity {
    fn ray_shooting(&self, x: f64, y: f64) -> (f64, f64) {
        (x, y)
    }

    fn hessian(&self, _x: f64, _y: f64) -> Hessian {
        Hessian::default()
    }
}

/// `beta = (x^2 - 1, y)`: two images at `x = +-1` for a source at the origin,
/// with a fold along `x = 0` where the Jacobian determinant vanishes.
pub struct Fold;

impl LensMapping for Fold {
    fn ray_shooting(&self, x: f64, y: f64) -> (f64, f64) {
        (x * x - 1.0, y)
    }

    fn hessian(&self, x: f64, _y: f64) -> Hessian {
        Hessian::new(1.0 - 2.0 * x, 0.0, 0.0, 0.0)
    }
}

/// Lenses nothing and reports no time-delay support.
pub struct NoPotential;

impl LensMapping for NoPotential {
    fn ray_shooting(&self, x: f64, y: f64) -> (f64, f64) {
        (x, y)
    }

    fn hessian(&self, _x: f64, _y: f64) -> Hessian {
        Hessian::default()
    }
}

/// Reports arrival times equal to the negated x coordinate.
pub struct ArrivalTimeByX;

impl LensMapping for ArrivalTimeByX {
    fn ray_shooting(&self, x: f64, y: f64) -> (f64, f64) {
        (x, y)
    }

    fn hessian(&self, _x: f64, _y: f64) -> Hessian {
        Hessian::default()
    }

    fn time_delay_capability(&self) -> TimeDelayCapability {
        TimeDelayCapability::ArrivalTime
    }

    fn arrival_time(&self, x: f64, _y: f64) -> Option<f64> {
        Some(-x)
    }
}
