use serde::{Deserialize, Serialize};

/// Second derivatives of the lensing potential at one image-plane position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Hessian {
    pub f_xx: f64,
    pub f_xy: f64,
    pub f_yx: f64,
    pub f_yy: f64,
}

impl Hessian {
    pub const fn new(f_xx: f64, f_xy: f64, f_yx: f64, f_yy: f64) -> Self {
        Self {
            f_xx,
            f_xy,
            f_yx,
            f_yy,
        }
    }

    /// Determinant of the lens-mapping Jacobian `A = I - H`.
    pub fn jacobian_determinant(&self) -> f64 {
        (1.0 - self.f_xx) * (1.0 - self.f_yy) - self.f_xy * self.f_yx
    }
}

impl std::ops::Add for Hessian {
    type Output = Hessian;

    fn add(self, rhs: Hessian) -> Hessian {
        Hessian {
            f_xx: self.f_xx + rhs.f_xx,
            f_xy: self.f_xy + rhs.f_xy,
            f_yx: self.f_yx + rhs.f_yx,
            f_yy: self.f_yy + rhs.f_yy,
        }
    }
}

/// Which scalar a mapping can provide for ordering images in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeDelayCapability {
    Unsupported,
    /// Single-plane Fermat potential.
    FermatPotential,
    /// Full arrival time, as produced by multi-plane mappings.
    ArrivalTime,
}

/// Forward lens mapping from the image plane to the source plane.
///
/// Implementations are evaluated concurrently by independent refinements, so
/// they must not mutate shared state behind `&self`.
pub trait LensMapping {
    /// Maps an image-plane position onto the source plane.
    fn ray_shooting(&self, x: f64, y: f64) -> (f64, f64);

    fn hessian(&self, x: f64, y: f64) -> Hessian;

    /// Signed magnification, the reciprocal of the Jacobian determinant.
    fn magnification(&self, x: f64, y: f64) -> f64 {
        1.0 / self.hessian(x, y).jacobian_determinant()
    }

    fn time_delay_capability(&self) -> TimeDelayCapability {
        TimeDelayCapability::Unsupported
    }

    fn fermat_potential(&self, _x: f64, _y: f64) -> Option<f64> {
        None
    }

    fn arrival_time(&self, _x: f64, _y: f64) -> Option<f64> {
        None
    }
}

impl<L: LensMapping + ?Sized> LensMapping for &L {
    fn ray_shooting(&self, x: f64, y: f64) -> (f64, f64) {
        (**self).ray_shooting(x, y)
    }

    fn hessian(&self, x: f64, y: f64) -> Hessian {
        (**self).hessian(x, y)
    }

    fn magnification(&self, x: f64, y: f64) -> f64 {
        (**self).magnification(x, y)
    }

    fn time_delay_capability(&self) -> TimeDelayCapability {
        (**self).time_delay_capability()
    }

    fn fermat_potential(&self, x: f64, y: f64) -> Option<f64> {
        (**self).fermat_potential(x, y)
    }

    fn arrival_time(&self, x: f64, y: f64) -> Option<f64> {
        (**self).arrival_time(x, y)
    }
}
