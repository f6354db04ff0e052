//! Analytic deflector profiles and their superposition.
//!
//! Each profile is a plain value type; `LensProfile` is the closed set the
//! solver dispatches over and `LensModel` sums any number of them.

use crate::traits::{Hessian, LensMapping, TimeDelayCapability};
use serde::{Deserialize, Serialize};

/// Radii below this are clamped so profiles stay finite at their centre.
const MIN_RADIUS: f64 = 1e-15;

/// Ellipticity below which the isothermal ellipsoid uses its spherical form.
const SPHERICAL_ELLIPTICITY: f64 = 1e-6;

/// Potential, deflection and Hessian of one profile at one position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProfileTerms {
    pub potential: f64,
    pub alpha_x: f64,
    pub alpha_y: f64,
    pub hessian: Hessian,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointMass {
    pub theta_e: f64,
    #[serde(default)]
    pub center_x: f64,
    #[serde(default)]
    pub center_y: f64,
}

impl PointMass {
    pub fn evaluate(&self, x: f64, y: f64) -> ProfileTerms {
        let dx = x - self.center_x;
        let dy = y - self.center_y;
        let r2 = (dx * dx + dy * dy).max(MIN_RADIUS * MIN_RADIUS);
        let theta2 = self.theta_e * self.theta_e;
        let r4 = r2 * r2;
        ProfileTerms {
            potential: 0.5 * theta2 * r2.ln(),
            alpha_x: theta2 * dx / r2,
            alpha_y: theta2 * dy / r2,
            hessian: Hessian::new(
                theta2 * (dy * dy - dx * dx) / r4,
                -2.0 * theta2 * dx * dy / r4,
                -2.0 * theta2 * dx * dy / r4,
                theta2 * (dx * dx - dy * dy) / r4,
            ),
        }
    }
}

/// Singular isothermal sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sis {
    pub theta_e: f64,
    #[serde(default)]
    pub center_x: f64,
    #[serde(default)]
    pub center_y: f64,
}

impl Sis {
    pub fn evaluate(&self, x: f64, y: f64) -> ProfileTerms {
        let dx = x - self.center_x;
        let dy = y - self.center_y;
        let r = (dx * dx + dy * dy).sqrt().max(MIN_RADIUS);
        let r3 = r * r * r;
        let b = self.theta_e;
        ProfileTerms {
            potential: b * r,
            alpha_x: b * dx / r,
            alpha_y: b * dy / r,
            hessian: Hessian::new(
                b * dy * dy / r3,
                -b * dx * dy / r3,
                -b * dx * dy / r3,
                b * dx * dx / r3,
            ),
        }
    }
}

/// Softened isothermal ellipsoid.
///
/// `q` is the axis ratio, `phi` the position angle in radians and `core` the
/// softening length. Internally the profile is evaluated in a frame rotated by
/// `phi + pi/2` with normalisation `theta_e / sqrt(q)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sie {
    pub theta_e: f64,
    #[serde(default = "default_axis_ratio")]
    pub q: f64,
    #[serde(default)]
    pub phi: f64,
    #[serde(default)]
    pub center_x: f64,
    #[serde(default)]
    pub center_y: f64,
    #[serde(default = "default_core")]
    pub core: f64,
}

fn default_axis_ratio() -> f64 {
    1.0
}

fn default_core() -> f64 {
    1e-6
}

impl Sie {
    pub fn evaluate(&self, x: f64, y: f64) -> ProfileTerms {
        let angle = std::f64::consts::FRAC_PI_2 + self.phi;
        let (sin, cos) = angle.sin_cos();
        let dx = x - self.center_x;
        let dy = y - self.center_y;

        // natural frame: no position angle left in the expressions below
        let xp = -sin * dx + cos * dy;
        let yp = -cos * dx - sin * dy;

        let ellipticity = 1.0 - self.q;
        let natural = if ellipticity < SPHERICAL_ELLIPTICITY {
            self.spherical(xp, yp)
        } else {
            self.elliptical(xp, yp, self.q)
        };

        let (s2, c2, sc) = (sin * sin, cos * cos, sin * cos);
        let h = natural.hessian;
        let f_xy = sc * (h.f_yy - h.f_xx) + (s2 - c2) * h.f_xy;
        ProfileTerms {
            potential: natural.potential,
            alpha_x: -sin * natural.alpha_x - cos * natural.alpha_y,
            alpha_y: cos * natural.alpha_x - sin * natural.alpha_y,
            hessian: Hessian::new(
                s2 * h.f_xx + c2 * h.f_yy + 2.0 * sc * h.f_xy,
                f_xy,
                f_xy,
                c2 * h.f_xx + s2 * h.f_yy - 2.0 * sc * h.f_xy,
            ),
        }
    }

    fn normalisation(&self) -> f64 {
        self.theta_e / self.q.sqrt()
    }

    fn spherical(&self, x: f64, y: f64) -> ProfileTerms {
        let b = self.normalisation();
        let s = self.core;
        let rad = (x * x + y * y + s * s).sqrt().max(MIN_RADIUS);
        let sprad = s + rad;
        let inv_denom = b / (rad * sprad * sprad);
        let core_term = if s > 0.0 {
            s * (1.0 + (sprad / (2.0 * s)).ln())
        } else {
            0.0
        };
        ProfileTerms {
            potential: b * (rad - core_term),
            alpha_x: b * x / sprad,
            alpha_y: b * y / sprad,
            hessian: Hessian::new(
                (s * sprad + y * y) * inv_denom,
                -x * y * inv_denom,
                -x * y * inv_denom,
                (s * sprad + x * x) * inv_denom,
            ),
        }
    }

    fn elliptical(&self, x: f64, y: f64, q: f64) -> ProfileTerms {
        let b = self.normalisation();
        let s = self.core;
        let (x2, y2, s2, q2) = (x * x, y * y, s * s, q * q);
        let om = 1.0 - q2;
        let rt = om.sqrt();
        let psi = (q2 * (s2 + x2) + y2).sqrt().max(MIN_RADIUS);
        let psis = psi + s;

        let alpha_x = b * q / rt * (rt * x / psis).atan();
        let alpha_y = b * q / rt * (rt * y / (psi + s * q2)).atanh();

        let inv_denom = b * q / (psi * (om * x2 + psis * psis));
        let core_term = if s > 0.0 {
            b * q * s * (-0.5 * (psis * psis + om * x2).ln() + (s * (1.0 + q)).ln())
        } else {
            0.0
        };
        ProfileTerms {
            potential: core_term + x * alpha_x + y * alpha_y,
            alpha_x,
            alpha_y,
            hessian: Hessian::new(
                (psi * psis - q2 * x2) * inv_denom,
                -x * y * inv_denom,
                -x * y * inv_denom,
                (x2 + s * psis) * inv_denom,
            ),
        }
    }
}

/// External shear anchored at `(ra_0, dec_0)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shear {
    pub gamma1: f64,
    pub gamma2: f64,
    #[serde(default)]
    pub ra_0: f64,
    #[serde(default)]
    pub dec_0: f64,
}

impl Shear {
    pub fn evaluate(&self, x: f64, y: f64) -> ProfileTerms {
        let dx = x - self.ra_0;
        let dy = y - self.dec_0;
        let (g1, g2) = (self.gamma1, self.gamma2);
        ProfileTerms {
            potential: 0.5 * (g1 * dx * dx + 2.0 * g2 * dx * dy - g1 * dy * dy),
            alpha_x: g1 * dx + g2 * dy,
            alpha_y: g2 * dx - g1 * dy,
            hessian: Hessian::new(g1, g2, g2, -g1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LensProfile {
    PointMass(PointMass),
    Sis(Sis),
    Sie(Sie),
    Shear(Shear),
}

impl LensProfile {
    pub fn evaluate(&self, x: f64, y: f64) -> ProfileTerms {
        match self {
            LensProfile::PointMass(profile) => profile.evaluate(x, y),
            LensProfile::Sis(profile) => profile.evaluate(x, y),
            LensProfile::Sie(profile) => profile.evaluate(x, y),
            LensProfile::Shear(profile) => profile.evaluate(x, y),
        }
    }

    /// Centre of the deflector, if the profile has one.
    pub fn center(&self) -> Option<(f64, f64)> {
        match self {
            LensProfile::PointMass(p) => Some((p.center_x, p.center_y)),
            LensProfile::Sis(p) => Some((p.center_x, p.center_y)),
            LensProfile::Sie(p) => Some((p.center_x, p.center_y)),
            LensProfile::Shear(_) => None,
        }
    }
}

/// Single-plane superposition of deflector profiles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LensModel {
    pub profiles: Vec<LensProfile>,
}

impl LensModel {
    pub fn new(profiles: Vec<LensProfile>) -> Self {
        Self { profiles }
    }

    pub fn single(profile: LensProfile) -> Self {
        Self {
            profiles: vec![profile],
        }
    }

    pub fn evaluate(&self, x: f64, y: f64) -> ProfileTerms {
        self.profiles
            .iter()
            .map(|profile| profile.evaluate(x, y))
            .fold(ProfileTerms::default(), |acc, terms| ProfileTerms {
                potential: acc.potential + terms.potential,
                alpha_x: acc.alpha_x + terms.alpha_x,
                alpha_y: acc.alpha_y + terms.alpha_y,
                hessian: acc.hessian + terms.hessian,
            })
    }

    pub fn potential(&self, x: f64, y: f64) -> f64 {
        self.evaluate(x, y).potential
    }

    pub fn deflection(&self, x: f64, y: f64) -> (f64, f64) {
        let terms = self.evaluate(x, y);
        (terms.alpha_x, terms.alpha_y)
    }

    /// Centre of the first profile that has one.
    pub fn center(&self) -> Option<(f64, f64)> {
        self.profiles.iter().find_map(LensProfile::center)
    }
}

impl LensMapping for LensModel {
    fn ray_shooting(&self, x: f64, y: f64) -> (f64, f64) {
        let (alpha_x, alpha_y) = self.deflection(x, y);
        (x - alpha_x, y - alpha_y)
    }

    fn hessian(&self, x: f64, y: f64) -> Hessian {
        self.evaluate(x, y).hessian
    }

    fn time_delay_capability(&self) -> TimeDelayCapability {
        TimeDelayCapability::FermatPotential
    }

    fn fermat_potential(&self, x: f64, y: f64) -> Option<f64> {
        let terms = self.evaluate(x, y);
        let geometric = 0.5 * (terms.alpha_x * terms.alpha_x + terms.alpha_y * terms.alpha_y);
        Some(geometric - terms.potential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: f64 = 1e-6;

    fn all_profiles() -> Vec<LensProfile> {
        vec![
            LensProfile::PointMass(PointMass {
                theta_e: 1.2,
                center_x: 0.1,
                center_y: -0.2,
            }),
            LensProfile::Sis(Sis {
                theta_e: 0.8,
                center_x: -0.3,
                center_y: 0.05,
            }),
            LensProfile::Sie(Sie {
                theta_e: 1.0,
                q: 0.7,
                phi: 0.4,
                center_x: 0.0,
                center_y: 0.1,
                core: 0.05,
            }),
            LensProfile::Sie(Sie {
                theta_e: 1.0,
                q: 1.0,
                phi: 0.0,
                center_x: 0.2,
                center_y: 0.0,
                core: 0.05,
            }),
            LensProfile::Shear(Shear {
                gamma1: 0.05,
                gamma2: -0.03,
                ra_0: 0.0,
                dec_0: 0.0,
            }),
        ]
    }

    #[test]
    fn deflection_matches_potential_gradient() {
        let (x, y) = (0.9, 0.7);
        for profile in all_profiles() {
            let terms = profile.evaluate(x, y);
            let dpdx = (profile.evaluate(x + STEP, y).potential
                - profile.evaluate(x - STEP, y).potential)
                / (2.0 * STEP);
            let dpdy = (profile.evaluate(x, y + STEP).potential
                - profile.evaluate(x, y - STEP).potential)
                / (2.0 * STEP);
            assert!(
                (dpdx - terms.alpha_x).abs() < 1e-6,
                "{profile:?}: alpha_x {} vs numeric {dpdx}",
                terms.alpha_x
            );
            assert!(
                (dpdy - terms.alpha_y).abs() < 1e-6,
                "{profile:?}: alpha_y {} vs numeric {dpdy}",
                terms.alpha_y
            );
        }
    }

    #[test]
    fn hessian_matches_deflection_jacobian() {
        let (x, y) = (-0.6, 1.1);
        for profile in all_profiles() {
            let h = profile.evaluate(x, y).hessian;
            let right = profile.evaluate(x + STEP, y);
            let left = profile.evaluate(x - STEP, y);
            let up = profile.evaluate(x, y + STEP);
            let down = profile.evaluate(x, y - STEP);
            let f_xx = (right.alpha_x - left.alpha_x) / (2.0 * STEP);
            let f_yx = (right.alpha_y - left.alpha_y) / (2.0 * STEP);
            let f_xy = (up.alpha_x - down.alpha_x) / (2.0 * STEP);
            let f_yy = (up.alpha_y - down.alpha_y) / (2.0 * STEP);
            for (analytic, numeric) in [
                (h.f_xx, f_xx),
                (h.f_xy, f_xy),
                (h.f_yx, f_yx),
                (h.f_yy, f_yy),
            ] {
                assert!(
                    (analytic - numeric).abs() < 1e-5,
                    "{profile:?}: hessian {analytic} vs numeric {numeric}"
                );
            }
        }
    }

    #[test]
    fn point_mass_einstein_ring_maps_to_center() {
        let lens = LensModel::single(LensProfile::PointMass(PointMass {
            theta_e: 1.0,
            center_x: 0.0,
            center_y: 0.0,
        }));
        let (bx, by) = lens.ray_shooting(0.6, 0.8);
        assert!(bx.abs() < 1e-12 && by.abs() < 1e-12, "got ({bx}, {by})");
        assert!(lens.magnification(0.6, 0.8).abs() > 1e10);
    }

    #[test]
    fn sis_magnification_has_expected_parity() {
        let lens = LensModel::single(LensProfile::Sis(Sis {
            theta_e: 1.0,
            center_x: 0.0,
            center_y: 0.0,
        }));
        // mu = r / (r - theta_e)
        assert!((lens.magnification(2.0, 0.0) - 2.0).abs() < 1e-12);
        assert!((lens.magnification(0.5, 0.0) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn model_sums_profile_terms() {
        let profiles = all_profiles();
        let model = LensModel::new(profiles.clone());
        let (x, y) = (0.4, -0.9);
        let expected_alpha_x: f64 = profiles.iter().map(|p| p.evaluate(x, y).alpha_x).sum();
        let (alpha_x, _) = model.deflection(x, y);
        assert!((alpha_x - expected_alpha_x).abs() < 1e-12);
        assert_eq!(model.center(), Some((0.1, -0.2)));
    }

    #[test]
    fn profiles_deserialize_from_tagged_json() {
        let json = r#"[
            {"type": "sis", "theta_e": 1.0},
            {"type": "shear", "gamma1": 0.1, "gamma2": 0.0}
        ]"#;
        let profiles: Vec<LensProfile> = serde_json::from_str(json).expect("profiles should parse");
        assert_eq!(profiles.len(), 2);
        match profiles[0] {
            LensProfile::Sis(sis) => assert_eq!(sis.center_x, 0.0),
            other => panic!("expected sis, got {other:?}"),
        }
    }
}
