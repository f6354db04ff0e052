#![allow(dead_code)]

use lens_core::{LensModel, LensProfile, PointMass, Sie, Sis};
use rand::rngs::StdRng;
use rand::SeedableRng;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

pub fn point_mass(theta_e: f64) -> LensModel {
    LensModel::single(LensProfile::PointMass(PointMass {
        theta_e,
        center_x: 0.0,
        center_y: 0.0,
    }))
}

pub fn sis(theta_e: f64) -> LensModel {
    LensModel::single(LensProfile::Sis(Sis {
        theta_e,
        center_x: 0.0,
        center_y: 0.0,
    }))
}

pub fn sie(theta_e: f64, q: f64, phi: f64) -> LensModel {
    LensModel::single(LensProfile::Sie(Sie {
        theta_e,
        q,
        phi,
        center_x: 0.0,
        center_y: 0.0,
        core: 1e-6,
    }))
}
