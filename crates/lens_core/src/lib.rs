//! The `lens_core` crate solves the gravitational lens equation for a point
//! source and traces the critical curves and caustics of a lens mapping.
//!
//! Key components:
//! - **Traits**: `LensMapping`, the forward image-to-source mapping every solver consumes.
//! - **Profiles**: analytic deflectors (`LensProfile`) summed into a `LensModel`.
//! - **Solver**: grid candidates, Newton or simplex refinement, overlap merging and
//!   arrival-time ordering.
//! - **Contours**: marching squares with segment assembly, used for critical curves.
pub mod arrival;
pub mod candidates;
pub mod contour;
pub mod critical;
pub mod error;
pub mod overlap;
pub mod profiles;
pub mod refine;
pub mod solver;
pub mod traits;
pub mod types;

#[cfg(test)]
mod test_support;

pub use critical::{trace_critical_curves_and_caustics, CriticalCurveSettings, GridSpec};
pub use error::LensError;
pub use profiles::{LensModel, LensProfile, PointMass, Shear, Sie, Sis};
pub use solver::{
    candidate_solutions, find_bright_images, image_position_stochastic, solve,
    solve_image_positions, SolverSettings,
};
pub use traits::{Hessian, LensMapping, TimeDelayCapability};
pub use types::{Candidate, Contour, CriticalCurve, ImageSet, Point2D, RefinedSolution, Segment};
