use thiserror::Error;

/// Conditions that abort a solver operation.
///
/// Refinement failures and singular Jacobians are not represented here: the
/// former are dropped from the image set, the latter recovered inside the refiner.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LensError {
    #[error(
        "ambiguous marching-squares saddle (case {case}) in cell {cell}; \
         the sampling grid is too coarse for the magnification field"
    )]
    Topology { case: u8, cell: usize },

    #[error(
        "lens mapping does not compute a lensing potential, \
         so images cannot be ordered by arrival time"
    )]
    Capability,

    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}
