//! JavaScript bindings for `lens_core`.
//!
//! A `WasmLens` owns one lens model built from a list of tagged profiles;
//! settings and results cross the boundary as plain objects.

mod critical;
mod lens;
mod solver;

pub use lens::WasmLens;
