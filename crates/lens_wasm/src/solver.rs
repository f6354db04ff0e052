//! Image-position solves.

use crate::lens::{settings_or_default, WasmLens};
use lens_core::{find_bright_images, solve, ImageSet, Point2D, SolverSettings};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
impl WasmLens {
    /// Image positions of the source `(source_x, source_y)` as `[{x, y}, ...]`.
    ///
    /// `seed` drives the backtracking perturbations and random restarts, so
    /// equal inputs give equal outputs.
    pub fn solve_image_positions(
        &self,
        source_x: f64,
        source_y: f64,
        settings: JsValue,
        seed: u32,
    ) -> Result<JsValue, JsValue> {
        let image_set = self.solve_internal(source_x, source_y, settings, seed)?;
        to_value(&image_set.positions())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Full image set including per-image precision, iteration counts and
    /// the number of dropped refinements.
    pub fn solve_images(
        &self,
        source_x: f64,
        source_y: f64,
        settings: JsValue,
        seed: u32,
    ) -> Result<JsValue, JsValue> {
        let image_set = self.solve_internal(source_x, source_y, settings, seed)?;
        to_value(&image_set).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn find_bright_images(
        &self,
        source_x: f64,
        source_y: f64,
        num_images: usize,
        settings: JsValue,
        seed: u32,
    ) -> Result<JsValue, JsValue> {
        let settings: SolverSettings = settings_or_default(settings)?;
        let mut rng = StdRng::seed_from_u64(u64::from(seed));
        let images = find_bright_images(
            &self.model,
            Point2D::new(source_x, source_y),
            num_images,
            &settings,
            &mut rng,
        )
        .map_err(|e| JsValue::from_str(&format!("Bright image search failed: {:#}", e)))?;
        to_value(&images).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}

impl WasmLens {
    fn solve_internal(
        &self,
        source_x: f64,
        source_y: f64,
        settings: JsValue,
        seed: u32,
    ) -> Result<ImageSet, JsValue> {
        let settings: SolverSettings = settings_or_default(settings)?;
        let mut rng = StdRng::seed_from_u64(u64::from(seed));
        solve(&self.model, Point2D::new(source_x, source_y), &settings, &mut rng)
            .map_err(|e| JsValue::from_str(&format!("Image solve failed: {:#}", e)))
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use crate::WasmLens;
    use lens_core::{ImageSet, Point2D};
    use serde::Serialize;
    use serde_wasm_bindgen::{from_value, to_value};
    use wasm_bindgen::JsValue;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[derive(Serialize)]
    struct Profile {
        #[serde(rename = "type")]
        kind: &'static str,
        theta_e: f64,
    }

    fn point_mass() -> WasmLens {
        let profiles = to_value(&vec![Profile {
            kind: "point_mass",
            theta_e: 1.0,
        }])
        .expect("encode profiles");
        WasmLens::new(profiles).expect("build lens")
    }

    #[wasm_bindgen_test]
    fn solves_point_mass_with_default_settings() {
        let lens = point_mass();
        let value = lens
            .solve_image_positions(0.1, 0.0, JsValue::UNDEFINED, 7)
            .expect("solve");
        let positions: Vec<Point2D> = from_value(value).expect("decode positions");
        assert_eq!(positions.len(), 2);
        assert!(positions[0].x > 1.0);
    }

    #[wasm_bindgen_test]
    fn detailed_solve_reports_precision() {
        let lens = point_mass();
        let value = lens
            .solve_images(0.1, 0.0, JsValue::NULL, 7)
            .expect("solve");
        let images: ImageSet = from_value(value).expect("decode image set");
        assert!(images.images.iter().all(|image| image.precision <= 1e-10));
    }

    #[wasm_bindgen_test]
    fn invalid_settings_are_reported() {
        #[derive(Serialize)]
        struct Settings {
            min_distance: f64,
        }
        let lens = point_mass();
        let settings = to_value(&Settings { min_distance: -1.0 }).expect("encode settings");
        let err = lens
            .solve_image_positions(0.1, 0.0, settings, 7)
            .expect_err("negative min_distance");
        let message = err.as_string().expect("string error");
        assert!(message.starts_with("Image solve failed"), "{message}");
    }

    #[wasm_bindgen_test]
    fn empty_profile_list_is_rejected() {
        let profiles = to_value(&Vec::<u8>::new()).expect("encode profiles");
        assert!(WasmLens::new(profiles).is_err());
    }
}
