use js_sys::Float64Array;
use lens_core::{LensMapping, LensModel, LensProfile};
use serde::de::DeserializeOwned;
use serde_wasm_bindgen::from_value;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmLens {
    pub(crate) model: LensModel,
}

#[wasm_bindgen]
impl WasmLens {
    /// Builds a lens from an array such as `[{ type: "sis", theta_e: 1.0 }]`.
    #[wasm_bindgen(constructor)]
    pub fn new(profiles: JsValue) -> Result<WasmLens, JsValue> {
        console_error_panic_hook::set_once();
        let profiles: Vec<LensProfile> = from_value(profiles)
            .map_err(|e| JsValue::from_str(&format!("Invalid lens profiles: {}", e)))?;
        if profiles.is_empty() {
            return Err(JsValue::from_str("Lens model needs at least one profile."));
        }
        Ok(WasmLens {
            model: LensModel::new(profiles),
        })
    }

    pub fn profile_count(&self) -> usize {
        self.model.profiles.len()
    }

    /// Source-plane position of the image-plane point `(x, y)` as `[beta_x, beta_y]`.
    pub fn ray_shooting(&self, x: f64, y: f64) -> Float64Array {
        let (beta_x, beta_y) = self.model.ray_shooting(x, y);
        Float64Array::from(&[beta_x, beta_y][..])
    }

    pub fn magnification(&self, x: f64, y: f64) -> f64 {
        self.model.magnification(x, y)
    }

    pub fn fermat_potential(&self, x: f64, y: f64) -> Option<f64> {
        self.model.fermat_potential(x, y)
    }
}

/// Decodes an optional settings object; `undefined` and `null` give the defaults.
pub(crate) fn settings_or_default<T>(value: JsValue) -> Result<T, JsValue>
where
    T: DeserializeOwned + Default,
{
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    from_value(value).map_err(|e| JsValue::from_str(&format!("Invalid settings: {}", e)))
}
