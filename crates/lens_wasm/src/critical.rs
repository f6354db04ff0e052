//! Critical curves and caustics.

use crate::lens::{settings_or_default, WasmLens};
use lens_core::{trace_critical_curves_and_caustics, CriticalCurveSettings, Point2D};
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
impl WasmLens {
    /// Returns `[{ critical: { points }, caustic: { points } }, ...]`.
    ///
    /// Cells are ordered around the first deflector's centre unless the
    /// settings name a `lens_center`.
    pub fn trace_critical_curves(&self, settings: JsValue) -> Result<JsValue, JsValue> {
        let mut settings: CriticalCurveSettings = settings_or_default(settings)?;
        if settings.lens_center.is_none() {
            settings.lens_center = self.model.center().map(Point2D::from);
        }
        let curves = trace_critical_curves_and_caustics(&self.model, &settings)
            .map_err(|e| JsValue::from_str(&format!("Critical curve tracing failed: {:#}", e)))?;
        to_value(&curves).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}
