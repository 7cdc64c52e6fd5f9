//! Core WASM wrapper around a compiled right-hand side.

use odekit_core::equation_engine::CompiledOde;
use odekit_core::trajectory::{integrate, Point};
use odekit_core::{Method, Stepper};
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmOde {
    pub(crate) ode: CompiledOde<f64>,
    pub(crate) method: Method,
    x: f64,
    y: f64,
}

pub(crate) fn build_ode(
    expression: &str,
    param_names: &[String],
    params: Vec<f64>,
) -> Result<CompiledOde<f64>, String> {
    CompiledOde::new(expression, param_names, params).map_err(|e| e.to_string())
}

pub(crate) fn parse_method(name: &str) -> Result<Method, String> {
    name.parse()
}

pub(crate) fn js_err(context: &str, err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, err))
}

impl WasmOde {
    pub(crate) fn from_parts(ode: CompiledOde<f64>, method: Method) -> Self {
        Self {
            ode,
            method,
            x: 0.0,
            y: 0.0,
        }
    }

    pub(crate) fn start(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub(crate) fn advance(&mut self, h: f64) -> Result<(), String> {
        if !(h.is_finite() && h != 0.0) {
            return Err(format!("Step size must be finite and non-zero (got {}).", h));
        }
        self.y = self.method.step(&self.ode, self.x, self.y, h).map_err(|e| e.to_string())?;
        self.x += h;
        Ok(())
    }
}

#[wasm_bindgen]
impl WasmOde {
    #[wasm_bindgen(constructor)]
    pub fn new(
        expression: &str,
        param_names: Vec<String>,
        params: Vec<f64>,
        method: &str,
    ) -> Result<WasmOde, JsValue> {
        console_error_panic_hook::set_once();

        let ode = build_ode(expression, &param_names, params).map_err(|e| js_err("Invalid equation", e))?;
        let method = parse_method(method).map_err(|e| JsValue::from_str(&e))?;
        Ok(WasmOde::from_parts(ode, method))
    }

    pub fn set_state(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    pub fn get_x(&self) -> f64 {
        self.x
    }

    pub fn get_y(&self) -> f64 {
        self.y
    }

    pub fn set_method(&mut self, method: &str) -> Result<(), JsValue> {
        self.method = parse_method(method).map_err(|e| JsValue::from_str(&e))?;
        Ok(())
    }

    pub fn set_param(&mut self, name: &str, value: f64) -> Result<(), JsValue> {
        self.ode
            .set_param(name, value)
            .map_err(|e| js_err("Unknown parameter", e))
    }

    pub fn step(&mut self, h: f64) -> Result<(), JsValue> {
        self.advance(h).map_err(|e| js_err("Step failed", e))
    }

    /// Integrates `steps` steps of size `h` from the current state and returns
    /// `{ points: [{x, y}, ...] }`. The stored state is left untouched.
    pub fn trajectory(&self, h: f64, steps: u32) -> Result<JsValue, JsValue> {
        let traj = integrate(self.method, &self.ode, self.start(), h, steps as usize)
            .map_err(|e| js_err("Integration failed", e))?;
        to_value(&traj).map_err(|e| js_err("Serialization error", e))
    }
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn constructor_rejects_unknown_symbol() {
        let result = WasmOde::new("k * y", vec![], vec![], "rk4");
        let message = result
            .err()
            .and_then(|err| err.as_string())
            .unwrap_or_default();
        assert!(message.contains("Invalid equation"));
    }

    #[wasm_bindgen_test]
    fn parameters_can_be_updated() {
        let mut ode = WasmOde::new("-k * y", vec!["k".to_string()], vec![1.0], "euler").unwrap();
        ode.set_state(0.0, 1.0);
        ode.set_param("k", 2.0).unwrap();
        ode.step(0.1).unwrap();
        assert!((ode.get_y() - 0.8).abs() < 1e-12);
        assert!(ode.set_param("m", 1.0).is_err());
    }
}
