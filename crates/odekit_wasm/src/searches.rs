//! Search runners: step doubling, asymptote detection, target crossing, root classification.

use crate::system::{js_err, WasmOde};
use js_sys::Float64Array;
use odekit_core::asymptote::{find_vertical_asymptote, AsymptoteReport, AsymptoteSettings};
use odekit_core::characteristic::{characteristic_roots, RootSettings};
use odekit_core::convergence::{converge, DoublingSettings};
use odekit_core::oscillator::{frequency_sweep, OscillatorParams};
use odekit_core::target::{find_x_for_target, ScanStrategy, TargetScanSettings};
use odekit_core::trajectory::{max_estimate_in_range, ExtremumScanSettings, Point};
use serde::Serialize;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

/// Result payload for the target search; `x` is absent when the target is not reached.
#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct TargetResult {
    found: bool,
    x: Option<f64>,
}

impl WasmOde {
    pub(crate) fn run_asymptote(
        &self,
        x_end: f64,
        h: f64,
        threshold: f64,
        precision: f64,
    ) -> Result<AsymptoteReport, String> {
        let settings = AsymptoteSettings {
            method: self.method,
            h,
            threshold,
            precision,
        };
        find_vertical_asymptote(&self.ode, self.start(), x_end, settings).map_err(|e| e.to_string())
    }

    pub(crate) fn run_target(
        &self,
        target_y: f64,
        a: f64,
        b: f64,
        steps: usize,
        linear: bool,
    ) -> Result<TargetResult, String> {
        let settings = TargetScanSettings {
            method: self.method,
            steps,
            strategy: if linear {
                ScanStrategy::Linear
            } else {
                ScanStrategy::Bracketed
            },
            ..TargetScanSettings::default()
        };
        let x = find_x_for_target(&self.ode, self.start(), target_y, a, b, settings)
            .map_err(|e| e.to_string())?;
        Ok(TargetResult {
            found: x.is_some(),
            x,
        })
    }
}

#[wasm_bindgen]
impl WasmOde {
    /// Step-doubling estimate of `y(x_target)`; the payload carries `status`
    /// (`converged` or `exhausted`) and the per-iteration history.
    pub fn converge(&self, x_target: f64, tolerance: f64, max_iterations: u32) -> Result<JsValue, JsValue> {
        let settings = DoublingSettings {
            method: self.method,
            tolerance,
            max_iterations: max_iterations as usize,
        };
        let outcome = converge(&self.ode, self.start(), x_target, settings)
            .map_err(|e| js_err("Step doubling failed", e))?;
        to_value(&outcome).map_err(|e| js_err("Serialization error", e))
    }

    pub fn find_asymptote(
        &self,
        x_end: f64,
        h: f64,
        threshold: f64,
        precision: f64,
    ) -> Result<JsValue, JsValue> {
        let report = self
            .run_asymptote(x_end, h, threshold, precision)
            .map_err(|e| js_err("Asymptote search failed", e))?;
        to_value(&report).map_err(|e| js_err("Serialization error", e))
    }

    pub fn find_target(
        &self,
        target_y: f64,
        a: f64,
        b: f64,
        steps: u32,
        linear: bool,
    ) -> Result<JsValue, JsValue> {
        let result = self
            .run_target(target_y, a, b, steps as usize, linear)
            .map_err(|e| js_err("Target search failed", e))?;
        to_value(&result).map_err(|e| js_err("Serialization error", e))
    }

    /// Returns `[x, y]` of the largest estimate over `[a, b]`.
    pub fn max_estimate(&self, a: f64, b: f64, scan_step: f64, steps: u32) -> Result<Float64Array, JsValue> {
        let settings = ExtremumScanSettings {
            method: self.method,
            scan_step,
            steps: steps as usize,
        };
        let best: Point = max_estimate_in_range(&self.ode, self.start(), a, b, settings)
            .map_err(|e| js_err("Extremum scan failed", e))?;
        Ok(Float64Array::from([best.x, best.y].as_slice()))
    }
}

/// Roots and basis of `a_n r^n + ... + a_0` (coefficients highest order first).
#[wasm_bindgen]
pub fn compute_characteristic_roots(coefficients: Vec<f64>) -> Result<JsValue, JsValue> {
    #[derive(Serialize)]
    struct Payload {
        roots: odekit_core::characteristic::CharacteristicRoots,
        general_solution: String,
    }

    let roots = characteristic_roots(&coefficients, RootSettings::default())
        .map_err(|e| js_err("Root computation failed", e))?;
    let payload = Payload {
        general_solution: roots.general_solution(),
        roots,
    };
    to_value(&payload).map_err(|e| js_err("Serialization error", e))
}

#[wasm_bindgen]
pub fn compute_frequency_sweep(
    m: f64,
    b: f64,
    k: f64,
    omega_start: f64,
    omega_end: f64,
    samples: u32,
) -> Result<JsValue, JsValue> {
    let sweep = frequency_sweep(OscillatorParams { m, b, k }, omega_start, omega_end, samples as usize)
        .map_err(|e| js_err("Frequency sweep failed", e))?;
    to_value(&sweep).map_err(|e| js_err("Serialization error", e))
}
