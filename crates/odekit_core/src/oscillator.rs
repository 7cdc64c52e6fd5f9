//! Steady-state response of the forced oscillator `m y'' + b y' + k y = cos(Ωt)`.
//! The synchronous solution is `A(Ω) cos(Ωt) + B(Ω) sin(Ωt)`.

use crate::error::{ensure_domain, OdeError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OscillatorParams {
    /// Mass
    pub m: f64,
    /// Damping coefficient
    pub b: f64,
    /// Spring constant
    pub k: f64,
}

impl OscillatorParams {
    /// Undamped natural frequency `sqrt(k / m)`.
    pub fn natural_frequency(&self) -> f64 {
        (self.k / self.m).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseSample {
    pub omega: f64,
    pub a: f64,
    pub b: f64,
}

/// `A = (k - mΩ²) / D`, `B = bΩ / D` with `D = b²Ω² + (k - mΩ²)²`.
pub fn steady_state_coefficients(params: OscillatorParams, omega: f64) -> Result<(f64, f64), OdeError> {
    let detuning = params.k - params.m * omega * omega;
    let denominator = params.b * params.b * omega * omega + detuning * detuning;
    if denominator == 0.0 || !denominator.is_finite() {
        return Err(OdeError::SingularResponse { omega });
    }
    Ok((detuning / denominator, params.b * omega / denominator))
}

/// Evaluates the coefficients on `samples` evenly spaced frequencies in `[omega_start, omega_end]`.
/// Frequencies where the response is singular are left out.
pub fn frequency_sweep(
    params: OscillatorParams,
    omega_start: f64,
    omega_end: f64,
    samples: usize,
) -> Result<Vec<ResponseSample>, OdeError> {
    ensure_domain(omega_start, omega_end)?;
    if samples < 2 {
        return Err(OdeError::InvalidIterations { name: "samples" });
    }
    let spacing = (omega_end - omega_start) / (samples - 1) as f64;
    let sweep = (0..samples)
        .map(|i| omega_start + i as f64 * spacing)
        .filter_map(|omega| {
            steady_state_coefficients(params, omega)
                .ok()
                .map(|(a, b)| ResponseSample { omega, a, b })
        })
        .collect();
    Ok(sweep)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAMPED: OscillatorParams = OscillatorParams {
        m: 1.0,
        b: 0.1,
        k: 25.0,
    };

    #[test]
    fn damped_resonance_is_pure_sine() {
        let (a, b) = steady_state_coefficients(DAMPED, 5.0).unwrap();
        assert_eq!(a, 0.0);
        assert!((b - 2.0).abs() < 1e-12);
    }

    #[test]
    fn undamped_resonance_is_singular() {
        let undamped = OscillatorParams { b: 0.0, ..DAMPED };
        assert_eq!(undamped.natural_frequency(), 5.0);
        assert_eq!(
            steady_state_coefficients(undamped, 5.0).unwrap_err(),
            OdeError::SingularResponse { omega: 5.0 }
        );
        let (a, b) = steady_state_coefficients(undamped, 4.0).unwrap();
        assert!((a - 1.0 / 9.0).abs() < 1e-12);
        assert_eq!(b, 0.0);
    }

    #[test]
    fn sweep_skips_singular_frequencies() {
        let undamped = OscillatorParams { b: 0.0, ..DAMPED };
        // 4.0, 4.5, 5.0, 5.5, 6.0
        let sweep = frequency_sweep(undamped, 4.0, 6.0, 5).unwrap();
        assert_eq!(sweep.len(), 4);
        assert!(sweep.iter().all(|s| s.omega != 5.0));

        let damped = frequency_sweep(DAMPED, 4.0, 6.0, 400).unwrap();
        assert_eq!(damped.len(), 400);
        let peak = damped.iter().map(|s| s.b).fold(f64::MIN, f64::max);
        assert!(peak > 1.9 && peak < 2.001);
    }

    #[test]
    fn sweep_validates_input() {
        assert!(frequency_sweep(DAMPED, 6.0, 4.0, 10).is_err());
        assert!(frequency_sweep(DAMPED, 4.0, 6.0, 1).is_err());
    }
}
