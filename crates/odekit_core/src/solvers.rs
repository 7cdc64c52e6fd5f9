use crate::error::OdeError;
use crate::traits::{checked_slope, Scalar, ScalarOde, Stepper};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Explicit Euler, first order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Euler;

impl<T: Scalar> Stepper<T> for Euler {
    fn step(&self, ode: &impl ScalarOde<T>, x: T, y: T, h: T) -> Result<T, OdeError> {
        // y_next = y + h*f(x, y)
        let slope = checked_slope(ode, x, y)?;
        Ok(y + h * slope)
    }
}

/// Improved Euler (Heun) predictor-corrector, second order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImprovedEuler;

impl<T: Scalar> Stepper<T> for ImprovedEuler {
    fn step(&self, ode: &impl ScalarOde<T>, x: T, y: T, h: T) -> Result<T, OdeError> {
        let half = T::constant(0.5);

        // predictor F = f(x, y)
        let f = checked_slope(ode, x, y)?;
        // corrector G = f(x + h, y + h*F)
        let g = checked_slope(ode, x + h, y + h * f)?;

        Ok(y + h * half * (f + g))
    }
}

/// Classic Runge-Kutta 4th Order
#[derive(Debug, Clone, Copy, Default)]
pub struct RK4;

impl<T: Scalar> Stepper<T> for RK4 {
    fn step(&self, ode: &impl ScalarOde<T>, x: T, y: T, h: T) -> Result<T, OdeError> {
        let half = T::constant(0.5);
        let sixth = T::constant(1.0 / 6.0);
        let two = T::constant(2.0);

        // k1 = f(x, y)
        let k1 = checked_slope(ode, x, y)?;
        // k2 = f(x + h/2, y + h*k1/2)
        let k2 = checked_slope(ode, x + h * half, y + h * k1 * half)?;
        // k3 = f(x + h/2, y + h*k2/2)
        let k3 = checked_slope(ode, x + h * half, y + h * k2 * half)?;
        // k4 = f(x + h, y + h*k3)
        let k4 = checked_slope(ode, x + h, y + h * k3)?;

        // y_next = y + h/6 * (k1 + 2k2 + 2k3 + k4)
        Ok(y + h * sixth * (k1 + two * k2 + two * k3 + k4))
    }
}

/// Selects one of the fixed-step update rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Euler,
    #[default]
    #[serde(alias = "heun")]
    ImprovedEuler,
    Rk4,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::Euler, Method::ImprovedEuler, Method::Rk4];

    /// Order of the global truncation error.
    pub fn order(self) -> u32 {
        match self {
            Method::Euler => 1,
            Method::ImprovedEuler => 2,
            Method::Rk4 => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Method::Euler => "euler",
            Method::ImprovedEuler => "improved_euler",
            Method::Rk4 => "rk4",
        }
    }
}

impl<T: Scalar> Stepper<T> for Method {
    fn step(&self, ode: &impl ScalarOde<T>, x: T, y: T, h: T) -> Result<T, OdeError> {
        match self {
            Method::Euler => Euler.step(ode, x, y, h),
            Method::ImprovedEuler => ImprovedEuler.step(ode, x, y, h),
            Method::Rk4 => RK4.step(ode, x, y, h),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "euler" => Ok(Method::Euler),
            "heun" | "improved_euler" | "improved-euler" => Ok(Method::ImprovedEuler),
            "rk4" => Ok(Method::Rk4),
            other => Err(format!("Unknown method: {}", other)),
        }
    }
}
