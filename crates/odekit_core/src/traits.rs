use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

use crate::error::OdeError;

/// A trait for types that can be used as scalars in the integrators.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {
    /// Converts an `f64` constant, falling back to NaN when it does not fit.
    fn constant(value: f64) -> Self {
        Self::from_f64(value).unwrap_or_else(Self::nan)
    }

    /// Lossy view as `f64`, used for diagnostics and error payloads.
    fn as_f64(self) -> f64 {
        self.to_f64().unwrap_or(f64::NAN)
    }
}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// Right-hand side of a scalar first-order ODE `dy/dx = f(x, y)`.
pub trait ScalarOde<T: Scalar> {
    /// Evaluates the slope at `(x, y)`.
    fn slope(&self, x: T, y: T) -> T;
}

impl<T, F> ScalarOde<T> for F
where
    T: Scalar,
    F: Fn(T, T) -> T,
{
    fn slope(&self, x: T, y: T) -> T {
        self(x, y)
    }
}

/// A one-step rule advancing `y` from `x` to `x + h`.
pub trait Stepper<T: Scalar> {
    /// Performs one step of size `h` and returns the new `y`.
    /// Fails when any slope evaluation is not finite.
    fn step(&self, ode: &impl ScalarOde<T>, x: T, y: T, h: T) -> Result<T, OdeError>;
}

/// Evaluates the slope and rejects NaN or infinite results.
pub(crate) fn checked_slope<T: Scalar>(ode: &impl ScalarOde<T>, x: T, y: T) -> Result<T, OdeError> {
    let slope = ode.slope(x, y);
    if slope.is_finite() {
        Ok(slope)
    } else {
        Err(OdeError::NonFiniteSlope {
            x: x.as_f64(),
            y: y.as_f64(),
        })
    }
}
