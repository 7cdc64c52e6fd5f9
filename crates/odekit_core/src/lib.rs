pub mod asymptote;
pub mod characteristic;
pub mod convergence;
pub mod equation_engine;
pub mod error;
pub mod oscillator;
pub mod solvers;
pub mod target;
pub mod trajectory;
/// The `odekit_core` crate provides the numerical kernel for scalar first-order ODEs
/// `dy/dx = f(x, y)`. It is generic over the scalar type (`f64`, `f32`).
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `ScalarOde` (right-hand sides), `Stepper` (one-step rules).
/// - **Solvers**: Fixed-step Euler, improved Euler (Heun) and classical RK4, selected through `Method`.
/// - **Trajectory**: Repeated stepping, fixed-step evaluation at a target x, extremum scans, CSV export.
/// - **Searches**: Step-doubling convergence, vertical-asymptote detection, target-value crossing.
/// - **Equation Engine**: A small bytecode VM for user-defined right-hand sides.
pub mod traits;

pub use error::OdeError;
pub use solvers::Method;
pub use traits::{Scalar, ScalarOde, Stepper};
pub use trajectory::{Point, Trajectory};
