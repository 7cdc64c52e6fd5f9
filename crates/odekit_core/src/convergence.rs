use crate::error::{ensure_positive, OdeError};
use crate::solvers::Method;
use crate::traits::ScalarOde;
use crate::trajectory::{solve_at, Point};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoublingSettings {
    pub method: Method,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for DoublingSettings {
    fn default() -> Self {
        Self {
            method: Method::ImprovedEuler,
            tolerance: 1e-6,
            max_iterations: 100,
        }
    }
}

/// One doubling: the estimate with `steps` steps against the one with `steps / 2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoublingRecord {
    pub iteration: usize,
    pub steps: usize,
    pub estimate: f64,
    pub previous: f64,
    pub difference: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Convergence {
    Converged {
        value: f64,
        steps: usize,
        iterations: usize,
        difference: f64,
        history: Vec<DoublingRecord>,
    },
    Exhausted {
        value: f64,
        steps: usize,
        iterations: usize,
        difference: f64,
        history: Vec<DoublingRecord>,
    },
}

impl Convergence {
    /// Latest estimate, whether or not the tolerance was met.
    pub fn value(&self) -> f64 {
        match self {
            Convergence::Converged { value, .. } | Convergence::Exhausted { value, .. } => *value,
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, Convergence::Converged { .. })
    }

    pub fn history(&self) -> &[DoublingRecord] {
        match self {
            Convergence::Converged { history, .. } | Convergence::Exhausted { history, .. } => {
                history
            }
        }
    }

    /// Turns an exhausted run into `OdeError::NotConverged`.
    pub fn into_result(self) -> Result<f64, OdeError> {
        match self {
            Convergence::Converged { value, .. } => Ok(value),
            Convergence::Exhausted {
                value,
                iterations,
                difference,
                ..
            } => Err(OdeError::NotConverged {
                iterations,
                estimate: value,
                difference,
            }),
        }
    }
}

/// Estimates `y(x_target)` starting from one step, doubling the step count until two
/// successive estimates differ by less than `settings.tolerance`.
pub fn converge(
    ode: &impl ScalarOde<f64>,
    start: Point,
    x_target: f64,
    settings: DoublingSettings,
) -> Result<Convergence, OdeError> {
    ensure_positive("tolerance", settings.tolerance)?;
    if settings.max_iterations == 0 {
        return Err(OdeError::InvalidIterations {
            name: "max_iterations",
        });
    }
    debug!("Initial values, x = {}, y = {}", start.x, start.y);

    let mut steps = 1usize;
    let mut previous = solve_at(settings.method, ode, start, x_target, steps)?;
    let mut history = Vec::new();
    let mut difference = f64::INFINITY;

    for iteration in 1..=settings.max_iterations {
        let Some(next_steps) = steps.checked_mul(2) else {
            warn!("Step count overflow after {} iterations", iteration - 1);
            break;
        };
        steps = next_steps;
        let estimate = solve_at(settings.method, ode, start, x_target, steps)?;
        difference = (estimate - previous).abs();
        debug!(
            "Iteration {}: N = {}, y_new = {}, y_prev = {}, error = {}",
            iteration, steps, estimate, previous, difference
        );
        history.push(DoublingRecord {
            iteration,
            steps,
            estimate,
            previous,
            difference,
        });

        if difference < settings.tolerance {
            info!("Tolerance reached after {} iterations, y = {}", iteration, estimate);
            return Ok(Convergence::Converged {
                value: estimate,
                steps,
                iterations: iteration,
                difference,
                history,
            });
        }
        previous = estimate;
    }

    warn!(
        "Max number of iterations reached, returning last value, y = {}",
        previous
    );
    Ok(Convergence::Exhausted {
        value: previous,
        steps,
        iterations: history.len(),
        difference,
        history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(x: f64, y: f64) -> f64 {
        x + 3.0 - y
    }

    #[test]
    fn heun_converges_on_smooth_equation() {
        let outcome =
            converge(&linear, Point::new(0.0, 12.0), 1.0, DoublingSettings::default()).unwrap();
        assert!(outcome.is_converged());
        let exact = 3.0 + 10.0 * (-1.0f64).exp();
        assert!((outcome.value() - exact).abs() < 1e-5);
        match &outcome {
            Convergence::Converged {
                steps, iterations, ..
            } => {
                assert_eq!(*iterations, 11);
                assert_eq!(*steps, 2048);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn successive_differences_shrink() {
        let outcome =
            converge(&linear, Point::new(0.0, 12.0), 1.0, DoublingSettings::default()).unwrap();
        let history = outcome.history();
        assert!(history.len() > 3);
        for pair in history[1..].windows(2) {
            assert!(pair[1].difference < pair[0].difference);
        }
    }

    #[test]
    fn exhaustion_is_explicit() {
        let settings = DoublingSettings {
            max_iterations: 3,
            ..DoublingSettings::default()
        };
        let outcome = converge(&linear, Point::new(0.0, 12.0), 1.0, settings).unwrap();
        assert!(!outcome.is_converged());
        assert_eq!(outcome.history().len(), 3);
        assert_eq!(outcome.value(), outcome.history()[2].estimate);
        match outcome.into_result() {
            Err(OdeError::NotConverged { iterations, .. }) => assert_eq!(iterations, 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rejects_invalid_settings() {
        let bad_tol = DoublingSettings {
            tolerance: 0.0,
            ..DoublingSettings::default()
        };
        assert!(converge(&linear, Point::new(0.0, 12.0), 1.0, bad_tol).is_err());
        let bad_iter = DoublingSettings {
            max_iterations: 0,
            ..DoublingSettings::default()
        };
        assert_eq!(
            converge(&linear, Point::new(0.0, 12.0), 1.0, bad_iter).unwrap_err(),
            OdeError::InvalidIterations {
                name: "max_iterations"
            }
        );
    }

    #[test]
    fn target_at_origin_converges_immediately() {
        let outcome =
            converge(&linear, Point::new(0.0, 12.0), 0.0, DoublingSettings::default()).unwrap();
        assert!(outcome.is_converged());
        assert_eq!(outcome.value(), 12.0);
    }
}
