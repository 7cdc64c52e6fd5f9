use thiserror::Error;

use crate::equation_engine::ExpressionError;

/// Failures raised by the integrators and the searches built on them.
///
/// "Not found" outcomes (no asymptote, no target crossing) are not errors;
/// they are reported as `None` by the respective searches.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OdeError {
    #[error("step size must be finite and positive (got {0})")]
    InvalidStepSize(f64),
    #[error("search domain must satisfy a < b with finite bounds (got [{a}, {b}])")]
    InvalidDomain { a: f64, b: f64 },
    #[error("{name} must be finite and positive (got {value})")]
    InvalidTolerance { name: &'static str, value: f64 },
    #[error("{name} must be at least one")]
    InvalidIterations { name: &'static str },
    #[error("right-hand side is not finite at x = {x}, y = {y}")]
    NonFiniteSlope { x: f64, y: f64 },
    #[error(
        "step doubling did not converge after {iterations} iterations \
         (last estimate {estimate}, last difference {difference})"
    )]
    NotConverged {
        iterations: usize,
        estimate: f64,
        difference: f64,
    },
    #[error("steady-state response is singular at omega = {omega}")]
    SingularResponse { omega: f64 },
    #[error(transparent)]
    Expression(#[from] ExpressionError),
}

pub(crate) fn ensure_step_size(h: f64) -> Result<(), OdeError> {
    if h.is_finite() && h > 0.0 {
        Ok(())
    } else {
        Err(OdeError::InvalidStepSize(h))
    }
}

pub(crate) fn ensure_domain(a: f64, b: f64) -> Result<(), OdeError> {
    if a.is_finite() && b.is_finite() && a < b {
        Ok(())
    } else {
        Err(OdeError::InvalidDomain { a, b })
    }
}

pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<(), OdeError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(OdeError::InvalidTolerance { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equation_engine::CompiledOde;

    fn compile(source: &str) -> Result<CompiledOde<f64>, OdeError> {
        Ok(CompiledOde::from_source(source)?)
    }

    #[test]
    fn expression_errors_convert_and_keep_their_message() {
        let err = compile("q + y").unwrap_err();
        assert_eq!(err, OdeError::Expression(ExpressionError::UnknownSymbol("q".into())));
        assert_eq!(err.to_string(), "unknown variable or parameter: q");
    }

    #[test]
    fn messages_name_the_offending_values() {
        assert_eq!(
            ensure_domain(2.0, 1.0).unwrap_err().to_string(),
            "search domain must satisfy a < b with finite bounds (got [2, 1])"
        );
        assert_eq!(
            ensure_positive("tolerance", -1.0).unwrap_err().to_string(),
            "tolerance must be finite and positive (got -1)"
        );
        assert_eq!(
            OdeError::NonFiniteSlope { x: 0.0, y: 1.5 }.to_string(),
            "right-hand side is not finite at x = 0, y = 1.5"
        );
    }
}
