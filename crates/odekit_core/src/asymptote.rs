use crate::error::{ensure_positive, ensure_step_size, OdeError};
use crate::solvers::Method;
use crate::traits::{ScalarOde, Stepper};
use crate::trajectory::Point;
use log::{debug, info};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsymptoteSettings {
    pub method: Method,
    /// Coarse step size.
    pub h: f64,
    /// `y` above this value is treated as divergent.
    pub threshold: f64,
    /// Resolution of the reported x; the refined step is `precision / 100`.
    pub precision: f64,
}

impl Default for AsymptoteSettings {
    fn default() -> Self {
        Self {
            method: Method::ImprovedEuler,
            h: 0.01,
            threshold: 1e6,
            precision: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AsymptoteReport {
    /// Location of the blow-up rounded to `precision`, `None` if `y` stayed below the threshold.
    pub asymptote: Option<f64>,
    /// Coarse steps taken.
    pub steps: usize,
}

/// Rounds `x` to the nearest multiple of `precision`.
pub fn round_to_precision(x: f64, precision: f64) -> f64 {
    let scaled = (x / precision).round();
    // Dividing by the reciprocal keeps 0.01-style precisions free of trailing noise.
    let inverse = 1.0 / precision;
    if (inverse - inverse.round()).abs() < 1e-9 {
        scaled / inverse.round()
    } else {
        scaled * precision
    }
}

fn diverged(y: f64, threshold: f64) -> bool {
    !y.is_finite() || y > threshold
}

/// Steps from `start` towards `b` until `y` exceeds the threshold, then refines inside
/// the bracketing step to locate the vertical asymptote.
pub fn find_vertical_asymptote(
    ode: &impl ScalarOde<f64>,
    start: Point,
    b: f64,
    settings: AsymptoteSettings,
) -> Result<AsymptoteReport, OdeError> {
    ensure_step_size(settings.h)?;
    ensure_positive("precision", settings.precision)?;
    if settings.threshold.is_nan() {
        return Err(OdeError::InvalidTolerance {
            name: "threshold",
            value: settings.threshold,
        });
    }

    let h = settings.h;
    let mut x = start.x;
    let mut y = start.y;
    let mut steps = 0usize;

    while x < b {
        let y_next = step_or_overflow(ode, x, y, h, settings.method)?;
        let x_next = start.x + (steps + 1) as f64 * h;
        steps += 1;

        if diverged(y_next, settings.threshold) {
            debug!("Threshold crossed in [{}, {}], refining", x, x_next);
            let found = refine(ode, Point::new(x, y), x_next, settings)?;
            let raw = found.unwrap_or(x_next);
            let asymptote = round_to_precision(raw, settings.precision);
            info!("Vertical asymptote detected at x = {} after {} steps", asymptote, steps);
            return Ok(AsymptoteReport {
                asymptote: Some(asymptote),
                steps,
            });
        }

        x = x_next;
        y = y_next;
    }

    info!("No vertical asymptote below x = {} ({} steps)", b, steps);
    Ok(AsymptoteReport {
        asymptote: None,
        steps,
    })
}

/// One step where a non-finite slope counts as blow-up rather than an error.
fn step_or_overflow(
    ode: &impl ScalarOde<f64>,
    x: f64,
    y: f64,
    h: f64,
    method: Method,
) -> Result<f64, OdeError> {
    match method.step(ode, x, y, h) {
        Ok(v) => Ok(v),
        // Near the pole the slope itself may overflow.
        Err(OdeError::NonFiniteSlope { .. }) => Ok(f64::INFINITY),
        Err(err) => Err(err),
    }
}

/// Fine scan of `[lower.x, upper)`; the first x whose `y` diverges, if any.
fn refine(
    ode: &impl ScalarOde<f64>,
    lower: Point,
    upper: f64,
    settings: AsymptoteSettings,
) -> Result<Option<f64>, OdeError> {
    let fine = settings.precision / 100.0;
    let mut x = lower.x;
    let mut y = lower.y;
    let mut i = 0usize;

    while x < upper {
        let y_next = step_or_overflow(ode, x, y, fine, settings.method)?;
        i += 1;
        let x_next = lower.x + i as f64 * fine;
        if diverged(y_next, settings.threshold) {
            return Ok(Some(x_next));
        }
        x = x_next;
        y = y_next;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadratic(_x: f64, y: f64) -> f64 {
        y * y
    }

    #[test]
    fn locates_known_blow_up_within_precision() {
        // y' = y^2, y(0) = 1 => y = 1 / (1 - x), pole at x = 1.
        let settings = AsymptoteSettings {
            h: 0.001,
            ..AsymptoteSettings::default()
        };
        let report = find_vertical_asymptote(&quadratic, Point::new(0.0, 1.0), 2.0, settings).unwrap();
        let x = report.asymptote.unwrap();
        assert!((x - 1.0).abs() <= 0.01 + 1e-12, "x = {}", x);
        assert!(report.steps > 990 && report.steps < 1010);
    }

    #[test]
    fn rk4_locates_blow_up_with_default_step() {
        let settings = AsymptoteSettings {
            method: Method::Rk4,
            ..AsymptoteSettings::default()
        };
        let report = find_vertical_asymptote(&quadratic, Point::new(0.0, 1.0), 2.0, settings).unwrap();
        assert!((report.asymptote.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(report.steps, 101);
    }

    #[test]
    fn slope_overflow_in_coarse_scan_counts_as_blow_up() {
        // y' = exp(50 y), y(0) = 0 => y = -ln(1 - 50x) / 50, pole at x = 0.02.
        // The fourth Heun step evaluates exp(50 * 16.2), which overflows.
        let f = |_x: f64, y: f64| (50.0 * y).exp();
        let report = find_vertical_asymptote(&f, Point::new(0.0, 0.0), 1.0, AsymptoteSettings::default())
            .unwrap();
        let x = report.asymptote.unwrap();
        assert!((x - 0.02).abs() <= 0.01 + 1e-9, "x = {}", x);
        assert_eq!(report.steps, 4);
    }

    #[test]
    fn reproduces_classic_experiment() {
        let f = |x: f64, y: f64| x.powi(3) * y * y - y / x;
        let report = find_vertical_asymptote(&f, Point::new(0.9, 3.2), 1.5, AsymptoteSettings::default())
            .unwrap();
        assert!((report.asymptote.unwrap() - 1.22).abs() < 1e-9);
        assert_eq!(report.steps, 33);
    }

    #[test]
    fn bounded_solution_reports_none() {
        let f = |_x: f64, y: f64| -y;
        let report = find_vertical_asymptote(&f, Point::new(0.0, 1.0), 1.0, AsymptoteSettings::default())
            .unwrap();
        assert_eq!(report.asymptote, None);
        assert!(report.steps >= 100 && report.steps <= 101);
    }

    #[test]
    fn refined_scan_falls_back_to_bracket_end() {
        // Only the slope at the bracket's left end is large, so the fine steps never diverge.
        let f = |x: f64, _y: f64| if x == 0.0 { 1e7 } else { 0.0 };
        let settings = AsymptoteSettings {
            method: Method::Euler,
            h: 0.5,
            ..AsymptoteSettings::default()
        };
        let report = find_vertical_asymptote(&f, Point::new(0.0, 0.0), 2.0, settings).unwrap();
        assert_eq!(report.steps, 1);
        assert_eq!(report.asymptote, Some(0.5));
    }

    #[test]
    fn rounding_helper() {
        assert_eq!(round_to_precision(1.2204, 0.01), 1.22);
        assert_eq!(round_to_precision(1.0106, 0.01), 1.01);
        assert_eq!(round_to_precision(0.26, 0.5), 0.5);
    }
}
