use crate::error::{ensure_domain, ensure_positive, ensure_step_size, OdeError};
use crate::solvers::Method;
use crate::traits::{Scalar, ScalarOde, Stepper};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Independent and dependent variable at one integration point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point<T = f64> {
    pub x: T,
    pub y: T,
}

impl<T> Point<T> {
    pub fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

/// Ordered points produced by repeated fixed-size steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory<T = f64> {
    pub points: Vec<Point<T>>,
}

impl<T: Scalar> Trajectory<T> {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<Point<T>> {
        self.points.last().copied()
    }

    /// Point with the largest `y`. Ties keep the earliest point.
    pub fn max_point(&self) -> Option<Point<T>> {
        self.points.iter().copied().fold(None, |best, p| match best {
            Some(b) if b.y >= p.y => Some(b),
            _ => Some(p),
        })
    }

    /// Point with the smallest `y`. Ties keep the earliest point.
    pub fn min_point(&self) -> Option<Point<T>> {
        self.points.iter().copied().fold(None, |best, p| match best {
            Some(b) if b.y <= p.y => Some(b),
            _ => Some(p),
        })
    }

    pub fn xs(&self) -> Vec<T> {
        self.points.iter().map(|p| p.x).collect()
    }

    pub fn ys(&self) -> Vec<T> {
        self.points.iter().map(|p| p.y).collect()
    }

    /// Writes the trajectory as CSV with an `x,y` header.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(["x", "y"])?;
        for p in &self.points {
            wtr.write_record([p.x.as_f64().to_string(), p.y.as_f64().to_string()])
                .context("Failed to write trajectory row.")?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// How a span `(x_end - x0) / h` is turned into a whole number of steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRounding {
    /// Stop at or before `x_end`.
    #[default]
    Floor,
    /// Stop at or past `x_end`.
    Ceil,
}

const SPAN_GUARD: f64 = 1e-9;

/// Number of steps of size `h` covering `[x0, x_end]`.
/// A relative guard absorbs float noise in the quotient (e.g. `0.3 / 0.1`).
pub fn steps_for_span(x0: f64, x_end: f64, h: f64, rounding: StepRounding) -> Result<usize, OdeError> {
    ensure_step_size(h)?;
    let span = (x_end - x0) / h;
    if !span.is_finite() {
        return Err(OdeError::InvalidDomain { a: x0, b: x_end });
    }
    if span <= 0.0 {
        return Ok(0);
    }
    let steps = match rounding {
        StepRounding::Floor => (span * (1.0 + SPAN_GUARD)).floor(),
        StepRounding::Ceil => (span * (1.0 - SPAN_GUARD)).ceil(),
    };
    Ok(steps as usize)
}

/// Takes `steps` steps of size `h` from `start`, recording every point (start included).
pub fn integrate<T: Scalar>(
    method: Method,
    ode: &impl ScalarOde<T>,
    start: Point<T>,
    h: T,
    steps: usize,
) -> Result<Trajectory<T>, OdeError> {
    ensure_step_size(h.as_f64())?;

    let mut points = Vec::with_capacity(steps + 1);
    points.push(start);
    let mut y = start.y;
    for i in 0..steps {
        // x is recomputed from the origin so that long runs do not drift.
        let x = start.x + T::constant(i as f64) * h;
        y = method.step(ode, x, y, h)?;
        points.push(Point::new(start.x + T::constant((i + 1) as f64) * h, y));
    }
    Ok(Trajectory { points })
}

/// Integrates from `start` towards `x_end` with step `h`, the step count chosen by `rounding`.
pub fn integrate_to<T: Scalar>(
    method: Method,
    ode: &impl ScalarOde<T>,
    start: Point<T>,
    x_end: T,
    h: T,
    rounding: StepRounding,
) -> Result<Trajectory<T>, OdeError> {
    let steps = steps_for_span(start.x.as_f64(), x_end.as_f64(), h.as_f64(), rounding)?;
    integrate(method, ode, start, h, steps)
}

/// Estimates `y(x_target)` with `n` equal steps of size `(x_target - x0) / n`.
///
/// `n == 0` and `x_target == x0` both return the initial `y` untouched.
/// A target left of `x0` integrates backwards.
pub fn solve_at<T: Scalar>(
    method: Method,
    ode: &impl ScalarOde<T>,
    start: Point<T>,
    x_target: T,
    n: usize,
) -> Result<T, OdeError> {
    if n == 0 || x_target == start.x {
        return Ok(start.y);
    }
    let h = (x_target - start.x) / T::constant(n as f64);
    if !h.is_finite() {
        return Err(OdeError::InvalidStepSize(h.as_f64()));
    }

    let mut y = start.y;
    for i in 0..n {
        let x = start.x + T::constant(i as f64) * h;
        y = method.step(ode, x, y, h)?;
    }
    Ok(y)
}

/// Grid settings for [`max_estimate_in_range`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtremumScanSettings {
    pub method: Method,
    /// Spacing of the candidate x grid.
    pub scan_step: f64,
    /// Steps used for every individual estimate.
    pub steps: usize,
}

impl Default for ExtremumScanSettings {
    fn default() -> Self {
        Self {
            method: Method::ImprovedEuler,
            scan_step: 0.001,
            steps: 1000,
        }
    }
}

/// Scans `x` over `[a, b]` (endpoint included when it falls on the grid),
/// estimating `y(x)` independently at each candidate, and returns the largest.
pub fn max_estimate_in_range(
    ode: &impl ScalarOde<f64>,
    start: Point,
    a: f64,
    b: f64,
    settings: ExtremumScanSettings,
) -> Result<Point, OdeError> {
    ensure_domain(a, b)?;
    ensure_positive("scan_step", settings.scan_step)?;

    let candidates = ((b - a) / settings.scan_step * (1.0 + SPAN_GUARD)).floor() as usize;
    let mut best: Option<Point> = None;
    for i in 0..=candidates {
        let x = a + i as f64 * settings.scan_step;
        let y = solve_at(settings.method, ode, start, x, settings.steps)?;
        if best.map_or(true, |b| y > b.y) {
            best = Some(Point::new(x, y));
        }
    }
    // The grid always holds at least `a`.
    Ok(best.unwrap_or(Point::new(a, start.y)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(x: f64, y: f64) -> f64 {
        x + 3.0 - y
    }

    fn linear_exact(x: f64) -> f64 {
        x + 2.0 + 10.0 * (-x).exp()
    }

    fn error_at_one(method: Method, h: f64) -> f64 {
        let n = (1.0 / h).round() as usize;
        let y = solve_at(method, &linear, Point::new(0.0, 12.0), 1.0, n).unwrap();
        (y - linear_exact(1.0)).abs()
    }

    #[test]
    fn rk4_matches_closed_form_within_fourth_order() {
        let h = 0.1;
        let err = error_at_one(Method::Rk4, h);
        // C * h^4 with a modest constant
        assert!(err < 0.1 * h.powi(4), "error {}", err);
    }

    #[test]
    fn halving_step_reduces_error_by_expected_order() {
        let rk_ratio = error_at_one(Method::Rk4, 0.1) / error_at_one(Method::Rk4, 0.05);
        assert!(rk_ratio > 14.0 && rk_ratio < 18.0, "rk4 ratio {}", rk_ratio);

        let euler_ratio = error_at_one(Method::Euler, 0.1) / error_at_one(Method::Euler, 0.05);
        assert!(euler_ratio > 1.8 && euler_ratio < 2.2, "euler ratio {}", euler_ratio);

        let heun_ratio =
            error_at_one(Method::ImprovedEuler, 0.1) / error_at_one(Method::ImprovedEuler, 0.05);
        assert!(heun_ratio > 3.5 && heun_ratio < 4.5, "heun ratio {}", heun_ratio);
    }

    #[test]
    fn zero_steps_return_initial_value() {
        let start = Point::new(0.0, 12.0);
        for method in Method::ALL {
            assert_eq!(solve_at(method, &linear, start, 1.0, 0).unwrap(), 12.0);
            assert_eq!(solve_at(method, &linear, start, 0.0, 16).unwrap(), 12.0);
        }
        let traj = integrate(Method::Rk4, &linear, start, 0.4, 0).unwrap();
        assert_eq!(traj.points, vec![start]);
    }

    #[test]
    fn integrate_records_every_point() {
        let traj = integrate(Method::Rk4, &linear, Point::new(0.0, 12.0), 0.1, 10).unwrap();
        assert_eq!(traj.len(), 11);
        let last = traj.last().unwrap();
        assert!((last.x - 1.0).abs() < 1e-12);
        let direct = solve_at(Method::Rk4, &linear, Point::new(0.0, 12.0), 1.0, 10).unwrap();
        assert!((last.y - direct).abs() < 1e-12);
    }

    #[test]
    fn integrate_rejects_bad_step() {
        assert_eq!(
            integrate(Method::Euler, &linear, Point::new(0.0, 1.0), 0.0, 3).unwrap_err(),
            OdeError::InvalidStepSize(0.0)
        );
        assert!(integrate(Method::Euler, &linear, Point::new(0.0, 1.0), -0.1, 3).is_err());
    }

    #[test]
    fn reruns_are_bit_identical() {
        let f = |x: f64, y: f64| (5.0 * y).cos() - x;
        let a = integrate(Method::Rk4, &f, Point::new(0.0, 7.0), 0.4, 30).unwrap();
        let b = integrate(Method::Rk4, &f, Point::new(0.0, 7.0), 0.4, 30).unwrap();
        for (p, q) in a.points.iter().zip(&b.points) {
            assert_eq!(p.y.to_bits(), q.y.to_bits());
        }
    }

    #[test]
    fn step_counts_absorb_float_noise() {
        assert_eq!(steps_for_span(0.0, 30.0, 0.1, StepRounding::Floor).unwrap(), 300);
        assert_eq!(steps_for_span(0.0, 60.0, 0.1, StepRounding::Floor).unwrap(), 600);
        assert_eq!(steps_for_span(0.5, 1.5, 0.01, StepRounding::Ceil).unwrap(), 100);
        assert_eq!(steps_for_span(0.0, 1.0, 0.3, StepRounding::Floor).unwrap(), 3);
        assert_eq!(steps_for_span(0.0, 1.0, 0.3, StepRounding::Ceil).unwrap(), 4);
        assert_eq!(steps_for_span(1.0, 1.0, 0.3, StepRounding::Ceil).unwrap(), 0);
    }

    #[test]
    fn euler_cooling_reaches_expected_temperatures() {
        let cooling = |_t: f64, temp: f64| 0.04 * (292.0 - temp);
        let start = Point::new(0.0, 364.0);
        let t30 = integrate_to(Method::Euler, &cooling, start, 30.0, 0.1, StepRounding::Floor)
            .unwrap()
            .last()
            .unwrap();
        let t60 = integrate_to(Method::Euler, &cooling, start, 60.0, 0.1, StepRounding::Floor)
            .unwrap()
            .last()
            .unwrap();
        assert!((t30.y - 313.6339).abs() < 1e-3, "T(30) = {}", t30.y);
        assert!((t60.y - 298.5003).abs() < 1e-3, "T(60) = {}", t60.y);
    }

    #[test]
    fn trajectory_extrema() {
        let traj = Trajectory {
            points: vec![
                Point::new(0.0, 1.0),
                Point::new(1.0, 3.0),
                Point::new(2.0, -2.0),
                Point::new(3.0, 3.0),
            ],
        };
        assert_eq!(traj.max_point(), Some(Point::new(1.0, 3.0)));
        assert_eq!(traj.min_point(), Some(Point::new(2.0, -2.0)));
        assert_eq!(Trajectory::<f64> { points: vec![] }.max_point(), None);
    }

    #[test]
    fn max_estimate_scan_finds_peak_of_parabola() {
        // y' = 1 - x, y(0) = 0 peaks at x = 1 with y = 0.5.
        let f = |x: f64, _y: f64| 1.0 - x;
        let settings = ExtremumScanSettings {
            scan_step: 0.01,
            steps: 50,
            ..ExtremumScanSettings::default()
        };
        let best = max_estimate_in_range(&f, Point::new(0.0, 0.0), 0.0, 2.0, settings).unwrap();
        assert!((best.x - 1.0).abs() < 1e-9, "x = {}", best.x);
        assert!((best.y - 0.5).abs() < 1e-9, "y = {}", best.y);
    }

    #[test]
    fn csv_export_has_header_and_rows() {
        let traj = integrate(Method::Euler, &linear, Point::new(0.0, 12.0), 0.5, 2).unwrap();
        let mut buf = Vec::new();
        traj.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "x,y");
        assert_eq!(lines[1], "0,12");
    }
}
