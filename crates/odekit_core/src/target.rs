use crate::error::{ensure_domain, ensure_positive, OdeError};
use crate::solvers::Method;
use crate::traits::ScalarOde;
use crate::trajectory::{solve_at, Point};
use log::{debug, info};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStrategy {
    /// Every grid point `a + i * scan_step` is tested against `tolerance` in y.
    Linear,
    /// Sign changes on a coarse grid, then bisection down to `tolerance` in x.
    #[default]
    Bracketed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetScanSettings {
    pub method: Method,
    /// Steps used for every estimate of `y(x)`.
    pub steps: usize,
    pub scan_step: f64,
    pub bracket_step: f64,
    pub tolerance: f64,
    pub strategy: ScanStrategy,
}

impl Default for TargetScanSettings {
    fn default() -> Self {
        Self {
            method: Method::ImprovedEuler,
            steps: 1000,
            scan_step: 1e-4,
            bracket_step: 0.01,
            tolerance: 1e-4,
            strategy: ScanStrategy::Bracketed,
        }
    }
}

/// Finds the first `x` in `[a, b]` where the fixed-step estimate of `y(x)` reaches `target_y`.
/// Returns `Ok(None)` when the domain holds no crossing.
pub fn find_x_for_target(
    ode: &impl ScalarOde<f64>,
    start: Point,
    target_y: f64,
    a: f64,
    b: f64,
    settings: TargetScanSettings,
) -> Result<Option<f64>, OdeError> {
    ensure_domain(a, b)?;
    ensure_positive("tolerance", settings.tolerance)?;
    if settings.steps == 0 {
        return Err(OdeError::InvalidIterations { name: "steps" });
    }

    let residual = |x: f64| -> Result<f64, OdeError> {
        Ok(solve_at(settings.method, ode, start, x, settings.steps)? - target_y)
    };

    let found = match settings.strategy {
        ScanStrategy::Linear => {
            ensure_positive("scan_step", settings.scan_step)?;
            linear_scan(&residual, a, b, settings)?
        }
        ScanStrategy::Bracketed => {
            ensure_positive("bracket_step", settings.bracket_step)?;
            bracketed_scan(&residual, a, b, settings)?
        }
    };
    match found {
        Some(x) => info!("y = {} reached at x = {}", target_y, x),
        None => info!("y = {} not reached on [{}, {}]", target_y, a, b),
    }
    Ok(found)
}

fn linear_scan(
    residual: &impl Fn(f64) -> Result<f64, OdeError>,
    a: f64,
    b: f64,
    settings: TargetScanSettings,
) -> Result<Option<f64>, OdeError> {
    let mut i = 0usize;
    loop {
        let x = a + i as f64 * settings.scan_step;
        if x >= b {
            return Ok(None);
        }
        if residual(x)?.abs() < settings.tolerance {
            return Ok(Some(x));
        }
        i += 1;
    }
}

fn bracketed_scan(
    residual: &impl Fn(f64) -> Result<f64, OdeError>,
    a: f64,
    b: f64,
    settings: TargetScanSettings,
) -> Result<Option<f64>, OdeError> {
    let cells = ((b - a) / settings.bracket_step).ceil().max(1.0) as usize;
    let mut lo = a;
    let mut g_lo = residual(a)?;

    for i in 1..=cells {
        if g_lo == 0.0 {
            return Ok(Some(lo));
        }
        let hi = (a + i as f64 * settings.bracket_step).min(b);
        let g_hi = residual(hi)?;
        if (g_lo < 0.0) != (g_hi < 0.0) {
            debug!("Sign change bracketed in [{}, {}]", lo, hi);
            return bisect(residual, lo, g_lo, hi, settings.tolerance).map(Some);
        }
        lo = hi;
        g_lo = g_hi;
    }
    Ok(if g_lo == 0.0 { Some(lo) } else { None })
}

fn bisect(
    residual: &impl Fn(f64) -> Result<f64, OdeError>,
    mut lo: f64,
    mut g_lo: f64,
    mut hi: f64,
    tolerance: f64,
) -> Result<f64, OdeError> {
    while hi - lo >= tolerance {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        let g_mid = residual(mid)?;
        if g_mid == 0.0 {
            return Ok(mid);
        }
        if (g_mid < 0.0) == (g_lo < 0.0) {
            lo = mid;
            g_lo = g_mid;
        } else {
            hi = mid;
        }
    }
    Ok(0.5 * (lo + hi))
}
