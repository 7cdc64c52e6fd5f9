//! The classic experiments, each producing the lines it prints and an optional table
//! that can be exported as CSV.

use crate::config::{Config, TrajectoryConfig};
use anyhow::{bail, Context, Result};
use log::info;
use odekit_core::asymptote::find_vertical_asymptote;
use odekit_core::characteristic::characteristic_roots;
use odekit_core::convergence::{converge, Convergence};
use odekit_core::oscillator::{frequency_sweep, OscillatorParams};
use odekit_core::target::find_x_for_target;
use odekit_core::trajectory::{integrate_to, solve_at, steps_for_span, Point, StepRounding};
use std::io::Write;

/// Scenario names with a one-line description, in the order `all` runs them.
pub const SCENARIOS: [(&str, &str); 9] = [
    ("cooling", "Euler's method for Newton cooling, T(30) and T(60)"),
    ("heun-convergence", "Improved Euler with step doubling until successive estimates agree"),
    ("asymptote", "Improved Euler search for a vertical asymptote"),
    ("target", "x where the solution reaches a target y"),
    ("rk4-point", "RK4 estimate at a single x"),
    ("rk4-max", "RK4 trajectory and its maximum"),
    ("rk4-trajectory", "RK4 trajectory table and its maximum"),
    ("characteristic", "Characteristic roots and general solution of a linear ODE"),
    ("oscillator", "Forced oscillator steady-state coefficients over a frequency sweep"),
];

/// Tabular data attached to a scenario run.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl Table {
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(|v| v.to_string()))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScenarioOutput {
    pub lines: Vec<String>,
    pub table: Option<Table>,
}

impl ScenarioOutput {
    fn line(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }
}

pub fn run_scenario(name: &str, config: &Config) -> Result<ScenarioOutput> {
    info!("Running scenario '{}'", name);
    match name {
        "cooling" => cooling(config),
        "heun-convergence" => convergence(config),
        "asymptote" => asymptote(config),
        "target" => target(config),
        "rk4-point" => rk4_point(config),
        "rk4-max" => trajectory(&config.rk4_max),
        "rk4-trajectory" => trajectory(&config.rk4_trajectory),
        "characteristic" => characteristic(config),
        "oscillator" => oscillator(config),
        other => bail!("Unknown scenario '{}'. Run `odekit list` for the available names.", other),
    }
}

fn cooling(config: &Config) -> Result<ScenarioOutput> {
    let cfg = &config.cooling;
    let ode = cfg.equation.compile()?;
    let start = Point::new(cfg.t0, cfg.temperature0);
    let mut out = ScenarioOutput::default();
    let mut rows = Vec::new();

    for &end in &cfg.end_times {
        let traj = integrate_to(cfg.method, &ode, start, end, cfg.h, StepRounding::Floor)
            .with_context(|| format!("Integration to t = {} failed", end))?;
        let last = traj.last().unwrap_or(start);
        out.line(format!(
            "Approximate temperature after {} minutes: {:.2} K",
            end, last.y
        ));
        rows.push(vec![end, last.y]);
    }
    out.table = Some(Table {
        headers: vec!["t".into(), "temperature".into()],
        rows,
    });
    Ok(out)
}

fn convergence(config: &Config) -> Result<ScenarioOutput> {
    let cfg = &config.convergence;
    let ode = cfg.equation.compile()?;
    let outcome = converge(&ode, Point::new(cfg.x0, cfg.y0), cfg.x_target, cfg.settings)?;

    let mut out = ScenarioOutput::default();
    out.line(format!("Initial values, x = {}, y = {}", cfg.x0, cfg.y0));
    for r in outcome.history() {
        out.line(format!(
            "Iteration {}: N = {}, y_new = {}, y_prev = {}, error = {}",
            r.iteration, r.steps, r.estimate, r.previous, r.difference
        ));
    }
    match &outcome {
        Convergence::Converged { value, .. } => out.line(format!("Tolerance reached, y = {}", value)),
        Convergence::Exhausted { value, .. } => out.line(format!(
            "Max number of iterations reached, returning last value, y = {}",
            value
        )),
    }
    out.table = Some(Table {
        headers: vec!["iteration".into(), "steps".into(), "estimate".into(), "difference".into()],
        rows: outcome
            .history()
            .iter()
            .map(|r| vec![r.iteration as f64, r.steps as f64, r.estimate, r.difference])
            .collect(),
    });
    Ok(out)
}

fn asymptote(config: &Config) -> Result<ScenarioOutput> {
    let cfg = &config.asymptote;
    let ode = cfg.equation.compile()?;
    let report = find_vertical_asymptote(&ode, Point::new(cfg.x0, cfg.y0), cfg.x_end, cfg.settings)?;

    let mut out = ScenarioOutput::default();
    match report.asymptote {
        Some(x) => {
            out.line(format!("Vertical asymptote detected at x = {}", x));
            out.line(format!("Number of steps taken: {}", report.steps));
        }
        None => out.line(format!(
            "No vertical asymptote detected within the interval [{}, {}].",
            cfg.x0, cfg.x_end
        )),
    }
    Ok(out)
}

fn target(config: &Config) -> Result<ScenarioOutput> {
    let cfg = &config.target;
    let ode = cfg.equation.compile()?;
    let found = find_x_for_target(
        &ode,
        Point::new(cfg.x0, cfg.y0),
        cfg.target_y,
        cfg.a,
        cfg.b,
        cfg.settings,
    )?;

    let mut out = ScenarioOutput::default();
    match found {
        Some(x) => out.line(format!(
            "The value of x where y(x) ≈ {} is approximately x = {:.4}",
            cfg.target_y, x
        )),
        None => out.line(format!(
            "y(x) does not reach {} on [{}, {}]",
            cfg.target_y, cfg.a, cfg.b
        )),
    }
    Ok(out)
}

fn rk4_point(config: &Config) -> Result<ScenarioOutput> {
    let cfg = &config.rk4_point;
    let ode = cfg.equation.compile()?;
    let steps = steps_for_span(cfg.x0, cfg.x_target, cfg.h, StepRounding::Floor)?;
    let x_reached = cfg.x0 + steps as f64 * cfg.h;
    let y = solve_at(cfg.method, &ode, Point::new(cfg.x0, cfg.y0), x_reached, steps)?;

    let mut out = ScenarioOutput::default();
    out.line(format!(
        "Approximation using {} at x = {}: y({}) = {:.6}",
        cfg.method.name().to_uppercase(),
        x_reached,
        x_reached,
        y
    ));
    Ok(out)
}

fn trajectory(cfg: &TrajectoryConfig) -> Result<ScenarioOutput> {
    let ode = cfg.equation.compile()?;
    let traj = integrate_to(cfg.method, &ode, cfg.start(), cfg.x_end, cfg.h, cfg.rounding)?;
    let Some(max) = traj.max_point() else {
        bail!("Trajectory is empty.");
    };
    let xd = cfg.x_decimals;

    let mut out = ScenarioOutput::default();
    if cfg.print_points {
        out.line(format!("Approximate Solution using {}:", cfg.method.name().to_uppercase()));
        for p in &traj.points {
            out.line(format!("x = {:.xd$}, y = {:.6}", p.x, p.y, xd = xd));
        }
        out.line("");
    }
    out.line(format!(
        "Maximum value of y over [{}, {}]: {:.6}",
        cfg.x0, cfg.x_end, max.y
    ));
    out.line(format!("Occurs at x = {:.xd$}", max.x, xd = xd));
    out.table = Some(Table {
        headers: vec!["x".into(), "y".into()],
        rows: traj.points.iter().map(|p| vec![p.x, p.y]).collect(),
    });
    Ok(out)
}

fn characteristic(config: &Config) -> Result<ScenarioOutput> {
    let cfg = &config.characteristic;
    let roots = characteristic_roots(&cfg.coefficients, cfg.settings)?;

    let mut out = ScenarioOutput::default();
    out.line(format!("Characteristic coefficients: {:?}", cfg.coefficients));
    for r in &roots.real {
        out.line(format!("Real root r = {} (multiplicity {})", r.re, r.multiplicity));
    }
    for r in &roots.complex {
        out.line(format!(
            "Complex pair r = {} ± {}i (multiplicity {})",
            r.re, r.im, r.multiplicity
        ));
    }
    out.line("");
    out.line("General Solution:");
    out.line(roots.general_solution());
    Ok(out)
}

fn oscillator(config: &Config) -> Result<ScenarioOutput> {
    let cfg = &config.oscillator;
    let mut out = ScenarioOutput::default();
    let mut rows = Vec::new();

    for &b in &cfg.dampings {
        let params = OscillatorParams { m: cfg.m, b, k: cfg.k };
        let sweep = frequency_sweep(params, cfg.omega_start, cfg.omega_end, cfg.samples)?;
        let skipped = cfg.samples - sweep.len();
        let peak = sweep
            .iter()
            .max_by(|p, q| p.a.abs().max(p.b.abs()).total_cmp(&q.a.abs().max(q.b.abs())));

        out.line(format!(
            "Damping b = {}: resonance at Ω = {}",
            b,
            params.natural_frequency()
        ));
        if let Some(p) = peak {
            out.line(format!(
                "  largest response at Ω = {:.4}: A = {:.6}, B = {:.6}",
                p.omega, p.a, p.b
            ));
        }
        if skipped > 0 {
            out.line(format!("  {} singular frequencies skipped", skipped));
        }
        rows.extend(sweep.iter().map(|s| vec![b, s.omega, s.a, s.b]));
    }
    out.table = Some(Table {
        headers: vec!["damping".into(), "omega".into(), "A".into(), "B".into()],
        rows,
    });
    Ok(out)
}
