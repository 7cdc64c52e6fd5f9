//! TOML configuration. Every table and field is optional; missing values fall back to
//! the parameters of the classic experiments.

use crate::logging::LoggingConfig;
use anyhow::{Context, Result};
use odekit_core::asymptote::AsymptoteSettings;
use odekit_core::characteristic::RootSettings;
use odekit_core::convergence::DoublingSettings;
use odekit_core::equation_engine::CompiledOde;
use odekit_core::target::TargetScanSettings;
use odekit_core::trajectory::{Point, StepRounding};
use odekit_core::Method;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A right-hand side `dy/dx = rhs(x, y)` with named parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equation {
    pub rhs: String,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl Equation {
    pub fn new(rhs: &str) -> Self {
        Self {
            rhs: rhs.to_string(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: f64) -> Self {
        self.params.insert(name.to_string(), value);
        self
    }

    pub fn compile(&self) -> Result<CompiledOde<f64>> {
        let names: Vec<String> = self.params.keys().cloned().collect();
        let values: Vec<f64> = self.params.values().copied().collect();
        CompiledOde::new(&self.rhs, &names, values)
            .with_context(|| format!("Failed to compile right-hand side '{}'", self.rhs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoolingConfig {
    pub equation: Equation,
    pub t0: f64,
    pub temperature0: f64,
    pub h: f64,
    pub end_times: Vec<f64>,
    pub method: Method,
}

impl Default for CoolingConfig {
    fn default() -> Self {
        Self {
            equation: Equation::new("K*(M - y)")
                .with_param("K", 0.04)
                .with_param("M", 292.0),
            t0: 0.0,
            temperature0: 364.0,
            h: 0.1,
            end_times: vec![30.0, 60.0],
            method: Method::Euler,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    pub equation: Equation,
    pub x0: f64,
    pub y0: f64,
    pub x_target: f64,
    pub settings: DoublingSettings,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            equation: Equation::new("x + 3 - y"),
            x0: 0.0,
            y0: 12.0,
            x_target: 1.0,
            settings: DoublingSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsymptoteConfig {
    pub equation: Equation,
    pub x0: f64,
    pub y0: f64,
    pub x_end: f64,
    pub settings: AsymptoteSettings,
}

impl Default for AsymptoteConfig {
    fn default() -> Self {
        Self {
            equation: Equation::new("x^3*y^2 - y/x"),
            x0: 0.9,
            y0: 3.2,
            x_end: 1.5,
            settings: AsymptoteSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub equation: Equation,
    pub x0: f64,
    pub y0: f64,
    pub target_y: f64,
    pub a: f64,
    pub b: f64,
    pub settings: TargetScanSettings,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            equation: Equation::new("(x + y + 1)^2"),
            x0: 0.0,
            y0: -1.0,
            target_y: 0.0,
            a: 0.0,
            b: 1.4,
            settings: TargetScanSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointEstimateConfig {
    pub equation: Equation,
    pub x0: f64,
    pub y0: f64,
    pub h: f64,
    pub x_target: f64,
    pub method: Method,
}

impl Default for PointEstimateConfig {
    fn default() -> Self {
        Self {
            equation: Equation::new("x + 3 - y"),
            x0: 0.0,
            y0: 12.0,
            h: 0.2,
            x_target: 1.0,
            method: Method::Rk4,
        }
    }
}

/// A recorded trajectory and its maximum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryConfig {
    pub equation: Equation,
    pub x0: f64,
    pub y0: f64,
    pub h: f64,
    pub x_end: f64,
    pub rounding: StepRounding,
    pub method: Method,
    /// Print every point, not only the maximum.
    pub print_points: bool,
    /// Decimals used for x in the printed table.
    pub x_decimals: usize,
}

impl TrajectoryConfig {
    pub fn start(&self) -> Point {
        Point::new(self.x0, self.y0)
    }

    /// `y' = 1.8 / x^4 - y^2` on `[0.5, 1.5]`.
    pub fn rk4_max() -> Self {
        Self {
            equation: Equation::new("1.8 / x^4 - y^2"),
            x0: 0.5,
            y0: -1.0,
            h: 0.01,
            x_end: 1.5,
            rounding: StepRounding::Ceil,
            method: Method::Rk4,
            print_points: false,
            x_decimals: 2,
        }
    }

    /// `y' = cos(5y) - x` on `[0, 12]`.
    pub fn rk4_trajectory() -> Self {
        Self {
            equation: Equation::new("cos(5*y) - x"),
            x0: 0.0,
            y0: 7.0,
            h: 0.4,
            x_end: 12.0,
            rounding: StepRounding::Floor,
            method: Method::Rk4,
            print_points: true,
            x_decimals: 1,
        }
    }
}

/// Partial `TrajectoryConfig`; the two trajectory scenarios start from different bases.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TrajectoryOverrides {
    equation: Option<Equation>,
    x0: Option<f64>,
    y0: Option<f64>,
    h: Option<f64>,
    x_end: Option<f64>,
    rounding: Option<StepRounding>,
    method: Option<Method>,
    print_points: Option<bool>,
    x_decimals: Option<usize>,
}

impl TrajectoryOverrides {
    fn apply(self, mut base: TrajectoryConfig) -> TrajectoryConfig {
        if let Some(v) = self.equation {
            base.equation = v;
        }
        base.x0 = self.x0.unwrap_or(base.x0);
        base.y0 = self.y0.unwrap_or(base.y0);
        base.h = self.h.unwrap_or(base.h);
        base.x_end = self.x_end.unwrap_or(base.x_end);
        base.rounding = self.rounding.unwrap_or(base.rounding);
        base.method = self.method.unwrap_or(base.method);
        base.print_points = self.print_points.unwrap_or(base.print_points);
        base.x_decimals = self.x_decimals.unwrap_or(base.x_decimals);
        base
    }
}

fn rk4_max_table<'de, D: Deserializer<'de>>(d: D) -> Result<TrajectoryConfig, D::Error> {
    Ok(TrajectoryOverrides::deserialize(d)?.apply(TrajectoryConfig::rk4_max()))
}

fn rk4_trajectory_table<'de, D: Deserializer<'de>>(d: D) -> Result<TrajectoryConfig, D::Error> {
    Ok(TrajectoryOverrides::deserialize(d)?.apply(TrajectoryConfig::rk4_trajectory()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacteristicConfig {
    /// Highest order first.
    pub coefficients: Vec<f64>,
    pub settings: RootSettings,
}

impl Default for CharacteristicConfig {
    fn default() -> Self {
        Self {
            coefficients: vec![1.0, 3.0, -2.0, -4.0, 0.5],
            settings: RootSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscillatorConfig {
    pub m: f64,
    pub k: f64,
    /// One sweep per damping coefficient.
    pub dampings: Vec<f64>,
    pub omega_start: f64,
    pub omega_end: f64,
    pub samples: usize,
}

impl Default for OscillatorConfig {
    fn default() -> Self {
        Self {
            m: 1.0,
            k: 25.0,
            dampings: vec![0.1, 0.0],
            omega_start: 4.0,
            omega_end: 6.0,
            samples: 400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub cooling: CoolingConfig,
    pub convergence: ConvergenceConfig,
    pub asymptote: AsymptoteConfig,
    pub target: TargetConfig,
    pub rk4_point: PointEstimateConfig,
    #[serde(deserialize_with = "rk4_max_table")]
    pub rk4_max: TrajectoryConfig,
    #[serde(deserialize_with = "rk4_trajectory_table")]
    pub rk4_trajectory: TrajectoryConfig,
    pub characteristic: CharacteristicConfig,
    pub oscillator: OscillatorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            cooling: CoolingConfig::default(),
            convergence: ConvergenceConfig::default(),
            asymptote: AsymptoteConfig::default(),
            target: TargetConfig::default(),
            rk4_point: PointEstimateConfig::default(),
            rk4_max: TrajectoryConfig::rk4_max(),
            rk4_trajectory: TrajectoryConfig::rk4_trajectory(),
            characteristic: CharacteristicConfig::default(),
            oscillator: OscillatorConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("In {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odekit_core::ScalarOde;

    #[test]
    fn empty_file_gives_classic_parameters() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.asymptote.x0, 0.9);
        assert_eq!(cfg.asymptote.settings.threshold, 1e6);
        assert_eq!(cfg.rk4_max.x0, 0.5);
        assert_eq!(cfg.rk4_trajectory.y0, 7.0);
        assert_eq!(cfg.cooling.end_times, vec![30.0, 60.0]);
    }

    #[test]
    fn trajectory_tables_override_their_own_base() {
        let cfg = Config::from_toml_str("[rk4_max]\nh = 0.02\n\n[rk4_trajectory]\nprint_points = false").unwrap();
        assert_eq!(cfg.rk4_max.h, 0.02);
        assert_eq!(cfg.rk4_max.equation.rhs, "1.8 / x^4 - y^2");
        assert_eq!(cfg.rk4_max.rounding, StepRounding::Ceil);
        assert!(!cfg.rk4_trajectory.print_points);
        assert_eq!(cfg.rk4_trajectory.x_end, 12.0);
        assert!(Config::from_toml_str("[rk4_max]\nstep = 0.1").is_err());
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let cfg = Config::from_toml_str(
            r#"
            [asymptote]
            x_end = 2.0

            [asymptote.settings]
            method = "rk4"

            [cooling.equation]
            rhs = "K*(M - y)"
            params = { K = 0.05, M = 300.0 }
            "#,
        )
        .unwrap();
        assert_eq!(cfg.asymptote.x_end, 2.0);
        assert_eq!(cfg.asymptote.settings.method, Method::Rk4);
        assert_eq!(cfg.asymptote.settings.h, 0.01);
        assert_eq!(cfg.asymptote.equation.rhs, "x^3*y^2 - y/x");
        assert_eq!(cfg.cooling.equation.params["K"], 0.05);
    }

    #[test]
    fn equation_compiles_with_params() {
        let ode = CoolingConfig::default().equation.compile().unwrap();
        assert!((ode.slope(0.0, 364.0) + 2.88).abs() < 1e-12);
        assert!(Equation::new("K * y").compile().is_err());
    }

    #[test]
    fn rejects_unknown_method() {
        assert!(Config::from_toml_str("[rk4_point]\nmethod = \"tsit5\"").is_err());
    }
}
