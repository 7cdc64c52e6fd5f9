//! Console driver for the odekit kernel: named scenarios reproducing the classic
//! one-shot experiments, with parameters loaded from an optional TOML file.

pub mod config;
pub mod logging;
pub mod scenarios;

pub use config::Config;
pub use scenarios::{run_scenario, ScenarioOutput, Table, SCENARIOS};
