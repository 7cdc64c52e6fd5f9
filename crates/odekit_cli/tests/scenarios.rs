use odekit_cli::{run_scenario, Config};
use std::io::Write;

fn lines(name: &str, config: &Config) -> Vec<String> {
    run_scenario(name, config).unwrap().lines
}

#[test]
fn cooling_reports_both_times() {
    let out = lines("cooling", &Config::default());
    assert_eq!(out[0], "Approximate temperature after 30 minutes: 313.63 K");
    assert!(out[1].starts_with("Approximate temperature after 60 minutes:"));
}

#[test]
fn heun_convergence_reaches_tolerance() {
    let out = lines("heun-convergence", &Config::default());
    let last = out.last().unwrap();
    assert!(last.starts_with("Tolerance reached, y = "), "{}", last);
    let y: f64 = last.trim_start_matches("Tolerance reached, y = ").parse().unwrap();
    let exact = 3.0 + 10.0 * (-1.0f64).exp();
    assert!((y - exact).abs() < 1e-5);
}

#[test]
fn asymptote_matches_classic_experiment() {
    let out = lines("asymptote", &Config::default());
    assert_eq!(out[0], "Vertical asymptote detected at x = 1.22");
    assert_eq!(out[1], "Number of steps taken: 33");
}

#[test]
fn target_crossing_is_printed_to_four_decimals() {
    let out = lines("target", &Config::default());
    assert_eq!(out[0], "The value of x where y(x) ≈ 0 is approximately x = 1.1323");
}

#[test]
fn rk4_max_reports_peak() {
    let out = run_scenario("rk4-max", &Config::default()).unwrap();
    assert_eq!(out.lines[0], "Maximum value of y over [0.5, 1.5]: 2.004322");
    assert_eq!(out.lines[1], "Occurs at x = 0.82");
    let table = out.table.unwrap();
    assert_eq!(table.rows.len(), 101);
}

#[test]
fn rk4_trajectory_lists_every_point() {
    let out = lines("rk4-trajectory", &Config::default());
    // header, 31 points (12 / 0.4 = 30 steps), blank line, max, location
    assert_eq!(out.len(), 1 + 31 + 1 + 2);
    assert_eq!(out[1], "x = 0.0, y = 7.000000");
}

#[test]
fn characteristic_prints_general_solution() {
    let mut config = Config::default();
    config.characteristic.coefficients = vec![1.0, 9.0, 0.0, -108.0];
    let out = lines("characteristic", &config);
    let solution = out.last().unwrap();
    assert!(solution.starts_with("y = "));
    assert!(solution.contains("exp(3*x)"), "{}", solution);
}

#[test]
fn config_file_overrides_scenario_parameters() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[logging]\nlevel = \"info\"\n\n[cooling]\nend_times = [10.0]\nmethod = \"rk4\"\n"
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.logging.level, "info");
    let out = lines("cooling", &config);
    assert_eq!(out.len(), 1);
    assert!(out[0].starts_with("Approximate temperature after 10 minutes:"));
    // RK4 is near exact for linear cooling: 292 + 72 e^{-0.4}
    let expected = format!("{:.2}", 292.0 + 72.0 * (-0.4f64).exp());
    assert!(out[0].contains(&expected), "{}", out[0]);
}

#[test]
fn malformed_config_reports_its_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[target.settings]\nstrategy = \"sideways\"").unwrap();
    let err = Config::load(file.path()).unwrap_err();
    assert!(format!("{:#}", err).contains(&file.path().display().to_string()));
}
