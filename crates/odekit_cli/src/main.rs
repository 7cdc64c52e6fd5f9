use anyhow::{bail, Context, Result};
use log::LevelFilter;
use odekit_cli::logging::init_logging;
use odekit_cli::{run_scenario, Config, SCENARIOS};
use std::fs::File;
use std::path::PathBuf;

const USAGE: &str = "Usage: odekit <scenario|all|list> [--config FILE] [--csv FILE] [-v|--verbose] [-q|--quiet]";

#[derive(Debug, Default)]
struct Args {
    command: Option<String>,
    config: Option<PathBuf>,
    csv: Option<PathBuf>,
    verbose: bool,
    quiet: bool,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Args> {
    let mut args = Args::default();
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = raw.next().context("--config needs a file path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--csv" => {
                let path = raw.next().context("--csv needs a file path")?;
                args.csv = Some(PathBuf::from(path));
            }
            "-v" | "--verbose" => args.verbose = true,
            "-q" | "--quiet" => args.quiet = true,
            "-h" | "--help" => args.command = Some("help".to_string()),
            flag if flag.starts_with('-') => bail!("Unknown option '{}'\n{}", flag, USAGE),
            _ if args.command.is_some() => bail!("Unexpected argument '{}'\n{}", arg, USAGE),
            _ => args.command = Some(arg),
        }
    }
    Ok(args)
}

fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    let Some(command) = args.command.as_deref() else {
        bail!("{}", USAGE);
    };

    match command {
        "help" => {
            println!("{}", USAGE);
            return Ok(());
        }
        "list" => {
            for (name, description) in SCENARIOS {
                println!("{:<16} {}", name, description);
            }
            return Ok(());
        }
        _ => {}
    }

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let level = if args.quiet {
        LevelFilter::Error
    } else if args.verbose {
        LevelFilter::Debug
    } else {
        config.logging.level_filter()?
    };
    init_logging(level, config.logging.file.as_ref())?;

    let names: Vec<&str> = if command == "all" {
        if args.csv.is_some() {
            bail!("--csv applies to a single scenario");
        }
        SCENARIOS.iter().map(|(name, _)| *name).collect()
    } else {
        vec![command]
    };

    for (i, name) in names.iter().enumerate() {
        if names.len() > 1 {
            if i > 0 {
                println!();
            }
            println!("== {} ==", name);
        }
        let output = run_scenario(name, &config)?;
        for line in &output.lines {
            println!("{}", line);
        }

        if let Some(path) = &args.csv {
            let Some(table) = &output.table else {
                bail!("Scenario '{}' produces no table to export", name);
            };
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            table.write_csv(file)?;
            log::info!("Wrote {} rows to {}", table.rows.len(), path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn options_in_any_order() {
        let args = parse(&["--csv", "out.csv", "rk4-trajectory", "-v"]).unwrap();
        assert_eq!(args.command.as_deref(), Some("rk4-trajectory"));
        assert_eq!(args.csv, Some(PathBuf::from("out.csv")));
        assert!(args.verbose);
        assert!(!args.quiet);
    }

    #[test]
    fn missing_option_value_is_an_error() {
        assert!(parse(&["cooling", "--config"]).is_err());
    }

    #[test]
    fn unknown_flag_and_extra_positional_are_errors() {
        assert!(parse(&["cooling", "--plot"]).is_err());
        assert!(parse(&["cooling", "target"]).is_err());
    }
}
