use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use clap::{App, Arg, ArgMatches};
use serde::{Deserialize, Serialize};

use crate::error::{invalid, Result};
use crate::lattice;
use crate::simulation::RunSettings;

/// Run parameters. Loaded from an optional TOML file, then overridden by
/// command line options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cells: usize,
    pub density: f64,
    pub temperature: f64,
    pub cutoff: f64,
    pub dt: f64,
    pub equilibration_steps: usize,
    pub sampling_steps: usize,
    pub blocks: usize,
    pub rdf_bins: usize,
    pub seed: u64,
    /// 0 selects the serial kernel.
    pub threads: usize,
    pub stdout_step: Option<usize>,
    pub check_momentum: bool,
    #[serde(skip)]
    pub print_rdf: bool,
    #[serde(skip)]
    pub print_block_curve: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cells: 3,
            density: 0.8,
            temperature: 1.0,
            cutoff: 2.5,
            dt: 4e-3,
            equilibration_steps: 2500,
            sampling_steps: 2500,
            blocks: 10,
            rdf_bins: 50,
            seed: 0,
            threads: 0,
            stdout_step: None,
            check_momentum: false,
            print_rdf: false,
            print_block_curve: false,
        }
    }
}

fn app<'a, 'b>() -> App<'a, 'b> {
    App::new("Lennard-Jones molecular dynamics")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Equilibrates an FCC argon crystal with a rescaling thermostat, samples it in the NVE ensemble and reports block-averaged thermodynamics.")
        .arg(Arg::with_name("CONFIG")
            .short("c")
            .long("config")
            .help("TOML file with run parameters (command line options take precedence)")
            .takes_value(true))
        .arg(Arg::with_name("CELLS")
            .short("m")
            .long("cells")
            .help("FCC unit cells per box edge [default: 3]")
            .takes_value(true))
        .arg(Arg::with_name("DENSITY")
            .short("r")
            .long("density")
            .help("Number density [default: 0.8]")
            .takes_value(true))
        .arg(Arg::with_name("TEMP")
            .short("t")
            .long("temp")
            .help("Target temperature [default: 1.0]")
            .takes_value(true))
        .arg(Arg::with_name("CUTOFF")
            .long("cutoff")
            .help("Interaction cutoff radius, below half the box length [default: 2.5]")
            .takes_value(true))
        .arg(Arg::with_name("DT")
            .long("dt")
            .help("Size of the system timestep [default: 4e-3]")
            .takes_value(true))
        .arg(Arg::with_name("EQUIL")
            .short("e")
            .long("equil")
            .help("Thermostatted equilibration steps [default: 2500]")
            .takes_value(true))
        .arg(Arg::with_name("STEP")
            .short("s")
            .long("steps")
            .help("Sampling steps without thermostat [default: 2500]")
            .takes_value(true))
        .arg(Arg::with_name("BLOCKS")
            .short("b")
            .long("blocks")
            .help("Number of blocks for error estimates [default: 10]")
            .takes_value(true))
        .arg(Arg::with_name("BINS")
            .long("bins")
            .help("Radial distribution function bins [default: 50]")
            .takes_value(true))
        .arg(Arg::with_name("SEED")
            .long("seed")
            .help("Random seed for the initial velocities [default: 0]")
            .takes_value(true))
        .arg(Arg::with_name("THREADS")
            .short("j")
            .long("threads")
            .help("Worker threads for the force kernel, 0 for the deterministic serial kernel [default: 0]")
            .takes_value(true))
        .arg(Arg::with_name("IO")
            .short("i")
            .long("iostep")
            .help("Number of steps between progress messages")
            .takes_value(true))
        .arg(Arg::with_name("MOMENTUM")
            .long("check-momentum")
            .help("Report total momentum before and after each run"))
        .arg(Arg::with_name("RDF")
            .long("rdf")
            .help("Print g(r) of the final configuration"))
        .arg(Arg::with_name("CURVE")
            .long("block-curve")
            .help("Print the block error of the temperature against block length"))
}

impl Config {
    /// Initialize configuration from command line arguments, exiting on `--help` or bad syntax.
    pub fn new() -> Result<Config> {
        Config::from_matches(&app().get_matches())
    }

    pub fn from_args<I, T>(args: I) -> Result<Config>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        match app().get_matches_from_safe(args) {
            Ok(matches) => Config::from_matches(&matches),
            Err(e) => invalid(e.message),
        }
    }

    fn from_matches(matches: &ArgMatches) -> Result<Config> {
        let mut config: Config = match matches.value_of("CONFIG") {
            Some(path) => {
                // confy writes defaults to a missing path
                if !Path::new(path).is_file() {
                    return invalid(format!("config file '{}' not found", path));
                }
                confy::load_path(path)?
            }
            None => Config::default(),
        };

        override_with(&mut config.cells, matches, "CELLS")?;
        override_with(&mut config.density, matches, "DENSITY")?;
        override_with(&mut config.temperature, matches, "TEMP")?;
        override_with(&mut config.cutoff, matches, "CUTOFF")?;
        override_with(&mut config.dt, matches, "DT")?;
        override_with(&mut config.equilibration_steps, matches, "EQUIL")?;
        override_with(&mut config.sampling_steps, matches, "STEP")?;
        override_with(&mut config.blocks, matches, "BLOCKS")?;
        override_with(&mut config.rdf_bins, matches, "BINS")?;
        override_with(&mut config.seed, matches, "SEED")?;
        override_with(&mut config.threads, matches, "THREADS")?;
        if let Some(io) = conv_match::<usize>(matches, "IO")? {
            config.stdout_step = Some(io);
        }
        config.check_momentum |= matches.is_present("MOMENTUM");
        config.print_rdf = matches.is_present("RDF");
        config.print_block_curve = matches.is_present("CURVE");

        Ok(config)
    }

    pub fn num_atoms(&self) -> usize {
        4 * self.cells * self.cells * self.cells
    }

    pub fn box_length(&self) -> f64 {
        lattice::box_length(self.cells, self.density)
    }

    /// Check every precondition before anything is run.
    pub fn validate(&self) -> Result<()> {
        if self.cells == 0 {
            return invalid("number of unit cells must be positive");
        }
        if !(self.density > 0.0) || !self.density.is_finite() {
            return invalid(format!("density must be positive, found {}", self.density));
        }
        if !(self.temperature > 0.0) || !self.temperature.is_finite() {
            return invalid(format!("temperature must be positive, found {}", self.temperature));
        }
        if !(self.cutoff > 0.0) {
            return invalid(format!("cutoff must be positive, found {}", self.cutoff));
        }
        if !(self.dt > 0.0) || !self.dt.is_finite() {
            return invalid(format!("timestep must be positive, found {}", self.dt));
        }
        let half_box = 0.5 * self.box_length();
        if self.cutoff >= half_box {
            return invalid(format!(
                "cutoff {} must be smaller than half the box length {:.5}",
                self.cutoff, half_box
            ));
        }
        if self.sampling_steps == 0 {
            return invalid("sampling run needs at least one step");
        }
        if self.blocks < 1 || self.blocks > self.sampling_steps {
            return invalid(format!(
                "block count {} must lie in [1, {}]",
                self.blocks, self.sampling_steps
            ));
        }
        if self.rdf_bins == 0 {
            return invalid("rdf needs at least one bin");
        }
        if self.stdout_step == Some(0) {
            return invalid("progress interval must be positive");
        }
        Ok(())
    }

    pub fn equilibration(&self) -> RunSettings {
        RunSettings {
            steps: self.equilibration_steps,
            dt: self.dt,
            thermostat: Some(self.temperature),
            check_momentum: self.check_momentum,
            stdout_step: self.stdout_step,
        }
    }

    pub fn sampling(&self) -> RunSettings {
        RunSettings { steps: self.sampling_steps, thermostat: None, ..self.equilibration() }
    }

    // format run label with configuration data
    pub fn format_file_suffix(&self) -> String {
        format!("m{}_rho{}_t{}_rc{}_dt{}_eq{}_steps{}_seed{}",
                self.cells, self.density, self.temperature, self.cutoff,
                self.dt, self.equilibration_steps, self.sampling_steps, self.seed)
    }
}

// convert matches to corresponding generic types
fn conv_match<T>(matches: &ArgMatches, tag: &str) -> Result<Option<T>>
    where T: FromStr, <T as FromStr>::Err: Display {
    match matches.value_of(tag) {
        None => Ok(None),
        Some(raw) => match T::from_str(raw) {
            Ok(v) => Ok(Some(v)),
            Err(e) => invalid(format!("could not parse {} value '{}': {}", tag, raw, e)),
        },
    }
}

fn override_with<T>(field: &mut T, matches: &ArgMatches, tag: &str) -> Result<()>
    where T: FromStr, <T as FromStr>::Err: Display {
    if let Some(v) = conv_match(matches, tag)? {
        *field = v;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;
    use std::fs;

    #[test]
    fn defaults_describe_reference_state_point() {
        let config = Config::from_args(vec!["md-lj"]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.num_atoms(), 108);
        assert!(config.validate().is_ok());
        assert!(config.equilibration().thermostat.is_some());
        assert!(config.sampling().thermostat.is_none());
    }

    #[test]
    fn command_line_overrides() {
        let config = Config::from_args(vec![
            "md-lj", "-m", "4", "--density", "0.9", "--dt", "0.002", "-j", "2", "--iostep", "100",
            "--rdf",
        ])
        .unwrap();
        assert_eq!(config.cells, 4);
        assert_eq!(config.density, 0.9);
        assert_eq!(config.dt, 0.002);
        assert_eq!(config.threads, 2);
        assert_eq!(config.stdout_step, Some(100));
        assert!(config.print_rdf);
        assert!(!config.print_block_curve);
    }

    #[test]
    fn unparsable_value_is_an_error() {
        assert!(Config::from_args(vec!["md-lj", "--density", "dense"]).is_err());
    }

    #[test]
    fn cutoff_must_fit_in_half_box() {
        let config = Config { cells: 2, ..Config::default() };
        assert!(config.validate().is_err());
        let config = Config { cells: 2, cutoff: 1.5, ..Config::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn preconditions() {
        assert!(Config { temperature: 0.0, ..Config::default() }.validate().is_err());
        assert!(Config { density: -0.8, ..Config::default() }.validate().is_err());
        assert!(Config { cells: 0, ..Config::default() }.validate().is_err());
        assert!(Config { blocks: 0, ..Config::default() }.validate().is_err());
        assert!(Config { blocks: 3000, ..Config::default() }.validate().is_err());
        assert!(Config { stdout_step: Some(0), ..Config::default() }.validate().is_err());
    }

    #[test]
    fn file_values_then_command_line() {
        let path = std::env::temp_dir().join(format!("md-lj-config-{}.toml", std::process::id()));
        fs::write(&path, "cells = 5\ndensity = 0.7\nseed = 99\n").unwrap();
        let path_str = path.to_str().unwrap().to_string();

        let config = Config::from_args(vec!["md-lj", "-c", &path_str, "--seed", "3"]).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(config.cells, 5);
        assert_eq!(config.density, 0.7);
        assert_eq!(config.seed, 3);
        assert_eq!(config.temperature, 1.0);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let dir = std::env::temp_dir().join(format!("md-lj-missing-{}", std::process::id()));
        let path = dir.join("typo.toml");
        let path_str = path.to_str().unwrap().to_string();

        let result = Config::from_args(vec!["md-lj", "--config", &path_str]);
        assert!(matches!(result, Err(SimError::InvalidConfiguration(_))));
        assert!(!path.exists());
        assert!(!dir.exists());
    }
}
