#![allow(dead_code)]

use lazy_static::lazy_static;
use sepflux::{
    cli,
    config::SolverConfig,
    io::Verbosity,
    plasma::solar_wind::SteadySolarWind,
    simulation::{self, RunConfig, SimulationOutput},
};
use std::{ffi::OsString, io::Write, path::Path};
use tempfile::NamedTempFile;

/// Parameters of a small simulation exercising every transport operator.
pub const SMALL_PARAMS: &str = "\
# Grid
numNodesPerStream = 6
numRowsPerFace = 2
numColumnsPerFace = 2
numEnergySteps = 5
numMuSteps = 4
rScale = 0.05
eMin = 1.0
eMax = 100.0

mass = [1.0, 4.0]
charge = [1.0, 2.0]

simStartTime = 0.0
simStopTime = 0.1
tDel = 0.05
numEpSteps = 2

useShellDiffusion = 1
useParallelDiffusion = 1
useDrift = 1
useAdiabaticChange = 1
useAdiabaticFocus = 1
adiabaticChangeAlg = 2
adiabaticFocusAlg = 1
kperxkpar = 0.05
lamo = 0.2

useEPBoundary = 1
useBoundaryFunction = 1
boundaryFunctionInitDomain = 1
checkSeedPopulation = 1
dumpFreq = 1
";

lazy_static! {
    static ref COMMAND: clap::Command<'static> = cli::build::build().no_binary_name(true);
}

pub fn run<I, T>(args: I)
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    cli::run::run_with_args(COMMAND.clone().get_matches_from(args));
}

/// Writes the given text to a temporary parameter file.
pub fn param_file(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Could not create temporary file");
    file.write_all(text.as_bytes())
        .expect("Could not write temporary file");
    file
}

pub fn read_config(text: &str) -> SolverConfig {
    let file = param_file(text);
    SolverConfig::from_param_file(file.path()).expect("Invalid parameters")
}

/// Runs the given configuration in a steady solar wind.
pub fn simulate(
    config: &SolverConfig,
    num_background_steps: usize,
    num_workers: usize,
) -> SimulationOutput {
    let run_config = RunConfig {
        num_background_steps,
        num_workers,
    };
    let wind = SteadySolarWind::new(config);
    simulation::run_simulation(config, &run_config, &wind, &Verbosity::Quiet)
        .expect("Simulation failed")
}

pub fn assert_file_exists<P: AsRef<Path>>(file_path: P) {
    let file_path = file_path.as_ref();
    assert!(
        file_path.exists(),
        "File {} does not exist",
        file_path.to_string_lossy()
    );
}
