//! Command line interface for running transport simulations.

use super::utils;
use crate::{
    config::SolverConfig,
    exit_on_error,
    plasma::solar_wind::SteadySolarWind,
    simulation::{self, RunConfig},
};
use clap::{Arg, ArgMatches, Command};

/// Creates a subcommand for running a simulation.
pub fn create_run_subcommand() -> Command<'static> {
    Command::new("run")
        .about("Run a transport simulation in a steady solar wind")
        .long_about(
            "Run a transport simulation in a steady solar wind.\n\
             The streams are distributed over the given number of in-process workers.",
        )
        .arg(
            Arg::new("param-file")
                .value_name("PARAM_FILE")
                .help("Path to the parameter file describing the simulation")
                .required(true)
                .takes_value(true),
        )
        .arg(
            Arg::new("steps")
                .long("steps")
                .require_equals(true)
                .value_name("NUMBER")
                .help(
                    "Number of background updates to perform\n\
                     [default: enough to reach simStopTime]",
                )
                .takes_value(true),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .require_equals(true)
                .value_name("NUMBER")
                .help("Number of workers to distribute the streams over")
                .takes_value(true)
                .default_value("1"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .require_equals(true)
                .value_name("OUTPUT_FILE")
                .help("Path of JSON file where the step reports should be saved")
                .takes_value(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print status messages"),
        )
        .arg(
            Arg::new("progress")
                .long("progress")
                .help("Show a progress bar (overrides --verbose)"),
        )
}

/// Runs the actions for the `run` subcommand using the given arguments.
pub fn run_run_subcommand(arguments: &ArgMatches) {
    let param_file_path = arguments
        .value_of("param-file")
        .expect("No value for required argument");

    let config = exit_on_error!(
        SolverConfig::from_param_file(param_file_path),
        "Error: Invalid configuration in {0}: {1}",
        param_file_path
    );

    let mut run_config = RunConfig::covering(&config);
    if let Some(num_background_steps) =
        utils::get_value_from_parseable_argument(arguments, "steps")
    {
        run_config.num_background_steps = num_background_steps;
    }
    if let Some(num_workers) = utils::get_value_from_argument_with_min(arguments, "workers", 1) {
        run_config.num_workers = num_workers;
    }

    let verbosity = utils::parse_verbosity(arguments, true);
    let wind = SteadySolarWind::new(&config);

    let output = exit_on_error!(
        simulation::run_simulation(&config, &run_config, &wind, &verbosity),
        "Error: Simulation failed: {}"
    );

    if verbosity.print_messages() {
        let total_leakage = output.reports.iter().fold((0.0, 0.0), |(left, right), report| {
            (
                left + report.leakage.leaving_left,
                right + report.leakage.leaving_right,
            )
        });
        println!(
            "Completed {} transport steps, total leakage left {:.4e}, right {:.4e}",
            output.reports.len(),
            total_leakage.0,
            total_leakage.1
        );
    }

    if let Some(output_path) = arguments.value_of("output") {
        write_reports(&output.reports, output_path);
    }
}

#[cfg(feature = "json")]
fn write_reports(reports: &[crate::transport::driver::StepReport], output_path: &str) {
    exit_on_error!(
        crate::io::utils::save_data_as_json(output_path, &reports),
        "Error: Could not write step reports to {0}: {1}",
        output_path
    );
}

#[cfg(not(feature = "json"))]
fn write_reports(_reports: &[crate::transport::driver::StepReport], _output_path: &str) {
    crate::exit_with_error!("Error: Writing step reports requires the json feature");
}
