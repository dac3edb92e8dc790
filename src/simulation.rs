//! Running the transport engine over a sequence of background updates.

use crate::{
    comm::{run_workers, Communicator, SerialCommunicator},
    config::SolverConfig,
    error::TransportError,
    io::Verbosity,
    plasma::BackgroundFlow,
    transport::{
        driver::{StepReport, TransportEngine},
        fep,
    },
};
use ndarray::Array4;

/// Result of a simulation run.
#[derive(Clone, Debug)]
pub struct SimulationOutput {
    /// Report of every transport step.
    pub reports: Vec<StepReport>,
    /// Final distribution of every stream, ordered by stream index.
    pub distributions: Vec<Array4<fep>>,
}

/// Parameters controlling the extent of a simulation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    /// Number of background updates to perform.
    pub num_background_steps: usize,
    /// Number of in-process workers to distribute the streams over.
    pub num_workers: usize,
}

impl RunConfig {
    /// Creates a run configuration covering the simulated time interval of
    /// the given solver configuration with a single worker.
    pub fn covering(config: &SolverConfig) -> Self {
        let duration = config.time.sim_stop_time - config.time.sim_start_time;
        Self {
            num_background_steps: (duration / config.time.t_del).ceil().max(0.0) as usize,
            num_workers: 1,
        }
    }
}

/// Output of a single worker.
struct WorkerOutput {
    reports: Vec<StepReport>,
    distributions: Vec<(usize, Array4<fep>)>,
}

/// Runs the simulation described by the given configurations, with the
/// background plasma given by `flow`.
///
/// The reports are the same on every worker, so only those of the first
/// worker are kept.
pub fn run_simulation<B>(
    config: &SolverConfig,
    run_config: &RunConfig,
    flow: &B,
    verbosity: &Verbosity,
) -> Result<SimulationOutput, TransportError>
where
    B: BackgroundFlow + ?Sized,
{
    let outputs = if run_config.num_workers <= 1 {
        vec![run_worker(&SerialCommunicator, config, run_config, flow, verbosity)]
    } else {
        run_workers(run_config.num_workers, |comm| {
            run_worker(&comm, config, run_config, flow, verbosity)
        })
    };

    let mut reports = None;
    let mut distributions = Vec::new();
    for output in outputs {
        let output = output?;
        if reports.is_none() {
            reports = Some(output.reports);
        }
        distributions.extend(output.distributions);
    }
    distributions.sort_by_key(|(stream, _)| *stream);

    Ok(SimulationOutput {
        reports: reports.unwrap_or_default(),
        distributions: distributions
            .into_iter()
            .map(|(_, distribution)| distribution)
            .collect(),
    })
}

fn run_worker<C, B>(
    comm: &C,
    config: &SolverConfig,
    run_config: &RunConfig,
    flow: &B,
    verbosity: &Verbosity,
) -> Result<WorkerOutput, TransportError>
where
    C: Communicator,
    B: BackgroundFlow + ?Sized,
{
    let is_root = comm.rank() == 0;
    let num_ep_steps = config.time.num_ep_steps;
    let time_step = config.time.ep_time_step();

    let mut engine = TransportEngine::new(config, comm, flow)?;

    if is_root && verbosity.print_messages() {
        println!(
            "Running {} background steps with {} transport steps each on {} worker(s)",
            run_config.num_background_steps,
            num_ep_steps,
            comm.size()
        );
    }
    let progress_bar = if is_root {
        verbosity.create_progress_bar(run_config.num_background_steps)
    } else {
        Verbosity::Quiet.create_progress_bar(0)
    };

    let mut reports = Vec::with_capacity(run_config.num_background_steps * num_ep_steps);
    for background_step in 0..run_config.num_background_steps {
        let background_time =
            config.time.sim_start_time + (background_step + 1) as fep * config.time.t_del;
        engine.update_background(flow, background_time);

        for _ in 0..num_ep_steps {
            reports.push(engine.advance(comm, time_step)?);
        }

        if is_root
            && verbosity.print_messages()
            && (background_step + 1) % config.dump_freq.max(1) == 0
        {
            if let Some(report) = reports.last() {
                print_report(background_step + 1, report);
            }
        }
        progress_bar.inc(1);
    }
    progress_bar.finish();

    let distributions = engine
        .streams()
        .iter()
        .map(|stream| (stream.index(), stream.distribution().clone()))
        .collect();

    Ok(WorkerOutput {
        reports,
        distributions,
    })
}

fn print_report(background_step: usize, report: &StepReport) {
    let max_subcycles = report
        .subcycles
        .iter()
        .max_by_key(|count| count.subcycles);
    println!(
        "Step {}: t = {:.4e}, min tau = {:.4e}, leaking left = {:.4e}, leaking right = {:.4e}, shocked nodes = {}",
        background_step,
        report.time,
        report.min_tau,
        report.leakage.leaving_left,
        report.leakage.leaving_right,
        report.num_shocked_nodes
    );
    if let Some(count) = max_subcycles {
        if count.subcycles > 1 {
            println!(
                "  Most subcycles: {} for {} at {}",
                count.subcycles, count.operator, count.location
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{plasma::solar_wind::SteadySolarWind, units};

    #[test]
    fn run_covers_simulated_interval() {
        let mut config = SolverConfig::default();
        config.time.sim_stop_time = units::days_to_internal(0.25);
        config.time.t_del = units::days_to_internal(0.1);
        assert_eq!(RunConfig::covering(&config).num_background_steps, 3);
    }

    #[test]
    fn run_produces_one_report_per_transport_step() {
        let mut config = SolverConfig::default();
        config.grid.num_nodes_per_stream = 4;
        config.grid.num_rows_per_face = 1;
        config.grid.num_columns_per_face = 1;
        config.grid.num_energy_steps = 4;
        config.grid.num_mu_steps = 2;
        config.time.num_ep_steps = 3;
        let run_config = RunConfig {
            num_background_steps: 2,
            num_workers: 1,
        };
        let wind = SteadySolarWind::new(&config);
        let output = run_simulation(&config, &run_config, &wind, &Verbosity::Quiet).unwrap();
        assert_eq!(output.reports.len(), 6);
        assert_eq!(output.distributions.len(), 6);
        let last = output.reports.last().unwrap();
        assert!(
            (last.time - 2.0 * config.time.t_del).abs() < 1e-9 * config.time.t_del,
            "Final time {} differs from end of last background interval",
            last.time
        );
    }
}
