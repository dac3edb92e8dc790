//! Top-level update of the energetic particle distribution.

use super::{
    adiabatic::{AdiabaticChange, AdiabaticFocusing, AdiabaticRates},
    apply_floor,
    diffusion::{InflowBoundary, Leakage, ParallelTransport, ScatteringModel, ShellDiffusion},
    drift::DriftOperator,
    fep,
    seed::{enforce_seed_population, fill_with_seed_population, SeedSpectrum},
    shock::ShockInjection,
    stability::{StabilityEstimate, SubcycleCount},
    stream_list::{gather_stream_lists, OwnedStreamData, StreamList},
    FLOOR,
};
use crate::{
    comm::Communicator,
    config::SolverConfig,
    error::{OperatorKind, TransportError},
    grid::{
        phase_space::{EnergyGrid, MuGrid, PhaseSpace},
        StreamGrid,
    },
    plasma::{BackgroundFlow, StreamNode},
};
use ndarray::Array4;

#[cfg(feature = "serialization")]
use serde::Serialize;

/// A stream owned by this worker, with its current and previous background
/// node states.
#[derive(Clone, Debug)]
pub struct OwnedStream {
    index: usize,
    nodes: Vec<StreamNode>,
    previous_nodes: Option<Vec<StreamNode>>,
    distribution: Array4<fep>,
}

impl OwnedStream {
    /// Global index of the stream.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn nodes(&self) -> &[StreamNode] {
        &self.nodes
    }

    /// Distribution function of the stream, indexed `[shell, species, energy, mu]`.
    pub fn distribution(&self) -> &Array4<fep> {
        &self.distribution
    }
}

impl OwnedStreamData for OwnedStream {
    fn stream(&self) -> usize {
        self.index
    }

    fn nodes(&self) -> &[StreamNode] {
        &self.nodes
    }

    fn distribution(&self) -> &Array4<fep> {
        &self.distribution
    }
}

/// Transport operators enabled by the configuration.
pub struct TransportOperators {
    shell_diffusion: Option<ShellDiffusion>,
    parallel: Option<ParallelTransport>,
    drift: Option<DriftOperator>,
    adiabatic_change: Option<AdiabaticChange>,
    adiabatic_focusing: Option<AdiabaticFocusing>,
    shock: Option<ShockInjection>,
    seed_floor: Option<SeedSpectrum>,
}

impl TransportOperators {
    pub fn from_config(config: &SolverConfig) -> Self {
        let transport = &config.transport;
        let scattering = ScatteringModel::new(transport);
        Self {
            shell_diffusion: transport
                .use_shell_diffusion
                .then(|| ShellDiffusion::new(scattering.clone())),
            parallel: transport.use_parallel_diffusion.then(|| {
                ParallelTransport::new(scattering.clone(), InflowBoundary::new(&config.seed))
            }),
            drift: transport
                .use_drift
                .then(|| DriftOperator::new(&config.species)),
            adiabatic_change: transport
                .use_adiabatic_change
                .then(|| AdiabaticChange::new(transport.adiabatic_change_algorithm)),
            adiabatic_focusing: transport
                .use_adiabatic_focus
                .then(|| AdiabaticFocusing::new(transport.adiabatic_focus_algorithm)),
            shock: ShockInjection::from_config(config),
            seed_floor: config
                .seed
                .check_seed_population
                .then(|| SeedSpectrum::new(&config.seed)),
        }
    }

    fn uses_adiabatic_rates(&self) -> bool {
        self.adiabatic_change.is_some() || self.adiabatic_focusing.is_some()
    }
}

/// Summary of one outer transport step, identical on every worker.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct StepReport {
    /// Time at the end of the step [AU/c].
    pub time: fep,
    pub time_step: fep,
    /// Subcycles used by each operator.
    pub subcycles: Vec<SubcycleCount>,
    /// Smallest stable substep of any operator over all streams.
    pub min_tau: fep,
    /// Particles that left through the ends of all streams.
    pub leakage: Leakage,
    /// Number of nodes where shock injection took place.
    pub num_shocked_nodes: usize,
}

/// Local work for one stream during an outer step.
struct StreamWork {
    list: StreamList,
    rates: Vec<AdiabaticRates>,
}

/// Operator-split solver for the energetic particle distribution on the
/// streams owned by one worker.
pub struct TransportEngine {
    stream_grid: StreamGrid,
    phase_space: PhaseSpace,
    operators: TransportOperators,
    min_node_spacing: fep,
    max_subcycles: usize,
    streams: Vec<OwnedStream>,
    time: fep,
    background_time: fep,
    background_interval: fep,
}

impl TransportEngine {
    /// Creates the engine for the streams owned by the calling worker, with
    /// the background taken from the given flow at the start time.
    pub fn new<C, B>(config: &SolverConfig, comm: &C, flow: &B) -> Result<Self, TransportError>
    where
        C: Communicator,
        B: BackgroundFlow + ?Sized,
    {
        config.validate()?;

        let stream_grid = StreamGrid::from_config(&config.grid);
        let phase_space = PhaseSpace::new(config);
        let start_time = config.time.sim_start_time;
        let num_shells = config.grid.num_nodes_per_stream;
        let seed = SeedSpectrum::new(&config.seed);

        let streams = stream_grid
            .owned_streams(comm.rank(), comm.size())
            .into_iter()
            .map(|index| {
                let nodes: Vec<StreamNode> = (0..num_shells)
                    .map(|shell| flow.node_state(index, shell, start_time))
                    .collect();
                let mut distribution = phase_space.layout.new_distribution(FLOOR);
                if config.seed.boundary_function_init_domain {
                    fill_with_seed_population(
                        &mut distribution,
                        &nodes,
                        &seed,
                        &phase_space.energies,
                    );
                }
                OwnedStream {
                    index,
                    nodes,
                    previous_nodes: None,
                    distribution,
                }
            })
            .collect();

        Ok(Self {
            stream_grid,
            phase_space,
            operators: TransportOperators::from_config(config),
            min_node_spacing: config.transport.dsh_min,
            max_subcycles: config.transport.max_subcycles,
            streams,
            time: start_time,
            background_time: start_time,
            background_interval: 0.0,
        })
    }

    /// Takes a new snapshot of the background at the given time. The previous
    /// snapshot is kept for computing the adiabatic rates.
    pub fn update_background<B>(&mut self, flow: &B, time: fep)
    where
        B: BackgroundFlow + ?Sized,
    {
        for stream in &mut self.streams {
            let nodes = (0..stream.nodes.len())
                .map(|shell| flow.node_state(stream.index, shell, time))
                .collect();
            stream.previous_nodes = Some(std::mem::replace(&mut stream.nodes, nodes));
        }
        self.background_interval = time - self.background_time;
        self.background_time = time;
    }

    /// Advances the distribution of every owned stream by the given time step.
    ///
    /// Must be called collectively by all workers with the same time step.
    /// If any operator would need more subcycles than permitted, or a
    /// neighbour stream could not be gathered, every worker returns the same
    /// error and no distribution is modified.
    pub fn advance<C: Communicator>(
        &mut self,
        comm: &C,
        time_step: fep,
    ) -> Result<StepReport, TransportError> {
        if !(time_step.is_finite() && time_step > 0.0) {
            return Err(TransportError::InvalidParameter {
                name: "time_step".to_string(),
                value: time_step.to_string(),
                reason: "must be positive and finite".to_string(),
            });
        }

        let lists = gather_stream_lists(
            comm,
            &self.stream_grid,
            &self.phase_space.layout,
            &self.streams,
            self.min_node_spacing,
        )?;

        let work: Vec<StreamWork> = lists
            .into_iter()
            .zip(&self.streams)
            .map(|(list, stream)| {
                let rates = if self.operators.uses_adiabatic_rates() {
                    AdiabaticRates::for_stream(
                        stream.previous_nodes.as_deref(),
                        &stream.nodes,
                        &list.deduped,
                        self.background_interval,
                    )
                } else {
                    Vec::new()
                };
                StreamWork { list, rates }
            })
            .collect();

        let estimate = self
            .estimate_stability(&work, time_step)
            .reduce(comm);
        estimate.verify(time_step, self.max_subcycles)?;

        let mut leakage = Leakage::default();
        let mut num_shocked_nodes = 0;
        let end_time = self.time + time_step;

        for (stream, work) in self.streams.iter_mut().zip(&work) {
            debug_assert_eq!(stream.index, work.list.stream);
            let (leaked, shocked) = Self::apply_operators(
                &self.operators,
                &self.phase_space,
                &estimate,
                stream,
                work,
                time_step,
                end_time,
            );
            leakage += leaked;
            num_shocked_nodes += shocked;
        }

        let leakage = Leakage {
            leaving_left: comm.all_reduce_sum(leakage.leaving_left),
            leaving_right: comm.all_reduce_sum(leakage.leaving_right),
        };
        let num_shocked_nodes: usize = comm.all_gather(num_shocked_nodes).into_iter().sum();
        self.time = end_time;

        Ok(StepReport {
            time: self.time,
            time_step,
            subcycles: estimate.counts().to_vec(),
            min_tau: estimate.min_tau(),
            leakage,
            num_shocked_nodes,
        })
    }

    fn estimate_stability(&self, work: &[StreamWork], time_step: fep) -> StabilityEstimate {
        let ops = &self.operators;
        let ps = &self.phase_space;
        let mut stable_steps = Vec::new();
        for (stream, work) in self.streams.iter().zip(work) {
            let (index, nodes, neighbours) = (stream.index, &stream.nodes, &work.list.neighbours);
            if let Some(op) = &ops.shell_diffusion {
                stable_steps.push((
                    OperatorKind::ShellDiffusion,
                    op.stable_step(index, nodes, neighbours, ps),
                ));
            }
            if let Some(op) = &ops.parallel {
                stable_steps.push((
                    OperatorKind::Streaming,
                    op.stable_step(index, &work.list.deduped, ps),
                ));
            }
            if let Some(op) = &ops.drift {
                stable_steps.push((
                    OperatorKind::Drift,
                    op.stable_step(index, nodes, neighbours, ps),
                ));
            }
            if let Some(op) = &ops.adiabatic_change {
                stable_steps.push((
                    OperatorKind::AdiabaticChange,
                    op.stable_step(index, &work.rates, ps),
                ));
            }
            if let Some(op) = &ops.adiabatic_focusing {
                stable_steps.push((
                    OperatorKind::AdiabaticFocusing,
                    op.stable_step(index, &work.rates, ps),
                ));
            }
        }
        StabilityEstimate::from_stable_steps(time_step, &stable_steps)
    }

    /// Applies every enabled operator to one stream, and returns the leakage
    /// and the number of shocked nodes.
    fn apply_operators(
        ops: &TransportOperators,
        ps: &PhaseSpace,
        estimate: &StabilityEstimate,
        stream: &mut OwnedStream,
        work: &StreamWork,
        dt: fep,
        end_time: fep,
    ) -> (Leakage, usize) {
        let nodes = &stream.nodes;
        let distribution = &mut stream.distribution;
        let neighbours = &work.list.neighbours;
        let deduped = &work.list.deduped;
        let subcycles = |operator| estimate.subcycles(operator);

        if let Some(op) = &ops.shell_diffusion {
            let n = subcycles(OperatorKind::ShellDiffusion);
            op.apply(distribution, nodes, neighbours, ps, dt, n);
        }
        let leakage = match &ops.parallel {
            Some(op) => {
                let n = subcycles(OperatorKind::Streaming);
                op.apply(distribution, nodes, deduped, ps, dt, n)
            }
            None => Leakage::default(),
        };
        if let Some(op) = &ops.drift {
            op.apply(
                distribution,
                nodes,
                neighbours,
                ps,
                dt,
                subcycles(OperatorKind::Drift),
            );
        }
        if let Some(op) = &ops.adiabatic_change {
            let n = subcycles(OperatorKind::AdiabaticChange);
            op.apply(distribution, &work.rates, ps, dt, n);
        }
        if let Some(op) = &ops.adiabatic_focusing {
            let n = subcycles(OperatorKind::AdiabaticFocusing);
            op.apply(distribution, &work.rates, ps, dt, n);
        }
        let num_shocked = ops.shock.as_ref().map_or(0, |shock| {
            shock.apply(distribution, nodes, deduped, &ps.energies, end_time)
        });
        if let Some(seed) = &ops.seed_floor {
            enforce_seed_population(distribution, nodes, seed, &ps.energies);
        }
        apply_floor(distribution);
        (leakage, num_shocked)
    }

    /// Streams owned by this worker, in order of increasing global index.
    pub fn streams(&self) -> &[OwnedStream] {
        &self.streams
    }

    /// Distribution of every owned stream, in the order of [`Self::streams`].
    pub fn distributions(&self) -> impl Iterator<Item = &Array4<fep>> {
        self.streams.iter().map(|stream| &stream.distribution)
    }

    pub fn energy_grid(&self) -> &EnergyGrid {
        &self.phase_space.energies
    }

    pub fn mu_grid(&self) -> &MuGrid {
        &self.phase_space.mu
    }

    pub fn phase_space(&self) -> &PhaseSpace {
        &self.phase_space
    }

    pub fn stream_grid(&self) -> &StreamGrid {
        &self.stream_grid
    }

    /// Current time [AU/c].
    pub fn time(&self) -> fep {
        self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        comm::SerialCommunicator, plasma::solar_wind::SteadySolarWind,
        transport::seed::SEEDED_SHELLS,
    };

    fn minimal_config() -> SolverConfig {
        let mut config = SolverConfig::default();
        config.grid.num_nodes_per_stream = 6;
        config.grid.num_rows_per_face = 1;
        config.grid.num_columns_per_face = 1;
        config.grid.num_energy_steps = 5;
        config.grid.num_mu_steps = 4;
        let transport = &mut config.transport;
        transport.use_shell_diffusion = false;
        transport.use_parallel_diffusion = false;
        transport.use_drift = false;
        transport.use_adiabatic_change = false;
        transport.use_adiabatic_focus = false;
        config.seed.boundary_function_init_domain = false;
        config.seed.check_seed_population = false;
        config
    }

    #[test]
    fn seed_floor_raises_exactly_the_sub_floor_bins() {
        let mut config = minimal_config();
        config.seed.check_seed_population = true;
        let wind = SteadySolarWind::new(&config);
        let mut engine = TransportEngine::new(&config, &SerialCommunicator, &wind).unwrap();
        let seed = SeedSpectrum::new(&config.seed);

        let report = engine.advance(&SerialCommunicator, 1e-3).unwrap();
        assert_eq!(report.num_shocked_nodes, 0);
        assert_eq!(report.leakage, Leakage::default());
        assert!(report.subcycles.iter().all(|count| count.subcycles == 1));

        for stream in engine.streams() {
            for ((shell, species, energy, _), &value) in stream.distribution().indexed_iter() {
                if shell < SEEDED_SHELLS {
                    let expected = seed.distribution(
                        engine.energy_grid().energy(species, energy),
                        stream.nodes()[shell].radius(),
                    );
                    assert_eq!(value, expected);
                } else {
                    assert_eq!(value, FLOOR);
                }
            }
        }
    }

    #[test]
    fn disabled_operators_leave_distribution_unchanged() {
        let mut config = minimal_config();
        config.seed.boundary_function_init_domain = true;
        let wind = SteadySolarWind::new(&config);
        let mut engine = TransportEngine::new(&config, &SerialCommunicator, &wind).unwrap();
        let initial: Vec<Array4<fep>> = engine.distributions().cloned().collect();

        engine.update_background(&wind, config.time.t_del);
        let report = engine.advance(&SerialCommunicator, 1e-2).unwrap();
        assert_eq!(report.min_tau, fep::INFINITY);
        assert!((engine.time() - 1e-2).abs() < 1e-15);
        for (before, after) in initial.iter().zip(engine.distributions()) {
            assert_eq!(before, after);
        }
    }

    #[test]
    fn background_change_drives_adiabatic_cooling() {
        let mut config = minimal_config();
        config.seed.boundary_function_init_domain = true;
        config.transport.use_adiabatic_change = true;
        let wind = SteadySolarWind::new(&config);
        let mut engine = TransportEngine::new(&config, &SerialCommunicator, &wind).unwrap();
        let initial: Vec<Array4<fep>> = engine.distributions().cloned().collect();

        // Without an earlier background snapshot there is nothing to do
        let report = engine.advance(&SerialCommunicator, 1e-2).unwrap();
        assert_eq!(report.subcycles[3].subcycles, 1);
        assert_eq!(engine.distributions().next(), initial.first());

        engine.update_background(&wind, config.time.t_del);
        let step = config.time.ep_time_step();
        let report = engine.advance(&SerialCommunicator, step).unwrap();
        assert!(report.min_tau.is_finite());
        // The expanding wind moves particles to lower energies
        let cooled = engine.distributions().next().unwrap();
        let before = &initial[0];
        assert!(cooled[[0, 0, 1, 0]] < before[[0, 0, 1, 0]]);
    }

    #[test]
    fn excessive_subcycling_aborts_without_modifying_distribution() {
        let mut config = minimal_config();
        config.seed.boundary_function_init_domain = true;
        config.transport.use_parallel_diffusion = true;
        config.transport.max_subcycles = 2;
        let wind = SteadySolarWind::new(&config);
        let mut engine = TransportEngine::new(&config, &SerialCommunicator, &wind).unwrap();
        let initial: Vec<Array4<fep>> = engine.distributions().cloned().collect();

        match engine.advance(&SerialCommunicator, 1e3) {
            Err(TransportError::Unstable {
                operator,
                required_subcycles,
                max_subcycles,
                ..
            }) => {
                assert_eq!(operator, OperatorKind::Streaming);
                assert!(required_subcycles > 2);
                assert_eq!(max_subcycles, 2);
            }
            other => panic!("Expected stability violation, got {:?}", other.map(|_| ())),
        }
        assert_eq!(engine.time(), config.time.sim_start_time);
        for (before, after) in initial.iter().zip(engine.distributions()) {
            assert_eq!(before, after);
        }
    }

    #[test]
    fn non_positive_or_non_finite_time_steps_are_rejected() {
        let mut config = minimal_config();
        config.seed.boundary_function_init_domain = true;
        config.transport.use_parallel_diffusion = true;
        let wind = SteadySolarWind::new(&config);
        let mut engine = TransportEngine::new(&config, &SerialCommunicator, &wind).unwrap();
        let initial: Vec<Array4<fep>> = engine.distributions().cloned().collect();

        for time_step in [0.0, -1.0, -0.0, fep::NAN, fep::INFINITY] {
            match engine.advance(&SerialCommunicator, time_step) {
                Err(TransportError::InvalidParameter { name, .. }) => {
                    assert_eq!(name, "time_step")
                }
                other => panic!("Expected invalid time step, got {:?}", other.map(|_| ())),
            }
        }
        assert_eq!(engine.time(), config.time.sim_start_time);
        for (before, after) in initial.iter().zip(engine.distributions()) {
            assert_eq!(before, after);
        }
    }

    #[test]
    fn streaming_reports_leakage_through_both_ends() {
        let mut config = minimal_config();
        config.seed.boundary_function_init_domain = true;
        config.transport.use_parallel_diffusion = true;
        let wind = SteadySolarWind::new(&config);
        let mut engine = TransportEngine::new(&config, &SerialCommunicator, &wind).unwrap();

        let report = engine.advance(&SerialCommunicator, 1e-4).unwrap();
        let leakage = report.leakage;
        assert!(
            leakage.leaving_right.is_finite() && leakage.leaving_right > 0.0
        );
        assert!(
            leakage.leaving_left.is_finite() && leakage.leaving_left > 0.0
        );
    }

    #[test]
    fn engine_rejects_grids_too_small_for_the_operators() {
        let mut config = minimal_config();
        config.grid.num_mu_steps = 1;
        let wind = SteadySolarWind::new(&config);
        match TransportEngine::new(&config, &SerialCommunicator, &wind) {
            Err(TransportError::InvalidParameter { name, .. }) => assert_eq!(name, "numMuSteps"),
            other => panic!("Expected invalid grid size, got {:?}", other.map(|_| ())),
        }
    }
}
