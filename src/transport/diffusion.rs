//! Parallel and perpendicular diffusion of energetic particles.
//!
//! Parallel transport consists of upwind streaming along the deduplicated
//! stream followed by relaxation of each pitch-angle distribution towards
//! isotropy. Perpendicular diffusion exchanges particles with the nodes of
//! neighbouring streams on the same shell.

use super::{
    fep, floored,
    seed::{SeedSpectrum, SEEDED_SHELLS},
    stability::StableStep,
    stream_list::{DedupedStream, NeighbourStream},
    FLOOR,
};
use crate::{
    config::{SeedConfig, TransportConfig},
    error::BinLocation,
    grid::phase_space::PhaseSpace,
    plasma::StreamNode,
};
use ndarray::Array4;
use std::ops::AddAssign;

#[cfg(feature = "serialization")]
use serde::Serialize;

/// Model for the scattering of particles by magnetic turbulence.
#[derive(Clone, Debug, PartialEq)]
pub struct ScatteringModel {
    lamo: fep,
    rigidity_power: fep,
    mfp_radial_power: fep,
    kperxkpar: fep,
}

impl ScatteringModel {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            lamo: config.lamo,
            rigidity_power: config.rigidity_power,
            mfp_radial_power: config.mfp_radial_power,
            kperxkpar: config.kperxkpar,
        }
    }

    /// Computes the parallel mean free path [AU] for the given rigidity [GV]
    /// and radial distance [AU].
    pub fn mean_free_path(&self, rigidity: fep, radius: fep) -> fep {
        self.lamo * rigidity.powf(self.rigidity_power) * radius.powf(self.mfp_radial_power)
    }

    /// Computes the perpendicular diffusion coefficient [AU^2 c/AU] for the
    /// given speed [c], rigidity [GV] and radial distance [AU].
    pub fn perpendicular_diffusion_coefficient(
        &self,
        speed: fep,
        rigidity: fep,
        radius: fep,
    ) -> fep {
        self.kperxkpar * speed * self.mean_free_path(rigidity, radius) / 3.0
    }
}

/// Value streaming in through the inner end of a stream.
#[derive(Clone, Debug, PartialEq)]
pub enum InflowBoundary {
    /// Nothing flows in.
    Floor,
    /// The seed population flows in.
    Seed(SeedSpectrum),
    /// The innermost value is extrapolated with zero gradient.
    ZeroGradient,
}

impl InflowBoundary {
    pub fn new(config: &SeedConfig) -> Self {
        match (config.use_ep_boundary, config.use_boundary_function) {
            (false, _) => Self::Floor,
            (true, true) => Self::Seed(SeedSpectrum::new(config)),
            (true, false) => Self::ZeroGradient,
        }
    }

    /// Computes the value beyond the inner end of the stream, next to the
    /// node with the given shell index, radius and current value.
    fn ghost_value(&self, shell: usize, energy: fep, radius: fep, inner_value: fep) -> fep {
        match self {
            Self::Floor => FLOOR,
            Self::Seed(seed) if shell < SEEDED_SHELLS => seed.distribution(energy, radius),
            Self::Seed(_) | Self::ZeroGradient => inner_value,
        }
    }
}

/// Particles that left the domain through the ends of the streams.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct Leakage {
    /// Leakage through the inner boundary.
    pub leaving_left: fep,
    /// Leakage through the outer boundary.
    pub leaving_right: fep,
}

impl AddAssign for Leakage {
    fn add_assign(&mut self, other: Self) {
        self.leaving_left += other.leaving_left;
        self.leaving_right += other.leaving_right;
    }
}

/// Streaming along a stream with pitch-angle scattering.
#[derive(Clone, Debug)]
pub struct ParallelTransport {
    scattering: ScatteringModel,
    inflow: InflowBoundary,
}

impl ParallelTransport {
    pub fn new(scattering: ScatteringModel, inflow: InflowBoundary) -> Self {
        Self { scattering, inflow }
    }

    /// Computes the largest stable substep for streaming along the given stream.
    pub fn stable_step(
        &self,
        stream: usize,
        deduped: &DedupedStream,
        phase_space: &PhaseSpace,
    ) -> StableStep {
        let mut stable = StableStep::unlimited();
        let max_abs_mu = phase_space
            .mu
            .values()
            .iter()
            .fold(0.0, |max: fep, mu| max.max(mu.abs()));
        for (segment, &length) in deduped.segment_lengths().iter().enumerate() {
            for species in 0..phase_space.num_species() {
                for energy in 0..phase_space.num_energies() {
                    let speed = phase_space.energies.speed(species, energy) * max_abs_mu;
                    stable.limit(
                        length / speed,
                        BinLocation {
                            stream,
                            shell: deduped.representatives()[segment],
                            species,
                            energy,
                        },
                    );
                }
            }
        }
        stable
    }

    /// Streams and scatters the particles of a stream for the given number of
    /// substeps, and returns the particles that left through the ends.
    pub fn apply(
        &self,
        distribution: &mut Array4<fep>,
        nodes: &[StreamNode],
        deduped: &DedupedStream,
        phase_space: &PhaseSpace,
        time_step: fep,
        num_substeps: usize,
    ) -> Leakage {
        let mut leakage = Leakage::default();
        let reps = deduped.representatives();
        if reps.len() < 2 {
            return leakage;
        }
        let dt = time_step / num_substeps as fep;
        let lengths = deduped.segment_lengths();
        let inner_shell = reps[0];
        let inner_radius = nodes[inner_shell].radius();
        let dmu = phase_space.mu.spacing();
        let n = reps.len();
        let mut column = vec![0.0; n];

        for _ in 0..num_substeps {
            for species in 0..phase_space.num_species() {
                for energy in 0..phase_space.num_energies() {
                    let speed = phase_space.energies.speed(species, energy);
                    let energy_value = phase_space.energies.energy(species, energy);

                    for (mu_idx, &mu) in phase_space.mu.values().iter().enumerate() {
                        for (value, &shell) in column.iter_mut().zip(reps) {
                            *value = distribution[[shell, species, energy, mu_idx]];
                        }
                        let velocity = speed * mu;

                        let updated: Vec<fep> = if velocity > 0.0 {
                            let ghost = self.inflow.ghost_value(
                                inner_shell,
                                energy_value,
                                inner_radius,
                                column[0],
                            );
                            leakage.leaving_right += column[n - 1] * velocity * dt * 0.5 * dmu;
                            (0..n)
                                .map(|k| {
                                    let (upstream, length) = if k == 0 {
                                        (ghost, lengths[0])
                                    } else {
                                        (column[k - 1], lengths[k - 1])
                                    };
                                    column[k] - velocity * dt / length * (column[k] - upstream)
                                })
                                .collect()
                        } else {
                            leakage.leaving_left += column[0] * (-velocity) * dt * 0.5 * dmu;
                            (0..n)
                                .map(|k| {
                                    let (upstream, length) = if k == n - 1 {
                                        (FLOOR, lengths[n - 2])
                                    } else {
                                        (column[k + 1], lengths[k])
                                    };
                                    column[k] + velocity * dt / length * (column[k] - upstream)
                                })
                                .collect()
                        };

                        for (&value, &shell) in updated.iter().zip(reps) {
                            distribution[[shell, species, energy, mu_idx]] = floored(value);
                        }
                    }
                }
            }
            self.isotropize(distribution, nodes, reps, phase_space, dt);
        }
        deduped.propagate_to_members(distribution);
        leakage
    }

    /// Relaxes the pitch-angle distribution at each representative towards
    /// its mean over the given time.
    fn isotropize(
        &self,
        distribution: &mut Array4<fep>,
        nodes: &[StreamNode],
        reps: &[usize],
        phase_space: &PhaseSpace,
        dt: fep,
    ) {
        for &shell in reps {
            let radius = nodes[shell].radius();
            for species in 0..phase_space.num_species() {
                for energy in 0..phase_space.num_energies() {
                    let speed = phase_space.energies.speed(species, energy);
                    let mfp = self
                        .scattering
                        .mean_free_path(phase_space.energies.rigidity(species, energy), radius);
                    let retained = fep::exp(-dt * speed / mfp);

                    let mut mu_values =
                        distribution.slice_mut(ndarray::s![shell, species, energy, ..]);
                    let mean = mu_values.mean().unwrap_or(FLOOR);
                    mu_values.mapv_inplace(|value| floored(mean + (value - mean) * retained));
                }
            }
        }
    }
}

/// Diffusion perpendicular to the magnetic field, between streams.
///
/// The diffusion coefficient between two nodes is the mean of the values at
/// the two nodes, so a pair of neighbouring streams exchange equal and
/// opposite amounts.
#[derive(Clone, Debug)]
pub struct ShellDiffusion {
    scattering: ScatteringModel,
}

impl ShellDiffusion {
    /// Largest ratio of the diffusion number to its stable limit.
    const STABILITY_LIMIT: fep = 0.5;

    pub fn new(scattering: ScatteringModel) -> Self {
        Self { scattering }
    }

    /// Computes the rate `kappa/d^2` of exchange with the node on the same
    /// shell of each neighbour. Coincident nodes do not exchange particles.
    fn exchange_rates(
        &self,
        node: &StreamNode,
        shell: usize,
        neighbours: &[NeighbourStream],
        speed: fep,
        rigidity: fep,
    ) -> Vec<fep> {
        let kappa = |radius| {
            self.scattering
                .perpendicular_diffusion_coefficient(speed, rigidity, radius)
        };
        let own_kappa = kappa(node.radius());
        neighbours
            .iter()
            .map(|neighbour| {
                let other = &neighbour.nodes[shell];
                let distance = (other.position - node.position).length();
                if distance > 0.0 {
                    0.5 * (own_kappa + kappa(other.radius())) / (distance * distance)
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Computes the largest stable substep for perpendicular diffusion on a stream.
    pub fn stable_step(
        &self,
        stream: usize,
        nodes: &[StreamNode],
        neighbours: &[NeighbourStream],
        phase_space: &PhaseSpace,
    ) -> StableStep {
        let mut stable = StableStep::unlimited();
        for (shell, node) in nodes.iter().enumerate() {
            for species in 0..phase_space.num_species() {
                for energy in 0..phase_space.num_energies() {
                    let total_rate: fep = self
                        .exchange_rates(
                            node,
                            shell,
                            neighbours,
                            phase_space.energies.speed(species, energy),
                            phase_space.energies.rigidity(species, energy),
                        )
                        .iter()
                        .sum();
                    if total_rate > 0.0 {
                        stable.limit(
                            Self::STABILITY_LIMIT / total_rate,
                            BinLocation {
                                stream,
                                shell,
                                species,
                                energy,
                            },
                        );
                    }
                }
            }
        }
        stable
    }

    /// Exchanges particles with the neighbouring streams for the given number
    /// of substeps. Neighbour values are held fixed.
    pub fn apply(
        &self,
        distribution: &mut Array4<fep>,
        nodes: &[StreamNode],
        neighbours: &[NeighbourStream],
        phase_space: &PhaseSpace,
        time_step: fep,
        num_substeps: usize,
    ) {
        if neighbours.is_empty() {
            return;
        }
        let dt = time_step / num_substeps as fep;
        for (shell, node) in nodes.iter().enumerate() {
            for species in 0..phase_space.num_species() {
                for energy in 0..phase_space.num_energies() {
                    let rates = self.exchange_rates(
                        node,
                        shell,
                        neighbours,
                        phase_space.energies.speed(species, energy),
                        phase_space.energies.rigidity(species, energy),
                    );
                    for mu in 0..phase_space.num_mu() {
                        let mut value = distribution[[shell, species, energy, mu]];
                        for _ in 0..num_substeps {
                            let exchange: fep = neighbours
                                .iter()
                                .zip(&rates)
                                .map(|(neighbour, &rate)| {
                                    rate * (neighbour.distribution[[shell, species, energy, mu]]
                                        - value)
                                })
                                .sum();
                            value += dt * exchange;
                        }
                        distribution[[shell, species, energy, mu]] = floored(value);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SolverConfig,
        geometry::{SphVec, Vec3},
        plasma::PlasmaState,
        transport::seed::SeedSpectrum,
    };
    use approx::assert_relative_eq;

    fn node_at(position: Vec3<fep>) -> StreamNode {
        StreamNode {
            position,
            plasma: PlasmaState {
                density: 1.0,
                b_mag: 1.0,
                velocity: Vec3::zero(),
                curl_b_over_b2: SphVec::zero(),
            },
        }
    }

    fn small_config() -> SolverConfig {
        let mut config = SolverConfig::default();
        config.grid.num_nodes_per_stream = 6;
        config.grid.num_energy_steps = 4;
        config.grid.num_mu_steps = 4;
        config
    }

    fn radial_nodes(n: usize) -> Vec<StreamNode> {
        (0..n)
            .map(|i| node_at(Vec3::new(0.1 + 0.1 * i as fep, 0.0, 0.0)))
            .collect()
    }

    #[test]
    fn mean_free_path_scales_with_rigidity_and_radius() {
        let mut config = SolverConfig::default().transport;
        config.lamo = 0.5;
        config.rigidity_power = 1.0 / 3.0;
        config.mfp_radial_power = 1.0;
        let model = ScatteringModel::new(&config);
        assert_relative_eq!(model.mean_free_path(1.0, 1.0), 0.5);
        assert_relative_eq!(model.mean_free_path(8.0, 2.0), 2.0, epsilon = 1e-12);
        assert_relative_eq!(
            model.perpendicular_diffusion_coefficient(0.3, 1.0, 1.0),
            config.kperxkpar * 0.3 * 0.5 / 3.0
        );
    }

    #[test]
    fn uniform_distribution_leaks_symmetrically() {
        let config = small_config();
        let phase_space = PhaseSpace::new(&config);
        let nodes = radial_nodes(6);
        let deduped = DedupedStream::new(&nodes, 1e-6);
        let transport = ParallelTransport::new(
            ScatteringModel::new(&config.transport),
            InflowBoundary::ZeroGradient,
        );
        let mut distribution = phase_space.layout.new_distribution(1.0);
        let stable = transport.stable_step(0, &deduped, &phase_space);
        let leakage = transport.apply(
            &mut distribution,
            &nodes,
            &deduped,
            &phase_space,
            stable.time_step,
            1,
        );

        // Everything but the outermost node, which sees floor inflow from outside
        for ((shell, ..), &value) in distribution.indexed_iter() {
            if shell < 5 {
                assert!(value > 0.0);
            }
        }
        assert!(leakage.leaving_left > 0.0);
        assert_relative_eq!(leakage.leaving_left, leakage.leaving_right, max_relative = 1e-12);
    }

    #[test]
    fn strong_scattering_isotropizes() {
        let mut config = small_config();
        config.transport.lamo = 1e-10;
        let phase_space = PhaseSpace::new(&config);
        let nodes = radial_nodes(6);
        let deduped = DedupedStream::new(&nodes, 1e-6);
        let transport =
            ParallelTransport::new(
                ScatteringModel::new(&config.transport),
                InflowBoundary::Floor,
            );

        let mut distribution = phase_space.layout.new_distribution(1.0);
        distribution[[2, 0, 1, 3]] = 5.0;
        transport.apply(&mut distribution, &nodes, &deduped, &phase_space, 1e-6, 1);
        let mu_values = distribution.slice(ndarray::s![2, 0, 1, ..]);
        let mean = mu_values.mean().unwrap();
        for &value in mu_values.iter() {
            assert_relative_eq!(value, mean, max_relative = 1e-6);
        }
    }

    #[test]
    fn seed_inflow_enters_at_inner_boundary() {
        let mut config = small_config();
        config.seed.amplitude = 1e6;
        let phase_space = PhaseSpace::new(&config);
        let nodes = radial_nodes(6);
        let deduped = DedupedStream::new(&nodes, 1e-6);
        let seed = SeedSpectrum::new(&config.seed);
        let transport = ParallelTransport::new(
            ScatteringModel::new(&config.transport),
            InflowBoundary::Seed(seed.clone()),
        );

        let mut distribution = phase_space.layout.new_distribution(FLOOR);
        let stable = transport.stable_step(0, &deduped, &phase_space);
        transport.apply(
            &mut distribution,
            &nodes,
            &deduped,
            &phase_space,
            stable.time_step,
            1,
        );

        let target = seed.distribution(phase_space.energies.energy(0, 0), nodes[0].radius());
        assert!(distribution[[0, 0, 0, 3]] > 0.0);
        assert!(distribution[[0, 0, 0, 3]] <= target);
        assert_eq!(distribution[[5, 0, 0, 3]], FLOOR);
    }

    #[test]
    fn shell_diffusion_relaxes_towards_neighbours() {
        let config = small_config();
        let phase_space = PhaseSpace::new(&config);
        let nodes = radial_nodes(6);
        let neighbour = NeighbourStream {
            stream: 1,
            nodes: nodes
                .iter()
                .map(|node| node_at(node.position + Vec3::new(0.0, 0.05, 0.0)))
                .collect(),
            distribution: phase_space.layout.new_distribution(2.0),
        };
        let diffusion = ShellDiffusion::new(ScatteringModel::new(&config.transport));
        let neighbours = vec![neighbour];
        let stable = diffusion.stable_step(0, &nodes, &neighbours, &phase_space);
        assert!(stable.time_step.is_finite());

        let mut distribution = phase_space.layout.new_distribution(1.0);
        diffusion.apply(
            &mut distribution,
            &nodes,
            &neighbours,
            &phase_space,
            4.0 * stable.time_step,
            4,
        );
        assert!(
            distribution.iter().all(|&value| value > 1.0 && value <= 2.0)
        );

        let mut unchanged = phase_space.layout.new_distribution(1.0);
        diffusion.apply(&mut unchanged, &nodes, &[], &phase_space, 1.0, 1);
        assert!(unchanged.iter().all(|&value| value == 1.0));
    }

    #[test]
    fn inflow_boundary_follows_seed_options() {
        let mut seed_config = SolverConfig::default().seed;
        seed_config.use_ep_boundary = false;
        assert_eq!(InflowBoundary::new(&seed_config), InflowBoundary::Floor);
        seed_config.use_ep_boundary = true;
        seed_config.use_boundary_function = false;
        assert_eq!(
            InflowBoundary::new(&seed_config),
            InflowBoundary::ZeroGradient
        );
        seed_config.use_boundary_function = true;
        let seed = SeedSpectrum::new(&seed_config);
        assert_eq!(
            InflowBoundary::new(&seed_config),
            InflowBoundary::Seed(seed.clone())
        );

        let (energy, radius) = (1e-3, 0.1);
        assert_eq!(
            InflowBoundary::Floor.ghost_value(0, energy, radius, 5.0),
            FLOOR
        );
        assert_eq!(
            InflowBoundary::ZeroGradient.ghost_value(0, energy, radius, 5.0),
            5.0
        );
        let boundary = InflowBoundary::Seed(seed.clone());
        assert_eq!(
            boundary.ghost_value(0, energy, radius, 5.0),
            seed.distribution(energy, radius)
        );
        assert_eq!(
            boundary.ghost_value(SEEDED_SHELLS, energy, radius, 5.0),
            5.0
        );
    }

    #[test]
    fn inner_inflow_is_empty_for_floor_and_extrapolated_for_zero_gradient() {
        let mut config = small_config();
        config.transport.lamo = 1e10;
        let phase_space = PhaseSpace::new(&config);
        let nodes = radial_nodes(6);
        let deduped = DedupedStream::new(&nodes, 1e-6);
        let outward: Vec<usize> = phase_space
            .mu
            .values()
            .iter()
            .enumerate()
            .filter(|(_, &mu)| mu > 0.0)
            .map(|(idx, _)| idx)
            .collect();
        assert!(!outward.is_empty());

        let run = |inflow: InflowBoundary| {
            let transport = ParallelTransport::new(ScatteringModel::new(&config.transport), inflow);
            let mut distribution = phase_space.layout.new_distribution(1.0);
            let stable = transport.stable_step(0, &deduped, &phase_space);
            transport.apply(
                &mut distribution,
                &nodes,
                &deduped,
                &phase_space,
                stable.time_step,
                1,
            );
            distribution
        };

        let extrapolated = run(InflowBoundary::ZeroGradient);
        for ((shell, ..), &value) in extrapolated.indexed_iter() {
            if shell < 5 {
                assert_relative_eq!(value, 1.0, epsilon = 1e-12);
            }
        }

        let emptied = run(InflowBoundary::Floor);
        for species in 0..phase_space.num_species() {
            for energy in 0..phase_space.num_energies() {
                for &mu in &outward {
                    let value = emptied[[0, species, energy, mu]];
                    assert!(value >= FLOOR && value < 1.0);
                    assert_relative_eq!(emptied[[1, species, energy, mu]], 1.0, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn outer_leakage_counts_outward_flux_of_last_node() {
        let config = small_config();
        let phase_space = PhaseSpace::new(&config);
        let nodes = radial_nodes(6);
        let deduped = DedupedStream::new(&nodes, 1e-6);
        let transport = ParallelTransport::new(
            ScatteringModel::new(&config.transport),
            InflowBoundary::Floor,
        );
        let mut distribution = phase_space.layout.new_distribution(FLOOR);
        distribution
            .slice_mut(ndarray::s![5, .., .., ..])
            .fill(1.0);
        let time_step = transport.stable_step(0, &deduped, &phase_space).time_step;

        let leakage = transport.apply(
            &mut distribution,
            &nodes,
            &deduped,
            &phase_space,
            time_step,
            1,
        );

        let dmu = phase_space.mu.spacing();
        let mut expected = 0.0;
        for species in 0..phase_space.num_species() {
            for energy in 0..phase_space.num_energies() {
                let speed = phase_space.energies.speed(species, energy);
                for &mu in phase_space.mu.values().iter().filter(|&&mu| mu > 0.0) {
                    expected += speed * mu * time_step * 0.5 * dmu;
                }
            }
        }
        assert!(expected > 0.0);
        assert_relative_eq!(leakage.leaving_right, expected, max_relative = 1e-12);
        assert!(leakage.leaving_left < 1e-300);
    }

    #[test]
    fn exchange_between_streams_at_different_radii_is_conservative() {
        let mut config = small_config();
        config.grid.num_nodes_per_stream = 1;
        config.transport.mfp_radial_power = 1.0;
        let phase_space = PhaseSpace::new(&config);
        let nodes_a = vec![node_at(Vec3::new(1.0, 0.0, 0.0))];
        let nodes_b = vec![node_at(Vec3::new(1.5, 0.0, 0.0))];
        let initial_a = phase_space.layout.new_distribution(1.0);
        let initial_b = phase_space.layout.new_distribution(3.0);
        let neighbours_of_a = vec![NeighbourStream {
            stream: 1,
            nodes: nodes_b.clone(),
            distribution: initial_b.clone(),
        }];
        let neighbours_of_b = vec![NeighbourStream {
            stream: 0,
            nodes: nodes_a.clone(),
            distribution: initial_a.clone(),
        }];
        let diffusion = ShellDiffusion::new(ScatteringModel::new(&config.transport));

        let stable_a = diffusion.stable_step(0, &nodes_a, &neighbours_of_a, &phase_space);
        let stable_b = diffusion.stable_step(1, &nodes_b, &neighbours_of_b, &phase_space);
        assert_relative_eq!(stable_a.time_step, stable_b.time_step, max_relative = 1e-12);
        let time_step = 0.5 * stable_a.time_step;

        let mut a = initial_a.clone();
        let mut b = initial_b.clone();
        diffusion.apply(
            &mut a,
            &nodes_a,
            &neighbours_of_a,
            &phase_space,
            time_step,
            1,
        );
        diffusion.apply(
            &mut b,
            &nodes_b,
            &neighbours_of_b,
            &phase_space,
            time_step,
            1,
        );
        for (((&a0, &a1), &b0), &b1) in initial_a.iter().zip(&a).zip(&initial_b).zip(&b) {
            assert!(a1 > a0 && b1 < b0);
            assert_relative_eq!(a1 - a0, b0 - b1, max_relative = 1e-12);
        }
    }
}
