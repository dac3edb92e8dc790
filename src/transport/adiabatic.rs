//! Adiabatic energy change and focusing in the evolving background plasma.
//!
//! Both effects are advection problems in a single phase space coordinate:
//! the logarithm of energy for the energy change and the pitch-angle cosine
//! for focusing. The rates follow from the change of the magnetic field
//! strength and plasma density of every node over the last background
//! interval, together with the field gradient along the stream.

use super::{
    advection::{Advector, EdgeTreatment, UpwindAdvector, Weno3Advector},
    fep,
    stability::StableStep,
    stream_list::DedupedStream,
};
use crate::{
    config::{AdiabaticChangeAlgorithm, AdiabaticFocusAlgorithm},
    error::BinLocation,
    grid::phase_space::PhaseSpace,
    plasma::StreamNode,
};
use ndarray::{parallel::prelude::*, Array4, Axis};

/// Logarithmic rates of change of the background at a node.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AdiabaticRates {
    /// `dln(B)/dt` following the node [c/AU].
    pub dlnb_dt: fep,
    /// `dln(n)/dt` following the node [c/AU].
    pub dlnn_dt: fep,
    /// `dln(B)/ds` along the stream [1/AU].
    pub dlnb_ds: fep,
}

impl AdiabaticRates {
    /// Computes the rates for every node of a stream.
    ///
    /// The time derivatives compare the current node states with those at the
    /// start of the background interval, and vanish when no earlier state is
    /// known. Merged nodes use the field gradient of their representative.
    pub fn for_stream(
        previous_nodes: Option<&[StreamNode]>,
        nodes: &[StreamNode],
        deduped: &DedupedStream,
        interval: fep,
    ) -> Vec<Self> {
        let gradients = deduped.log_gradient(nodes, |node| node.plasma.b_mag);
        nodes
            .iter()
            .enumerate()
            .map(|(shell, node)| {
                let (dlnb_dt, dlnn_dt) = match previous_nodes {
                    Some(previous) if interval > 0.0 => {
                        let old = &previous[shell].plasma;
                        (
                            (node.plasma.b_mag / old.b_mag).ln() / interval,
                            (node.plasma.density / old.density).ln() / interval,
                        )
                    }
                    _ => (0.0, 0.0),
                };
                Self {
                    dlnb_dt,
                    dlnn_dt,
                    dlnb_ds: gradients[deduped.representative_of(shell)],
                }
            })
            .collect()
    }
}

/// Smallest stable step over all bins of the given shell, for an advection
/// rate given as a function of `(species, energy, mu)`.
fn shell_stable_step<R>(
    stream: usize,
    shell: usize,
    phase_space: &PhaseSpace,
    spacing: fep,
    courant_limit: fep,
    rate: R,
) -> StableStep
where
    R: Fn(usize, usize, usize) -> fep,
{
    let mut stable = StableStep::unlimited();
    for species in 0..phase_space.num_species() {
        for energy in 0..phase_space.num_energies() {
            for mu in 0..phase_space.num_mu() {
                let speed = rate(species, energy, mu).abs();
                if speed > 0.0 {
                    stable.limit(
                        courant_limit * spacing / speed,
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

/// Change of particle energy due to compression and expansion of the plasma.
pub struct AdiabaticChange {
    advector: Box<dyn Advector>,
    isotropic: bool,
}

impl AdiabaticChange {
    pub fn new(algorithm: AdiabaticChangeAlgorithm) -> Self {
        let (advector, isotropic): (Box<dyn Advector>, bool) = match algorithm {
            AdiabaticChangeAlgorithm::Upwind => (Box::new(UpwindAdvector), false),
            AdiabaticChangeAlgorithm::Weno3 => (Box::new(Weno3Advector), false),
            AdiabaticChangeAlgorithm::IsotropicUpwind => (Box::new(UpwindAdvector), true),
        };
        Self {
            advector,
            isotropic,
        }
    }

    /// Computes `dln(E)/dt` for a particle with the given kinetic energy
    /// [m_p c^2 per nucleon] and pitch-angle cosine.
    pub fn log_energy_rate(&self, rates: &AdiabaticRates, energy: fep, mu: fep) -> fep {
        let gamma = 1.0 + energy;
        let factor = (gamma + 1.0) / gamma;
        if self.isotropic {
            factor * rates.dlnn_dt / 3.0
        } else {
            let mu2 = mu * mu;
            factor * (0.5 * (1.0 - 3.0 * mu2) * rates.dlnb_dt + mu2 * rates.dlnn_dt)
        }
    }

    /// Computes the largest stable substep for energy change on a stream.
    pub fn stable_step(
        &self,
        stream: usize,
        rates: &[AdiabaticRates],
        phase_space: &PhaseSpace,
    ) -> StableStep {
        let spacing = phase_space.energies.log_spacing();
        rates
            .par_iter()
            .enumerate()
            .map(|(shell, node_rates)| {
                shell_stable_step(
                    stream,
                    shell,
                    phase_space,
                    spacing,
                    self.advector.courant_limit(),
                    |species, energy, mu| {
                        self.log_energy_rate(
                            node_rates,
                            phase_space.energies.energy(species, energy),
                            phase_space.mu.value(mu),
                        )
                    },
                )
            })
            .reduce(StableStep::unlimited, StableStep::min)
    }

    /// Advects the distribution of every node in log energy.
    pub fn apply(
        &self,
        distribution: &mut Array4<fep>,
        rates: &[AdiabaticRates],
        phase_space: &PhaseSpace,
        time_step: fep,
        num_substeps: usize,
    ) {
        let num_energies = phase_space.num_energies();
        if num_energies < 2 {
            return;
        }
        let dt = time_step / num_substeps as fep;
        let dx = phase_space.energies.log_spacing();

        distribution
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(rates.par_iter())
            .for_each(|(mut shell_values, node_rates)| {
                let mut column = vec![0.0; num_energies];
                let mut courant_numbers = vec![0.0; num_energies];
                for species in 0..phase_space.num_species() {
                    for mu in 0..phase_space.num_mu() {
                        let mu_value = phase_space.mu.value(mu);
                        for (energy, nu) in courant_numbers.iter_mut().enumerate() {
                            *nu = self.log_energy_rate(
                                node_rates,
                                phase_space.energies.energy(species, energy),
                                mu_value,
                            ) * dt
                                / dx;
                        }
                        if courant_numbers.iter().all(|&nu| nu == 0.0) {
                            continue;
                        }
                        for (energy, value) in column.iter_mut().enumerate() {
                            *value = shell_values[[species, energy, mu]];
                        }
                        for _ in 0..num_substeps {
                            self.advector.advance(
                                &mut column,
                                &courant_numbers,
                                EdgeTreatment::PowerLaw,
                            );
                        }
                        for (energy, &value) in column.iter().enumerate() {
                            shell_values[[species, energy, mu]] = value;
                        }
                    }
                }
            });
    }
}

/// Change of pitch angle due to the converging field and the evolving plasma.
pub struct AdiabaticFocusing {
    advector: Box<dyn Advector>,
    static_field: bool,
}

impl AdiabaticFocusing {
    pub fn new(algorithm: AdiabaticFocusAlgorithm) -> Self {
        let (advector, static_field): (Box<dyn Advector>, bool) = match algorithm {
            AdiabaticFocusAlgorithm::Upwind => (Box::new(UpwindAdvector), false),
            AdiabaticFocusAlgorithm::Weno3 => (Box::new(Weno3Advector), false),
            AdiabaticFocusAlgorithm::StaticFieldUpwind => (Box::new(UpwindAdvector), true),
        };
        Self {
            advector,
            static_field,
        }
    }

    /// Computes `dmu/dt` for a particle with the given speed [c] and
    /// pitch-angle cosine.
    pub fn pitch_angle_rate(&self, rates: &AdiabaticRates, speed: fep, mu: fep) -> fep {
        let mirror = -speed * rates.dlnb_ds;
        let drive = if self.static_field {
            mirror
        } else {
            mirror - mu * rates.dlnb_dt + 2.0 * mu * (rates.dlnn_dt - rates.dlnb_dt)
        };
        0.5 * (1.0 - mu * mu) * drive
    }

    /// Computes the largest stable substep for focusing on a stream.
    pub fn stable_step(
        &self,
        stream: usize,
        rates: &[AdiabaticRates],
        phase_space: &PhaseSpace,
    ) -> StableStep {
        let spacing = phase_space.mu.spacing();
        rates
            .par_iter()
            .enumerate()
            .map(|(shell, node_rates)| {
                shell_stable_step(
                    stream,
                    shell,
                    phase_space,
                    spacing,
                    self.advector.courant_limit(),
                    |species, energy, mu| {
                        self.pitch_angle_rate(
                            node_rates,
                            phase_space.energies.speed(species, energy),
                            phase_space.mu.value(mu),
                        )
                    },
                )
            })
            .reduce(StableStep::unlimited, StableStep::min)
    }

    /// Advects the distribution of every node in pitch-angle cosine.
    pub fn apply(
        &self,
        distribution: &mut Array4<fep>,
        rates: &[AdiabaticRates],
        phase_space: &PhaseSpace,
        time_step: fep,
        num_substeps: usize,
    ) {
        let num_mu = phase_space.num_mu();
        if num_mu < 2 {
            return;
        }
        let dt = time_step / num_substeps as fep;
        let dmu = phase_space.mu.spacing();

        distribution
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(rates.par_iter())
            .for_each(|(mut shell_values, node_rates)| {
                let mut courant_numbers = vec![0.0; num_mu];
                for species in 0..phase_space.num_species() {
                    for energy in 0..phase_space.num_energies() {
                        let speed = phase_space.energies.speed(species, energy);
                        for (mu, nu) in courant_numbers.iter_mut().enumerate() {
                            *nu = self.pitch_angle_rate(node_rates, speed, phase_space.mu.value(mu))
                                * dt
                                / dmu;
                        }
                        if courant_numbers.iter().all(|&nu| nu == 0.0) {
                            continue;
                        }
                        let mut column =
                            shell_values.slice(ndarray::s![species, energy, ..]).to_vec();
                        for _ in 0..num_substeps {
                            self.advector.advance(
                                &mut column,
                                &courant_numbers,
                                EdgeTreatment::ZeroSlope,
                            );
                        }
                        for (mu, &value) in column.iter().enumerate() {
                            shell_values[[species, energy, mu]] = value;
                        }
                    }
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SolverConfig,
        geometry::{SphVec, Vec3},
        plasma::PlasmaState,
        transport::FLOOR,
    };
    use approx::assert_relative_eq;

    fn node(r: fep, density: fep, b_mag: fep) -> StreamNode {
        StreamNode {
            position: Vec3::new(r, 0.0, 0.0),
            plasma: PlasmaState {
                density,
                b_mag,
                velocity: Vec3::zero(),
                curl_b_over_b2: SphVec::zero(),
            },
        }
    }

    fn small_phase_space() -> PhaseSpace {
        let mut config = SolverConfig::default();
        config.grid.num_nodes_per_stream = 3;
        config.grid.num_energy_steps = 8;
        config.grid.num_mu_steps = 6;
        PhaseSpace::new(&config)
    }

    fn power_law(phase_space: &PhaseSpace) -> Array4<fep> {
        let mut distribution = phase_space.layout.new_distribution(0.0);
        for ((_, species, energy, _), value) in distribution.indexed_iter_mut() {
            *value = phase_space.energies.energy(species, energy).powi(-2);
        }
        distribution
    }

    #[test]
    fn rates_follow_background_change() {
        let previous = vec![node(1.0, 2.0, 1.0), node(1.1, 2.0, 1.0)];
        let current = vec![node(1.0, 1.0, 0.5), node(1.1, 1.0, 0.25)];
        let deduped = DedupedStream::new(&current, 1e-6);

        let rates = AdiabaticRates::for_stream(Some(&previous), &current, &deduped, 2.0);
        assert_relative_eq!(rates[0].dlnn_dt, -(2.0 as fep).ln() / 2.0);
        assert_relative_eq!(rates[1].dlnb_dt, -(4.0 as fep).ln() / 2.0);
        assert_relative_eq!(rates[0].dlnb_ds, -(2.0 as fep).ln() / 0.1, max_relative = 1e-12);

        let initial = AdiabaticRates::for_stream(None, &current, &deduped, 2.0);
        assert!(initial.iter().all(|r| r.dlnb_dt == 0.0 && r.dlnn_dt == 0.0));
    }

    #[test]
    fn expansion_cools_particles() {
        let phase_space = small_phase_space();
        let change = AdiabaticChange::new(AdiabaticChangeAlgorithm::IsotropicUpwind);
        let rates = vec![
            AdiabaticRates {
                dlnn_dt: -0.5,
                ..AdiabaticRates::default()
            };
            3
        ];
        let rate = change.log_energy_rate(&rates[0], 0.01, 0.3);
        assert!(rate < 0.0);

        let stable = change.stable_step(0, &rates, &phase_space);
        assert!(stable.time_step.is_finite() && stable.time_step > 0.0);

        let original = power_law(&phase_space);
        let mut distribution = original.clone();
        change.apply(&mut distribution, &rates, &phase_space, stable.time_step, 1);
        // A falling spectrum shifted to lower energies decreases everywhere
        for ((shell, species, energy, mu), &value) in distribution.indexed_iter() {
            let before = original[[shell, species, energy, mu]];
            assert!(value <= before * (1.0 + 1e-12));
            assert!(value >= FLOOR);
        }
    }

    #[test]
    fn static_background_leaves_energy_unchanged() {
        let phase_space = small_phase_space();
        let rates = vec![AdiabaticRates::default(); 3];
        for algorithm in [
            AdiabaticChangeAlgorithm::Upwind,
            AdiabaticChangeAlgorithm::Weno3,
            AdiabaticChangeAlgorithm::IsotropicUpwind,
        ] {
            let change = AdiabaticChange::new(algorithm);
            assert_eq!(
                change.stable_step(0, &rates, &phase_space).time_step,
                fep::INFINITY
            );
            let mut distribution = power_law(&phase_space);
            change.apply(&mut distribution, &rates, &phase_space, 1.0, 1);
            assert_eq!(distribution, power_law(&phase_space));
        }
    }

    #[test]
    fn diverging_field_focuses_particles_outward() {
        let phase_space = small_phase_space();
        let focusing = AdiabaticFocusing::new(AdiabaticFocusAlgorithm::StaticFieldUpwind);
        let rates = vec![
            AdiabaticRates {
                dlnb_ds: -2.0,
                // Ignored by the static field variant
                dlnb_dt: 100.0,
                ..AdiabaticRates::default()
            };
            3
        ];
        assert!(focusing.pitch_angle_rate(&rates[0], 0.5, 0.0) > 0.0);
        assert_eq!(focusing.pitch_angle_rate(&rates[0], 0.5, 1.0), 0.0);

        let stable = focusing.stable_step(0, &rates, &phase_space);
        let mut distribution = phase_space.layout.new_distribution(1.0);
        distribution
            .slice_mut(ndarray::s![.., .., .., 0])
            .fill(2.0);
        focusing.apply(&mut distribution, &rates, &phase_space, stable.time_step, 1);
        // Particles move away from the most negative pitch-angle cosine
        assert!(distribution[[0, 0, 0, 1]] > 1.0);
        assert_relative_eq!(distribution[[0, 0, 0, 2]], 1.0);
        assert!(
            distribution.iter().all(|&value| value >= FLOOR && value <= 2.0)
        );
    }

    #[test]
    fn weno_focusing_is_selected_with_half_courant_limit() {
        let phase_space = small_phase_space();
        let rates = vec![
            AdiabaticRates {
                dlnb_ds: -2.0,
                ..AdiabaticRates::default()
            };
            3
        ];
        let upwind = AdiabaticFocusing::new(AdiabaticFocusAlgorithm::Upwind)
            .stable_step(0, &rates, &phase_space);
        let weno = AdiabaticFocusing::new(AdiabaticFocusAlgorithm::Weno3)
            .stable_step(0, &rates, &phase_space);
        assert_relative_eq!(weno.time_step, 0.5 * upwind.time_step, max_relative = 1e-12);
        assert_eq!(weno.location, upwind.location);
    }
}
