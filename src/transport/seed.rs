//! Analytic seed population near the inner boundary.

use super::{fep, FLOOR};
use crate::{
    config::SeedConfig, grid::phase_space::EnergyGrid, plasma::StreamNode, units,
};
use ndarray::{Array4, Axis};

/// Number of innermost shells on which the seed population is enforced.
pub const SEEDED_SHELLS: usize = 3;

/// Power-law seed spectrum with an exponential cutoff and a radial power-law
/// dependence.
///
/// The differential flux is
/// `J(E, r) = J0*(r/r0)^(-beta)*(E/Er)^(-gamma)*exp(-E/Ec)/xi`,
/// and the distribution function is `J/(2E)`.
#[derive(Clone, Debug, PartialEq)]
pub struct SeedSpectrum {
    norm_amplitude: fep,
    norm_reference_energy: fep,
    norm_cutoff_energy: fep,
    xi: fep,
    gamma: fep,
    beta: fep,
    r0: fep,
}

impl SeedSpectrum {
    /// Creates the seed spectrum described by the given configuration.
    pub fn new(config: &SeedConfig) -> Self {
        Self {
            norm_amplitude: units::flux_to_internal(config.amplitude),
            norm_reference_energy: units::mev_to_internal(config.er),
            norm_cutoff_energy: units::mev_to_internal(config.ecutoff),
            xi: config.xi,
            gamma: config.gamma,
            beta: config.beta,
            r0: config.r0,
        }
    }

    /// Flux amplitude in internal units.
    pub fn norm_amplitude(&self) -> fep {
        self.norm_amplitude
    }

    /// Reference energy in internal units.
    pub fn norm_reference_energy(&self) -> fep {
        self.norm_reference_energy
    }

    /// Evaluates the seed distribution at the given kinetic energy per nucleon
    /// and radial distance [AU]. The result is never below [`FLOOR`].
    pub fn distribution(&self, energy: fep, radius: fep) -> fep {
        let radial_term = (radius / self.r0).powf(-self.beta);
        let power_law_term = (energy / self.norm_reference_energy).powf(-self.gamma);
        let exp_term = fep::exp(-energy / self.norm_cutoff_energy);
        let flux = self.norm_amplitude * radial_term * power_law_term * exp_term / self.xi;
        let distribution = flux / (2.0 * energy);
        if distribution >= FLOOR {
            distribution
        } else {
            FLOOR
        }
    }

    /// Raises every bin of the given shell of a stream distribution to at
    /// least `factor` times the seed value at the given radius, for energies
    /// not below `min_energy`. Returns whether any value was changed.
    pub fn raise_shell(
        &self,
        distribution: &mut Array4<fep>,
        shell: usize,
        radius: fep,
        energy_grid: &EnergyGrid,
        factor: fep,
        min_energy: fep,
    ) -> bool {
        let mut changed = false;
        for (species, mut species_values) in distribution
            .index_axis_mut(Axis(0), shell)
            .outer_iter_mut()
            .enumerate()
        {
            for (energy_idx, mut mu_values) in species_values.outer_iter_mut().enumerate() {
                let energy = energy_grid.energy(species, energy_idx);
                if energy < min_energy {
                    continue;
                }
                let target = factor * self.distribution(energy, radius);
                for value in mu_values.iter_mut() {
                    if *value < target {
                        *value = target;
                        changed = true;
                    }
                }
            }
        }
        changed
    }
}

/// Raises the distribution on the innermost [`SEEDED_SHELLS`] shells of a
/// stream to the seed population wherever it falls below it.
///
/// Values are never lowered, so applying this more than once has no further effect.
pub fn enforce_seed_population(
    distribution: &mut Array4<fep>,
    nodes: &[StreamNode],
    seed: &SeedSpectrum,
    energy_grid: &EnergyGrid,
) {
    for (shell, node) in nodes.iter().enumerate().take(SEEDED_SHELLS) {
        seed.raise_shell(distribution, shell, node.radius(), energy_grid, 1.0, 0.0);
    }
}

/// Fills the whole distribution of a stream with the seed population.
pub fn fill_with_seed_population(
    distribution: &mut Array4<fep>,
    nodes: &[StreamNode],
    seed: &SeedSpectrum,
    energy_grid: &EnergyGrid,
) {
    for ((shell, species, energy, _), value) in distribution.indexed_iter_mut() {
        *value = seed.distribution(energy_grid.energy(species, energy), nodes[shell].radius());
    }
}
