//! Layout of the distribution function and the energy and pitch-angle grids.

use crate::{
    config::{SolverConfig, SpeciesTable},
    constants::MC2_PROTON_GEV,
    transport::fep,
};
use ndarray::{Array2, Array4};

/// Shape of the distribution function of a single stream, and the single
/// place where flat offsets into it are defined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseSpaceLayout {
    num_shells: usize,
    num_species: usize,
    num_energies: usize,
    num_mu: usize,
}

impl PhaseSpaceLayout {
    pub fn new(num_shells: usize, num_species: usize, num_energies: usize, num_mu: usize) -> Self {
        Self {
            num_shells,
            num_species,
            num_energies,
            num_mu,
        }
    }

    pub fn num_shells(&self) -> usize {
        self.num_shells
    }

    pub fn num_species(&self) -> usize {
        self.num_species
    }

    pub fn num_energies(&self) -> usize {
        self.num_energies
    }

    pub fn num_mu(&self) -> usize {
        self.num_mu
    }

    /// Shape of the distribution array of a stream.
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        (
            self.num_shells,
            self.num_species,
            self.num_energies,
            self.num_mu,
        )
    }

    /// Number of bins belonging to a single node.
    pub fn node_block_len(&self) -> usize {
        self.num_species * self.num_energies * self.num_mu
    }

    /// Flat offset of the given bin within the block of a single node, in
    /// the standard (row major) order of a stream distribution array.
    pub fn node_offset(&self, species: usize, energy: usize, mu: usize) -> usize {
        (species * self.num_energies + energy) * self.num_mu + mu
    }

    /// Creates a stream distribution array filled with the given value.
    pub fn new_distribution(&self, value: fep) -> Array4<fep> {
        Array4::from_elem(self.shape(), value)
    }
}

/// Energy grid with tabulated speeds and rigidities for each species.
///
/// All species share the same energies per nucleon, which are spaced
/// logarithmically between the configured bounds.
#[derive(Clone, Debug)]
pub struct EnergyGrid {
    energies: Array2<fep>,
    speeds: Array2<fep>,
    rigidities: Array2<fep>,
    log_spacing: fep,
}

impl EnergyGrid {
    /// Creates the energy grid for the given species.
    pub fn new(species: &SpeciesTable, e_min: fep, e_max: fep, num_energies: usize) -> Self {
        assert!(num_energies > 1, "Energy grid needs at least two energies");
        assert!(e_min > 0.0 && e_max > e_min, "Invalid energy range");

        let log_spacing = (e_max / e_min).ln() / (num_energies - 1) as fep;
        let shape = (species.len(), num_energies);

        let energies =
            Array2::from_shape_fn(shape, |(_, k)| e_min * (log_spacing * k as fep).exp());
        let speeds = energies.mapv(speed_from_energy);
        let rigidities = Array2::from_shape_fn(shape, |(s, k)| {
            let sp = species.get(s);
            rigidity_from_energy(energies[[s, k]], sp.mass, sp.charge)
        });

        Self {
            energies,
            speeds,
            rigidities,
            log_spacing,
        }
    }

    pub fn num_energies(&self) -> usize {
        self.energies.ncols()
    }

    /// Kinetic energy per nucleon of the given bin [proton rest energies].
    pub fn energy(&self, species: usize, energy: usize) -> fep {
        self.energies[[species, energy]]
    }

    /// Particle speed of the given bin [c].
    pub fn speed(&self, species: usize, energy: usize) -> fep {
        self.speeds[[species, energy]]
    }

    /// Magnitude of the rigidity of the given bin [GV].
    pub fn rigidity(&self, species: usize, energy: usize) -> fep {
        self.rigidities[[species, energy]]
    }

    /// Spacing of the grid in the logarithm of energy.
    pub fn log_spacing(&self) -> fep {
        self.log_spacing
    }

    /// Returns the full table of energies, indexed `[species, energy]`.
    pub fn energies(&self) -> &Array2<fep> {
        &self.energies
    }
}

/// Pitch-angle cosine grid of uniformly spaced cell centres on [-1, 1].
#[derive(Clone, Debug)]
pub struct MuGrid {
    values: Vec<fep>,
    spacing: fep,
}

impl MuGrid {
    pub fn new(num_mu: usize) -> Self {
        assert!(num_mu > 0, "Pitch-angle grid must be non-empty");
        let spacing = 2.0 / num_mu as fep;
        let values = (0..num_mu)
            .map(|i| -1.0 + (i as fep + 0.5) * spacing)
            .collect();
        Self { values, spacing }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, mu: usize) -> fep {
        self.values[mu]
    }

    pub fn values(&self) -> &[fep] {
        &self.values
    }

    pub fn spacing(&self) -> fep {
        self.spacing
    }
}

/// Layout and grids of the phase space shared by all streams.
#[derive(Clone, Debug)]
pub struct PhaseSpace {
    pub layout: PhaseSpaceLayout,
    pub energies: EnergyGrid,
    pub mu: MuGrid,
}

impl PhaseSpace {
    /// Creates the phase space described by the given configuration.
    pub fn new(config: &SolverConfig) -> Self {
        let grid = &config.grid;
        Self {
            layout: PhaseSpaceLayout::new(
                grid.num_nodes_per_stream,
                config.num_species(),
                grid.num_energy_steps,
                grid.num_mu_steps,
            ),
            energies: EnergyGrid::new(
                &config.species,
                grid.e_min,
                grid.e_max,
                grid.num_energy_steps,
            ),
            mu: MuGrid::new(grid.num_mu_steps),
        }
    }

    pub fn num_species(&self) -> usize {
        self.layout.num_species()
    }

    pub fn num_energies(&self) -> usize {
        self.layout.num_energies()
    }

    pub fn num_mu(&self) -> usize {
        self.layout.num_mu()
    }
}

/// Computes the speed [c] of a particle with the given kinetic energy per
/// nucleon [proton rest energies].
pub fn speed_from_energy(energy: fep) -> fep {
    fep::sqrt(energy * (energy + 2.0)) / (1.0 + energy)
}

/// Computes the rigidity [GV] of a particle with the given kinetic energy per
/// nucleon, mass [nucleons] and charge [elementary charges].
pub fn rigidity_from_energy(energy: fep, mass: fep, charge: fep) -> fep {
    mass * MC2_PROTON_GEV * fep::sqrt(energy * (energy + 2.0)) / charge.abs()
}
