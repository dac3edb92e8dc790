//! Gradient and curvature drift of particles across streams.

use super::{fep, floored, stability::StableStep, stream_list::NeighbourStream};
use crate::{
    config::SpeciesTable,
    constants::GV_TO_STATVOLT,
    error::BinLocation,
    geometry::{SphVec, Vec3},
    grid::phase_space::PhaseSpace,
    plasma::StreamNode,
    units::{U_B, U_L},
};
use lazy_static::lazy_static;
use ndarray::Array4;

lazy_static! {
    /// Converts `R[GV]*v[c]*curl(B/B^2)[1/(U_B AU)]` to a speed [c].
    static ref DRIFT_NORM: fep = GV_TO_STATVOLT / (*U_B * U_L);
}

/// Drift of the pitch-angle averaged distribution between neighbouring streams.
#[derive(Clone, Debug)]
pub struct DriftOperator {
    charge_signs: Vec<fep>,
}

impl DriftOperator {
    pub fn new(species: &SpeciesTable) -> Self {
        Self {
            charge_signs: species.iter().map(|sp| sp.charge.signum()).collect(),
        }
    }

    /// Computes the drift velocity [c] of the given species and energy bin at
    /// the given position, where `curl_b_over_b2` is given in the local
    /// spherical basis.
    pub fn drift_velocity(
        &self,
        phase_space: &PhaseSpace,
        species: usize,
        energy: usize,
        curl_b_over_b2: &SphVec<fep>,
        position: &Vec3<fep>,
    ) -> Vec3<fep> {
        let rigidity = self.charge_signs[species] * phase_space.energies.rigidity(species, energy);
        let speed = phase_space.energies.speed(species, energy);
        curl_b_over_b2.to_cartesian(position) * (rigidity * speed * *DRIFT_NORM / 3.0)
    }

    /// Computes, for each neighbour with a distinct node on the given shell,
    /// the neighbour index, the drift speed from the node towards the
    /// neighbour node and their separation.
    fn face_speeds(
        &self,
        node: &StreamNode,
        shell: usize,
        neighbours: &[NeighbourStream],
        phase_space: &PhaseSpace,
        species: usize,
        energy: usize,
    ) -> Vec<(usize, fep, fep)> {
        let own_drift = self.drift_velocity(
            phase_space,
            species,
            energy,
            &node.plasma.curl_b_over_b2,
            &node.position,
        );
        neighbours
            .iter()
            .enumerate()
            .filter_map(|(idx, neighbour)| {
                let other = &neighbour.nodes[shell];
                let separation = other.position - node.position;
                let distance = separation.length();
                if distance <= 0.0 {
                    return None;
                }
                let other_drift = self.drift_velocity(
                    phase_space,
                    species,
                    energy,
                    &other.plasma.curl_b_over_b2,
                    &other.position,
                );
                let face_drift = (own_drift + other_drift) * 0.5;
                Some((idx, face_drift.dot(&(separation / distance)), distance))
            })
            .collect()
    }

    /// Computes the largest stable substep for drift on a stream.
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
                    let outflow_rate: fep = self
                        .face_speeds(node, shell, neighbours, phase_space, species, energy)
                        .iter()
                        .map(|&(_, speed, distance)| speed.max(0.0) / distance)
                        .sum();
                    if outflow_rate > 0.0 {
                        stable.limit(
                            1.0 / outflow_rate,
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

    /// Moves particles between the stream and its neighbours by first-order
    /// upwind exchange. Neighbour values are held fixed.
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
                    let speeds =
                        self.face_speeds(node, shell, neighbours, phase_space, species, energy);
                    let outflow_rate: fep = speeds
                        .iter()
                        .map(|&(_, speed, distance)| speed.max(0.0) / distance)
                        .sum();

                    for mu in 0..phase_space.num_mu() {
                        let inflow: fep = speeds
                            .iter()
                            .filter(|&&(_, speed, _)| speed < 0.0)
                            .map(|&(idx, speed, distance)| {
                                -speed / distance
                                    * neighbours[idx].distribution[[shell, species, energy, mu]]
                            })
                            .sum();
                        let mut value = distribution[[shell, species, energy, mu]];
                        for _ in 0..num_substeps {
                            value += dt * (inflow - outflow_rate * value);
                        }
                        distribution[[shell, species, energy, mu]] = floored(value);
                    }
                }
            }
        }
    }
}
