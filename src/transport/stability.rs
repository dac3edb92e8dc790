//! Subcycling required for the explicit operators to remain stable.

use super::fep;
use crate::{
    comm::Communicator,
    error::{BinLocation, OperatorKind, TransportError},
};

#[cfg(feature = "serialization")]
use serde::Serialize;

/// Largest stable time step of an operator and the bin where it is attained.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StableStep {
    pub time_step: fep,
    pub location: BinLocation,
}

impl StableStep {
    /// A stable step without any limit.
    pub fn unlimited() -> Self {
        Self {
            time_step: fep::INFINITY,
            location: BinLocation::default(),
        }
    }

    /// Lowers the stable time step to the given value if it is smaller.
    pub fn limit(&mut self, time_step: fep, location: BinLocation) {
        if time_step < self.time_step {
            self.time_step = time_step;
            self.location = location;
        }
    }

    /// Returns the more restrictive of the two stable steps.
    pub fn min(self, other: Self) -> Self {
        if other.time_step < self.time_step {
            other
        } else {
            self
        }
    }
}

/// Number of subcycles an operator needs for a given outer time step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct SubcycleCount {
    pub operator: OperatorKind,
    pub subcycles: usize,
    /// Bin requiring the largest number of subcycles.
    pub location: BinLocation,
}

/// Subcycle counts of every operator together with the smallest stable
/// time step over all operators.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct StabilityEstimate {
    counts: Vec<SubcycleCount>,
    min_tau: fep,
}

impl StabilityEstimate {
    /// Computes the subcycle counts for the given outer time step from the
    /// stable steps of each operator. Operators not listed need one cycle.
    pub fn from_stable_steps(time_step: fep, stable_steps: &[(OperatorKind, StableStep)]) -> Self {
        let counts = OperatorKind::ALL
            .iter()
            .map(|&operator| {
                let stable_step = stable_steps
                    .iter()
                    .filter(|(kind, _)| *kind == operator)
                    .fold(StableStep::unlimited(), |acc, (_, step)| acc.min(*step));
                SubcycleCount {
                    operator,
                    subcycles: required_subcycles(time_step, stable_step.time_step),
                    location: stable_step.location,
                }
            })
            .collect();
        let min_tau = stable_steps
            .iter()
            .fold(fep::INFINITY, |min, (_, step)| min.min(step.time_step));
        Self { counts, min_tau }
    }

    /// Merges with another estimate, keeping the larger count of each
    /// operator and the smaller stable time step.
    pub fn merge(&mut self, other: &Self) {
        for (count, other_count) in self.counts.iter_mut().zip(&other.counts) {
            if other_count.subcycles > count.subcycles {
                *count = *other_count;
            }
        }
        self.min_tau = self.min_tau.min(other.min_tau);
    }

    /// Combines the estimates of all workers so that every worker ends up
    /// with the same counts, corresponding to the globally smallest substeps.
    pub fn reduce<C: Communicator>(self, comm: &C) -> Self {
        let mut all = comm.all_gather(self).into_iter();
        let mut reduced = all.next().unwrap_or_else(|| unreachable!("gather includes own value"));
        for estimate in all {
            reduced.merge(&estimate);
        }
        reduced
    }

    /// Number of subcycles to use for the given operator.
    pub fn subcycles(&self, operator: OperatorKind) -> usize {
        self.counts
            .iter()
            .find(|count| count.operator == operator)
            .map_or(1, |count| count.subcycles)
    }

    pub fn counts(&self) -> &[SubcycleCount] {
        &self.counts
    }

    /// Smallest stable time step of any operator.
    pub fn min_tau(&self) -> fep {
        self.min_tau
    }

    /// Checks that no operator needs more than the given number of subcycles.
    pub fn verify(&self, time_step: fep, max_subcycles: usize) -> Result<(), TransportError> {
        match self
            .counts
            .iter()
            .find(|count| count.subcycles > max_subcycles)
        {
            Some(count) => Err(TransportError::Unstable {
                operator: count.operator,
                location: count.location,
                time_step,
                required_subcycles: count.subcycles,
                max_subcycles,
            }),
            None => Ok(()),
        }
    }
}

/// Computes the number of equal substeps of the given time step needed for
/// every substep to be no longer than the stable time step.
pub fn required_subcycles(time_step: fep, stable_time_step: fep) -> usize {
    if stable_time_step.is_nan() || stable_time_step <= 0.0 {
        return usize::MAX;
    }
    let subcycles = (time_step / stable_time_step).ceil();
    if subcycles >= usize::MAX as fep {
        usize::MAX
    } else {
        usize::max(subcycles as usize, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{run_workers, SerialCommunicator};

    fn location(stream: usize) -> BinLocation {
        BinLocation {
            stream,
            shell: 1,
            species: 0,
            energy: 2,
        }
    }

    #[test]
    fn subcycles_cover_the_time_step() {
        assert_eq!(required_subcycles(1.0, fep::INFINITY), 1);
        assert_eq!(required_subcycles(1.0, 2.0), 1);
        assert_eq!(required_subcycles(1.0, 0.3), 4);
        assert_eq!(required_subcycles(1.0, 0.0), usize::MAX);
    }

    #[test]
    fn estimate_tracks_most_restrictive_bin() {
        let mut first = StableStep::unlimited();
        first.limit(0.5, location(0));
        first.limit(0.25, location(1));
        first.limit(0.4, location(2));
        let estimate = StabilityEstimate::from_stable_steps(1.0, &[(OperatorKind::Drift, first)]);
        assert_eq!(estimate.subcycles(OperatorKind::Drift), 4);
        assert_eq!(estimate.subcycles(OperatorKind::Streaming), 1);
        assert_eq!(estimate.min_tau(), 0.25);
        let drift = estimate.counts()[2];
        assert_eq!(drift.operator, OperatorKind::Drift);
        assert_eq!(drift.location, location(1));

        let serial = estimate.clone().reduce(&SerialCommunicator);
        assert_eq!(serial, estimate);
    }

    #[test]
    fn reduction_applies_global_minimum_substep_on_every_worker() {
        let local_steps = [0.5, 0.05, 0.2, 0.1];
        let results = run_workers(local_steps.len(), |comm| {
            let mut step = StableStep::unlimited();
            step.limit(local_steps[comm.rank()], location(comm.rank()));
            StabilityEstimate::from_stable_steps(1.0, &[(OperatorKind::AdiabaticChange, step)])
                .reduce(&comm)
        });
        for estimate in results {
            assert_eq!(estimate.subcycles(OperatorKind::AdiabaticChange), 20);
            assert_eq!(estimate.min_tau(), 0.05);
            assert_eq!(estimate.counts()[3].location.stream, 1);
        }
    }

    #[test]
    fn excessive_subcycling_is_reported() {
        let mut step = StableStep::unlimited();
        step.limit(1e-3, location(7));
        let estimate =
            StabilityEstimate::from_stable_steps(1.0, &[(OperatorKind::AdiabaticFocusing, step)]);
        assert!(estimate.verify(1.0, 1000).is_ok());
        match estimate.verify(1.0, 999) {
            Err(TransportError::Unstable {
                operator,
                location,
                required_subcycles,
                ..
            }) => {
                assert_eq!(operator, OperatorKind::AdiabaticFocusing);
                assert_eq!(location.stream, 7);
                assert_eq!(required_subcycles, 1000);
            }
            other => panic!("Expected stability violation, got {:?}", other),
        }
    }
}
