//! Gathering of streams and their neighbours across workers.

use super::fep;
use crate::{
    comm::Communicator,
    error::TransportError,
    grid::{phase_space::PhaseSpaceLayout, StreamGrid},
    plasma::StreamNode,
};
use ndarray::{s, Array4, Axis};
use std::collections::BTreeSet;

/// Position, plasma state and distribution of a single node, as exchanged
/// between workers.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeRecord {
    pub stream: usize,
    pub shell: usize,
    pub node: StreamNode,
    /// Distribution of the node, flattened with [`PhaseSpaceLayout::node_offset`].
    pub values: Vec<fep>,
}

impl NodeRecord {
    /// Creates the records of all nodes of a stream.
    pub fn from_stream(
        stream: usize,
        nodes: &[StreamNode],
        distribution: &Array4<fep>,
        layout: &PhaseSpaceLayout,
    ) -> Vec<Self> {
        nodes
            .iter()
            .enumerate()
            .map(|(shell, node)| {
                let mut values = vec![0.0; layout.node_block_len()];
                for ((species, energy, mu), &value) in
                    distribution.index_axis(Axis(0), shell).indexed_iter()
                {
                    values[layout.node_offset(species, energy, mu)] = value;
                }
                Self {
                    stream,
                    shell,
                    node: *node,
                    values,
                }
            })
            .collect()
    }
}

/// Read-only copy of a stream owned by some worker.
#[derive(Clone, Debug, PartialEq)]
pub struct NeighbourStream {
    pub stream: usize,
    pub nodes: Vec<StreamNode>,
    pub distribution: Array4<fep>,
}

impl NeighbourStream {
    /// Assembles a stream from the records of its nodes, given in any order.
    ///
    /// Fails if the records do not cover every node of the stream.
    pub fn from_records<'a, I>(
        stream: usize,
        records: I,
        layout: &PhaseSpaceLayout,
    ) -> Result<Self, TransportError>
    where
        I: IntoIterator<Item = &'a NodeRecord>,
    {
        let mut records: Vec<&NodeRecord> = records
            .into_iter()
            .filter(|record| record.stream == stream)
            .collect();
        records.sort_by_key(|record| record.shell);
        records.dedup_by_key(|record| record.shell);
        if records.len() != layout.num_shells() {
            return Err(TransportError::IncompleteStream {
                stream,
                expected: layout.num_shells(),
                found: records.len(),
            });
        }

        let nodes = records.iter().map(|record| record.node).collect();
        let mut distribution = layout.new_distribution(0.0);
        for ((shell, species, energy, mu), value) in distribution.indexed_iter_mut() {
            *value = records[shell].values[layout.node_offset(species, energy, mu)];
        }
        Ok(Self {
            stream,
            nodes,
            distribution,
        })
    }
}

/// Nodes of a stream with near-coincident nodes merged.
///
/// Walking outward, a node closer than the minimum spacing to the last kept
/// representative is merged into that representative.
#[derive(Clone, Debug, PartialEq)]
pub struct DedupedStream {
    representatives: Vec<usize>,
    representative_of: Vec<usize>,
    segment_lengths: Vec<fep>,
}

impl DedupedStream {
    pub fn new(nodes: &[StreamNode], min_spacing: fep) -> Self {
        let mut representatives: Vec<usize> = Vec::with_capacity(nodes.len());
        let mut representative_of = Vec::with_capacity(nodes.len());
        let mut segment_lengths = Vec::with_capacity(nodes.len());

        for (shell, node) in nodes.iter().enumerate() {
            match representatives.last() {
                Some(&last) => {
                    let distance = (node.position - nodes[last].position).length();
                    if distance < min_spacing {
                        representative_of.push(representatives.len() - 1);
                    } else {
                        segment_lengths.push(distance);
                        representative_of.push(representatives.len());
                        representatives.push(shell);
                    }
                }
                None => {
                    representative_of.push(0);
                    representatives.push(shell);
                }
            }
        }
        Self {
            representatives,
            representative_of,
            segment_lengths,
        }
    }

    /// Shell indices of the representative nodes, in outward order.
    pub fn representatives(&self) -> &[usize] {
        &self.representatives
    }

    pub fn num_representatives(&self) -> usize {
        self.representatives.len()
    }

    /// Index of the representative that the node with the given shell index
    /// was merged into (or that it is itself).
    pub fn representative_of(&self, shell: usize) -> usize {
        self.representative_of[shell]
    }

    /// Distances between consecutive representatives [AU].
    pub fn segment_lengths(&self) -> &[fep] {
        &self.segment_lengths
    }

    /// Computes the derivative of the logarithm of the given quantity with
    /// respect to distance along the stream, for every representative.
    ///
    /// The gradient is zero where the representatives around a node coincide.
    pub fn log_gradient<Q>(&self, nodes: &[StreamNode], quantity: Q) -> Vec<fep>
    where
        Q: Fn(&StreamNode) -> fep,
    {
        let n = self.representatives.len();
        if n < 2 {
            return vec![0.0; n];
        }
        let log_values: Vec<fep> = self
            .representatives
            .iter()
            .map(|&shell| quantity(&nodes[shell]).ln())
            .collect();
        (0..n)
            .map(|k| {
                let lower = k.saturating_sub(1);
                let upper = usize::min(k + 1, n - 1);
                let distance: fep = self.segment_lengths[lower..upper].iter().sum();
                let gradient = (log_values[upper] - log_values[lower]) / distance;
                if gradient.is_finite() {
                    gradient
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Copies the values of every representative to the nodes merged into it.
    pub fn propagate_to_members(&self, distribution: &mut Array4<fep>) {
        for (shell, &rep) in self.representative_of.iter().enumerate() {
            let rep_shell = self.representatives[rep];
            if rep_shell != shell {
                let (source, mut target) = distribution
                    .multi_slice_mut((s![rep_shell, .., .., ..], s![shell, .., .., ..]));
                target.assign(&source);
            }
        }
    }
}

/// Deduplicated work stream together with read-only copies of its neighbours.
#[derive(Clone, Debug)]
pub struct StreamList {
    pub stream: usize,
    pub deduped: DedupedStream,
    pub neighbours: Vec<NeighbourStream>,
}

/// Local data of a stream owned by a worker, as needed for gathering.
pub trait OwnedStreamData {
    fn stream(&self) -> usize;
    fn nodes(&self) -> &[StreamNode];
    fn distribution(&self) -> &Array4<fep>;
}

/// Gathers the stream lists of all work indices handled by this worker.
///
/// Every worker takes part in every gather iteration, also when it has no
/// work index left. Returned lists are in order of increasing work index,
/// which is the order of `owned`. If any worker fails to assemble a
/// neighbour stream, every worker returns the same error.
pub fn gather_stream_lists<C, S>(
    comm: &C,
    grid: &StreamGrid,
    layout: &PhaseSpaceLayout,
    owned: &[S],
    min_spacing: fep,
) -> Result<Vec<StreamList>, TransportError>
where
    C: Communicator,
    S: OwnedStreamData,
{
    let (rank, size) = (comm.rank(), comm.size());
    let mut lists = Vec::with_capacity(owned.len());
    let mut incomplete: Option<(usize, usize)> = None;

    for iteration in 0..grid.num_work_iterations(size) {
        let work_index = grid.work_index(rank, size, iteration);

        let request: Vec<usize> = work_index
            .map(|stream| {
                std::iter::once(stream)
                    .chain(grid.in_face_neighbours(stream))
                    .collect()
            })
            .unwrap_or_default();

        let requested: BTreeSet<usize> = comm
            .all_gather(request.clone())
            .into_iter()
            .flatten()
            .collect();

        let contribution: Vec<NodeRecord> = owned
            .iter()
            .filter(|data| requested.contains(&data.stream()))
            .flat_map(|data| {
                NodeRecord::from_stream(data.stream(), data.nodes(), data.distribution(), layout)
            })
            .collect();

        let gathered: Vec<NodeRecord> = comm
            .all_gather(contribution)
            .into_iter()
            .flatten()
            .collect();

        if let Some(stream) = work_index {
            let target = &owned[iteration];
            debug_assert_eq!(target.stream(), stream);
            let mut neighbours = Vec::with_capacity(request.len() - 1);
            for &neighbour in &request[1..] {
                match NeighbourStream::from_records(neighbour, &gathered, layout) {
                    Ok(assembled) => neighbours.push(assembled),
                    Err(_) => {
                        let found = gathered
                            .iter()
                            .filter(|record| record.stream == neighbour)
                            .map(|record| record.shell)
                            .collect::<BTreeSet<_>>()
                            .len();
                        incomplete.get_or_insert((neighbour, found));
                    }
                }
            }
            lists.push(StreamList {
                stream,
                deduped: DedupedStream::new(target.nodes(), min_spacing),
                neighbours,
            });
        }
    }

    match comm.all_gather(incomplete).into_iter().flatten().next() {
        Some((stream, found)) => Err(TransportError::IncompleteStream {
            stream,
            expected: layout.num_shells(),
            found,
        }),
        None => Ok(lists),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        comm::{run_workers, SerialCommunicator},
        geometry::{SphVec, Vec3},
        plasma::PlasmaState,
    };
    use approx::assert_relative_eq;

    fn node_at(r: fep) -> StreamNode {
        StreamNode {
            position: Vec3::new(r, 0.0, 0.0),
            plasma: PlasmaState {
                density: 1.0 / (r * r),
                b_mag: 1.0,
                velocity: Vec3::zero(),
                curl_b_over_b2: SphVec::zero(),
            },
        }
    }

    struct TestStream {
        stream: usize,
        nodes: Vec<StreamNode>,
        distribution: Array4<fep>,
    }

    impl OwnedStreamData for TestStream {
        fn stream(&self) -> usize {
            self.stream
        }
        fn nodes(&self) -> &[StreamNode] {
            &self.nodes
        }
        fn distribution(&self) -> &Array4<fep> {
            &self.distribution
        }
    }

    fn test_stream(stream: usize, layout: &PhaseSpaceLayout) -> TestStream {
        TestStream {
            stream,
            nodes: (0..layout.num_shells())
                .map(|shell| node_at(1.0 + 0.1 * shell as fep + 0.01 * stream as fep))
                .collect(),
            distribution: Array4::from_shape_fn(layout.shape(), |(a, b, c, d)| {
                (stream * 10000 + a * 1000 + b * 100 + c * 10 + d) as fep
            }),
        }
    }

    #[test]
    fn deduplication_merges_close_nodes_and_preserves_order() {
        let nodes: Vec<_> = [1.0, 1.05, 1.06, 1.2, 1.201, 1.4]
            .iter()
            .map(|&r| node_at(r))
            .collect();
        let deduped = DedupedStream::new(&nodes, 0.02);
        assert_eq!(deduped.representatives(), &[0, 1, 3, 5]);
        assert_eq!(
            (0..6).map(|shell| deduped.representative_of(shell)).collect::<Vec<_>>(),
            vec![0, 1, 1, 2, 2, 3]
        );
        let lengths = deduped.segment_lengths();
        assert_eq!(lengths.len(), 3);
        assert_relative_eq!(lengths[0], 0.05, epsilon = 1e-12);
        assert_relative_eq!(lengths[1], 0.15, epsilon = 1e-12);
        assert_relative_eq!(lengths[2], 0.2, epsilon = 1e-12);
    }

    #[test]
    fn merged_nodes_take_values_of_their_representative() {
        let nodes: Vec<_> = [1.0, 1.0001, 1.5].iter().map(|&r| node_at(r)).collect();
        let deduped = DedupedStream::new(&nodes, 0.01);
        let mut distribution =
            Array4::from_shape_fn((3, 1, 2, 2), |(a, _, c, d)| (a * 4 + c * 2 + d) as fep);
        deduped.propagate_to_members(&mut distribution);
        assert_eq!(
            distribution.index_axis(Axis(0), 1),
            distribution.index_axis(Axis(0), 0)
        );
        assert_eq!(distribution[[2, 0, 1, 1]], 11.0);
    }

    #[test]
    fn log_gradient_of_inverse_square_density() {
        let nodes: Vec<_> = (0..10).map(|i| node_at(1.0 + 0.01 * i as fep)).collect();
        let deduped = DedupedStream::new(&nodes, 1e-6);
        let gradient = deduped.log_gradient(&nodes, |node| node.plasma.density);
        // dln(r^-2)/dr = -2/r
        assert_relative_eq!(gradient[5], -2.0 / 1.05, epsilon = 1e-3);
        assert!(gradient.iter().all(|&g| g < 0.0));
    }

    #[test]
    fn coincident_nodes_give_zero_log_gradient() {
        let nodes: Vec<_> = [1.0, 1.0, 1.2].iter().map(|&r| node_at(r)).collect();
        let deduped = DedupedStream::new(&nodes, 0.0);
        assert_eq!(deduped.num_representatives(), 3);
        assert_eq!(deduped.segment_lengths()[0], 0.0);

        let gradient = deduped.log_gradient(&nodes, |node| node.plasma.density);
        assert!(gradient.iter().all(|g| g.is_finite()));
        assert_eq!(gradient[0], 0.0);
        assert_relative_eq!(gradient[2], -2.0 * fep::ln(1.2) / 0.2, epsilon = 1e-12);
    }

    #[test]
    fn records_round_trip_through_layout() {
        let layout = PhaseSpaceLayout::new(4, 2, 3, 2);
        let data = test_stream(5, &layout);
        let records = NodeRecord::from_stream(5, &data.nodes, &data.distribution, &layout);
        let reversed: Vec<NodeRecord> = records.into_iter().rev().collect();
        let assembled = NeighbourStream::from_records(5, &reversed, &layout).unwrap();
        assert_eq!(assembled.distribution, data.distribution);
        assert_eq!(assembled.nodes, data.nodes);
    }

    #[test]
    fn missing_node_records_are_reported() {
        let layout = PhaseSpaceLayout::new(4, 1, 2, 2);
        let data = test_stream(2, &layout);
        let mut records = NodeRecord::from_stream(2, &data.nodes, &data.distribution, &layout);
        records.remove(1);
        let duplicated = records[0].clone();
        records.push(duplicated);

        let err = NeighbourStream::from_records(2, &records, &layout).unwrap_err();
        assert!(matches!(
            err,
            TransportError::IncompleteStream {
                stream: 2,
                expected: 4,
                found: 3
            }
        ));
        assert_eq!(err.to_string(), "Gathered 3 of 4 nodes of stream 2");

        assert!(NeighbourStream::from_records(7, &records, &layout).is_err());
    }

    #[test]
    fn every_worker_receives_its_neighbours() {
        let grid = StreamGrid::new(2, 2);
        let layout = PhaseSpaceLayout::new(3, 1, 2, 2);

        let serial_owned: Vec<TestStream> = (0..grid.num_streams())
            .map(|s| test_stream(s, &layout))
            .collect();
        let serial =
            gather_stream_lists(&SerialCommunicator, &grid, &layout, &serial_owned, 1e-3).unwrap();
        assert_eq!(serial.len(), grid.num_streams());

        let num_workers = 5;
        let results = run_workers(num_workers, |comm| {
            let owned: Vec<TestStream> = grid
                .owned_streams(comm.rank(), num_workers)
                .into_iter()
                .map(|s| test_stream(s, &layout))
                .collect();
            gather_stream_lists(&comm, &grid, &layout, &owned, 1e-3).unwrap()
        });

        for lists in results {
            for list in lists {
                let reference = &serial[list.stream];
                assert_eq!(list.deduped, reference.deduped);
                assert_eq!(list.neighbours, reference.neighbours);
                assert_eq!(
                    list.neighbours.iter().map(|nb| nb.stream).collect::<Vec<_>>(),
                    grid.in_face_neighbours(list.stream)
                );
            }
        }
    }
}
