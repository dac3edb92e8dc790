//! Collective communication between the workers advancing the transport.
//!
//! Each worker owns a disjoint set of streams and talks to the others only
//! through the blocking collectives of a [`Communicator`]. Every worker must
//! call the collectives in the same order.

use crate::transport::fep;
use crossbeam_channel::{Receiver, Sender};
use std::{any::Any, thread};

/// Collective operations available to a worker.
pub trait Communicator {
    /// Rank of this worker, in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of participating workers.
    fn size(&self) -> usize;

    /// Contributes a value and returns the values of all workers, ordered by rank.
    ///
    /// Blocks until every worker has contributed.
    fn all_gather<T: Clone + Send + 'static>(&self, value: T) -> Vec<T>;

    /// Returns the minimum of the values contributed by all workers.
    fn all_reduce_min(&self, value: fep) -> fep {
        self.all_gather(value).into_iter().fold(value, fep::min)
    }

    /// Returns the maximum of the values contributed by all workers.
    fn all_reduce_max<T: PartialOrd + Clone + Send + 'static>(&self, value: T) -> T {
        self.all_gather(value.clone())
            .into_iter()
            .fold(value, |max, other| if other > max { other } else { max })
    }

    /// Returns the sum of the values contributed by all workers.
    fn all_reduce_sum(&self, value: fep) -> fep {
        self.all_gather(value).into_iter().sum()
    }
}

/// Communicator for a single worker.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialCommunicator;

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_gather<T: Clone + Send + 'static>(&self, value: T) -> Vec<T> {
        vec![value]
    }
}

type Payload = Box<dyn Any + Send>;

/// Communicator for workers running as threads in the same process.
///
/// Every ordered pair of workers has its own channel, so messages of
/// consecutive collectives arrive in the order they were issued.
#[derive(Debug)]
pub struct ChannelCommunicator {
    rank: usize,
    senders: Vec<Sender<Payload>>,
    receivers: Vec<Receiver<Payload>>,
}

impl ChannelCommunicator {
    /// Creates connected communicators for the given number of workers,
    /// ordered by rank.
    pub fn create_group(num_workers: usize) -> Vec<Self> {
        assert!(num_workers > 0, "Need at least one worker");

        // channels[from][to]
        let channels: Vec<Vec<(Sender<Payload>, Receiver<Payload>)>> = (0..num_workers)
            .map(|_| (0..num_workers).map(|_| crossbeam_channel::unbounded()).collect())
            .collect();

        (0..num_workers)
            .map(|rank| Self {
                rank,
                senders: (0..num_workers)
                    .map(|to| channels[rank][to].0.clone())
                    .collect(),
                receivers: (0..num_workers)
                    .map(|from| channels[from][rank].1.clone())
                    .collect(),
            })
            .collect()
    }
}

impl Communicator for ChannelCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.senders.len()
    }

    fn all_gather<T: Clone + Send + 'static>(&self, value: T) -> Vec<T> {
        for (to, sender) in self.senders.iter().enumerate() {
            if to != self.rank && sender.send(Box::new(value.clone())).is_err() {
                panic!("Worker {} has terminated", to);
            }
        }
        let mut gathered = Vec::with_capacity(self.size());
        for (from, receiver) in self.receivers.iter().enumerate() {
            if from == self.rank {
                gathered.push(value.clone());
                continue;
            }
            let payload = receiver
                .recv()
                .unwrap_or_else(|_| panic!("Worker {} has terminated", from));
            gathered.push(*payload.downcast::<T>().unwrap_or_else(|_| {
                panic!(
                    "Worker {} contributed to a different collective than worker {}",
                    from, self.rank
                )
            }));
        }
        gathered
    }
}

/// Runs the given worker function on the given number of threads, each with
/// its own connected [`ChannelCommunicator`], and returns the results ordered
/// by rank.
pub fn run_workers<F, R>(num_workers: usize, worker: F) -> Vec<R>
where
    F: Fn(ChannelCommunicator) -> R + Sync,
    R: Send,
{
    let communicators = ChannelCommunicator::create_group(num_workers);
    let worker = &worker;
    thread::scope(|scope| {
        let handles: Vec<_> = communicators
            .into_iter()
            .map(|comm| scope.spawn(move || worker(comm)))
            .collect();
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}
