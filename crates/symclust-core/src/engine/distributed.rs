use super::error::EngineError;
use std::any::Any;
use std::ops::Range;
use std::sync::{Arc, Barrier, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// A group of cooperating workers that can synchronize and exchange data.
///
/// Every worker of the group must make the same sequence of collective calls
/// (`barrier`, `all_gather`); a worker that skips one blocks the others.
pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn is_coordinator(&self) -> bool {
        self.rank() == 0
    }

    /// Blocks until every worker has reached the barrier.
    fn barrier(&self);

    /// Contributes `local` and returns every worker's contribution, indexed by rank.
    /// All workers receive identical results.
    fn all_gather<T: Clone + Send + 'static>(
        &self,
        local: Vec<T>,
    ) -> Result<Vec<Vec<T>>, EngineError>;
}

/// The trivial group of one worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleProcess;

impl Communicator for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) {}

    fn all_gather<T: Clone + Send + 'static>(
        &self,
        local: Vec<T>,
    ) -> Result<Vec<Vec<T>>, EngineError> {
        Ok(vec![local])
    }
}

type Slot = Option<Box<dyn Any + Send>>;

struct SharedState {
    barrier: Barrier,
    slots: Mutex<Vec<Slot>>,
}

/// In-process group whose workers are threads.
pub struct ThreadGroup;

impl ThreadGroup {
    /// Creates the communicators of a group of `size` workers, one per thread.
    pub fn create(size: usize) -> Vec<ThreadCommunicator> {
        let shared = Arc::new(SharedState {
            barrier: Barrier::new(size.max(1)),
            slots: Mutex::new((0..size).map(|_| None).collect()),
        });
        (0..size)
            .map(|rank| ThreadCommunicator {
                rank,
                size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

pub struct ThreadCommunicator {
    rank: usize,
    size: usize,
    shared: Arc<SharedState>,
}

impl ThreadCommunicator {
    fn slots(&self) -> MutexGuard<'_, Vec<Slot>> {
        self.shared
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Communicator for ThreadCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }

    fn all_gather<T: Clone + Send + 'static>(
        &self,
        local: Vec<T>,
    ) -> Result<Vec<Vec<T>>, EngineError> {
        self.slots()[self.rank] = Some(Box::new(local));
        self.barrier();

        let gathered = {
            let slots = self.slots();
            slots
                .iter()
                .enumerate()
                .map(|(rank, slot)| {
                    slot.as_ref()
                        .and_then(|value| value.downcast_ref::<Vec<T>>())
                        .cloned()
                        .ok_or_else(|| {
                            EngineError::Internal(format!(
                                "rank {rank} provided no contribution of the expected type"
                            ))
                        })
                })
                .collect::<Result<Vec<_>, _>>()
        };

        // Nobody may clear a slot before everyone has read it.
        self.barrier();
        self.slots()[self.rank] = None;
        trace!(rank = self.rank, "All-gather complete.");
        gathered
    }
}

/// Bounds of segment `index` when `len` items are split into `segments` contiguous
/// segments. Boundaries fall at `floor(k * len / segments)`, so segment sizes differ by at
/// most one and some segments may be empty.
pub fn segment_bounds(len: usize, segments: usize, index: usize) -> Range<usize> {
    if segments == 0 || index >= segments {
        return len..len;
    }
    let boundary = |k: usize| k * len / segments;
    boundary(index)..boundary(index + 1)
}

/// Runs the distributed parts of a workflow: contiguous work partitioning, all-gather of
/// per-worker results, and coordinator-only sections fenced by barriers.
pub struct DistributedCoordinator<C> {
    communicator: C,
}

impl<C: Communicator> DistributedCoordinator<C> {
    pub fn new(communicator: C) -> Self {
        Self { communicator }
    }

    pub fn communicator(&self) -> &C {
        &self.communicator
    }

    pub fn rank(&self) -> usize {
        self.communicator.rank()
    }

    pub fn size(&self) -> usize {
        self.communicator.size()
    }

    pub fn is_coordinator(&self) -> bool {
        self.communicator.is_coordinator()
    }

    /// The range of `0..len` this worker is responsible for.
    pub fn local_range(&self, len: usize) -> Range<usize> {
        segment_bounds(len, self.size(), self.rank())
    }

    pub fn local_chunk<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[self.local_range(items.len())]
    }

    /// Concatenates every worker's segment of a sequence of `total` items, in rank order.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::DistributedInconsistency`] if any worker contributed a
    /// different number of items than its segment holds.
    pub fn gather<T: Clone + Send + 'static>(
        &self,
        local: Vec<T>,
        total: usize,
    ) -> Result<Vec<T>, EngineError> {
        let size = self.size();
        let parts = self.communicator.all_gather(local)?;
        if parts.len() != size {
            return Err(EngineError::DistributedInconsistency {
                rank: self.rank(),
                expected: size,
                found: parts.len(),
            });
        }

        let mut gathered = Vec::with_capacity(total);
        for (rank, part) in parts.into_iter().enumerate() {
            let expected = segment_bounds(total, size, rank).len();
            if part.len() != expected {
                return Err(EngineError::DistributedInconsistency {
                    rank,
                    expected,
                    found: part.len(),
                });
            }
            gathered.extend(part);
        }
        debug!(rank = self.rank(), items = gathered.len(), "Gathered distributed segments.");
        Ok(gathered)
    }

    /// Runs `task` on the coordinator only, with every worker synchronized before and
    /// after. Returns `Some` on the coordinator and `None` elsewhere.
    pub fn on_coordinator<R>(
        &self,
        task: impl FnOnce() -> Result<R, EngineError>,
    ) -> Result<Option<R>, EngineError> {
        self.communicator.barrier();
        let result = if self.is_coordinator() {
            Some(task())
        } else {
            None
        };
        self.communicator.barrier();
        result.transpose()
    }
}
