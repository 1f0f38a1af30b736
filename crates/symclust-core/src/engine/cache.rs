use super::alignment::AlignmentEngine;
use super::assignment::{AssignmentSolver, PairMetric};
use super::config::ClusteringConfig;
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use super::selection_index::SelectionIndex;
use crate::core::models::ensemble::FrameStore;
use crate::core::models::frame::Frame;
use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, instrument, trace};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Canonical key of an unordered frame pair: the lower index first.
#[inline]
pub fn pair_key(i: usize, j: usize) -> (usize, usize) {
    if i <= j { (i, j) } else { (j, i) }
}

/// Memoizes `(distance, assignment)` for every frame pair compared so far.
///
/// Entries are keyed by the unordered pair, so `(i, j)` and `(j, i)` share one entry. The
/// lower index of a pair is always the reference: the other frame is superposed onto it
/// and the stored assignment maps the lower frame's copies onto the higher frame's. Nothing
/// is evicted; call [`PairwiseMetricCache::clear`] between independent runs.
pub struct PairwiseMetricCache<S> {
    store: S,
    index: SelectionIndex,
    aligner: AlignmentEngine,
    entries: HashMap<(usize, usize), PairMetric>,
    computations: usize,
}

impl<S: FrameStore> PairwiseMetricCache<S> {
    pub fn new(store: S, index: SelectionIndex, aligner: AlignmentEngine) -> Self {
        Self {
            store,
            index,
            aligner,
            entries: HashMap::new(),
            computations: 0,
        }
    }

    /// Builds the selection index and alignment engine described by `config` for the
    /// store's topology.
    pub fn from_config(store: S, config: &ClusteringConfig) -> Result<Self, EngineError> {
        let topology = store.topology();
        let index = SelectionIndex::build(topology, &config.rmsd_selection())?;
        let aligner =
            AlignmentEngine::new(topology, config.alignment, &config.alignment_selection())?;
        Ok(Self::new(store, index, aligner))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn index(&self) -> &SelectionIndex {
        &self.index
    }

    pub fn aligner(&self) -> &AlignmentEngine {
        &self.aligner
    }

    /// Number of memoized pairs.
    pub fn cached_pairs(&self) -> usize {
        self.entries.len()
    }

    /// Number of times the solver has been run since the cache was created.
    pub fn computations(&self) -> usize {
        self.computations
    }

    pub fn get(&self, i: usize, j: usize) -> Option<&PairMetric> {
        self.entries.get(&pair_key(i, j))
    }

    /// Returns the memoized metric of the pair, computing and storing it on a miss.
    pub fn get_or_compute(&mut self, i: usize, j: usize) -> Result<&PairMetric, EngineError> {
        let key = pair_key(i, j);
        if !self.entries.contains_key(&key) {
            let metric = self.compute(key.0, key.1)?;
            trace!(i = key.0, j = key.1, distance = metric.distance, "Computed pair metric.");
            self.computations += 1;
            self.entries.insert(key, metric);
        }
        self.entries
            .get(&key)
            .ok_or_else(|| EngineError::Internal(format!("cache entry {key:?} vanished")))
    }

    /// Computes the metric of a pair without touching the cache.
    pub fn compute(&self, i: usize, j: usize) -> Result<PairMetric, EngineError> {
        let (lower, higher) = pair_key(i, j);
        let reference = self.frame(lower)?;
        let target = self.frame(higher)?;
        let aligned = self.aligner.align((higher, target), (lower, reference))?;
        AssignmentSolver::new(&self.index).solve((lower, reference), (higher, &aligned))
    }

    /// Returns frame `target` superposed onto frame `reference` (unchanged when alignment
    /// is disabled).
    pub fn aligned_frame(
        &self,
        reference: usize,
        target: usize,
    ) -> Result<Cow<'_, Frame>, EngineError> {
        let reference_frame = self.frame(reference)?;
        let target_frame = self.frame(target)?;
        self.aligner
            .align((target, target_frame), (reference, reference_frame))
    }

    pub fn frame(&self, index: usize) -> Result<&Frame, EngineError> {
        self.store.frame(index).ok_or(EngineError::FrameOutOfRange {
            index,
            len: self.store.len(),
        })
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<S: FrameStore + Sync> PairwiseMetricCache<S> {
    /// Computes every pair of `pairs` that is not cached yet, in parallel when the
    /// `parallel` feature is enabled, and stores the results.
    #[instrument(skip_all, name = "pairwise_precompute")]
    pub fn precompute(
        &mut self,
        pairs: &[(usize, usize)],
        reporter: &ProgressReporter,
    ) -> Result<(), EngineError> {
        let missing: Vec<(usize, usize)> = pairs
            .iter()
            .map(|&(i, j)| pair_key(i, j))
            .filter(|key| !self.entries.contains_key(key))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        debug!(pairs = missing.len(), "Precomputing pair metrics.");

        reporter.report(Progress::TaskStart {
            total_steps: missing.len() as u64,
        });

        #[cfg(not(feature = "parallel"))]
        let iterator = missing.iter();

        #[cfg(feature = "parallel")]
        let iterator = missing.par_iter();

        let this = &*self;
        let results: Vec<Result<((usize, usize), PairMetric), EngineError>> = iterator
            .map(|&(i, j)| {
                let metric = this.compute(i, j);
                reporter.report(Progress::TaskIncrement);
                metric.map(|metric| ((i, j), metric))
            })
            .collect();

        reporter.report(Progress::TaskFinish);

        for result in results {
            let (key, metric) = result?;
            self.computations += 1;
            self.entries.insert(key, metric);
        }
        Ok(())
    }
}
