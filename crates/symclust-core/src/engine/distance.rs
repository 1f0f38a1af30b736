use super::cache::PairwiseMetricCache;
use super::error::EngineError;
use super::progress::ProgressReporter;
use crate::core::io::matrix::DistanceMatrix;
use crate::core::models::ensemble::FrameStore;

/// Symmetric pairwise distances over `len()` items, as consumed by the clustering engine.
///
/// Distances may be produced lazily, hence `&mut self`.
pub trait DistanceSource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn distance(&mut self, i: usize, j: usize) -> Result<f64, EngineError>;

    /// Hint that the given pairs are about to be requested.
    fn prefetch(
        &mut self,
        _pairs: &[(usize, usize)],
        _reporter: &ProgressReporter,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Original index of item `i`, for reporting.
    fn source_index(&self, i: usize) -> usize {
        i
    }

    /// Distances between every pair of items, in item order.
    fn collect_matrix(&mut self) -> Result<DistanceMatrix, EngineError> {
        let size = self.len();
        let mut matrix = DistanceMatrix::new(size);
        for i in 0..size {
            for j in (i + 1)..size {
                matrix.set(i, j, self.distance(i, j)?);
            }
        }
        Ok(matrix)
    }
}

impl DistanceSource for DistanceMatrix {
    fn len(&self) -> usize {
        DistanceMatrix::len(self)
    }

    fn collect_matrix(&mut self) -> Result<DistanceMatrix, EngineError> {
        Ok(self.clone())
    }

    fn distance(&mut self, i: usize, j: usize) -> Result<f64, EngineError> {
        self.get(i, j).ok_or(EngineError::FrameOutOfRange {
            index: i.max(j),
            len: DistanceMatrix::len(self),
        })
    }
}

impl<S: FrameStore + Sync> DistanceSource for PairwiseMetricCache<S> {
    fn len(&self) -> usize {
        self.store().len()
    }

    fn distance(&mut self, i: usize, j: usize) -> Result<f64, EngineError> {
        if i == j {
            self.frame(i)?;
            return Ok(0.0);
        }
        Ok(self.get_or_compute(i, j)?.distance)
    }

    fn prefetch(
        &mut self,
        pairs: &[(usize, usize)],
        reporter: &ProgressReporter,
    ) -> Result<(), EngineError> {
        let off_diagonal: Vec<_> = pairs.iter().copied().filter(|(i, j)| i != j).collect();
        self.precompute(&off_diagonal, reporter)
    }

    fn source_index(&self, i: usize) -> usize {
        self.store().source_index(i)
    }
}
