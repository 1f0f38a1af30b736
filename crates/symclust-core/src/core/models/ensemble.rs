use super::frame::Frame;
use super::topology::{Topology, TopologyError};
use nalgebra::{Isometry3, Point3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Read-only, randomly indexable sequence of frames sharing one topology.
pub trait FrameStore {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn frame(&self, index: usize) -> Option<&Frame>;

    fn topology(&self) -> &Arc<Topology>;

    /// Sampling score of the frame (lower is better), if one was recorded.
    fn score(&self, _index: usize) -> Option<f64> {
        None
    }

    /// Index of the frame in the sequence it was originally read from.
    ///
    /// Stores built from a filtered selection report the original position here, so
    /// cluster members can be mapped back to their source.
    fn source_index(&self, index: usize) -> usize {
        index
    }
}

impl<T: FrameStore + ?Sized> FrameStore for &T {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn frame(&self, index: usize) -> Option<&Frame> {
        (**self).frame(index)
    }

    fn topology(&self) -> &Arc<Topology> {
        (**self).topology()
    }

    fn score(&self, index: usize) -> Option<f64> {
        (**self).score(index)
    }

    fn source_index(&self, index: usize) -> usize {
        (**self).source_index(index)
    }
}

#[derive(Debug, Clone)]
struct EnsembleEntry {
    frame: Frame,
    score: Option<f64>,
    source_index: usize,
}

/// In-memory frame store.
#[derive(Debug, Clone)]
pub struct Ensemble {
    topology: Arc<Topology>,
    entries: Vec<EnsembleEntry>,
}

impl Ensemble {
    pub fn new(topology: Arc<Topology>) -> Self {
        Self {
            topology,
            entries: Vec::new(),
        }
    }

    /// Appends a frame and returns its index in the ensemble.
    pub fn push(&mut self, positions: Vec<Point3<f64>>) -> Result<usize, TopologyError> {
        let frame = Frame::new(Arc::clone(&self.topology), positions)?;
        Ok(self.push_entry(frame, None, None))
    }

    pub fn push_scored(
        &mut self,
        positions: Vec<Point3<f64>>,
        score: f64,
    ) -> Result<usize, TopologyError> {
        let frame = Frame::new(Arc::clone(&self.topology), positions)?;
        Ok(self.push_entry(frame, Some(score), None))
    }

    /// Rebuilds an ensemble from extracted records, keeping their order and source indices.
    pub fn from_records(
        topology: Arc<Topology>,
        records: Vec<FrameRecord>,
    ) -> Result<Self, TopologyError> {
        let mut ensemble = Self::new(topology);
        for record in records {
            let frame = Frame::with_body_poses(
                Arc::clone(&ensemble.topology),
                record.positions,
                record.body_poses,
            )?;
            ensemble.push_entry(frame, record.score, Some(record.index));
        }
        Ok(ensemble)
    }

    fn push_entry(&mut self, frame: Frame, score: Option<f64>, source: Option<usize>) -> usize {
        let index = self.entries.len();
        self.entries.push(EnsembleEntry {
            frame,
            score,
            source_index: source.unwrap_or(index),
        });
        index
    }
}

impl FrameStore for Ensemble {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn frame(&self, index: usize) -> Option<&Frame> {
        self.entries.get(index).map(|entry| &entry.frame)
    }

    fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    fn score(&self, index: usize) -> Option<f64> {
        self.entries.get(index).and_then(|entry| entry.score)
    }

    fn source_index(&self, index: usize) -> usize {
        self.entries
            .get(index)
            .map_or(index, |entry| entry.source_index)
    }
}

/// A frame reduced to plain data, suitable for exchange between workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub index: usize,
    pub score: Option<f64>,
    pub positions: Vec<Point3<f64>>,
    pub body_poses: Vec<Isometry3<f64>>,
}

impl FrameRecord {
    /// Extracts frame `index` of `store`, recording its source index.
    pub fn extract<S: FrameStore + ?Sized>(store: &S, index: usize) -> Option<Self> {
        let frame = store.frame(index)?;
        Some(Self {
            index: store.source_index(index),
            score: store.score(index),
            positions: frame.positions().to_vec(),
            body_poses: frame.body_poses().to_vec(),
        })
    }
}
