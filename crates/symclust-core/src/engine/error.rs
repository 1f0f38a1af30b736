use thiserror::Error;

use super::cluster::ClusterFileError;
use super::config::ConfigError;
use crate::core::io::matrix::MatrixError;
use crate::core::models::topology::TopologyError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Data integrity error in group '{group}' (frames {frames:?}): {message}")]
    DataIntegrity {
        group: String,
        frames: Vec<usize>,
        message: String,
    },

    #[error("No valid comparison available for {context}")]
    EmptyComparison { context: String },

    #[error(
        "Inconsistent distributed contribution from rank {rank}: expected {expected} item(s), found {found}"
    )]
    DistributedInconsistency {
        rank: usize,
        expected: usize,
        found: usize,
    },

    #[error("Frame index {index} is out of range for a store of {len} frame(s)")]
    FrameOutOfRange { index: usize, len: usize },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Topology error: {source}")]
    Topology {
        #[from]
        source: TopologyError,
    },

    #[error("Distance matrix error: {source}")]
    Matrix {
        #[from]
        source: MatrixError,
    },

    #[error("Cluster file error: {source}")]
    ClusterFile {
        #[from]
        source: ClusterFileError,
    },

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    pub(crate) fn data_integrity(
        group: impl Into<String>,
        frames: &[usize],
        message: impl Into<String>,
    ) -> Self {
        Self::DataIntegrity {
            group: group.into(),
            frames: frames.to_vec(),
            message: message.into(),
        }
    }
}
