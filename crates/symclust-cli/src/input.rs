//! JSON ensemble files: a point topology followed by the frames sampled over it.
//!
//! ```json
//! {
//!   "points": [{ "molecule": "A", "copy": 0, "residues": [1, 1] }],
//!   "rigid-bodies": [{ "name": "A0-core", "members": [0] }],
//!   "frames": [{ "score": -12.5, "positions": [[0.0, 0.0, 0.0]] }]
//! }
//! ```

use crate::error::{CliError, Result};
use nalgebra::Point3;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use symclust::core::models::ensemble::{Ensemble, FrameStore};
use symclust::core::models::selection::ResidueRange;
use symclust::core::models::topology::{PointInfo, Topology, TopologyError};
use tracing::{debug, info};

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct FilePoint {
    molecule: String,
    #[serde(default)]
    copy: usize,
    #[serde(default)]
    state: usize,
    residues: (i32, i32),
    #[serde(default = "default_resolution")]
    resolution: u32,
}

fn default_resolution() -> u32 {
    1
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct FileRigidBody {
    name: String,
    members: Vec<usize>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct FileFrame {
    score: Option<f64>,
    positions: Vec<[f64; 3]>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct EnsembleFile {
    points: Vec<FilePoint>,
    #[serde(default)]
    rigid_bodies: Vec<FileRigidBody>,
    frames: Vec<FileFrame>,
}

impl EnsembleFile {
    fn into_ensemble(self) -> std::result::Result<Ensemble, TopologyError> {
        let mut topology = Topology::new();
        for point in self.points {
            topology.add_point(
                PointInfo::new(
                    point.molecule,
                    point.copy,
                    point.state,
                    ResidueRange::new(point.residues.0, point.residues.1),
                )
                .with_resolution(point.resolution),
            );
        }
        for body in self.rigid_bodies {
            topology.add_rigid_body(body.name, body.members)?;
        }

        let mut ensemble = Ensemble::new(Arc::new(topology));
        for frame in self.frames {
            let positions = frame
                .positions
                .into_iter()
                .map(|[x, y, z]| Point3::new(x, y, z))
                .collect();
            match frame.score {
                Some(score) => ensemble.push_scored(positions, score)?,
                None => ensemble.push(positions)?,
            };
        }
        Ok(ensemble)
    }
}

pub fn parse_ensemble(content: &str) -> anyhow::Result<Ensemble> {
    let file: EnsembleFile = serde_json::from_str(content)?;
    Ok(file.into_ensemble()?)
}

pub fn load_ensemble(path: &Path) -> Result<Ensemble> {
    debug!("Reading ensemble file {:?}", path);
    let content = std::fs::read_to_string(path)?;
    let ensemble = parse_ensemble(&content).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e,
    })?;
    info!(
        "Loaded {} frame(s) over {} point(s) from {:?}",
        ensemble.len(),
        ensemble.topology().len(),
        path
    );
    Ok(ensemble)
}
