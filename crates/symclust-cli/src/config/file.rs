use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use symclust::core::models::selection::{ResidueRange, SelectionQuery};
use symclust::engine::config as core_config;
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSelection {
    pub molecule: Option<String>,
    pub residues: Option<(i32, i32)>,
    pub copy: Option<usize>,
    pub state: Option<usize>,
    pub resolution: Option<u32>,
}

impl From<FileSelection> for SelectionQuery {
    fn from(p: FileSelection) -> Self {
        Self {
            molecule: p.molecule,
            residues: p.residues.map(|(start, end)| ResidueRange::new(start, end)),
            copy_index: p.copy,
            state_index: p.state,
            resolution: p.resolution,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileRmsfRequest {
    pub molecule: String,
    pub copy: Option<usize>,
    pub state: Option<usize>,
    pub resolution: Option<u32>,
    pub step: Option<usize>,
    pub reference_cluster: Option<usize>,
}

impl From<FileRmsfRequest> for core_config::RmsfRequest {
    fn from(p: FileRmsfRequest) -> Self {
        let mut request = core_config::RmsfRequest::new(p.molecule)
            .with_copy(p.copy.unwrap_or(0))
            .with_state(p.state.unwrap_or(0))
            .with_step(p.step.unwrap_or(1));
        if let Some(resolution) = p.resolution {
            request = request.with_resolution(resolution);
        }
        if let Some(cluster) = p.reference_cluster {
            request = request.with_reference_cluster(cluster);
        }
        request
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileClusteringConfig {
    pub cutoff: Option<f64>,
    pub refinement_cutoff: Option<f64>,
    pub alignment: Option<bool>,
    pub best_scoring_models: Option<usize>,
    pub frame_window: Option<(f64, f64)>,
    pub bipartite: Option<bool>,
    #[serde(default)]
    pub rmsd_components: Vec<FileSelection>,
    #[serde(default)]
    pub alignment_components: Vec<FileSelection>,
    #[serde(default)]
    pub rmsf: Vec<FileRmsfRequest>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileOutputConfig {
    pub report: Option<PathBuf>,
    pub distance_matrix: Option<PathBuf>,
    pub pretty: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub clustering: Option<FileClusteringConfig>,
    pub output: Option<FileOutputConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_sections() {
        let config = FileConfig::from_toml(
            r#"
            [clustering]
            cutoff = 7.5
            refinement-cutoff = 2.0
            alignment = true
            best-scoring-models = 50
            frame-window = [0.5, 1.0]
            bipartite = true
            rmsd-components = [{ molecule = "Rpb1", residues = [1, 100] }]

            [[clustering.rmsf]]
            molecule = "Rpb1"
            copy = 1
            step = 5

            [output]
            report = "report.json"
            distance-matrix = "distances.csv"
            pretty = false
            "#,
        )
        .unwrap();

        let clustering = config.clustering.unwrap();
        assert_eq!(clustering.cutoff, Some(7.5));
        assert_eq!(clustering.frame_window, Some((0.5, 1.0)));
        assert_eq!(clustering.rmsd_components[0].residues, Some((1, 100)));

        let request: core_config::RmsfRequest = clustering.rmsf[0].clone().into();
        assert_eq!(request.copy_index, 1);
        assert_eq!(request.step, 5);
        assert_eq!(request.reference_cluster, None);

        let output = config.output.unwrap();
        assert_eq!(output.distance_matrix, Some(PathBuf::from("distances.csv")));
    }

    #[test]
    fn selection_defaults_match_everything() {
        let query: SelectionQuery = FileSelection::default().into();
        assert_eq!(query, SelectionQuery::all());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(FileConfig::from_toml("[clustering]\nradius = 3.0\n").is_err());
        assert!(FileConfig::from_toml("[plotting]\n").is_err());
    }
}
