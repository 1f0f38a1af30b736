use std::path::PathBuf;
use symclust::engine::config as core_config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Ensemble(PathBuf),
    Matrix(PathBuf),
}

pub struct AppConfig {
    pub input: InputSource,
    pub report_path: Option<PathBuf>,
    pub matrix_path: Option<PathBuf>,
    pub pretty: bool,
    pub core_config: core_config::ClusteringConfig,
}
