use crate::core::models::selection::SelectionQuery;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// Whether frames are superposed before they are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AlignmentPolicy {
    /// Raw coordinates are compared directly.
    #[default]
    Disabled,
    /// The higher-index frame of each pair is superposed onto the lower-index frame over
    /// the alignment components before the comparison.
    Enabled,
}

impl AlignmentPolicy {
    pub fn is_enabled(self) -> bool {
        matches!(self, AlignmentPolicy::Enabled)
    }
}

/// Per-residue fluctuation analysis of one molecule copy.
#[derive(Debug, Clone, PartialEq)]
pub struct RmsfRequest {
    pub molecule: String,
    pub copy_index: usize,
    pub state_index: usize,
    pub resolution: Option<u32>,
    /// Stride over cluster members; only every `step`-th member is compared.
    pub step: usize,
    /// Cluster whose center is the reference of every comparison. When unset, each
    /// cluster is compared against its own center.
    pub reference_cluster: Option<usize>,
}

impl RmsfRequest {
    pub fn new(molecule: impl Into<String>) -> Self {
        Self {
            molecule: molecule.into(),
            copy_index: 0,
            state_index: 0,
            resolution: None,
            step: 1,
            reference_cluster: None,
        }
    }

    pub fn with_copy(mut self, copy_index: usize) -> Self {
        self.copy_index = copy_index;
        self
    }

    pub fn with_state(mut self, state_index: usize) -> Self {
        self.state_index = state_index;
        self
    }

    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn with_step(mut self, step: usize) -> Self {
        self.step = step;
        self
    }

    pub fn with_reference_cluster(mut self, cluster: usize) -> Self {
        self.reference_cluster = Some(cluster);
        self
    }

    /// The selection of points whose fluctuation is reported.
    pub fn query(&self) -> SelectionQuery {
        let query = SelectionQuery::molecule(self.molecule.clone())
            .with_copy(self.copy_index)
            .with_state(self.state_index);
        match self.resolution {
            Some(resolution) => query.with_resolution(resolution),
            None => query,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringConfig {
    pub cutoff: f64,
    pub refinement_cutoff: Option<f64>,
    pub alignment: AlignmentPolicy,
    /// Selections compared by the distance. Empty means every point.
    pub rmsd_components: Vec<SelectionQuery>,
    /// Selections superposed when alignment is enabled. Empty means the RMSD components.
    pub alignment_components: Vec<SelectionQuery>,
    pub best_scoring_models: Option<usize>,
    /// Fraction range `[first, last)` of the frame sequence to keep.
    pub frame_window: Option<(f64, f64)>,
    pub rmsf: Vec<RmsfRequest>,
    pub compute_bipartite: bool,
    /// Keep the distances between the analyzed frames alongside the report.
    pub export_distance_matrix: bool,
}

impl ClusteringConfig {
    pub fn rmsd_selection(&self) -> Vec<SelectionQuery> {
        if self.rmsd_components.is_empty() {
            vec![SelectionQuery::all()]
        } else {
            self.rmsd_components.clone()
        }
    }

    pub fn alignment_selection(&self) -> Vec<SelectionQuery> {
        if self.alignment_components.is_empty() {
            self.rmsd_selection()
        } else {
            self.alignment_components.clone()
        }
    }
}

#[derive(Default)]
pub struct ClusteringConfigBuilder {
    cutoff: Option<f64>,
    refinement_cutoff: Option<f64>,
    alignment: Option<AlignmentPolicy>,
    rmsd_components: Vec<SelectionQuery>,
    alignment_components: Vec<SelectionQuery>,
    best_scoring_models: Option<usize>,
    frame_window: Option<(f64, f64)>,
    rmsf: Vec<RmsfRequest>,
    compute_bipartite: bool,
    export_distance_matrix: bool,
}

impl ClusteringConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = Some(cutoff);
        self
    }
    pub fn refinement_cutoff(mut self, cutoff: f64) -> Self {
        self.refinement_cutoff = Some(cutoff);
        self
    }
    pub fn alignment(mut self, policy: AlignmentPolicy) -> Self {
        self.alignment = Some(policy);
        self
    }
    pub fn rmsd_component(mut self, query: SelectionQuery) -> Self {
        self.rmsd_components.push(query);
        self
    }
    pub fn alignment_component(mut self, query: SelectionQuery) -> Self {
        self.alignment_components.push(query);
        self
    }
    pub fn best_scoring_models(mut self, count: usize) -> Self {
        self.best_scoring_models = Some(count);
        self
    }
    pub fn frame_window(mut self, first: f64, last: f64) -> Self {
        self.frame_window = Some((first, last));
        self
    }
    pub fn rmsf(mut self, request: RmsfRequest) -> Self {
        self.rmsf.push(request);
        self
    }
    pub fn compute_bipartite(mut self, enabled: bool) -> Self {
        self.compute_bipartite = enabled;
        self
    }
    pub fn export_distance_matrix(mut self, enabled: bool) -> Self {
        self.export_distance_matrix = enabled;
        self
    }

    pub fn build(self) -> Result<ClusteringConfig, ConfigError> {
        let cutoff = self
            .cutoff
            .ok_or(ConfigError::MissingParameter("cutoff"))?;
        validate_cutoff("cutoff", cutoff)?;
        if let Some(refinement) = self.refinement_cutoff {
            validate_cutoff("refinement_cutoff", refinement)?;
        }

        if let Some((first, last)) = self.frame_window {
            let in_unit = |value: f64| (0.0..=1.0).contains(&value);
            if !in_unit(first) || !in_unit(last) || first >= last {
                return Err(ConfigError::InvalidValue {
                    name: "frame_window",
                    reason: format!("expected 0 <= first < last <= 1, got ({first}, {last})"),
                });
            }
        }

        if self.best_scoring_models == Some(0) {
            return Err(ConfigError::InvalidValue {
                name: "best_scoring_models",
                reason: "must select at least one model".to_string(),
            });
        }

        if let Some(request) = self.rmsf.iter().find(|request| request.step == 0) {
            return Err(ConfigError::InvalidValue {
                name: "rmsf.step",
                reason: format!("step for molecule '{}' must be positive", request.molecule),
            });
        }

        Ok(ClusteringConfig {
            cutoff,
            refinement_cutoff: self.refinement_cutoff,
            alignment: self.alignment.unwrap_or_default(),
            rmsd_components: self.rmsd_components,
            alignment_components: self.alignment_components,
            best_scoring_models: self.best_scoring_models,
            frame_window: self.frame_window,
            rmsf: self.rmsf,
            compute_bipartite: self.compute_bipartite,
            export_distance_matrix: self.export_distance_matrix,
        })
    }
}

fn validate_cutoff(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            name,
            reason: format!("must be a finite, non-negative distance, got {value}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_cutoff() {
        let result = ClusteringConfigBuilder::new().build();
        assert_eq!(result, Err(ConfigError::MissingParameter("cutoff")));
    }

    #[test]
    fn build_applies_defaults() {
        let config = ClusteringConfigBuilder::new().cutoff(5.0).build().unwrap();
        assert_eq!(config.cutoff, 5.0);
        assert_eq!(config.alignment, AlignmentPolicy::Disabled);
        assert_eq!(config.refinement_cutoff, None);
        assert_eq!(config.rmsd_selection(), vec![SelectionQuery::all()]);
        assert_eq!(config.alignment_selection(), vec![SelectionQuery::all()]);
        assert!(!config.compute_bipartite);
        assert!(!config.export_distance_matrix);
    }

    #[test]
    fn alignment_selection_falls_back_to_rmsd_components() {
        let config = ClusteringConfigBuilder::new()
            .cutoff(1.0)
            .rmsd_component(SelectionQuery::molecule("A"))
            .build()
            .unwrap();
        assert_eq!(
            config.alignment_selection(),
            vec![SelectionQuery::molecule("A")]
        );
    }

    #[test]
    fn build_rejects_negative_or_nan_cutoffs() {
        assert!(matches!(
            ClusteringConfigBuilder::new().cutoff(-1.0).build(),
            Err(ConfigError::InvalidValue { name: "cutoff", .. })
        ));
        assert!(matches!(
            ClusteringConfigBuilder::new()
                .cutoff(1.0)
                .refinement_cutoff(f64::NAN)
                .build(),
            Err(ConfigError::InvalidValue {
                name: "refinement_cutoff",
                ..
            })
        ));
    }

    #[test]
    fn build_validates_frame_window() {
        for (first, last) in [(0.5, 0.5), (-0.1, 0.5), (0.2, 1.5), (0.8, 0.2)] {
            let result = ClusteringConfigBuilder::new()
                .cutoff(1.0)
                .frame_window(first, last)
                .build();
            assert!(
                matches!(
                    result,
                    Err(ConfigError::InvalidValue {
                        name: "frame_window",
                        ..
                    })
                ),
                "window ({first}, {last}) should be rejected"
            );
        }
        assert!(
            ClusteringConfigBuilder::new()
                .cutoff(1.0)
                .frame_window(0.0, 1.0)
                .build()
                .is_ok()
        );
    }

    #[test]
    fn build_rejects_zero_model_count_and_zero_rmsf_step() {
        assert!(
            ClusteringConfigBuilder::new()
                .cutoff(1.0)
                .best_scoring_models(0)
                .build()
                .is_err()
        );
        assert!(
            ClusteringConfigBuilder::new()
                .cutoff(1.0)
                .rmsf(RmsfRequest::new("A").with_step(0))
                .build()
                .is_err()
        );
    }

    #[test]
    fn rmsf_request_query_selects_one_copy() {
        let query = RmsfRequest::new("A")
            .with_copy(2)
            .with_state(1)
            .with_resolution(10)
            .query();
        assert_eq!(
            query,
            SelectionQuery::molecule("A")
                .with_copy(2)
                .with_state(1)
                .with_resolution(10)
        );
    }
}
