use super::defaults::DefaultsConfig;
use super::file::{FileClusteringConfig, FileConfig};
use super::models::{AppConfig, InputSource};
use crate::cli::ClusterArgs;
use crate::error::{CliError, Result};
use symclust::engine::config as core_config;

pub fn build_config(args: &ClusterArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let clustering_file = file_config.clustering.take().unwrap_or_default();
    let output_file = file_config.output.take().unwrap_or_default();

    let input = match (&args.input.ensemble, &args.input.matrix) {
        (Some(path), None) => InputSource::Ensemble(path.clone()),
        (None, Some(path)) => InputSource::Matrix(path.clone()),
        _ => {
            return Err(CliError::Argument(
                "exactly one of --ensemble or --matrix must be given".to_string(),
            ));
        }
    };

    let cutoff = args
        .cutoff
        .or(clustering_file.cutoff)
        .unwrap_or(defaults.cutoff);
    let alignment = if args.align {
        true
    } else {
        clustering_file.alignment.unwrap_or(defaults.alignment)
    };
    let bipartite = args.bipartite || clustering_file.bipartite.unwrap_or(defaults.bipartite);
    let matrix_path = args.save_matrix.clone().or(output_file.distance_matrix);
    let export_matrix = matrix_path.is_some() && matches!(input, InputSource::Ensemble(_));

    let mut builder = core_config::ClusteringConfigBuilder::new()
        .cutoff(cutoff)
        .alignment(if alignment {
            core_config::AlignmentPolicy::Enabled
        } else {
            core_config::AlignmentPolicy::Disabled
        })
        .compute_bipartite(bipartite)
        .export_distance_matrix(export_matrix);

    if let Some(refinement) = args.refinement_cutoff.or(clustering_file.refinement_cutoff) {
        builder = builder.refinement_cutoff(refinement);
    }
    if let Some(count) = args
        .best_scoring_models
        .or(clustering_file.best_scoring_models)
    {
        builder = builder.best_scoring_models(count);
    }
    if let Some((first, last)) = clustering_file.frame_window {
        builder = builder.frame_window(first, last);
    }

    let FileClusteringConfig {
        rmsd_components,
        alignment_components,
        rmsf,
        ..
    } = clustering_file;
    for query in rmsd_components {
        builder = builder.rmsd_component(query.into());
    }
    for query in alignment_components {
        builder = builder.alignment_component(query.into());
    }
    for request in rmsf {
        builder = builder.rmsf(request.into());
    }

    let core_config = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(AppConfig {
        input,
        report_path: args.output.clone().or(output_file.report),
        matrix_path,
        pretty: output_file.pretty.unwrap_or(defaults.pretty),
        core_config,
    })
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };

        match key {
            "clustering.cutoff" => {
                config.clustering.get_or_insert_with(Default::default).cutoff =
                    Some(parse_value(key, value_str, "float")?);
            }
            "clustering.refinement-cutoff" => {
                config
                    .clustering
                    .get_or_insert_with(Default::default)
                    .refinement_cutoff = Some(parse_value(key, value_str, "float")?);
            }
            "clustering.alignment" => {
                config.clustering.get_or_insert_with(Default::default).alignment =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            "clustering.best-scoring-models" => {
                config
                    .clustering
                    .get_or_insert_with(Default::default)
                    .best_scoring_models = Some(parse_value(key, value_str, "integer")?);
            }
            "clustering.bipartite" => {
                config.clustering.get_or_insert_with(Default::default).bipartite =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            "output.pretty" => {
                config.output.get_or_insert_with(Default::default).pretty =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
