use crate::cli::ClusterArgs;
use crate::config::{self, AppConfig, InputSource};
use crate::error::{CliError, Result};
use crate::input;
use crate::utils::progress::CliProgressHandler;
use std::path::Path;
use symclust::core::io::matrix::DistanceMatrix;
use symclust::engine::distributed::{DistributedCoordinator, SingleProcess};
use symclust::engine::progress::ProgressReporter;
use symclust::workflows::cluster::{self as workflow, ClusteringReport};
use tracing::{info, warn};

pub async fn run(args: ClusterArgs) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let app_config = config::build_config(&args)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Starting clustering...");
    let report = tokio::task::block_in_place(|| execute(&app_config, &reporter))?;

    print_summary(&report);
    write_report(&report, app_config.report_path.as_deref(), app_config.pretty)?;
    Ok(())
}

fn execute(app_config: &AppConfig, reporter: &ProgressReporter) -> Result<ClusteringReport> {
    let core_config = &app_config.core_config;
    match &app_config.input {
        InputSource::Matrix(path) => {
            info!("Loading distance matrix from {:?}", path);
            let matrix = DistanceMatrix::load_csv(path)?;
            if app_config.matrix_path.is_some() {
                warn!("Ignoring the distance matrix output: the input already is a matrix.");
            }
            Ok(workflow::cluster_matrix(matrix, core_config, reporter)?)
        }
        InputSource::Ensemble(path) => {
            let ensemble = input::load_ensemble(path)?;

            info!("Invoking the core clustering workflow...");
            let coordinator = DistributedCoordinator::new(SingleProcess);
            let report = workflow::run(&ensemble, core_config, &coordinator, reporter)?
                .ok_or_else(|| {
                    CliError::Other(anyhow::anyhow!(
                        "the clustering workflow produced no report on the coordinator"
                    ))
                })?;

            if let (Some(matrix_path), Some(matrix)) =
                (&app_config.matrix_path, &report.distance_matrix)
            {
                matrix.save_csv(matrix_path)?;
                println!(
                    "Distance matrix over {} analyzed frame(s) written to: {}",
                    matrix.len(),
                    matrix_path.display()
                );
            }
            Ok(report)
        }
    }
}

fn print_summary(report: &ClusteringReport) {
    println!(
        "Clustered {} frame(s) into {} cluster(s) at cutoff {}.",
        report.frame_count,
        report.clusters.len(),
        report.cutoff
    );
    for cluster in &report.clusters {
        let precision = cluster
            .precision
            .map_or_else(|| "n/a".to_string(), |p| format!("{:.3}", p));
        let center = cluster
            .center
            .map_or_else(|| "-".to_string(), |c| c.to_string());
        println!(
            "  Cluster {:>3}: {:>6} member(s), center {:>6}, precision {}",
            cluster.id, cluster.size, center, precision
        );
    }
}

fn write_report(report: &ClusteringReport, path: Option<&Path>, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(report)
    } else {
        serde_json::to_string(report)
    }
    .map_err(|e| CliError::Other(e.into()))?;

    match path {
        Some(path) => {
            std::fs::write(path, json)?;
            println!("Report written to: {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ClusterInput;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    const TWO_STATES: &str = r#"{
        "points": [
            { "molecule": "A", "copy": 0, "residues": [1, 1] },
            { "molecule": "A", "copy": 1, "residues": [1, 1] }
        ],
        "frames": [
            { "score": 1.0, "positions": [[0, 0, 0], [0, 0, 10]] },
            { "score": 2.0, "positions": [[0, 0, 10], [0, 0, 0.5]] },
            { "score": 3.0, "positions": [[0, 0, 0], [0, 30, 0]] },
            { "score": 4.0, "positions": [[0, 30, 0], [0, 0, 0.5]] }
        ]
    }"#;

    fn args(input: ClusterInput, output: PathBuf) -> ClusterArgs {
        ClusterArgs {
            input,
            config: None,
            output: Some(output),
            save_matrix: None,
            cutoff: Some(2.0),
            refinement_cutoff: None,
            align: false,
            best_scoring_models: None,
            bipartite: true,
            set_values: vec![],
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ensemble_run_writes_report_and_matrix() {
        let dir = tempdir().unwrap();
        let ensemble_path = dir.path().join("ensemble.json");
        let report_path = dir.path().join("report.json");
        let matrix_path = dir.path().join("distances.csv");
        fs::write(&ensemble_path, TWO_STATES).unwrap();

        let mut cluster_args = args(
            ClusterInput {
                ensemble: Some(ensemble_path),
                matrix: None,
            },
            report_path.clone(),
        );
        cluster_args.save_matrix = Some(matrix_path.clone());
        run(cluster_args).await.unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(report["frame_count"], 4);
        assert_eq!(report["clusters"].as_array().unwrap().len(), 2);
        assert_eq!(report["clusters"][0]["members"], serde_json::json!([0, 1]));
        assert_eq!(report["bipartite_precision"].as_array().unwrap().len(), 1);

        let matrix = DistanceMatrix::load_csv(&matrix_path).unwrap();
        assert_eq!(matrix.len(), 4);
        assert!(matrix.get(0, 1).unwrap() < 0.5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn matrix_run_clusters_precomputed_distances() {
        let dir = tempdir().unwrap();
        let matrix_path = dir.path().join("input.csv");
        let report_path = dir.path().join("report.json");
        fs::write(&matrix_path, "0,1,9\n1,0,9\n9,9,0\n").unwrap();

        run(args(
            ClusterInput {
                ensemble: None,
                matrix: Some(matrix_path),
            },
            report_path.clone(),
        ))
        .await
        .unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(report["clusters"][0]["members"], serde_json::json!([0, 1]));
        assert_eq!(report["clusters"][1]["precision"], serde_json::Value::Null);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn saved_matrix_reclusters_to_the_same_members() {
        let dir = tempdir().unwrap();
        let ensemble_path = dir.path().join("ensemble.json");
        let matrix_path = dir.path().join("distances.csv");
        let first_report = dir.path().join("first.json");
        let second_report = dir.path().join("second.json");
        fs::write(&ensemble_path, TWO_STATES).unwrap();

        let mut from_ensemble = args(
            ClusterInput {
                ensemble: Some(ensemble_path),
                matrix: None,
            },
            first_report.clone(),
        );
        from_ensemble.best_scoring_models = Some(3);
        from_ensemble.save_matrix = Some(matrix_path.clone());
        run(from_ensemble).await.unwrap();

        assert_eq!(DistanceMatrix::load_csv(&matrix_path).unwrap().len(), 3);

        run(args(
            ClusterInput {
                ensemble: None,
                matrix: Some(matrix_path),
            },
            second_report.clone(),
        ))
        .await
        .unwrap();

        let read = |path: &PathBuf| -> serde_json::Value {
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
        };
        let original = read(&first_report);
        let replayed = read(&second_report);
        let analyzed: Vec<u64> = original["analyzed_frames"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_u64().unwrap())
            .collect();

        let clusters = replayed["clusters"].as_array().unwrap();
        assert_eq!(clusters.len(), original["clusters"].as_array().unwrap().len());
        for (position, cluster) in clusters.iter().enumerate() {
            let mapped: Vec<u64> = cluster["members"]
                .as_array()
                .unwrap()
                .iter()
                .map(|m| analyzed[m.as_u64().unwrap() as usize])
                .collect();
            assert_eq!(
                serde_json::json!(mapped),
                original["clusters"][position]["members"]
            );
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_input_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let result = run(args(
            ClusterInput {
                ensemble: Some(dir.path().join("absent.json")),
                matrix: None,
            },
            dir.path().join("report.json"),
        ))
        .await;
        assert!(matches!(result, Err(CliError::Io(_))));
    }
}
