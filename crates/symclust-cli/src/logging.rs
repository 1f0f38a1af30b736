use crate::error::{CliError, Result};
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::{
    EnvFilter,
    filter::LevelFilter,
    fmt::{self},
    prelude::*,
};

/// Environment variable holding filter directives that replace the verbosity flags.
pub const LOG_ENV: &str = "SYMCLUST_LOG";

/// Level of the clustering library and this binary, both logging under `symclust`.
fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::OFF;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Dependencies (rayon, indicatif, ...) only surface warnings unless tracing everything.
fn filter_directives(verbosity: u8, quiet: bool) -> String {
    let own = level_filter(verbosity, quiet);
    let others = match own {
        LevelFilter::OFF => LevelFilter::OFF,
        LevelFilter::TRACE => LevelFilter::DEBUG,
        _ => LevelFilter::WARN,
    };
    format!("{},symclust={}", others, own).to_lowercase()
}

fn build_filter(verbosity: u8, quiet: bool) -> Result<EnvFilter> {
    let directives = match std::env::var(LOG_ENV) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => filter_directives(verbosity, quiet),
    };
    EnvFilter::try_new(&directives).map_err(|e| {
        CliError::Config(format!(
            "Invalid {} directives '{}': {}",
            LOG_ENV, directives, e
        ))
    })
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact();

    let subscriber = tracing_subscriber::registry()
        .with(build_filter(verbosity, quiet)?)
        .with(stderr_layer);

    if let Some(path) = log_file {
        let file = File::create(&path).map_err(CliError::Io)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_target(true);

        subscriber.with(file_layer).init();
    } else {
        subscriber.init();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::Once;
    use tracing::{debug, info, warn};

    static INIT: Once = Once::new();

    fn ensure_global_logger_is_set() {
        INIT.call_once(|| {
            setup_logging(3, false, None).expect("Failed to set up global logger for tests");
        });
    }

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_filter(0, false), LevelFilter::WARN);
        assert_eq!(level_filter(1, false), LevelFilter::INFO);
        assert_eq!(level_filter(2, false), LevelFilter::DEBUG);
        assert_eq!(level_filter(7, false), LevelFilter::TRACE);
        assert_eq!(level_filter(3, true), LevelFilter::OFF);
    }

    #[test]
    fn dependencies_stay_quieter_than_the_clustering_targets() {
        assert_eq!(filter_directives(0, false), "warn,symclust=warn");
        assert_eq!(filter_directives(2, false), "warn,symclust=debug");
        assert_eq!(filter_directives(3, false), "debug,symclust=trace");
        assert_eq!(filter_directives(1, true), "off,symclust=off");
    }

    #[test]
    #[serial]
    fn environment_directives_replace_the_flags() {
        // SAFETY: tests touching the environment are serialized.
        unsafe { std::env::set_var(LOG_ENV, "symclust::engine=trace") };
        let filter = build_filter(0, false).unwrap();
        assert!(filter.to_string().contains("symclust::engine=trace"));

        unsafe { std::env::set_var(LOG_ENV, "symclust=loudest") };
        assert!(matches!(build_filter(0, false), Err(CliError::Config(_))));

        unsafe { std::env::remove_var(LOG_ENV) };
        assert!(build_filter(1, false).unwrap().to_string().contains("symclust=info"));
    }

    #[test]
    #[serial]
    fn initialization_and_macros_work() {
        ensure_global_logger_is_set();

        warn!(target: "symclust::engine::clustering", "Singleton cluster left unmerged");
        info!(clusters = 2, "Clustering finished.");
        debug!(pairs = 15, "Precomputing pair metrics.");
    }

    #[test]
    #[serial]
    fn file_layer_keeps_the_clustering_target() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("test.log");

        let file = File::create(&log_path).unwrap();
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_target(true);
        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::new(filter_directives(2, false)))
            .with(file_layer);

        tracing::subscriber::with_default(subscriber, || {
            debug!(
                target: "symclust::engine::clustering",
                first = 0,
                second = 3,
                "Merging clusters with close centers."
            );
            debug!(target: "rayon_core", "worker spawned");
        });

        let content = std::fs::read_to_string(log_path).unwrap();
        assert!(content.contains("symclust::engine::clustering"));
        assert!(content.contains("Merging clusters with close centers."));
        assert!(content.contains("second=3"));
        assert!(!content.contains("worker spawned"));
        assert!(content.contains("ThreadId"));
    }

    #[test]
    #[serial]
    fn invalid_log_file_path_propagates_error() {
        let invalid_path = PathBuf::from("/");

        if cfg!(unix) && invalid_path.is_dir() {
            let result = setup_logging(0, false, Some(invalid_path));
            assert!(matches!(result, Err(CliError::Io(_))));
        }
    }
}
