//! Hierarchical configuration loading: files, local overrides, the
//! `--config` file and `FLEETMON_*` environment variables.

use fleetmon::domain::models::{LogFormat, RotationPolicy};
use fleetmon::infrastructure::config::ConfigLoader;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const ENV_KEYS: [&str; 3] = [
    "FLEETMON_DISPATCH__MAX_WORKERS",
    "FLEETMON_MONITORING__CREDENTIALS__PASSWORD",
    "FLEETMON_RECONCILE__RETRY_BUDGET",
];

fn project(config: &str, local: Option<&str>) -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    fs::write(dir.path().join("config.yaml"), config).unwrap();
    if let Some(local) = local {
        fs::write(dir.path().join("local.yaml"), local).unwrap();
    }
    dir
}

#[test]
fn test_defaults_without_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_env::with_vars_unset(ENV_KEYS, || ConfigLoader::load_in(dir.path(), None))
        .unwrap();

    assert_eq!(config.dispatch.max_workers, 50);
    assert_eq!(config.inventory.max_pages, 40);
    assert_eq!(config.logging.format, LogFormat::Pretty);
}

#[test]
fn test_local_overrides_project_file() {
    let dir = project(
        "dispatch:\n  max_workers: 10\n  batch_size: 100\nlogging:\n  level: info\n",
        Some("dispatch:\n  max_workers: 4\n"),
    );

    let config = temp_env::with_vars_unset(ENV_KEYS, || ConfigLoader::load_in(dir.path(), None))
        .unwrap();

    assert_eq!(config.dispatch.max_workers, 4, "local.yaml should win");
    assert_eq!(config.dispatch.batch_size, 100, "unset keys fall through");
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_env_overrides_every_file() {
    let dir = project(
        "dispatch:\n  max_workers: 10\nmonitoring:\n  credentials:\n    username: ops\n",
        None,
    );
    let extra = tempfile::NamedTempFile::new().unwrap();
    fs::write(extra.path(), "reconcile:\n  retry_budget: 5\n").unwrap();

    let config = temp_env::with_vars(
        [
            ("FLEETMON_DISPATCH__MAX_WORKERS", Some("7")),
            ("FLEETMON_MONITORING__CREDENTIALS__PASSWORD", Some("from-env")),
            ("FLEETMON_RECONCILE__RETRY_BUDGET", None),
        ],
        || ConfigLoader::load_in(dir.path(), Some(extra.path())),
    )
    .unwrap();

    assert_eq!(config.dispatch.max_workers, 7);
    assert_eq!(config.monitoring.credentials.username, "ops");
    assert_eq!(config.monitoring.credentials.password, "from-env");
    assert_eq!(config.reconcile.retry_budget, 5, "--config file applies");
}

#[test]
fn test_missing_extra_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = temp_env::with_vars_unset(ENV_KEYS, || {
        ConfigLoader::load_in(dir.path(), Some(Path::new("/nonexistent/fleetmon.yaml")))
    });
    assert!(result.is_err());
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let dir = project("inventory:\n  page_size: 0\n", None);
    let err = temp_env::with_vars_unset(ENV_KEYS, || ConfigLoader::load_in(dir.path(), None))
        .unwrap_err();
    assert!(err.to_string().contains("page_size"), "got {err}");
}

#[test]
fn test_load_from_file_reads_logging_section() {
    let file = tempfile::NamedTempFile::new().unwrap();
    fs::write(
        file.path(),
        "logging:\n  level: debug\n  format: json\n  rotation: hourly\n  log_dir: /var/log/fleetmon\n",
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(file.path()).unwrap();

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.logging.rotation, RotationPolicy::Hourly);
    assert_eq!(
        config.logging.log_dir.as_deref(),
        Some(Path::new("/var/log/fleetmon"))
    );
}
