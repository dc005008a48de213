//! One-shot "apply schema, then apply seed" entry point.

use std::time::Duration;

use crate::config::Config;
use crate::db::SchoolDb;
use crate::error::SeedError;
use crate::seed::dataset::{load_dataset_file, load_embedded, SeedDataset};
use crate::seed::{run_seed, SeedReport};

/// Open (and migrate) the configured database, check the CMS catalog, then
/// seed the configured dataset.
pub fn apply(config: &Config) -> Result<SeedReport, SeedError> {
    let db_path = config.database_path()?;
    log::info!("Opening database at {}", db_path.display());
    let db = SchoolDb::open_at(&db_path, Duration::from_millis(config.busy_timeout_ms))?;
    apply_to(&db, config)
}

/// Same as `apply` against an already opened store.
pub fn apply_to(db: &SchoolDb, config: &Config) -> Result<SeedReport, SeedError> {
    let drift = db.verify_catalog()?;
    if drift.is_empty() {
        log::debug!("CMS catalog matches the schema");
    }
    for item in &drift {
        log::warn!("CMS catalog drift: {}", item);
    }

    let dataset = load_configured_dataset(config)?;
    run_seed(db, &dataset)
}

fn load_configured_dataset(config: &Config) -> Result<SeedDataset, SeedError> {
    match &config.dataset_path {
        Some(path) => {
            log::info!("Loading dataset from {}", path.display());
            load_dataset_file(path)
        }
        None => {
            log::info!("Using embedded dataset");
            load_embedded()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_creates_database_and_seeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            database_path: Some(dir.path().join("nested").join("orientamento.db")),
            ..Config::default()
        };

        let report = apply(&config).expect("first run");
        assert_eq!(report.batch, "rovereto_schools");
        assert_eq!(report.schools_written, 13);
        assert!(dir.path().join("nested").join("orientamento.db").exists());

        let again = apply(&config).expect("second run");
        assert_eq!(again.schools_written, 13);
        assert_eq!(again.new_memberships, 0);
    }

    #[test]
    fn test_apply_uses_configured_dataset() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dataset = dir.path().join("seed.json");
        std::fs::write(
            &dataset,
            r#"{"batch": "pilot", "schools": [
                {"miur_code": "TNPM02000E", "name": "Liceo Filzi", "type": "liceo",
                 "educational_paths": [{"name": "Liceo delle Scienze Umane"}]}
            ]}"#,
        )
        .unwrap();
        let config = Config {
            database_path: Some(dir.path().join("orientamento.db")),
            dataset_path: Some(dataset),
            ..Config::default()
        };

        let report = apply(&config).unwrap();
        assert_eq!(report.batch, "pilot");
        assert_eq!(report.schools_written, 1);
        assert_eq!(report.path_links, 1);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_bad_dataset_is_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dataset = dir.path().join("seed.json");
        std::fs::write(&dataset, "{ not json").unwrap();
        let config = Config {
            database_path: Some(dir.path().join("orientamento.db")),
            dataset_path: Some(dataset),
            ..Config::default()
        };

        let err = apply(&config).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_apply_to_open_store() {
        let db = SchoolDb::open_in_memory().unwrap();
        let report = apply_to(&db, &Config::default()).unwrap();
        assert_eq!(db.count_rows("schools").unwrap(), report.schools_written as i64);
    }
}
