//! Applies the schema and seeds the orientation directory.
//!
//! Usage: `orientamento` (no flags). Configuration comes from
//! `~/.orientamento/config.json` and the `ORIENTAMENTO_DB` /
//! `ORIENTAMENTO_DATASET` environment variables.

use orientamento_lib::bootstrap;
use orientamento_lib::config::load_config;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    match bootstrap::apply(&config) {
        Ok(report) => {
            if !report.warnings.is_empty() {
                log::warn!(
                    "Batch '{}' finished with {} warnings",
                    report.batch,
                    report.warnings.len()
                );
            }
        }
        Err(e) => {
            log::error!("Seed batch failed: {}", e);
            std::process::exit(1);
        }
    }
}
