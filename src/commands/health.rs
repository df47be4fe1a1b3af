//! Health command implementation

use crate::catalog::CatalogDb;
use crate::config::Config;
use crate::health::{check_health, HealthReport};
use tracing::warn;

/// Open the catalog if possible and report on it
pub async fn cmd_health(config: &Config) -> HealthReport {
    let db = if config.paths.db_file.exists() {
        match CatalogDb::connect(config).await {
            Ok(db) => Some(db),
            Err(e) => {
                warn!(error = %e, "Could not open catalog database");
                None
            }
        }
    } else {
        warn!("Catalog database missing at {:?}", config.paths.db_file);
        None
    };

    check_health(config, db.as_ref()).await
}

/// Print health report to console
pub fn print_health(report: &HealthReport) {
    let marker = if report.is_healthy() { "✓" } else { "✗" };
    println!("\n🩺 citadel Health: {} {}\n", marker, report.status);
    println!("Database: {}", report.database_path);
    println!("Upstream API: {}", report.api_base_url);

    let store = if report.store_reachable {
        "✓ Reachable"
    } else {
        "✗ Unreachable"
    };
    println!("Store: {}", store);
    if !report.tables_found.is_empty() {
        println!("Tables: {}", report.tables_found.join(", "));
    }
    if !report.missing_tables.is_empty() {
        println!("Missing tables: {} (run 'citadel init')", report.missing_tables.join(", "));
    }

    println!("\nRecords:");
    println!("  Characters: {}", report.characters);
    println!("  Episodes: {}", report.episodes);
    println!("  Locations: {}", report.locations);
    println!("  Searches: {}", report.search_records);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_database_is_not_created() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));

        let report = cmd_health(&config).await;
        assert!(!report.is_healthy());
        assert!(!config.paths.db_file.exists());
    }
}
