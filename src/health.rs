//! Readiness report for the local catalog

use crate::catalog::{CatalogCounts, CatalogDb, EXPECTED_TABLES};
use crate::config::Config;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// `healthy` when the store answers and every expected table exists
    pub status: String,
    pub store_reachable: bool,
    pub tables_found: Vec<String>,
    pub missing_tables: Vec<String>,
    pub characters: u64,
    pub episodes: u64,
    pub locations: u64,
    pub search_records: u64,
    pub database_path: String,
    pub api_base_url: String,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Inspect the store; failures are reported in the result, never returned
pub async fn check_health(config: &Config, db: Option<&CatalogDb>) -> HealthReport {
    let mut report = HealthReport {
        status: "unhealthy".to_string(),
        store_reachable: false,
        tables_found: Vec::new(),
        missing_tables: EXPECTED_TABLES.iter().map(|t| t.to_string()).collect(),
        characters: 0,
        episodes: 0,
        locations: 0,
        search_records: 0,
        database_path: config.paths.db_file.display().to_string(),
        api_base_url: config.api.base_url.clone(),
    };

    let Some(db) = db else {
        return report;
    };

    if let Err(e) = db.ping().await {
        warn!(error = %e, "Catalog store unreachable");
        return report;
    }
    report.store_reachable = true;

    let tables = match db.list_tables().await {
        Ok(tables) => tables,
        Err(e) => {
            warn!(error = %e, "Could not list catalog tables");
            return report;
        }
    };

    let (found, missing): (Vec<&str>, Vec<&str>) = EXPECTED_TABLES
        .iter()
        .copied()
        .partition(|expected| tables.iter().any(|t| t == expected));
    report.tables_found = found.into_iter().map(str::to_string).collect();
    report.missing_tables = missing.into_iter().map(str::to_string).collect();

    match db.counts().await {
        Ok(CatalogCounts {
            characters,
            episodes,
            locations,
            search_records,
        }) => {
            report.characters = characters;
            report.episodes = episodes;
            report.locations = locations;
            report.search_records = search_records;
        }
        Err(e) => debug!(error = %e, "Row counts unavailable"),
    }

    if report.missing_tables.is_empty() {
        report.status = "healthy".to_string();
    }
    report
}
