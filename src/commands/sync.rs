//! Sync command - sweep upstream list pages into the local catalog

use crate::api::payload::{has_next, results};
use crate::api::ListQuery;
use crate::config::SyncConfig;
use crate::error::Error;
use crate::models::EntityKind;
use crate::progress::sweep_bar;
use crate::sync::{payload_id, Reconciler};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info, warn};

/// Per-kind sweep statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindStats {
    pub kind: EntityKind,
    pub pages: u32,
    pub synced: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl KindStats {
    fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            pages: 0,
            synced: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

/// Sync statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStats {
    pub kinds: Vec<KindStats>,
    pub errors: Vec<String>,
}

impl SyncStats {
    pub fn synced(&self) -> usize {
        self.kinds.iter().map(|k| k.synced).sum()
    }
}

/// Sync options
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub kinds: Vec<EntityKind>,
    /// Highest page number fetched per kind
    pub page_limit: u32,
    pub page_delay: Duration,
}

impl SyncOptions {
    /// All kinds when none are selected
    pub fn new(kinds: Vec<EntityKind>, config: &SyncConfig) -> Self {
        let kinds = if kinds.is_empty() {
            EntityKind::ALL.to_vec()
        } else {
            kinds
        };
        Self {
            kinds,
            page_limit: config.page_limit,
            page_delay: config.page_delay(),
        }
    }
}

/// Execute sync command. Failures are counted, never returned.
pub async fn cmd_sync(reconciler: &Reconciler, options: &SyncOptions) -> SyncStats {
    info!(kinds = ?options.kinds, page_limit = options.page_limit, "Starting sync");

    let mut stats = SyncStats::default();
    for kind in &options.kinds {
        let kind_stats = sweep_kind(reconciler, *kind, options, &mut stats.errors).await;
        info!(
            %kind,
            synced = kind_stats.synced,
            skipped = kind_stats.skipped,
            failed = kind_stats.failed,
            "Sweep finished"
        );
        stats.kinds.push(kind_stats);
    }
    stats
}

async fn sweep_kind(
    reconciler: &Reconciler,
    kind: EntityKind,
    options: &SyncOptions,
    errors: &mut Vec<String>,
) -> KindStats {
    let mut stats = KindStats::new(kind);
    let progress = sweep_bar(kind);

    let mut page = 1;
    while page <= options.page_limit {
        let listing = match reconciler
            .api()
            .fetch_list(kind, &ListQuery::page(page))
            .await
        {
            Ok(listing) => listing,
            Err(e) => {
                let e = Error::from(e);
                warn!(%kind, page, error = %e, "Stopping sweep, page unavailable");
                errors.push(format!("{} page {}: {}", kind, page, e));
                break;
            }
        };

        if listing.get("results").and_then(Value::as_array).is_none() {
            warn!(%kind, page, "Stopping sweep, page has no results");
            break;
        }
        stats.pages += 1;

        let items = results(&listing);
        progress.inc_length(items.len() as u64);

        for item in items {
            progress.inc(1);

            if !item.is_object() || payload_id(kind, item).is_err() {
                warn!(%kind, page, "Skipping result without an id");
                stats.skipped += 1;
                continue;
            }

            match reconciler.reconcile(kind, item).await {
                Ok(record) => {
                    info!(%kind, id = record.api_id(), name = record.name(), "✅ Synced");
                    stats.synced += 1;
                }
                Err(e) => {
                    if e.is_fatal() {
                        error!(%kind, id = ?item.get("id"), error = %e, "Failed to store item");
                    } else {
                        warn!(%kind, id = ?item.get("id"), error = %e, "Failed to sync item");
                    }
                    errors.push(format!("{} {}: {}", kind, item["id"], e));
                    stats.failed += 1;
                }
            }
        }

        if !has_next(&listing) {
            break;
        }
        page += 1;

        if !options.page_delay.is_zero() {
            tokio::time::sleep(options.page_delay).await;
        }
    }

    progress.finish_with_message(format!("{}s synced", kind));
    stats
}

/// Print sync stats to console
pub fn print_sync_stats(stats: &SyncStats) {
    println!("\n🔄 Sync Complete\n");
    for kind in &stats.kinds {
        println!(
            "{}s: {} synced over {} page(s)",
            kind.kind, kind.synced, kind.pages
        );
        if kind.skipped > 0 {
            println!("  Skipped: {}", kind.skipped);
        }
        if kind.failed > 0 {
            println!("  Failed: {}", kind.failed);
        }
    }
    println!("\nTotal synced: {}", stats.synced());

    if !stats.errors.is_empty() {
        println!("\nErrors:");
        for error in &stats.errors {
            println!("- {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::tests::setup;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options(kind: EntityKind, page_limit: u32) -> SyncOptions {
        SyncOptions {
            kinds: vec![kind],
            page_limit,
            page_delay: Duration::ZERO,
        }
    }

    async fn mount_page(server: &MockServer, route: &str, page: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .and(query_param("page", page))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_sweep_stops_on_last_page() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/api/location",
            "1",
            json!({
                "info": {"count": 3, "pages": 2, "next": "https://rickandmortyapi.com/api/location?page=2"},
                "results": [{"id": 1, "name": "Earth (C-137)"}, {"id": 2, "name": "Abadango"}]
            }),
        )
        .await;
        mount_page(
            &server,
            "/api/location",
            "2",
            json!({
                "info": {"count": 3, "pages": 2, "next": null},
                "results": [{"id": 3, "name": "Citadel of Ricks"}]
            }),
        )
        .await;
        let (reconciler, _tmp) = setup(&server).await;

        let stats = cmd_sync(&reconciler, &options(EntityKind::Location, 5)).await;

        assert_eq!(stats.kinds[0].pages, 2);
        assert_eq!(stats.synced(), 3);
        assert!(stats.errors.is_empty());
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
        assert_eq!(reconciler.db().count(EntityKind::Location).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_sweep_respects_page_limit() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/api/episode",
            "1",
            json!({
                "info": {"count": 51, "pages": 3, "next": "https://rickandmortyapi.com/api/episode?page=2"},
                "results": [{"id": 1, "name": "Pilot", "episode": "S01E01"}]
            }),
        )
        .await;
        let (reconciler, _tmp) = setup(&server).await;

        let stats = cmd_sync(&reconciler, &options(EntityKind::Episode, 1)).await;
        assert_eq!(stats.kinds[0].pages, 1);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_skips_invalid_items() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/api/episode",
            "1",
            json!({
                "info": {"count": 3, "pages": 1, "next": null},
                "results": [{"id": 1, "name": "Pilot"}, "garbage", {"name": "No id"}]
            }),
        )
        .await;
        let (reconciler, _tmp) = setup(&server).await;

        let stats = cmd_sync(&reconciler, &options(EntityKind::Episode, 5)).await;
        let episodes = &stats.kinds[0];
        assert_eq!(episodes.synced, 1);
        assert_eq!(episodes.skipped, 2);
        assert_eq!(episodes.failed, 0);
    }

    #[tokio::test]
    async fn test_sweep_counts_store_failures_and_continues() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/api/episode",
            "1",
            json!({
                "info": {"count": 2, "pages": 1, "next": null},
                "results": [{"id": 1, "name": "Pilot"}, {"id": 2, "name": "Lawnmower Dog"}]
            }),
        )
        .await;
        let (reconciler, _tmp) = setup(&server).await;

        let mut tx = reconciler.db().begin().await.unwrap();
        sqlx::query("DROP TABLE character_episodes")
            .execute(&mut *tx)
            .await
            .unwrap();
        sqlx::query("DROP TABLE episodes")
            .execute(&mut *tx)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let stats = cmd_sync(&reconciler, &options(EntityKind::Episode, 5)).await;
        let episodes = &stats.kinds[0];
        assert_eq!(episodes.pages, 1);
        assert_eq!(episodes.failed, 2);
        assert_eq!(stats.errors.len(), 2);
        assert!(stats.errors.iter().all(|e| e.contains("Database error")));
    }

    #[tokio::test]
    async fn test_sweep_stops_when_page_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/character"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        let (reconciler, _tmp) = setup(&server).await;

        let stats = cmd_sync(&reconciler, &options(EntityKind::Character, 5)).await;
        assert_eq!(stats.kinds[0].pages, 0);
        assert_eq!(stats.errors.len(), 1);
        assert!(stats.errors[0].starts_with("character page 1: Network failure"));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[test]
    fn test_empty_selection_means_all_kinds() {
        let options = SyncOptions::new(Vec::new(), &SyncConfig::default());
        assert_eq!(options.kinds, EntityKind::ALL.to_vec());
        assert_eq!(options.page_limit, 5);
        assert_eq!(options.page_delay, Duration::from_millis(500));
    }
}
