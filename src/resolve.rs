//! Fallback resolution for read requests
//!
//! Every read tries the upstream API first, then the local catalog, then a
//! fixed default. Neither upstream nor local storage failures surface as
//! errors; a failing store is logged and read as a miss.

use crate::api::payload::{empty_page, has_results, result_count, results};
use crate::api::ListQuery;
use crate::config::{
    ResolverConfig, DEFAULT_CHARACTER_COUNT, DEFAULT_EPISODE_COUNT, DEFAULT_LOCATION_COUNT,
};
use crate::error::{Error, Result};
use crate::ledger::SearchLedger;
use crate::models::EntityKind;
use crate::sync::Reconciler;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Number of recent searches included in a locally served summary
const SUMMARY_RECENT_SEARCHES: usize = 5;

/// Where a resolved payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Remote,
    Local,
    Default,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DataSource::Remote => "remote",
            DataSource::Local => "local",
            DataSource::Default => "default",
        };
        f.write_str(label)
    }
}

/// A read request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Item { kind: EntityKind, id: i64 },
    List { kind: EntityKind, query: ListQuery },
    Search { kind: EntityKind, text: String, page: u32 },
    Summary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found { payload: Value, source: DataSource },
    /// A single item missing both upstream and locally
    NotFound { kind: EntityKind, id: i64 },
}

impl Resolution {
    fn found(payload: Value, source: DataSource) -> Self {
        Resolution::Found { payload, source }
    }

    pub fn source(&self) -> Option<DataSource> {
        match self {
            Resolution::Found { source, .. } => Some(*source),
            Resolution::NotFound { .. } => None,
        }
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            Resolution::Found { payload, .. } => Some(payload),
            Resolution::NotFound { .. } => None,
        }
    }

    /// Payload and source, with a missing item as [`Error::NotFound`]
    pub fn into_found(self) -> Result<(Value, DataSource)> {
        match self {
            Resolution::Found { payload, source } => Ok((payload, source)),
            Resolution::NotFound { kind, id } => Err(Error::NotFound {
                kind: kind.to_string(),
                id,
            }),
        }
    }
}

/// Remote, then local, then default
pub struct FallbackResolver {
    reconciler: Reconciler,
    ledger: SearchLedger,
    list_sync_limit: usize,
}

impl FallbackResolver {
    pub fn new(reconciler: Reconciler, ledger: SearchLedger, config: &ResolverConfig) -> Self {
        Self {
            reconciler,
            ledger,
            list_sync_limit: config.list_sync_limit,
        }
    }

    pub async fn resolve(&self, request: &Request) -> Resolution {
        match request {
            Request::Item { kind, id } => self.resolve_item(*kind, *id).await,
            Request::List { kind, query } => self.resolve_list(*kind, query).await,
            Request::Search { kind, text, page } => self.resolve_search(*kind, text, *page).await,
            Request::Summary => self.resolve_summary().await,
        }
    }

    pub async fn resolve_item(&self, kind: EntityKind, id: i64) -> Resolution {
        match self.reconciler.api().fetch_item(kind, id).await {
            Ok(payload) => {
                // Persistence is a side effect; the read succeeds regardless
                if let Err(e) = self.reconciler.reconcile(kind, &payload).await {
                    warn!(%kind, id, error = %e, "Failed to persist fetched item");
                }
                return Resolution::found(payload, DataSource::Remote);
            }
            Err(e) => {
                let error = Error::from(e);
                debug!(%kind, id, %error, "Remote item lookup failed, trying local store");
            }
        }

        match self.local_item(kind, id).await {
            Ok(Some(payload)) => Resolution::found(payload, DataSource::Local),
            Ok(None) => {
                info!(%kind, id, "Item not found upstream or locally");
                Resolution::NotFound { kind, id }
            }
            Err(e) => {
                warn!(%kind, id, error = %e, "Local item lookup failed, treating as missing");
                Resolution::NotFound { kind, id }
            }
        }
    }

    async fn local_item(&self, kind: EntityKind, id: i64) -> Result<Option<Value>> {
        let db = self.reconciler.db();
        let local = match kind {
            EntityKind::Character => db
                .get_character_detail(id)
                .await?
                .map(serde_json::to_value)
                .transpose()?,
            EntityKind::Episode => db
                .get_episode_detail(id)
                .await?
                .map(serde_json::to_value)
                .transpose()?,
            EntityKind::Location => db
                .get_location_detail(id)
                .await?
                .map(serde_json::to_value)
                .transpose()?,
        };
        Ok(local)
    }

    pub async fn resolve_list(&self, kind: EntityKind, query: &ListQuery) -> Resolution {
        match self.reconciler.api().fetch_list(kind, query).await {
            Ok(page) => {
                if kind == EntityKind::Character {
                    self.sync_leading(kind, &page).await;
                }
                Resolution::found(page, DataSource::Remote)
            }
            Err(e) => {
                let error = Error::from(e);
                warn!(%kind, page = query.page, %error, "List unavailable, serving empty page");
                Resolution::found(empty_page(), DataSource::Default)
            }
        }
    }

    /// Search by name, falling back to the kind's alternate filter when the
    /// name search fails or finds nothing
    pub async fn resolve_search(&self, kind: EntityKind, text: &str, page: u32) -> Resolution {
        let text = text.trim();
        if text.is_empty() {
            return Resolution::found(empty_page(), DataSource::Default);
        }

        let api = self.reconciler.api();
        let primary = ListQuery::page(page).with_filter("name", text);
        let mut fetched = api.fetch_list(kind, &primary).await;

        if !matches!(&fetched, Ok(page) if has_results(page)) {
            let filter = kind.alternate_search_filter();
            debug!(%kind, query = text, filter, "Name search empty, trying alternate filter");
            let alternate = ListQuery::page(page).with_filter(filter, text);
            fetched = api.fetch_list(kind, &alternate).await;
        }

        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                let error = Error::from(e);
                warn!(%kind, query = text, %error, "Search unavailable, serving empty page");
                return Resolution::found(empty_page(), DataSource::Default);
            }
        };

        let count = result_count(&page);
        if let Err(e) = self.ledger.record(text, kind, count).await {
            warn!(%kind, query = text, error = %e, "Failed to record search");
        }

        Resolution::found(page, DataSource::Remote)
    }

    /// Aggregate counts for a landing page
    pub async fn resolve_summary(&self) -> Resolution {
        if let Some(payload) = self.remote_summary().await {
            return Resolution::found(payload, DataSource::Remote);
        }

        match self.local_summary().await {
            Ok(Some(payload)) => return Resolution::found(payload, DataSource::Local),
            Ok(None) => debug!("Local store is empty, using default counts"),
            Err(e) => warn!(error = %e, "Local counts unavailable, using default counts"),
        }

        Resolution::found(
            summary_payload(
                DEFAULT_CHARACTER_COUNT,
                DEFAULT_EPISODE_COUNT,
                DEFAULT_LOCATION_COUNT,
                Value::Array(Vec::new()),
            ),
            DataSource::Default,
        )
    }

    async fn remote_summary(&self) -> Option<Value> {
        let api = self.reconciler.api();
        let mut counts = [0u64; 3];
        for (slot, kind) in counts.iter_mut().zip(EntityKind::ALL) {
            match api.probe(kind).await {
                Ok(page) => *slot = result_count(&page),
                Err(e) => {
                    let error = Error::from(e);
                    debug!(%kind, %error, "Remote count unavailable");
                    return None;
                }
            }
        }

        let [characters, episodes, locations] = counts;
        Some(summary_payload(characters, episodes, locations, Value::Array(Vec::new())))
    }

    async fn local_summary(&self) -> Result<Option<Value>> {
        let counts = self.reconciler.db().counts().await?;
        if counts.is_empty() {
            return Ok(None);
        }

        let recent = self.ledger.recent(SUMMARY_RECENT_SEARCHES).await?;
        Ok(Some(summary_payload(
            counts.characters,
            counts.episodes,
            counts.locations,
            serde_json::to_value(recent)?,
        )))
    }

    async fn sync_leading(&self, kind: EntityKind, page: &Value) {
        for item in results(page).iter().take(self.list_sync_limit) {
            if let Err(e) = self.reconciler.reconcile(kind, item).await {
                warn!(%kind, id = ?item.get("id"), error = %e, "Failed to sync listed item");
            }
        }
    }
}

fn summary_payload(characters: u64, episodes: u64, locations: u64, recent: Value) -> Value {
    json!({
        "characters": characters,
        "episodes": episodes,
        "locations": locations,
        "recent_searches": recent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NewLocation;
    use crate::sync::tests::{mount_json, mount_status, setup};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn resolver(server: &MockServer) -> (FallbackResolver, TempDir) {
        let (reconciler, tmp) = setup(server).await;
        let ledger = SearchLedger::new(reconciler.db().clone());
        let config = ResolverConfig { list_sync_limit: 1 };
        (FallbackResolver::new(reconciler, ledger, &config), tmp)
    }

    fn page_of(count: u64, items: Vec<Value>) -> Value {
        json!({"info": {"count": count, "pages": 1, "next": null, "prev": null}, "results": items})
    }

    #[tokio::test]
    async fn test_item_remote_is_persisted() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/api/episode/1",
            json!({"id": 1, "name": "Pilot", "air_date": "December 2, 2013", "episode": "S01E01"}),
        )
        .await;
        let (resolver, _tmp) = resolver(&server).await;

        let resolution = resolver
            .resolve(&Request::Item { kind: EntityKind::Episode, id: 1 })
            .await;
        assert_eq!(resolution.source(), Some(DataSource::Remote));
        assert_eq!(resolution.payload().unwrap()["name"], "Pilot");

        let stored = resolver.reconciler.db().get_episode(1).await.unwrap().unwrap();
        assert_eq!(stored.episode_code, "S01E01");
    }

    #[tokio::test]
    async fn test_item_falls_back_to_local_then_not_found() {
        let server = MockServer::start().await;
        mount_status(&server, "/api/location/3", 503).await;
        let (resolver, _tmp) = resolver(&server).await;

        resolver
            .reconciler
            .db()
            .upsert_location(&NewLocation {
                api_id: 3,
                name: "Citadel of Ricks".to_string(),
                location_type: "Space station".to_string(),
                dimension: "unknown".to_string(),
                url: String::new(),
            })
            .await
            .unwrap();

        let local = resolver.resolve_item(EntityKind::Location, 3).await;
        assert_eq!(local.source(), Some(DataSource::Local));
        let payload = local.payload().unwrap();
        assert_eq!(payload["name"], "Citadel of Ricks");
        assert_eq!(payload["type"], "Space station");
        assert!(payload["residents"].as_array().unwrap().is_empty());

        let missing = resolver.resolve_item(EntityKind::Location, 999).await;
        assert_eq!(
            missing,
            Resolution::NotFound { kind: EntityKind::Location, id: 999 }
        );
        assert!(matches!(
            missing.into_found(),
            Err(Error::NotFound { id: 999, .. })
        ));
    }

    #[tokio::test]
    async fn test_item_store_failure_reads_as_missing() {
        let server = MockServer::start().await;
        mount_status(&server, "/api/character/1", 503).await;
        let (resolver, _tmp) = resolver(&server).await;

        let mut tx = resolver.reconciler.db().begin().await.unwrap();
        sqlx::query("DROP TABLE character_episodes")
            .execute(&mut *tx)
            .await
            .unwrap();
        sqlx::query("DROP TABLE characters")
            .execute(&mut *tx)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let resolution = resolver
            .resolve(&Request::Item { kind: EntityKind::Character, id: 1 })
            .await;
        assert_eq!(
            resolution,
            Resolution::NotFound { kind: EntityKind::Character, id: 1 }
        );
    }

    #[tokio::test]
    async fn test_list_failure_serves_empty_default_page() {
        let server = MockServer::start().await;
        mount_status(&server, "/api/location", 500).await;
        let (resolver, _tmp) = resolver(&server).await;

        let resolution = resolver
            .resolve_list(EntityKind::Location, &ListQuery::page(1))
            .await;
        assert_eq!(resolution.source(), Some(DataSource::Default));
        assert_eq!(resolution.payload(), Some(&empty_page()));
    }

    #[tokio::test]
    async fn test_character_list_syncs_leading_results() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/api/character",
            page_of(
                2,
                vec![
                    json!({"id": 1, "name": "Rick Sanchez", "status": "Alive"}),
                    json!({"id": 2, "name": "Morty Smith", "status": "Alive"}),
                ],
            ),
        )
        .await;
        let (resolver, _tmp) = resolver(&server).await;

        let resolution = resolver
            .resolve_list(EntityKind::Character, &ListQuery::page(1))
            .await;
        assert_eq!(resolution.source(), Some(DataSource::Remote));

        let db = resolver.reconciler.db();
        assert!(db.get_character(1).await.unwrap().is_some());
        assert!(db.get_character(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_uses_alternate_filter_and_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/character"))
            .and(query_param("name", "Human"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "There is nothing here"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/character"))
            .and(query_param("species", "Human"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_of(
                366,
                vec![json!({"id": 1, "name": "Rick Sanchez"})],
            )))
            .mount(&server)
            .await;
        let (resolver, _tmp) = resolver(&server).await;

        let resolution = resolver
            .resolve(&Request::Search {
                kind: EntityKind::Character,
                text: "Human".to_string(),
                page: 1,
            })
            .await;
        assert_eq!(resolution.source(), Some(DataSource::Remote));
        assert_eq!(result_count(resolution.payload().unwrap()), 366);

        let recent = resolver.ledger.recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].query, "Human");
        assert_eq!(recent[0].results_count, 366);
    }

    #[tokio::test]
    async fn test_search_with_no_results_is_not_recorded() {
        let server = MockServer::start().await;
        mount_json(&server, "/api/episode", page_of(0, vec![])).await;
        let (resolver, _tmp) = resolver(&server).await;

        let resolution = resolver.resolve_search(EntityKind::Episode, "zzzz", 1).await;
        assert_eq!(resolution.source(), Some(DataSource::Remote));
        assert!(resolver.ledger.recent(10).await.unwrap().is_empty());

        // Name lookup plus the alternate filter
        assert_eq!(server.received_requests().await.unwrap().len(), 2);

        let blank = resolver.resolve_search(EntityKind::Episode, "   ", 1).await;
        assert_eq!(blank.source(), Some(DataSource::Default));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_summary_prefers_remote_counts() {
        let server = MockServer::start().await;
        mount_json(&server, "/api/character", page_of(826, vec![])).await;
        mount_json(&server, "/api/episode", page_of(51, vec![])).await;
        mount_json(&server, "/api/location", page_of(126, vec![])).await;
        let (resolver, _tmp) = resolver(&server).await;

        let resolution = resolver.resolve(&Request::Summary).await;
        assert_eq!(resolution.source(), Some(DataSource::Remote));
        let payload = resolution.payload().unwrap();
        assert_eq!(payload["characters"], 826);
        assert_eq!(payload["episodes"], 51);
        assert_eq!(payload["locations"], 126);
    }

    #[tokio::test]
    async fn test_summary_falls_back_to_local_then_default() {
        let server = MockServer::start().await;
        mount_status(&server, "/api/character", 500).await;
        let (resolver, _tmp) = resolver(&server).await;

        let fallback = resolver.resolve_summary().await;
        assert_eq!(fallback.source(), Some(DataSource::Default));
        assert_eq!(fallback.payload().unwrap()["characters"], DEFAULT_CHARACTER_COUNT);
        assert_eq!(fallback.payload().unwrap()["locations"], DEFAULT_LOCATION_COUNT);

        resolver
            .reconciler
            .reconcile(EntityKind::Episode, &json!({"id": 1, "name": "Pilot"}))
            .await
            .unwrap();
        resolver
            .ledger
            .record("pilot", EntityKind::Episode, 1)
            .await
            .unwrap();

        let local = resolver.resolve_summary().await;
        assert_eq!(local.source(), Some(DataSource::Local));
        let payload = local.payload().unwrap();
        assert_eq!(payload["episodes"], 1);
        assert_eq!(payload["characters"], 0);
        assert_eq!(payload["recent_searches"][0]["query"], "pilot");
    }
}
