//! Reconciliation of upstream payloads into the local catalog
//!
//! Locations and episodes are plain upserts keyed on `api_id`. Characters
//! additionally resolve their origin, current location and episodes through
//! the remote client. Related items are best-effort: each one that cannot be
//! parsed or fetched is logged and skipped. Only a missing top-level id or a
//! storage failure aborts, and the character's writes are applied in a
//! single transaction.

use crate::api::payload::{nested_url, str_field, trailing_id};
use crate::api::ApiClient;
use crate::catalog::{
    queries, CatalogDb, CharacterDetail, Episode, Location, NewCharacter, NewEpisode,
    NewLocation,
};
use crate::error::{Error, Result};
use crate::models::EntityKind;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// A persisted record returned by a reconciliation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Location(Location),
    Episode(Episode),
    Character(CharacterDetail),
}

impl Record {
    pub fn api_id(&self) -> i64 {
        match self {
            Record::Location(l) => l.api_id,
            Record::Episode(e) => e.api_id,
            Record::Character(c) => c.character.api_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Record::Location(l) => &l.name,
            Record::Episode(e) => &e.name,
            Record::Character(c) => &c.character.name,
        }
    }
}

/// Upstream `id` field; numeric strings are accepted
pub fn payload_id(kind: EntityKind, payload: &Value) -> Result<i64> {
    let id = payload.get("id").and_then(|id| match id {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    });
    id.ok_or_else(|| Error::missing_field(kind, "id"))
}

pub fn location_from_payload(payload: &Value) -> Result<NewLocation> {
    Ok(NewLocation {
        api_id: payload_id(EntityKind::Location, payload)?,
        name: str_field(payload, "name", "Unknown"),
        location_type: str_field(payload, "type", ""),
        dimension: str_field(payload, "dimension", ""),
        url: str_field(payload, "url", ""),
    })
}

pub fn episode_from_payload(payload: &Value) -> Result<NewEpisode> {
    Ok(NewEpisode {
        api_id: payload_id(EntityKind::Episode, payload)?,
        name: str_field(payload, "name", "Unknown"),
        air_date: str_field(payload, "air_date", ""),
        episode_code: str_field(payload, "episode", ""),
        url: str_field(payload, "url", ""),
    })
}

/// Upserts remote payloads, resolving a character's relations on the way
#[derive(Clone)]
pub struct Reconciler {
    api: Arc<ApiClient>,
    db: CatalogDb,
}

impl Reconciler {
    pub fn new(api: Arc<ApiClient>, db: CatalogDb) -> Self {
        Self { api, db }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn db(&self) -> &CatalogDb {
        &self.db
    }

    /// Persist one payload of the given kind
    pub async fn reconcile(&self, kind: EntityKind, payload: &Value) -> Result<Record> {
        match kind {
            EntityKind::Location => self.reconcile_location(payload).await.map(Record::Location),
            EntityKind::Episode => self.reconcile_episode(payload).await.map(Record::Episode),
            EntityKind::Character => self
                .reconcile_character(payload)
                .await
                .map(Record::Character),
        }
    }

    pub async fn reconcile_location(&self, payload: &Value) -> Result<Location> {
        let new = location_from_payload(payload)?;
        self.db.upsert_location(&new).await
    }

    pub async fn reconcile_episode(&self, payload: &Value) -> Result<Episode> {
        let new = episode_from_payload(payload)?;
        self.db.upsert_episode(&new).await
    }

    pub async fn reconcile_character(&self, payload: &Value) -> Result<CharacterDetail> {
        let api_id = payload_id(EntityKind::Character, payload)?;

        // Related records are fetched one at a time before any write
        let origin = self.related_location(api_id, payload, "origin").await;
        let current = self.related_location(api_id, payload, "location").await;
        let episodes = self.related_episodes(api_id, payload).await;

        let mut tx = self.db.begin().await?;

        let origin = match origin {
            Some(new) => Some(queries::upsert_location(&mut tx, &new).await?),
            None => None,
        };
        let location = match current {
            Some(new) => Some(queries::upsert_location(&mut tx, &new).await?),
            None => None,
        };

        let new = NewCharacter {
            api_id,
            name: str_field(payload, "name", "Unknown"),
            status: str_field(payload, "status", "unknown").to_lowercase(),
            species: str_field(payload, "species", ""),
            subtype: str_field(payload, "type", ""),
            gender: str_field(payload, "gender", "unknown").to_lowercase(),
            origin_id: origin.as_ref().map(|l| l.id),
            location_id: location.as_ref().map(|l| l.id),
            image: str_field(payload, "image", ""),
            url: str_field(payload, "url", ""),
        };
        let character = queries::upsert_character(&mut tx, &new).await?;

        for episode in &episodes {
            let row = queries::upsert_episode(&mut tx, episode).await?;
            queries::add_membership(&mut tx, character.id, row.id).await?;
        }

        let all_episodes = queries::episodes_of_character(&mut tx, character.id).await?;
        tx.commit().await?;

        debug!(
            character = api_id,
            episodes = all_episodes.len(),
            "Reconciled character"
        );

        Ok(CharacterDetail {
            character,
            origin,
            location,
            episodes: all_episodes,
        })
    }

    async fn related_location(
        &self,
        character: i64,
        payload: &Value,
        field: &str,
    ) -> Option<NewLocation> {
        let url = nested_url(payload, field)?;
        match self
            .fetch_related(EntityKind::Location, url, location_from_payload)
            .await
        {
            Ok(new) => Some(new),
            Err(e) => {
                warn!(character, field, url, error = %e, "Could not resolve location");
                None
            }
        }
    }

    async fn related_episodes(&self, character: i64, payload: &Value) -> Vec<NewEpisode> {
        let urls = payload
            .get("episode")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let mut episodes = Vec::with_capacity(urls.len());
        for entry in urls {
            let Some(url) = entry.as_str() else {
                warn!(character, field = "episode", entry = %entry, "Skipping non-string episode URL");
                continue;
            };

            match self
                .fetch_related(EntityKind::Episode, url, episode_from_payload)
                .await
            {
                Ok(new) => episodes.push(new),
                Err(e) => {
                    warn!(character, field = "episode", url, error = %e, "Could not resolve episode");
                }
            }
        }
        episodes
    }

    /// Fetch a related record by URL and parse it; every failure is a
    /// `RelatedFetchFailed`
    async fn fetch_related<T>(
        &self,
        kind: EntityKind,
        url: &str,
        parse: fn(&Value) -> Result<T>,
    ) -> Result<T> {
        let id = trailing_id(url).ok_or_else(|| related(kind, url, "no trailing numeric id"))?;

        let value = self
            .api
            .fetch_item(kind, id)
            .await
            .map_err(|e| related(kind, url, e))?;
        parse(&value).map_err(|e| related(kind, url, e))
    }
}

fn related(kind: EntityKind, url: &str, reason: impl std::fmt::Display) -> Error {
    Error::RelatedFetchFailed {
        kind: kind.to_string(),
        url: url.to_string(),
        reason: reason.to_string(),
    }
}
