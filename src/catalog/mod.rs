//! Local catalog storage using SQLite
//!
//! This module handles the local mirror of upstream records:
//! - Locations, episodes and characters keyed by their upstream `api_id`
//! - Character episode memberships
//! - The append-only search history

pub mod queries;
mod schema;

pub use schema::*;

use crate::config::Config;
use crate::error::Result;
use crate::models::EntityKind;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, Transaction};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// A stored location
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub location_type: String,
    pub dimension: String,
    pub url: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A stored episode
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Episode {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
    pub air_date: String,
    #[serde(rename = "episode")]
    pub episode_code: String,
    pub url: String,
    pub created_at: String,
    pub updated_at: String,
}

impl std::fmt::Display for Episode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.episode_code, self.name)
    }
}

/// A stored character; `origin_id`/`location_id` are local location row ids
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Character {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
    pub status: String,
    pub species: String,
    #[serde(rename = "type")]
    pub subtype: String,
    pub gender: String,
    pub origin_id: Option<i64>,
    pub location_id: Option<i64>,
    pub image: String,
    pub url: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Character {
    pub fn status_label(&self) -> &str {
        match self.status.as_str() {
            "alive" => "Alive",
            "dead" => "Dead",
            "unknown" => "Unknown",
            other => other,
        }
    }

    pub fn gender_label(&self) -> &str {
        match self.gender.as_str() {
            "female" => "Female",
            "male" => "Male",
            "genderless" => "Genderless",
            "unknown" => "Unknown",
            other => other,
        }
    }
}

/// A character together with its resolved relations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterDetail {
    #[serde(flatten)]
    pub character: Character,
    pub origin: Option<Location>,
    pub location: Option<Location>,
    pub episodes: Vec<Episode>,
}

/// An episode with the characters known to appear in it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeDetail {
    #[serde(flatten)]
    pub episode: Episode,
    pub characters: Vec<Character>,
}

/// A location with characters that originate from or currently live there
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDetail {
    #[serde(flatten)]
    pub location: Location,
    pub residents: Vec<Character>,
}

/// Upsert input for a location
#[derive(Debug, Clone, PartialEq)]
pub struct NewLocation {
    pub api_id: i64,
    pub name: String,
    pub location_type: String,
    pub dimension: String,
    pub url: String,
}

/// Upsert input for an episode
#[derive(Debug, Clone, PartialEq)]
pub struct NewEpisode {
    pub api_id: i64,
    pub name: String,
    pub air_date: String,
    pub episode_code: String,
    pub url: String,
}

/// Upsert input for a character
#[derive(Debug, Clone, PartialEq)]
pub struct NewCharacter {
    pub api_id: i64,
    pub name: String,
    pub status: String,
    pub species: String,
    pub subtype: String,
    pub gender: String,
    pub origin_id: Option<i64>,
    pub location_id: Option<i64>,
    pub image: String,
    pub url: String,
}

/// A search ledger entry
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SearchRecord {
    pub id: i64,
    pub query: String,
    pub search_kind: String,
    pub results_count: i64,
    pub created_at: String,
}

/// Row counts per table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCounts {
    pub characters: u64,
    pub episodes: u64,
    pub locations: u64,
    pub search_records: u64,
}

impl CatalogCounts {
    pub fn is_empty(&self) -> bool {
        self.characters == 0 && self.episodes == 0 && self.locations == 0
    }
}

/// Catalog database handle
#[derive(Clone)]
pub struct CatalogDb {
    pool: SqlitePool,
    path: PathBuf,
}

impl CatalogDb {
    /// Connect to the catalog database described by the config
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::new(&config.paths.db_file).await
    }

    /// Open the database at a path, creating the schema if needed
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self {
            pool,
            path: db_path.to_path_buf(),
        };

        if !db.is_initialized().await? {
            db.init_schema().await?;
        }

        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing catalog schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='characters'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    /// Start a transaction for a multi-write reconciliation
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    // ===== Upserts =====

    pub async fn upsert_location(&self, new: &NewLocation) -> Result<Location> {
        let mut conn = self.pool.acquire().await?;
        queries::upsert_location(&mut conn, new).await
    }

    pub async fn upsert_episode(&self, new: &NewEpisode) -> Result<Episode> {
        let mut conn = self.pool.acquire().await?;
        queries::upsert_episode(&mut conn, new).await
    }

    // ===== Lookups by natural key =====

    pub async fn get_location(&self, api_id: i64) -> Result<Option<Location>> {
        let location = sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE api_id = ?")
            .bind(api_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(location)
    }

    pub async fn get_episode(&self, api_id: i64) -> Result<Option<Episode>> {
        let episode = sqlx::query_as::<_, Episode>("SELECT * FROM episodes WHERE api_id = ?")
            .bind(api_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(episode)
    }

    pub async fn get_character(&self, api_id: i64) -> Result<Option<Character>> {
        let character =
            sqlx::query_as::<_, Character>("SELECT * FROM characters WHERE api_id = ?")
                .bind(api_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(character)
    }

    /// Load a character and its relations
    pub async fn get_character_detail(&self, api_id: i64) -> Result<Option<CharacterDetail>> {
        let mut conn = self.pool.acquire().await?;
        let character =
            sqlx::query_as::<_, Character>("SELECT * FROM characters WHERE api_id = ?")
                .bind(api_id)
                .fetch_optional(&mut *conn)
                .await?;

        let Some(character) = character else {
            return Ok(None);
        };

        let origin = match character.origin_id {
            Some(id) => queries::location_by_row_id(&mut conn, id).await?,
            None => None,
        };
        let location = match character.location_id {
            Some(id) => queries::location_by_row_id(&mut conn, id).await?,
            None => None,
        };
        let episodes = queries::episodes_of_character(&mut conn, character.id).await?;

        Ok(Some(CharacterDetail {
            character,
            origin,
            location,
            episodes,
        }))
    }

    /// Load an episode and the characters appearing in it
    pub async fn get_episode_detail(&self, api_id: i64) -> Result<Option<EpisodeDetail>> {
        let Some(episode) = self.get_episode(api_id).await? else {
            return Ok(None);
        };

        let characters = sqlx::query_as::<_, Character>(
            r#"
            SELECT c.* FROM characters c
            JOIN character_episodes ce ON ce.character_id = c.id
            WHERE ce.episode_id = ?
            ORDER BY c.name
            "#,
        )
        .bind(episode.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(EpisodeDetail {
            episode,
            characters,
        }))
    }

    /// Load a location and its residents (origin or current)
    pub async fn get_location_detail(&self, api_id: i64) -> Result<Option<LocationDetail>> {
        let Some(location) = self.get_location(api_id).await? else {
            return Ok(None);
        };

        let residents = sqlx::query_as::<_, Character>(
            "SELECT * FROM characters WHERE origin_id = ? OR location_id = ? ORDER BY name",
        )
        .bind(location.id)
        .bind(location.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(LocationDetail {
            location,
            residents,
        }))
    }

    // ===== Search history =====

    pub async fn insert_search(
        &self,
        query: &str,
        kind: EntityKind,
        results_count: i64,
    ) -> Result<SearchRecord> {
        let mut conn = self.pool.acquire().await?;
        queries::insert_search(&mut conn, query, kind.path(), results_count).await
    }

    /// Most recent searches first
    pub async fn recent_searches(&self, limit: usize) -> Result<Vec<SearchRecord>> {
        let records = sqlx::query_as::<_, SearchRecord>(
            "SELECT * FROM search_history ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    // ===== Statistics and health =====

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Names of all user tables
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tables)
    }

    pub async fn count(&self, kind: EntityKind) -> Result<u64> {
        let query = format!("SELECT COUNT(*) FROM {}", kind.table());
        let count: i64 = sqlx::query_scalar(&query).fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    pub async fn counts(&self) -> Result<CatalogCounts> {
        let search_records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM search_history")
            .fetch_one(&self.pool)
            .await?;

        Ok(CatalogCounts {
            characters: self.count(EntityKind::Character).await?,
            episodes: self.count(EntityKind::Episode).await?,
            locations: self.count(EntityKind::Location).await?,
            search_records: search_records as u64,
        })
    }
}
