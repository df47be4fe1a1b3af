//! Connection-level statements.
//!
//! Every function takes a bare `SqliteConnection` so the same statement runs
//! on a pooled connection or inside a reconciliation transaction.

use super::{
    Character, Episode, Location, NewCharacter, NewEpisode, NewLocation, SearchRecord,
};
use crate::error::Result;
use chrono::Utc;
use sqlx::SqliteConnection;

pub async fn upsert_location(conn: &mut SqliteConnection, new: &NewLocation) -> Result<Location> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        INSERT INTO locations (api_id, name, location_type, dimension, url, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(api_id) DO UPDATE SET
            name = excluded.name,
            location_type = excluded.location_type,
            dimension = excluded.dimension,
            url = excluded.url,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(new.api_id)
    .bind(&new.name)
    .bind(&new.location_type)
    .bind(&new.dimension)
    .bind(&new.url)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    let location = sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE api_id = ?")
        .bind(new.api_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(location)
}

pub async fn upsert_episode(conn: &mut SqliteConnection, new: &NewEpisode) -> Result<Episode> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        INSERT INTO episodes (api_id, name, air_date, episode_code, url, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(api_id) DO UPDATE SET
            name = excluded.name,
            air_date = excluded.air_date,
            episode_code = excluded.episode_code,
            url = excluded.url,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(new.api_id)
    .bind(&new.name)
    .bind(&new.air_date)
    .bind(&new.episode_code)
    .bind(&new.url)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    let episode = sqlx::query_as::<_, Episode>("SELECT * FROM episodes WHERE api_id = ?")
        .bind(new.api_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(episode)
}

pub async fn upsert_character(
    conn: &mut SqliteConnection,
    new: &NewCharacter,
) -> Result<Character> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        INSERT INTO characters (api_id, name, status, species, subtype, gender, origin_id, location_id, image, url, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(api_id) DO UPDATE SET
            name = excluded.name,
            status = excluded.status,
            species = excluded.species,
            subtype = excluded.subtype,
            gender = excluded.gender,
            origin_id = excluded.origin_id,
            location_id = excluded.location_id,
            image = excluded.image,
            url = excluded.url,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(new.api_id)
    .bind(&new.name)
    .bind(&new.status)
    .bind(&new.species)
    .bind(&new.subtype)
    .bind(&new.gender)
    .bind(new.origin_id)
    .bind(new.location_id)
    .bind(&new.image)
    .bind(&new.url)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    let character = sqlx::query_as::<_, Character>("SELECT * FROM characters WHERE api_id = ?")
        .bind(new.api_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(character)
}

/// Add an episode membership; an existing pair is left untouched
pub async fn add_membership(
    conn: &mut SqliteConnection,
    character_id: i64,
    episode_id: i64,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO character_episodes (character_id, episode_id) VALUES (?, ?)",
    )
    .bind(character_id)
    .bind(episode_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn location_by_row_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Location>> {
    let location = sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(location)
}

pub async fn episodes_of_character(
    conn: &mut SqliteConnection,
    character_id: i64,
) -> Result<Vec<Episode>> {
    let episodes = sqlx::query_as::<_, Episode>(
        r#"
        SELECT e.* FROM episodes e
        JOIN character_episodes ce ON ce.episode_id = e.id
        WHERE ce.character_id = ?
        ORDER BY e.episode_code, e.api_id
        "#,
    )
    .bind(character_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(episodes)
}

pub async fn insert_search(
    conn: &mut SqliteConnection,
    query: &str,
    kind: &str,
    results_count: i64,
) -> Result<SearchRecord> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "INSERT INTO search_history (query, search_kind, results_count, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(query)
    .bind(kind)
    .bind(results_count)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(SearchRecord {
        id: result.last_insert_rowid(),
        query: query.to_string(),
        search_kind: kind.to_string(),
        results_count,
        created_at: now,
    })
}
