//! SQLite schema definition

/// SQL schema for the catalog database
pub const SCHEMA_SQL: &str = r#"
-- Locations: planets, dimensions, stations
CREATE TABLE IF NOT EXISTS locations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    api_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    location_type TEXT NOT NULL DEFAULT '',
    dimension TEXT NOT NULL DEFAULT '',
    url TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Episodes
CREATE TABLE IF NOT EXISTS episodes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    api_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    air_date TEXT NOT NULL DEFAULT '',
    episode_code TEXT NOT NULL DEFAULT '',
    url TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Characters with nullable origin/current location references
CREATE TABLE IF NOT EXISTS characters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    api_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'unknown',
    species TEXT NOT NULL DEFAULT '',
    subtype TEXT NOT NULL DEFAULT '',
    gender TEXT NOT NULL DEFAULT 'unknown',
    origin_id INTEGER REFERENCES locations(id) ON DELETE SET NULL,
    location_id INTEGER REFERENCES locations(id) ON DELETE SET NULL,
    image TEXT NOT NULL DEFAULT '',
    url TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Episode membership (many-to-many)
CREATE TABLE IF NOT EXISTS character_episodes (
    character_id INTEGER NOT NULL REFERENCES characters(id) ON DELETE CASCADE,
    episode_id INTEGER NOT NULL REFERENCES episodes(id) ON DELETE CASCADE,
    PRIMARY KEY (character_id, episode_id)
);

-- Search ledger: append-only
CREATE TABLE IF NOT EXISTS search_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query TEXT NOT NULL,
    search_kind TEXT NOT NULL,
    results_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_characters_origin ON characters(origin_id);
CREATE INDEX IF NOT EXISTS idx_characters_location ON characters(location_id);
CREATE INDEX IF NOT EXISTS idx_character_episodes_episode ON character_episodes(episode_id);
CREATE INDEX IF NOT EXISTS idx_search_history_created ON search_history(created_at);
"#;

/// Tables the catalog cannot serve without
pub const EXPECTED_TABLES: [&str; 3] = ["characters", "episodes", "locations"];
