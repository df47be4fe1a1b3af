//! Entity kinds mirrored from the upstream catalog.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The three resource families exposed by the upstream API
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Character,
    Episode,
    Location,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Character,
        EntityKind::Episode,
        EntityKind::Location,
    ];

    /// Path segment under the API base URL
    pub fn path(&self) -> &'static str {
        match self {
            EntityKind::Character => "character",
            EntityKind::Episode => "episode",
            EntityKind::Location => "location",
        }
    }

    /// Local table holding this kind
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Character => "characters",
            EntityKind::Episode => "episodes",
            EntityKind::Location => "locations",
        }
    }

    /// Filter tried when a name search comes back empty
    pub fn alternate_search_filter(&self) -> &'static str {
        match self {
            EntityKind::Character => "species",
            EntityKind::Episode => "episode",
            EntityKind::Location => "type",
        }
    }

    /// Filters the upstream list endpoint understands for this kind
    pub fn list_filters(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Character => &["name", "status", "species", "type", "gender"],
            EntityKind::Episode => &["name", "episode"],
            EntityKind::Location => &["name", "type", "dimension"],
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "character" | "characters" => Ok(EntityKind::Character),
            "episode" | "episodes" => Ok(EntityKind::Episode),
            "location" | "locations" => Ok(EntityKind::Location),
            _ => Err(Error::Config(format!("Unknown entity kind: {}", s))),
        }
    }
}
