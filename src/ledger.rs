//! Append-only record of searches that found something

use crate::catalog::{CatalogDb, SearchRecord};
use crate::error::Result;
use crate::models::EntityKind;
use tracing::debug;

#[derive(Clone)]
pub struct SearchLedger {
    db: CatalogDb,
}

impl SearchLedger {
    pub fn new(db: CatalogDb) -> Self {
        Self { db }
    }

    /// Record a search. Searches with no results are not kept.
    pub async fn record(
        &self,
        query: &str,
        kind: EntityKind,
        count: u64,
    ) -> Result<Option<SearchRecord>> {
        if count == 0 {
            debug!(query, %kind, "Not recording empty search");
            return Ok(None);
        }

        let record = self.db.insert_search(query, kind, count as i64).await?;
        Ok(Some(record))
    }

    /// Newest first
    pub async fn recent(&self, limit: usize) -> Result<Vec<SearchRecord>> {
        self.db.recent_searches(limit).await
    }
}
