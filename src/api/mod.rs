//! Remote client for the upstream catalog API
//!
//! This module provides:
//! - Read-only list and detail requests per entity kind
//! - A fixed request timeout and http/https-only targets
//! - Memoization of successful responses through a [`ResponseCache`]
//!
//! There are no retries: one failed attempt is reported as a failure.

mod cache;
pub mod payload;

pub use cache::*;

use crate::config::{ApiConfig, CacheConfig, Config};
use crate::error::{Error, Result};
use crate::models::EntityKind;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Why a single upstream request failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL scheme for {0}")]
    InvalidScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("invalid JSON from {url}: {reason}")]
    NotJson { url: String, reason: String },

    #[error("non-object JSON body from {0}")]
    NotObject(String),
}

impl FetchError {
    /// The body arrived but was unusable
    pub fn is_malformed(&self) -> bool {
        matches!(self, FetchError::NotJson { .. } | FetchError::NotObject(_))
    }
}

impl From<FetchError> for Error {
    fn from(err: FetchError) -> Self {
        if err.is_malformed() {
            Error::MalformedResponse(err.to_string())
        } else {
            Error::NetworkFailure(err.to_string())
        }
    }
}

/// Result of one upstream call; `Ok` always holds a JSON object
pub type FetchResult = std::result::Result<Value, FetchError>;

/// Page number plus upstream filters for a list request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub filters: BTreeMap<String, String>,
}

impl ListQuery {
    pub fn page(page: u32) -> Self {
        Self {
            page: page.max(1),
            filters: BTreeMap::new(),
        }
    }

    /// Add a filter; blank values are ignored
    pub fn with_filter(mut self, key: &str, value: &str) -> Self {
        let value = value.trim();
        if !value.is_empty() {
            self.filters.insert(key.to_string(), value.to_string());
        }
        self
    }

    fn cache_key(&self, kind: EntityKind) -> String {
        let filters = self
            .filters
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}s_p{}_{}", kind, self.page.max(1), filters)
    }

    fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("page".to_string(), self.page.max(1).to_string())];
        params.extend(self.filters.iter().map(|(k, v)| (k.clone(), v.clone())));
        params
    }
}

/// Parse the base URL, ending its path with `/` so entity paths join beneath it
fn base_dir_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// HTTP client for the upstream API
pub struct ApiClient {
    client: Client,
    base_url: Url,
    cache: Arc<dyn ResponseCache>,
    list_ttl: Duration,
    item_ttl: Duration,
}

impl ApiClient {
    pub fn new(api: &ApiConfig, ttl: &CacheConfig, cache: Arc<dyn ResponseCache>) -> Result<Self> {
        let base_url = base_dir_url(&api.base_url)?;
        let client = Client::builder()
            .user_agent(&api.user_agent)
            .timeout(Duration::from_secs(api.timeout_secs))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            base_url,
            cache,
            list_ttl: ttl.list_ttl(),
            item_ttl: ttl.item_ttl(),
        })
    }

    /// Client with an in-process cache
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api, &config.cache, Arc::new(MemoryCache::new()))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, FetchError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| FetchError::InvalidUrl(format!("{}{}: {}", self.base_url, path, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidScheme(url.to_string()));
        }
        Ok(url)
    }

    /// Fetch one page of a kind's list endpoint
    pub async fn fetch_list(&self, kind: EntityKind, query: &ListQuery) -> FetchResult {
        let key = query.cache_key(kind);
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let url = self.endpoint(kind.path())?;
        let result = self.get_json(url, &query.params()).await;
        if let Ok(value) = &result {
            self.cache.set(&key, value.clone(), self.list_ttl).await;
        }
        result
    }

    /// Fetch a single record by upstream id
    pub async fn fetch_item(&self, kind: EntityKind, id: i64) -> FetchResult {
        let key = format!("{}_{}", kind, id);
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let url = self.endpoint(&format!("{}/{}", kind.path(), id))?;
        let result = self.get_json(url, &[]).await;
        if let Ok(value) = &result {
            self.cache.set(&key, value.clone(), self.item_ttl).await;
        }
        result
    }

    /// First list page, used for aggregate counts
    pub async fn probe(&self, kind: EntityKind) -> FetchResult {
        self.fetch_list(kind, &ListQuery::page(1)).await
    }

    async fn get_json(&self, url: Url, params: &[(String, String)]) -> FetchResult {
        debug!("Fetching: {}", url);

        let response = self
            .client
            .get(url.clone())
            .query(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!(%url, "API request timed out");
                    FetchError::Timeout(url.to_string())
                } else {
                    warn!(%url, error = %e, "API connection error");
                    FetchError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "API HTTP error");
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.contains("application/json") {
            warn!(%url, %content_type, "Unexpected content-type");
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else {
                FetchError::Connection(e.to_string())
            }
        })?;

        let value: Value = serde_json::from_slice(&body).map_err(|e| {
            warn!(%url, error = %e, "Invalid JSON response");
            FetchError::NotJson {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;

        if !value.is_object() {
            warn!(%url, "API returned non-object data");
            return Err(FetchError::NotObject(url.to_string()));
        }

        Ok(value)
    }
}
