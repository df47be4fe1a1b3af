//! Default values for configuration

/// Default upstream API base URL (trailing slash so entity paths join under it)
pub fn default_api_base_url() -> String {
    std::env::var("CITADEL_API_URL")
        .unwrap_or_else(|_| "https://rickandmortyapi.com/api/".to_string())
}

/// Default request timeout in seconds
pub fn default_api_timeout() -> u64 {
    10
}

/// Default user agent
pub fn default_api_user_agent() -> String {
    format!("citadel/{} (Catalog Mirror)", env!("CARGO_PKG_VERSION"))
}

/// Default TTL for cached list responses (5 minutes)
pub fn default_list_ttl() -> u64 {
    300
}

/// Default TTL for cached single-item responses (10 minutes)
pub fn default_item_ttl() -> u64 {
    600
}

/// Default maximum pages per kind in a sync sweep
pub fn default_sync_page_limit() -> u32 {
    5
}

/// Default delay between sweep pages in milliseconds
pub fn default_sync_page_delay() -> u64 {
    500
}

/// Default number of characters reconciled from a browsed list page
pub fn default_list_sync_limit() -> usize {
    5
}

/// Landing-page counts used when neither upstream nor the store can answer
pub const DEFAULT_CHARACTER_COUNT: u64 = 826;
pub const DEFAULT_EPISODE_COUNT: u64 = 51;
pub const DEFAULT_LOCATION_COUNT: u64 = 126;
