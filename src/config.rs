//! TOML configuration for API endpoints, credentials and search defaults.
//!
//! API keys can be left out of the file and supplied through environment
//! variables instead (see [`Config::apply_env`]).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const PARKING_API_KEY_ENV: &str = "SAFEPARKING_PARKING_API_KEY";
pub const ZONES_API_KEY_ENV: &str = "SAFEPARKING_ZONES_API_KEY";
pub const KAKAO_REST_API_KEY_ENV: &str = "SAFEPARKING_KAKAO_REST_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    /// Public parking-lot dataset (odcloud)
    pub parking_url: String,
    pub parking_api_key: Option<String>,
    pub parking_per_page: usize,
    pub parking_max_pages: usize,

    /// No-parking enforcement zones (data.go.kr)
    pub zones_url: String,
    pub zones_api_key: Option<String>,
    pub zones_per_page: usize,
    pub zones_max_pages: usize,

    /// Kakao REST key, shared by local search and directions
    pub kakao_rest_api_key: Option<String>,
    pub kakao_local_url: String,
    pub kakao_directions_url: String,

    /// HTTP timeout for dataset requests
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            parking_url: "https://api.odcloud.kr/api/15050093/v1/uddi:d19c8e21-4445-43fe-b2a6-865dff832e08"
                .to_string(),
            parking_api_key: None,
            parking_per_page: 1000,
            parking_max_pages: 20,
            zones_url: "http://api.data.go.kr/openapi/tn_pubr_public_prkstop_prhibt_area_api".to_string(),
            zones_api_key: None,
            zones_per_page: 1000,
            zones_max_pages: 20,
            kakao_rest_api_key: None,
            kakao_local_url: "https://dapi.kakao.com/v2/local/search/keyword.json".to_string(),
            kakao_directions_url: "https://apis-navi.kakaomobility.com/v1/directions".to_string(),
            timeout_secs: 15,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    /// Region token passed to the parking-lot fetcher when none is given
    pub default_region: Option<String>,
    pub default_radius_km: f64,
    pub default_cap: usize,
    /// Number of top results that get a route lookup
    pub shortlist: usize,
    /// Dataset cache lifetime; 0 disables expiry
    pub cache_ttl_secs: u64,
    /// Distinct filters cached per dataset before the oldest is evicted
    pub cache_max_filters: usize,
    pub route_timeout_secs: u64,
    pub name_search_limit: usize,
    pub name_search_min_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_region: Some("서울특별시".to_string()),
            default_radius_km: 1.0,
            default_cap: crate::models::DEFAULT_CAP,
            shortlist: 5,
            cache_ttl_secs: 600,
            cache_max_filters: crate::cache::DEFAULT_MAX_FILTERS,
            route_timeout_secs: 10,
            name_search_limit: 15,
            name_search_min_chars: 2,
        }
    }
}

impl SearchConfig {
    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_ttl_secs > 0).then(|| Duration::from_secs(self.cache_ttl_secs))
    }

    pub fn route_timeout(&self) -> Duration {
        Duration::from_secs(self.route_timeout_secs)
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise start from defaults; then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)
                .with_context(|| format!("Loading config from {}", path.display()))?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override API keys from the environment. Takes a lookup function so
    /// tests do not need to mutate process state.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(PARKING_API_KEY_ENV) {
            self.api.parking_api_key = Some(key);
        }
        if let Some(key) = non_empty(ZONES_API_KEY_ENV) {
            self.api.zones_api_key = Some(key);
        }
        if let Some(key) = non_empty(KAKAO_REST_API_KEY_ENV) {
            self.api.kakao_rest_api_key = Some(key);
        }
    }
}
