//! Kakao Local keyword search.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{check_status, dedup_by_id, http_client, DatasetFetcher};
use crate::config::ApiConfig;
use crate::error::FetchError;
use crate::models::entity::meta;
use crate::models::{Coordinate, EntityKind, FilterTokens, LocatedEntity};

const SOURCE: &str = "kakao_local";
const PAGE_SIZE: usize = 15;

#[derive(Debug, Deserialize)]
struct KeywordResponse {
    #[serde(default)]
    documents: Vec<PlaceDocument>,
}

#[derive(Debug, Deserialize)]
struct PlaceDocument {
    id: String,
    place_name: String,
    #[serde(default)]
    address_name: String,
    #[serde(default)]
    road_address_name: String,
    /// Longitude, as a string
    x: String,
    /// Latitude, as a string
    y: String,
    #[serde(default)]
    category_group_name: String,
    #[serde(default)]
    phone: String,
    /// Meters from the request center, only present when x/y were sent
    #[serde(default)]
    distance: String,
}

impl PlaceDocument {
    fn into_entity(self) -> LocatedEntity {
        let lat = self.y.trim().parse().unwrap_or(f64::NAN);
        let lng = self.x.trim().parse().unwrap_or(f64::NAN);
        let address = if self.road_address_name.trim().is_empty() {
            self.address_name
        } else {
            self.road_address_name
        };

        let mut place = LocatedEntity::new(self.id, self.place_name, EntityKind::Place, lat, lng);
        place.set_meta(meta::ADDRESS, Some(address));
        place.set_meta(meta::CATEGORY, Some(self.category_group_name));
        place.set_meta(meta::PHONE, Some(self.phone));
        place.set_meta(meta::PROVIDER_DISTANCE_M, Some(self.distance));
        place
    }
}

/// Keyword place search, optionally biased toward a location.
pub struct KakaoPlaceSearch {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl KakaoPlaceSearch {
    pub fn new(client: Client, base_url: Url, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, FetchError> {
        let api_key = config
            .kakao_rest_api_key
            .clone()
            .ok_or(FetchError::MissingApiKey(SOURCE))?;
        Ok(Self::new(
            http_client(config.timeout())?,
            Url::parse(&config.kakao_local_url)?,
            api_key,
        ))
    }

    fn search_url(&self, keyword: &str, near: Option<Coordinate>) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("query", keyword)
                .append_pair("size", &PAGE_SIZE.to_string());
            if let Some(center) = near {
                pairs
                    .append_pair("y", &center.lat.to_string())
                    .append_pair("x", &center.lng.to_string())
                    .append_pair("sort", "distance");
            }
        }
        url
    }

    /// Search places by keyword. With `near`, results come back sorted by
    /// distance from that point.
    pub async fn search(&self, keyword: &str, near: Option<Coordinate>) -> Result<Vec<LocatedEntity>, FetchError> {
        let response = self
            .client
            .get(self.search_url(keyword, near))
            .header("Authorization", format!("KakaoAK {}", self.api_key))
            .send()
            .await?;
        let text = check_status(SOURCE, response).await?.text().await?;
        let mut places = parse_keyword_response(&text)?;
        dedup_by_id(&mut places);
        debug!("Kakao keyword '{}' returned {} places", keyword, places.len());
        Ok(places)
    }
}

#[async_trait]
impl DatasetFetcher for KakaoPlaceSearch {
    fn name(&self) -> &'static str {
        SOURCE
    }

    /// Uses `filter.keyword`; without a keyword there is nothing to search.
    async fn fetch(&self, filter: &FilterTokens) -> Result<Vec<LocatedEntity>, FetchError> {
        match filter.keyword.as_deref().map(str::trim) {
            Some(keyword) if !keyword.is_empty() => self.search(keyword, None).await,
            _ => Ok(Vec::new()),
        }
    }
}

fn parse_keyword_response(text: &str) -> Result<Vec<LocatedEntity>, FetchError> {
    let response: KeywordResponse = serde_json::from_str(text)?;
    Ok(response.documents.into_iter().map(PlaceDocument::into_entity).collect())
}
