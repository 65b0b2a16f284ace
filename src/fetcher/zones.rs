//! No-parking enforcement zones (전국주정차금지(지정)구역표준데이터, data.go.kr).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::{check_status, dedup_by_id, field_str, hours_range, http_client, DatasetFetcher};
use crate::config::ApiConfig;
use crate::error::FetchError;
use crate::models::entity::{meta, parse_coord_value};
use crate::models::{EntityKind, FilterTokens, LocatedEntity};

const SOURCE: &str = "no_parking_zones";
const RESULT_OK: &str = "00";

#[derive(Debug, Deserialize)]
struct Envelope {
    response: ZoneResponse,
}

#[derive(Debug, Deserialize)]
struct ZoneResponse {
    header: ZoneHeader,
    #[serde(default)]
    body: Option<ZoneBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZoneHeader {
    result_code: String,
    #[serde(default)]
    result_msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZoneBody {
    #[serde(default)]
    items: Vec<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, deserialize_with = "lenient_usize")]
    total_count: Option<usize>,
}

/// data.go.kr reports counts as numbers or numeric strings
fn lenient_usize<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().map(|n| n as usize),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Fetches enforcement zones by province / district.
pub struct NoParkingZoneFetcher {
    client: Client,
    base_url: Url,
    api_key: String,
    per_page: usize,
    max_pages: usize,
}

impl NoParkingZoneFetcher {
    pub fn new(client: Client, base_url: Url, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
            per_page: 1000,
            max_pages: 20,
        }
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, FetchError> {
        let api_key = config
            .zones_api_key
            .clone()
            .ok_or(FetchError::MissingApiKey(SOURCE))?;
        let mut fetcher = Self::new(
            http_client(config.timeout())?,
            Url::parse(&config.zones_url)?,
            api_key,
        );
        fetcher.per_page = config.zones_per_page.max(1);
        fetcher.max_pages = config.zones_max_pages.max(1);
        Ok(fetcher)
    }

    fn page_url(&self, page: usize, filter: &FilterTokens) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("serviceKey", &self.api_key)
                .append_pair("pageNo", &page.to_string())
                .append_pair("numOfRows", &self.per_page.to_string())
                .append_pair("type", "json");
            if let Some(region) = &filter.region {
                pairs.append_pair("ctprvnNm", region);
            }
            if let Some(sub_region) = &filter.sub_region {
                pairs.append_pair("signguNm", sub_region);
            }
        }
        url
    }
}

#[async_trait]
impl DatasetFetcher for NoParkingZoneFetcher {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self, filter: &FilterTokens) -> Result<Vec<LocatedEntity>, FetchError> {
        let mut zones = Vec::new();

        for page in 1..=self.max_pages {
            let response = self
                .client
                .get(self.page_url(page, filter))
                .header("Accept", "application/json")
                .send()
                .await?;
            let text = check_status(SOURCE, response).await?.text().await?;
            let (items, total) = parse_zone_page(&text)?;
            let received = items.len();

            zones.extend(items);
            debug!("Zone page {}: {} rows", page, received);

            if received < self.per_page || total.is_some_and(|t| page * self.per_page >= t) {
                break;
            }
        }

        dedup_by_id(&mut zones);
        info!("Fetched {} no-parking zones (filter: {:?})", zones.len(), filter);
        Ok(zones)
    }
}

/// Decode one page, turning a non-"00" result code into an API error
fn parse_zone_page(text: &str) -> Result<(Vec<LocatedEntity>, Option<usize>), FetchError> {
    let envelope: Envelope = serde_json::from_str(text)?;
    let header = envelope.response.header;
    if header.result_code != RESULT_OK {
        return Err(FetchError::Api {
            code: header.result_code,
            message: header.result_msg,
        });
    }

    let Some(body) = envelope.response.body else {
        return Ok((Vec::new(), Some(0)));
    };
    let items = body.items.iter().filter_map(map_zone_row).collect();
    Ok((items, body.total_count))
}

fn map_zone_row(row: &serde_json::Map<String, serde_json::Value>) -> Option<LocatedEntity> {
    let name = field_str(row, "prhibtAreaNm")?;
    let province = field_str(row, "ctprvnNm").unwrap_or_default();
    let district = field_str(row, "signguNm").unwrap_or_default();
    let id = format!("{}_{}_{}", province, district, name);
    let lat = row.get("latitude").map(parse_coord_value).unwrap_or(f64::NAN);
    let lng = row.get("longitude").map(parse_coord_value).unwrap_or(f64::NAN);

    let mut zone = LocatedEntity::new(id, name, EntityKind::NoParkingZone, lat, lng);
    zone.set_meta(
        meta::ADDRESS,
        field_str(row, "rdnmadr").or_else(|| field_str(row, "lnmadr")),
    );
    zone.set_meta(meta::CATEGORY, field_str(row, "prhibtSeNm"));
    zone.set_meta(meta::RESTRICTED_DAYS, field_str(row, "prhibtDayNm"));
    zone.set_meta(
        meta::RESTRICTED_HOURS,
        hours_range(field_str(row, "operBeginHhmm"), field_str(row, "operEndHhmm"), "~"),
    );
    zone.set_meta(meta::REASON, field_str(row, "prhibtRsnCn"));
    zone.set_meta(meta::AUTHORITY, field_str(row, "institutionNm"));
    zone.set_meta(meta::PHONE, field_str(row, "phoneNumber"));
    zone.set_meta(meta::REGION, Some(format!("{} {}", province, district)));
    Some(zone)
}
