//! Public parking-lot dataset (한국교통안전공단 전국공영주차장정보, odcloud).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::{check_status, dedup_by_id, field_str, hours_range, http_client, DatasetFetcher};
use crate::config::ApiConfig;
use crate::error::FetchError;
use crate::models::entity::{meta, parse_coord_value};
use crate::models::{EntityKind, FilterTokens, LocatedEntity};

const SOURCE: &str = "parking";
const REGION_COND: &str = "cond[지역구분::EQ]";
const SUB_REGION_COND: &str = "cond[지역구분_sub::EQ]";

/// One page of the odcloud response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParkingPage {
    #[serde(default)]
    total_count: Option<usize>,
    #[serde(default)]
    match_count: Option<usize>,
    #[serde(default)]
    data: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// Fetches public parking lots, following pagination.
pub struct ParkingLotFetcher {
    client: Client,
    base_url: Url,
    api_key: String,
    per_page: usize,
    max_pages: usize,
}

impl ParkingLotFetcher {
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
            .parking_api_key
            .clone()
            .ok_or(FetchError::MissingApiKey(SOURCE))?;
        let mut fetcher = Self::new(
            http_client(config.timeout())?,
            Url::parse(&config.parking_url)?,
            api_key,
        );
        fetcher.per_page = config.parking_per_page.max(1);
        fetcher.max_pages = config.parking_max_pages.max(1);
        Ok(fetcher)
    }

    fn page_url(&self, page: usize, filter: &FilterTokens) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("page", &page.to_string())
                .append_pair("perPage", &self.per_page.to_string())
                .append_pair("serviceKey", &self.api_key);
            if let Some(region) = &filter.region {
                pairs.append_pair(REGION_COND, region);
            }
            if let Some(sub_region) = &filter.sub_region {
                pairs.append_pair(SUB_REGION_COND, sub_region);
            }
        }
        url
    }

    async fn fetch_page(&self, page: usize, filter: &FilterTokens) -> Result<ParkingPage, FetchError> {
        let response = self.client.get(self.page_url(page, filter)).send().await?;
        let response = check_status(SOURCE, response).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl DatasetFetcher for ParkingLotFetcher {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self, filter: &FilterTokens) -> Result<Vec<LocatedEntity>, FetchError> {
        let mut lots = Vec::new();

        for page in 1..=self.max_pages {
            let body = self.fetch_page(page, filter).await?;
            let expected = body.match_count.or(body.total_count);
            let received = body.data.len();

            lots.extend(body.data.iter().filter_map(map_parking_row));
            debug!("Parking page {}: {} rows ({} total so far)", page, received, lots.len());

            let exhausted = received == 0
                || received < self.per_page
                || expected.is_some_and(|total| page * self.per_page >= total);
            if exhausted {
                break;
            }
            if page == self.max_pages {
                warn!(
                    "Stopped parking pagination at {} pages; dataset reports {:?} rows",
                    self.max_pages, expected
                );
            }
        }

        dedup_by_id(&mut lots);
        info!("Fetched {} parking lots (filter: {:?})", lots.len(), filter);
        Ok(lots)
    }
}

/// Map one odcloud row. Rows without a management number are skipped.
fn map_parking_row(row: &serde_json::Map<String, serde_json::Value>) -> Option<LocatedEntity> {
    let id = field_str(row, "주차장관리번호")?;
    let name = field_str(row, "주차장명").unwrap_or_else(|| id.clone());
    let lat = row.get("위도").map(parse_coord_value).unwrap_or(f64::NAN);
    let lng = row.get("경도").map(parse_coord_value).unwrap_or(f64::NAN);

    let mut lot = LocatedEntity::new(id, name, EntityKind::Parking, lat, lng);
    lot.set_meta(
        meta::ADDRESS,
        field_str(row, "주차장도로명주소").or_else(|| field_str(row, "주차장지번주소")),
    );
    lot.set_meta(
        meta::CAPACITY,
        field_str(row, "주차구획수").and_then(|c| c.parse::<u32>().ok()).map(|c| c.to_string()),
    );
    lot.set_meta(meta::FEE, field_str(row, "요금정보"));
    lot.set_meta(meta::CATEGORY, field_str(row, "주차장구분"));
    lot.set_meta(meta::PHONE, field_str(row, "연락처"));
    lot.set_meta(meta::REGION, field_str(row, "지역구분"));
    lot.set_meta(
        meta::WEEKDAY_HOURS,
        hours_range(field_str(row, "평일운영시작시각"), field_str(row, "평일운영종료시각"), " ~ "),
    );
    lot.set_meta(
        meta::SATURDAY_HOURS,
        hours_range(field_str(row, "토요일운영시작시각"), field_str(row, "토요일운영종료시각"), " ~ "),
    );
    lot.set_meta(
        meta::HOLIDAY_HOURS,
        hours_range(field_str(row, "공휴일운영시작시각"), field_str(row, "공휴일운영종료시각"), " ~ "),
    );
    Some(lot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_parking_row() {
        let row = json!({
            "주차장관리번호": "123-2-000001",
            "주차장명": "역삼1동 공영주차장",
            "주차장도로명주소": "",
            "주차장지번주소": "서울특별시 강남구 역삼동 123",
            "위도": "37.4979",
            "경도": 127.0276,
            "주차구획수": "42",
            "요금정보": "유료",
            "평일운영시작시각": "09:00",
            "평일운영종료시각": "18:00",
            "연락처": "02-123-4567"
        });

        let lot = map_parking_row(row.as_object().unwrap()).unwrap();

        assert_eq!(lot.id, "123-2-000001");
        assert_eq!(lot.kind, EntityKind::Parking);
        assert_eq!(lot.lat, 37.4979);
        assert_eq!(lot.lng, 127.0276);
        assert_eq!(lot.meta(meta::ADDRESS), Some("서울특별시 강남구 역삼동 123"));
        assert_eq!(lot.meta(meta::CAPACITY), Some("42"));
        assert_eq!(lot.meta(meta::WEEKDAY_HOURS), Some("09:00 ~ 18:00"));
        assert!(lot.meta(meta::SATURDAY_HOURS).is_none());
    }

    #[test]
    fn test_bad_coordinates_are_kept_raw() {
        let row = json!({"주차장관리번호": "1", "주차장명": "x", "위도": "", "경도": "abc"});
        let lot = map_parking_row(row.as_object().unwrap()).unwrap();
        assert!(lot.lat.is_nan());
        assert!(lot.lng.is_nan());
        assert!(lot.coordinate().is_none());
    }

    #[test]
    fn test_row_without_id_skipped() {
        let row = json!({"주차장명": "x", "위도": "37.0", "경도": "127.0"});
        assert!(map_parking_row(row.as_object().unwrap()).is_none());
    }

    #[test]
    fn test_page_url_encodes_filter() {
        let fetcher = ParkingLotFetcher::new(
            Client::new(),
            Url::parse("https://api.example.test/parking").unwrap(),
            "KEY".to_string(),
        );
        let url = fetcher.page_url(2, &FilterTokens::region("서울특별시").with_sub_region("강남구"));

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("page".into(), "2".into())));
        assert!(pairs.contains(&("perPage".into(), "1000".into())));
        assert!(pairs.contains(&("serviceKey".into(), "KEY".into())));
        assert!(pairs.contains(&(REGION_COND.into(), "서울특별시".into())));
        assert!(pairs.contains(&(SUB_REGION_COND.into(), "강남구".into())));
    }

    #[test]
    fn test_page_envelope() {
        let page: ParkingPage = serde_json::from_value(json!({
            "page": 1, "perPage": 10, "totalCount": 3, "currentCount": 1, "matchCount": 1,
            "data": [{"주차장관리번호": "a"}]
        }))
        .unwrap();
        assert_eq!(page.match_count, Some(1));
        assert_eq!(page.data.len(), 1);
    }

    #[test]
    fn test_missing_key_is_error() {
        let config = ApiConfig::default();
        assert!(matches!(
            ParkingLotFetcher::from_config(&config),
            Err(FetchError::MissingApiKey("parking"))
        ));
    }
}
