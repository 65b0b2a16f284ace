//! Local dataset files (JSON or CSV) for offline use and fixtures.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::{dedup_by_id, field_str, DatasetFetcher};
use crate::error::FetchError;
use crate::models::entity::parse_coord_value;
use crate::models::{EntityKind, FilterTokens, LocatedEntity};

const ID_KEYS: &[&str] = &["id"];
const NAME_KEYS: &[&str] = &["name"];
const LAT_KEYS: &[&str] = &["lat", "latitude"];
const LNG_KEYS: &[&str] = &["lng", "lon", "longitude"];
const REGION_KEY: &str = "region";
const SUB_REGION_KEY: &str = "sub_region";

/// Reads located entities from a file on every fetch.
///
/// Records need `id`, `name`, `lat`/`latitude` and `lng`/`lon`/`longitude`;
/// every other column lands in the metadata map. Region filter tokens are
/// matched against `region` / `sub_region` columns when present.
pub struct FileDatasetFetcher {
    path: PathBuf,
    kind: EntityKind,
}

impl FileDatasetFetcher {
    pub fn new(path: impl Into<PathBuf>, kind: EntityKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_csv(&self) -> bool {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
    }
}

#[async_trait]
impl DatasetFetcher for FileDatasetFetcher {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch(&self, filter: &FilterTokens) -> Result<Vec<LocatedEntity>, FetchError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let rows = if self.is_csv() {
            csv_rows(&content)?
        } else {
            serde_json::from_str::<Vec<serde_json::Map<String, serde_json::Value>>>(&content)?
        };

        let mut entities: Vec<LocatedEntity> = rows
            .iter()
            .filter(|row| matches_filter(row, filter))
            .filter_map(|row| record_to_entity(row, self.kind))
            .collect();
        dedup_by_id(&mut entities);

        info!("Loaded {} entities from {}", entities.len(), self.path.display());
        Ok(entities)
    }
}

fn csv_rows(content: &str) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, FetchError> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: serde_json::Map<String, serde_json::Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(key, value)| (key.trim().to_string(), serde_json::Value::String(value.to_string())))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn first_of(row: &serde_json::Map<String, serde_json::Value>, keys: &[&str]) -> Option<(String, serde_json::Value)> {
    keys.iter()
        .find_map(|key| row.get(*key).map(|v| (key.to_string(), v.clone())))
}

fn matches_filter(row: &serde_json::Map<String, serde_json::Value>, filter: &FilterTokens) -> bool {
    let matches = |key: &str, wanted: &Option<String>| match (wanted, field_str(row, key)) {
        (Some(wanted), Some(actual)) => &actual == wanted,
        _ => true,
    };
    matches(REGION_KEY, &filter.region) && matches(SUB_REGION_KEY, &filter.sub_region)
}

fn record_to_entity(row: &serde_json::Map<String, serde_json::Value>, kind: EntityKind) -> Option<LocatedEntity> {
    let id = first_of(row, ID_KEYS).and_then(|(k, _)| field_str(row, &k))?;
    let name = first_of(row, NAME_KEYS)
        .and_then(|(k, _)| field_str(row, &k))
        .unwrap_or_else(|| id.clone());
    let (lat_key, lat) = first_of(row, LAT_KEYS)
        .map(|(k, v)| (Some(k), parse_coord_value(&v)))
        .unwrap_or((None, f64::NAN));
    let (lng_key, lng) = first_of(row, LNG_KEYS)
        .map(|(k, v)| (Some(k), parse_coord_value(&v)))
        .unwrap_or((None, f64::NAN));

    let mut entity = LocatedEntity::new(id, name, kind, lat, lng);
    for key in row.keys() {
        let consumed = ID_KEYS.contains(&key.as_str())
            || NAME_KEYS.contains(&key.as_str())
            || lat_key.as_deref() == Some(key.as_str())
            || lng_key.as_deref() == Some(key.as_str());
        if !consumed {
            entity.set_meta(key, field_str(row, key));
        }
    }
    Some(entity)
}
