//! Dataset fetchers: remote and local sources of located entities.
//!
//! Fetchers map provider-specific schemas into [`LocatedEntity`] and
//! deduplicate by id. They do not validate coordinates; the ranker drops
//! malformed positions.

mod file;
mod parking;
mod places;
mod zones;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::FetchError;
use crate::models::{FilterTokens, LocatedEntity};

pub use file::FileDatasetFetcher;
pub use parking::ParkingLotFetcher;
pub use places::KakaoPlaceSearch;
pub use zones::NoParkingZoneFetcher;

const USER_AGENT: &str = "SafeParking/0.1 (proximity search)";

/// A source of located entities.
#[async_trait]
pub trait DatasetFetcher: Send + Sync {
    /// Short name used in logs and error messages
    fn name(&self) -> &'static str;

    /// Retrieve the full dataset matching `filter`.
    ///
    /// Any network, HTTP or decoding problem is an error; implementations
    /// must never hide a failure behind an empty list.
    async fn fetch(&self, filter: &FilterTokens) -> Result<Vec<LocatedEntity>, FetchError>;

    /// Like [`DatasetFetcher::fetch`], for callers that only read the result.
    /// Caching fetchers hand out their snapshot without copying it.
    async fn fetch_shared(&self, filter: &FilterTokens) -> Result<Arc<Vec<LocatedEntity>>, FetchError> {
        Ok(Arc::new(self.fetch(filter).await?))
    }
}

#[async_trait]
impl<T: DatasetFetcher + ?Sized> DatasetFetcher for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn fetch(&self, filter: &FilterTokens) -> Result<Vec<LocatedEntity>, FetchError> {
        (**self).fetch(filter).await
    }

    async fn fetch_shared(&self, filter: &FilterTokens) -> Result<Arc<Vec<LocatedEntity>>, FetchError> {
        (**self).fetch_shared(filter).await
    }
}

/// Build the shared HTTP client used by the remote fetchers
pub(crate) fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Read a JSON object field as a trimmed, non-empty string
pub(crate) fn field_str(row: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
    row.get(key)
        .and_then(crate::models::entity::value_to_string)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Format an operating-hours range, using "?" for missing ends
pub(crate) fn hours_range(start: Option<String>, end: Option<String>, separator: &str) -> Option<String> {
    if start.is_none() && end.is_none() {
        return None;
    }
    Some(format!(
        "{}{}{}",
        start.as_deref().unwrap_or("?"),
        separator,
        end.as_deref().unwrap_or("?")
    ))
}

/// Keep the first occurrence of each id, preserving order
pub(crate) fn dedup_by_id(entities: &mut Vec<LocatedEntity>) {
    let mut seen = std::collections::HashSet::new();
    entities.retain(|e| seen.insert(e.id.clone()));
}

/// Turn a non-success response into a [`FetchError::Status`]
pub(crate) async fn check_status(
    source_name: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(FetchError::Status {
        source_name,
        status: status.as_u16(),
        body,
    })
}
