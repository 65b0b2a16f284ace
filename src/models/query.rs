//! Search query parameters.

use serde::{Deserialize, Serialize};

use super::Coordinate;
use crate::error::QueryError;

/// Result cap used when the caller does not supply one
pub const DEFAULT_CAP: usize = 20;

/// Dataset-level filter tokens, passed through to the fetcher untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterTokens {
    /// Top-level region, e.g. "서울특별시"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Sub-region, e.g. "강남구"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_region: Option<String>,

    /// Free-text keyword for providers that search by text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
}

impl FilterTokens {
    pub fn region(region: impl Into<String>) -> Self {
        Self {
            region: Some(region.into()),
            ..Default::default()
        }
    }

    pub fn with_sub_region(mut self, sub_region: impl Into<String>) -> Self {
        self.sub_region = Some(sub_region.into());
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }
}

/// Center, radius and cap for one nearby search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub center: Coordinate,
    pub radius_km: f64,
    pub cap: usize,
    #[serde(default)]
    pub filter: FilterTokens,
}

impl SearchQuery {
    /// Build a query with the default cap. Radius must be positive and finite.
    pub fn new(center: Coordinate, radius_km: f64) -> Result<Self, QueryError> {
        if !(radius_km.is_finite() && radius_km > 0.0) {
            return Err(QueryError::InvalidRadius(radius_km));
        }
        Ok(Self {
            center,
            radius_km,
            cap: DEFAULT_CAP,
            filter: FilterTokens::default(),
        })
    }

    pub fn with_cap(mut self, cap: usize) -> Result<Self, QueryError> {
        if cap == 0 {
            return Err(QueryError::InvalidCap);
        }
        self.cap = cap;
        Ok(self)
    }

    pub fn with_filter(mut self, filter: FilterTokens) -> Self {
        self.filter = filter;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seoul() -> Coordinate {
        Coordinate::new(37.5665, 126.9780).unwrap()
    }

    #[test]
    fn test_defaults() {
        let query = SearchQuery::new(seoul(), 1.0).unwrap();
        assert_eq!(query.cap, DEFAULT_CAP);
        assert_eq!(query.filter, FilterTokens::default());
    }

    #[test]
    fn test_rejects_bad_radius_and_cap() {
        assert!(SearchQuery::new(seoul(), 0.0).is_err());
        assert!(SearchQuery::new(seoul(), -1.0).is_err());
        assert!(SearchQuery::new(seoul(), f64::NAN).is_err());
        assert!(SearchQuery::new(seoul(), 1.0).unwrap().with_cap(0).is_err());
    }
}
