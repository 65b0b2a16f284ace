//! Located entities as delivered by dataset fetchers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::QueryError;

/// Well-known metadata keys shared by the fetchers.
pub mod meta {
    pub const ADDRESS: &str = "address";
    pub const CAPACITY: &str = "capacity";
    pub const FEE: &str = "fee";
    pub const WEEKDAY_HOURS: &str = "weekday_hours";
    pub const SATURDAY_HOURS: &str = "saturday_hours";
    pub const HOLIDAY_HOURS: &str = "holiday_hours";
    pub const PHONE: &str = "phone";
    pub const CATEGORY: &str = "category";
    pub const REGION: &str = "region";
    pub const RESTRICTED_DAYS: &str = "restricted_days";
    pub const RESTRICTED_HOURS: &str = "restricted_hours";
    pub const REASON: &str = "reason";
    pub const AUTHORITY: &str = "authority";
    pub const PROVIDER_DISTANCE_M: &str = "provider_distance_m";
}

/// WGS-84 coordinate in decimal degrees.
///
/// A `Coordinate` obtained through [`Coordinate::new`] always satisfies
/// latitude ∈ [-90, 90] and longitude ∈ [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Build a validated coordinate.
    pub fn new(lat: f64, lng: f64) -> Result<Self, QueryError> {
        if Self::is_valid(lat, lng) {
            Ok(Self { lat, lng })
        } else {
            Err(QueryError::InvalidCoordinate { lat, lng })
        }
    }

    /// Finite and within the WGS-84 ranges.
    pub fn is_valid(lat: f64, lng: f64) -> bool {
        lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.lat, self.lng)
    }
}

/// Which dataset an entity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Public parking lot
    Parking,
    /// No-parking enforcement zone
    NoParkingZone,
    /// Generic place search hit
    Place,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Parking => write!(f, "parking"),
            EntityKind::NoParkingZone => write!(f, "no_parking_zone"),
            EntityKind::Place => write!(f, "place"),
        }
    }
}

/// A point of interest with a position and free-form metadata.
///
/// Latitude and longitude are kept exactly as the provider delivered them
/// (possibly NaN or out of range). Validation happens in the ranker, which
/// drops malformed entries instead of failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatedEntity {
    /// Provider-scoped unique identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Source dataset
    pub kind: EntityKind,

    /// Latitude in decimal degrees (unvalidated)
    pub lat: f64,

    /// Longitude in decimal degrees (unvalidated)
    pub lng: f64,

    /// Address, capacity, fee text, operating hours, phone, category...
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl LocatedEntity {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: EntityKind, lat: f64, lng: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            lat,
            lng,
            metadata: HashMap::new(),
        }
    }

    /// Insert a metadata value, skipping absent or blank values
    pub fn set_meta(&mut self, key: &str, value: Option<String>) {
        if let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            self.metadata.insert(key.to_string(), value);
        }
    }

    /// Builder-style variant of [`LocatedEntity::set_meta`]
    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_meta(key, Some(value.into()));
        self
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// The validated coordinate, or `None` for malformed positions
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::new(self.lat, self.lng).ok()
    }
}

/// Lenient numeric parsing for provider fields that arrive either as
/// strings ("37.4979") or numbers. Anything unparseable becomes NaN so the
/// ranker drops it.
pub(crate) fn parse_coord_value(value: &serde_json::Value) -> f64 {
    match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Render a provider field as a string, whatever its JSON type
pub(crate) fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
