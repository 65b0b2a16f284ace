//! Ranked search results and their optional route annotation.

use serde::{Deserialize, Serialize};

use super::{Coordinate, LocatedEntity};

/// Fare estimate for a driving route, in won
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteFare {
    pub taxi: u64,
    pub toll: u64,
}

/// Road distance and travel time returned by a directions provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub distance_meters: f64,
    pub duration_seconds: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fare: Option<RouteFare>,

    /// Polyline from origin to destination; empty unless the provider was
    /// asked for it
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<Coordinate>,
}

impl RouteSummary {
    pub fn new(distance_meters: f64, duration_seconds: f64) -> Self {
        Self {
            distance_meters,
            duration_seconds,
            ..Default::default()
        }
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_seconds / 60.0
    }
}

/// Route annotation attached to a ranked entity.
///
/// `Unavailable` is an explicit marker: the lookup was attempted and failed.
/// An entity that was never annotated carries no `RouteInfo` at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RouteInfo {
    Available(RouteSummary),
    Unavailable { reason: String },
}

impl RouteInfo {
    pub fn summary(&self) -> Option<&RouteSummary> {
        match self {
            RouteInfo::Available(summary) => Some(summary),
            RouteInfo::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, RouteInfo::Available(_))
    }
}

/// A located entity plus the fields derived during a search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedEntity {
    #[serde(flatten)]
    pub entity: LocatedEntity,

    /// Great-circle distance from the query center
    pub distance_km: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteInfo>,
}

impl RankedEntity {
    pub fn new(entity: LocatedEntity, distance_km: f64) -> Self {
        Self {
            entity,
            distance_km,
            route: None,
        }
    }

    pub fn distance_meters(&self) -> f64 {
        self.distance_km * 1000.0
    }
}
