//! Directions providers: road distance and travel time between two points.

mod kakao;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::models::{Coordinate, RouteSummary};

pub use kakao::KakaoDirections;

/// Route search preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    #[default]
    Recommend,
    Time,
    Distance,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Recommend => "RECOMMEND",
            Priority::Time => "TIME",
            Priority::Distance => "DISTANCE",
        }
    }
}

#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    /// Driving route from `origin` to `destination`. Attempted once.
    async fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<RouteSummary, RouteError>;
}

#[async_trait]
impl<T: DirectionsProvider + ?Sized> DirectionsProvider for Arc<T> {
    async fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<RouteSummary, RouteError> {
        (**self).route(origin, destination).await
    }
}
