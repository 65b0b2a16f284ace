//! Route annotation for a shortlist of ranked entities.

use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::directions::DirectionsProvider;
use crate::error::RouteError;
use crate::models::{Coordinate, RankedEntity, RouteInfo};

/// Fans out one directions request per entity and joins them all.
///
/// A failed or timed-out lookup marks only that entity as
/// [`RouteInfo::Unavailable`]; the batch always completes and keeps the
/// input order. Each lookup is attempted exactly once.
pub struct RouteAnnotator<P> {
    provider: P,
    timeout: Option<Duration>,
}

impl<P: DirectionsProvider> RouteAnnotator<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            timeout: None,
        }
    }

    /// Bound each individual lookup
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub async fn annotate(&self, origin: Coordinate, entities: Vec<RankedEntity>) -> Vec<RankedEntity> {
        let lookups = entities.iter().map(|ranked| async move {
            let Some(destination) = ranked.entity.coordinate() else {
                return RouteInfo::Unavailable {
                    reason: "invalid destination coordinate".to_string(),
                };
            };
            match self.lookup(origin, destination).await {
                Ok(summary) => RouteInfo::Available(summary),
                Err(e) => {
                    warn!("Route lookup for '{}' failed: {}", ranked.entity.id, e);
                    RouteInfo::Unavailable { reason: e.to_string() }
                }
            }
        });
        let routes = join_all(lookups).await;

        let available = routes.iter().filter(|r| r.is_available()).count();
        debug!("Annotated {} entities, {} with routes", routes.len(), available);

        entities
            .into_iter()
            .zip(routes)
            .map(|(mut ranked, route)| {
                ranked.route = Some(route);
                ranked
            })
            .collect()
    }

    async fn lookup(&self, origin: Coordinate, destination: Coordinate) -> Result<crate::models::RouteSummary, RouteError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.provider.route(origin, destination))
                .await
                .map_err(|_| RouteError::Timeout(limit))?,
            None => self.provider.route(origin, destination).await,
        }
    }
}
