use serde::{Deserialize, Serialize};

use crate::models::RankedEntity;

/// Weights for combining straight-line distance with driving time.
///
/// `score = distance * distance_km + duration * duration_hours`; lower is
/// better. Both terms are in comparable magnitude for city-scale searches
/// (1 km ≈ 1 hour).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankWeights {
    pub distance: f64,
    pub duration: f64,
}

impl Default for RerankWeights {
    fn default() -> Self {
        Self {
            distance: 0.5,
            duration: 0.5,
        }
    }
}

/// Combined score for an entity with an available route, `None` otherwise
pub fn weighted_score(entity: &RankedEntity, weights: RerankWeights) -> Option<f64> {
    let summary = entity.route.as_ref()?.summary()?;
    Some(weights.distance * entity.distance_km + weights.duration * summary.duration_minutes() / 60.0)
}

/// Drop entities without an available route and order the rest by
/// [`weighted_score`], ascending. Equal scores keep their input order.
pub fn rerank_by_route(entities: Vec<RankedEntity>, weights: RerankWeights) -> Vec<RankedEntity> {
    let mut scored: Vec<(f64, RankedEntity)> = entities
        .into_iter()
        .filter_map(|entity| weighted_score(&entity, weights).map(|score| (score, entity)))
        .collect();

    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.into_iter().map(|(_, entity)| entity).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityKind, LocatedEntity, RouteInfo, RouteSummary};

    fn ranked(id: &str, distance_km: f64, route: Option<RouteInfo>) -> RankedEntity {
        let mut r = RankedEntity::new(
            LocatedEntity::new(id, id, EntityKind::Parking, 37.5, 127.0),
            distance_km,
        );
        r.route = route;
        r
    }

    fn available(minutes: f64) -> Option<RouteInfo> {
        Some(RouteInfo::Available(RouteSummary::new(1000.0, minutes * 60.0)))
    }

    #[test]
    fn test_default_weights_formula() {
        let entity = ranked("a", 0.4, available(30.0));
        let score = weighted_score(&entity, RerankWeights::default()).unwrap();
        // 0.5 * 0.4 + 0.5 * (30 / 60)
        assert!((score - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_rerank_prefers_short_drive() {
        let entities = vec![
            ranked("near_slow", 0.1, available(40.0)),
            ranked("far_fast", 0.4, available(5.0)),
            ranked("unavailable", 0.05, Some(RouteInfo::Unavailable { reason: "timeout".into() })),
            ranked("unannotated", 0.02, None),
        ];

        let reranked = rerank_by_route(entities, RerankWeights::default());
        let ids: Vec<&str> = reranked.iter().map(|r| r.entity.id.as_str()).collect();

        assert_eq!(ids, vec!["far_fast", "near_slow"]);
    }

    #[test]
    fn test_distance_only_weights() {
        let weights = RerankWeights {
            distance: 1.0,
            duration: 0.0,
        };
        let entities = vec![ranked("b", 0.3, available(1.0)), ranked("a", 0.2, available(50.0))];

        let reranked = rerank_by_route(entities, weights);
        assert_eq!(reranked[0].entity.id, "a");
    }
}
