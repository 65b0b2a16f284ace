use serde::{Deserialize, Serialize};
use tracing::info;

use super::NearbySearch;
use crate::annotate::RouteAnnotator;
use crate::directions::DirectionsProvider;
use crate::error::FetchError;
use crate::fetcher::DatasetFetcher;
use crate::models::{Coordinate, RankedEntity, SearchQuery};
use crate::proximity::{rerank_by_route, RerankWeights};

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RecommendOptions {
    /// How many of the nearest lots get a route lookup
    pub shortlist: usize,
    /// How many recommendations to return
    pub keep: usize,
    pub weights: RerankWeights,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            shortlist: 5,
            keep: 3,
            weights: RerankWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    /// Lots found within the radius of the destination
    pub total_found: usize,
    /// Reachable lots, best weighted score first
    pub recommendations: Vec<RankedEntity>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecommendOutcome {
    Recommended(Recommendation),
    NothingNearby,
}

/// Recommend lots near a destination, weighing walking distance from the
/// lot against driving time from the current location.
///
/// `query.center` is the destination. Lots whose route lookup failed are
/// left out of the recommendations but still counted in `total_found`.
pub async fn recommend<F, P>(
    search: &NearbySearch<F>,
    annotator: &RouteAnnotator<P>,
    current: Coordinate,
    query: &SearchQuery,
    options: RecommendOptions,
) -> Result<RecommendOutcome, FetchError>
where
    F: DatasetFetcher,
    P: DirectionsProvider,
{
    let mut nearby = search.search(query).await?.into_results();
    if nearby.is_empty() {
        return Ok(RecommendOutcome::NothingNearby);
    }
    let total_found = nearby.len();

    nearby.truncate(options.shortlist);
    let annotated = annotator.annotate(current, nearby).await;

    let mut recommendations = rerank_by_route(annotated, options.weights);
    recommendations.truncate(options.keep);

    info!(
        "Recommending {} of {} lots near {}",
        recommendations.len(),
        total_found,
        query.center
    );
    Ok(RecommendOutcome::Recommended(Recommendation {
        total_found,
        recommendations,
    }))
}
