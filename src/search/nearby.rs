use serde::Serialize;
use tracing::{error, info};

use crate::annotate::RouteAnnotator;
use crate::directions::DirectionsProvider;
use crate::error::FetchError;
use crate::fetcher::DatasetFetcher;
use crate::models::{Coordinate, RankedEntity, SearchQuery};
use crate::proximity::rank_nearby;

/// Result of a successful search.
///
/// `NoResults` means the dataset was fetched and nothing qualified. It is
/// distinct from a fetch failure, which is returned as an error.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "results", rename_all = "snake_case")]
pub enum SearchOutcome {
    Found(Vec<RankedEntity>),
    NoResults,
}

impl SearchOutcome {
    fn from_ranked(ranked: Vec<RankedEntity>) -> Self {
        if ranked.is_empty() {
            SearchOutcome::NoResults
        } else {
            SearchOutcome::Found(ranked)
        }
    }

    pub fn results(&self) -> &[RankedEntity] {
        match self {
            SearchOutcome::Found(results) => results,
            SearchOutcome::NoResults => &[],
        }
    }

    pub fn into_results(self) -> Vec<RankedEntity> {
        match self {
            SearchOutcome::Found(results) => results,
            SearchOutcome::NoResults => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, SearchOutcome::NoResults)
    }
}

/// Fetch → rank pipeline over one dataset
pub struct NearbySearch<F> {
    fetcher: F,
}

impl<F: DatasetFetcher> NearbySearch<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetch the dataset for `query.filter` and rank it around
    /// `query.center`. A fetch failure is returned as-is; no partial or
    /// empty result is produced in that case.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchOutcome, FetchError> {
        let entities = self.fetcher.fetch_shared(&query.filter).await.map_err(|e| {
            error!("Fetching {} failed: {}", self.fetcher.name(), e);
            e
        })?;
        let fetched = entities.len();

        let ranked = rank_nearby(query, entities.iter());
        info!(
            "{}: {} of {} entities within {} km of {}",
            self.fetcher.name(),
            ranked.len(),
            fetched,
            query.radius_km,
            query.center
        );
        Ok(SearchOutcome::from_ranked(ranked))
    }

    /// Like [`NearbySearch::search`], then annotate the first `shortlist`
    /// results with routes from `origin`. Remaining results follow in rank
    /// order without a route.
    pub async fn search_with_routes<P: DirectionsProvider>(
        &self,
        query: &SearchQuery,
        origin: Coordinate,
        annotator: &RouteAnnotator<P>,
        shortlist: usize,
    ) -> Result<SearchOutcome, FetchError> {
        let mut ranked = self.search(query).await?.into_results();
        let rest = ranked.split_off(shortlist.min(ranked.len()));

        let mut annotated = annotator.annotate(origin, ranked).await;
        annotated.extend(rest);
        Ok(SearchOutcome::from_ranked(annotated))
    }
}
