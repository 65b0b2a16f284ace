//! Request handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use safeparking::annotate::RouteAnnotator;
use safeparking::directions::{KakaoDirections, Priority};
use safeparking::format::{format_distance, format_duration};
use safeparking::models::{FilterTokens, RouteSummary};
use safeparking::search::{self, NameSearchOptions, RecommendOptions, RecommendOutcome, SearchOutcome};
use safeparking::{Coordinate, FetchError, LocatedEntity, QueryError, RankedEntity, RouteError, SearchQuery};

use crate::{AppState, Dataset};

/// Parking hits shown ahead of place hits in the combined search
const COMBINED_PARKING_HITS: usize = 5;

type HandlerError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
    retryable: bool,
}

fn error_response(status: StatusCode, error: String, retryable: bool) -> HandlerError {
    (status, Json(ErrorResponse { error, retryable }))
}

fn bad_request(e: QueryError) -> HandlerError {
    error_response(StatusCode::BAD_REQUEST, e.to_string(), false)
}

fn upstream(context: &str, e: FetchError) -> HandlerError {
    error!("{} failed: {}", context, e);
    error_response(StatusCode::BAD_GATEWAY, e.to_string(), e.is_retryable())
}

fn route_failed(e: RouteError) -> HandlerError {
    match e {
        RouteError::NoRoute { .. } => error_response(StatusCode::NOT_FOUND, e.to_string(), false),
        RouteError::TooManyWaypoints { .. } => error_response(StatusCode::BAD_REQUEST, e.to_string(), false),
        e => {
            error!("Directions failed: {}", e);
            error_response(StatusCode::BAD_GATEWAY, e.to_string(), e.is_retryable())
        }
    }
}

fn not_configured(what: &str) -> HandlerError {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        format!("{} is not configured", what),
        false,
    )
}

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        parking: state.parking.is_some(),
        zones: state.zones.is_some(),
        places: state.places.is_some(),
        directions: state.directions.is_some(),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    parking: bool,
    zones: bool,
    places: bool,
    directions: bool,
}

/// Route lookups for a request: the configured client with the request's
/// priority and path preference
fn annotator(
    state: &AppState,
    directions: &KakaoDirections,
    priority: Option<Priority>,
    path: Option<bool>,
) -> RouteAnnotator<KakaoDirections> {
    let provider = directions
        .clone()
        .with_priority(priority.unwrap_or_default())
        .with_path(path.unwrap_or(false));
    RouteAnnotator::new(provider).with_timeout(state.search.route_timeout())
}

#[derive(Debug, Default, Deserialize)]
pub struct NearbyParams {
    lat: f64,
    lng: f64,
    radius_km: Option<f64>,
    cap: Option<usize>,
    region: Option<String>,
    sub_region: Option<String>,
    /// Annotate this many of the nearest results with routes
    routes: Option<usize>,
    /// Route origin; defaults to the search center
    origin_lat: Option<f64>,
    origin_lng: Option<f64>,
    priority: Option<Priority>,
    /// Include route polylines
    path: Option<bool>,
    /// Caller's own request counter, echoed back
    seq: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct NearbyResponse {
    /// Server ticket, per dataset
    sequence: u64,
    /// A newer search on the same dataset started before this one finished
    superseded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    seq: Option<u64>,
    /// "found" or "no_results"
    status: &'static str,
    features: Vec<Feature>,
}

/// A ranked entity with display strings
#[derive(Debug, Serialize)]
pub struct Feature {
    #[serde(flatten)]
    ranked: RankedEntity,
    distance_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_text: Option<String>,
}

impl From<RankedEntity> for Feature {
    fn from(ranked: RankedEntity) -> Self {
        let duration_text = ranked
            .route
            .as_ref()
            .and_then(|r| r.summary())
            .map(|s| format_duration(s.duration_seconds));
        Self {
            distance_text: format_distance(ranked.distance_meters()),
            duration_text,
            ranked,
        }
    }
}

impl NearbyParams {
    fn query(&self, state: &AppState) -> Result<SearchQuery, QueryError> {
        let center = Coordinate::new(self.lat, self.lng)?;
        let radius = self.radius_km.unwrap_or(state.search.default_radius_km);
        let cap = self.cap.unwrap_or(state.search.default_cap);
        let filter = FilterTokens {
            region: self.region.clone().or_else(|| state.search.default_region.clone()),
            sub_region: self.sub_region.clone(),
            keyword: None,
        };
        Ok(SearchQuery::new(center, radius)?.with_cap(cap)?.with_filter(filter))
    }

    fn origin(&self, query: &SearchQuery) -> Result<Coordinate, QueryError> {
        match (self.origin_lat, self.origin_lng) {
            (Some(lat), Some(lng)) => Coordinate::new(lat, lng),
            _ => Ok(query.center),
        }
    }
}

async fn run_nearby(
    state: &AppState,
    dataset: &Dataset,
    params: &NearbyParams,
    context: &str,
) -> Result<NearbyResponse, HandlerError> {
    let query = params.query(state).map_err(bad_request)?;
    let ticket = dataset.sequence.next();

    let outcome = match (params.routes.filter(|n| *n > 0), &state.directions) {
        (Some(shortlist), Some(directions)) => {
            let origin = params.origin(&query).map_err(bad_request)?;
            let annotator = annotator(state, directions, params.priority, params.path);
            dataset
                .search
                .search_with_routes(&query, origin, &annotator, shortlist)
                .await
        }
        (Some(_), None) => return Err(not_configured("Directions")),
        (None, _) => dataset.search.search(&query).await,
    }
    .map_err(|e| upstream(context, e))?;

    let superseded = !dataset.sequence.is_latest(ticket);
    if superseded {
        debug!("{} {} finished after a newer search started", context, ticket);
    }

    let status = match outcome {
        SearchOutcome::Found(_) => "found",
        SearchOutcome::NoResults => "no_results",
    };
    Ok(NearbyResponse {
        sequence: ticket,
        superseded,
        seq: params.seq,
        status,
        features: outcome.into_results().into_iter().map(Feature::from).collect(),
    })
}

/// Parking lots near a point, optionally with routes for the nearest few
pub async fn parking_nearby(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<NearbyResponse>, HandlerError> {
    let parking = state.parking.as_ref().ok_or_else(|| not_configured("Parking dataset"))?;
    Ok(Json(run_nearby(&state, parking, &params, "Parking search").await?))
}

/// No-parking enforcement zones near a point
pub async fn zones_nearby(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<NearbyResponse>, HandlerError> {
    let zones = state.zones.as_ref().ok_or_else(|| not_configured("No-parking zone dataset"))?;
    Ok(Json(run_nearby(&state, zones, &params, "Zone search").await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct TextSearchParams {
    q: String,
    region: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
}

impl TextSearchParams {
    fn near(&self) -> Result<Option<Coordinate>, QueryError> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Coordinate::new(lat, lng).map(Some),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TextSearchResponse {
    results: Vec<LocatedEntity>,
    /// When the parking dataset behind these results was fetched
    #[serde(skip_serializing_if = "Option::is_none")]
    fetched_at: Option<DateTime<Utc>>,
}

async fn parking_name_hits(
    state: &AppState,
    params: &TextSearchParams,
    limit: usize,
) -> Result<(Vec<LocatedEntity>, Option<DateTime<Utc>>), HandlerError> {
    let Some(parking) = state.parking.as_ref() else {
        return Ok((Vec::new(), None));
    };
    let filter = FilterTokens {
        region: params.region.clone().or_else(|| state.search.default_region.clone()),
        ..Default::default()
    };
    let snapshot = parking
        .search
        .fetcher()
        .get(&filter)
        .await
        .map_err(|e| upstream("Parking name search", e))?;
    let options = NameSearchOptions {
        limit,
        min_chars: state.search.name_search_min_chars,
    };
    let hits = search::search_by_name(snapshot.entities.iter(), &params.q, options);
    Ok((hits, Some(snapshot.fetched_at)))
}

/// Parking lots whose name or address contains `q`
pub async fn parking_by_name(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TextSearchParams>,
) -> Result<Json<TextSearchResponse>, HandlerError> {
    if state.parking.is_none() {
        return Err(not_configured("Parking dataset"));
    }
    let (results, fetched_at) = parking_name_hits(&state, &params, state.search.name_search_limit).await?;
    Ok(Json(TextSearchResponse { results, fetched_at }))
}

/// Kakao keyword search, biased toward `lat`/`lng` when given
pub async fn places_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TextSearchParams>,
) -> Result<Json<TextSearchResponse>, HandlerError> {
    let places = state.places.as_ref().ok_or_else(|| not_configured("Place search"))?;
    let near = params.near().map_err(bad_request)?;
    let results = places
        .search(&params.q, near)
        .await
        .map_err(|e| upstream("Place search", e))?;
    Ok(Json(TextSearchResponse {
        results,
        fetched_at: None,
    }))
}

/// Parking hits first, at most [`COMBINED_PARKING_HITS`] of them, then places
fn combine_hits(parking: Vec<LocatedEntity>, places: Vec<LocatedEntity>) -> Vec<LocatedEntity> {
    parking
        .into_iter()
        .take(COMBINED_PARKING_HITS)
        .chain(places)
        .collect()
}

/// Matching parking lots followed by place hits
pub async fn combined_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TextSearchParams>,
) -> Result<Json<TextSearchResponse>, HandlerError> {
    let near = params.near().map_err(bad_request)?;
    let places = async {
        match state.places.as_ref() {
            Some(places) => places
                .search(&params.q, near)
                .await
                .map_err(|e| upstream("Place search", e)),
            None => Ok(Vec::new()),
        }
    };
    let (parking, places) = tokio::join!(
        parking_name_hits(&state, &params, COMBINED_PARKING_HITS),
        places
    );

    let (parking, fetched_at) = parking?;
    Ok(Json(TextSearchResponse {
        results: combine_hits(parking, places?),
        fetched_at,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RecommendParams {
    /// Current location
    lat: f64,
    lng: f64,
    /// Destination
    dest_lat: f64,
    dest_lng: f64,
    radius_km: Option<f64>,
    region: Option<String>,
    priority: Option<Priority>,
    path: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    /// "recommended" or "nothing_nearby"
    status: &'static str,
    total_found: usize,
    recommendations: Vec<Feature>,
}

/// Lots near a destination, re-ranked by walking distance and drive time
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecommendParams>,
) -> Result<Json<RecommendResponse>, HandlerError> {
    let parking = state.parking.as_ref().ok_or_else(|| not_configured("Parking dataset"))?;
    let directions = state.directions.as_ref().ok_or_else(|| not_configured("Directions"))?;

    let current = Coordinate::new(params.lat, params.lng).map_err(bad_request)?;
    let destination = Coordinate::new(params.dest_lat, params.dest_lng).map_err(bad_request)?;
    // Parking near a destination is a walking-distance question
    let radius = params.radius_km.unwrap_or(0.5);
    let filter = FilterTokens {
        region: params.region.clone().or_else(|| state.search.default_region.clone()),
        ..Default::default()
    };
    let query = SearchQuery::new(destination, radius)
        .map_err(bad_request)?
        .with_filter(filter);

    let annotator = annotator(&state, directions, params.priority, params.path);
    let options = RecommendOptions {
        shortlist: state.search.shortlist,
        ..Default::default()
    };

    let outcome = search::recommend(&parking.search, &annotator, current, &query, options)
        .await
        .map_err(|e| upstream("Recommendation", e))?;

    Ok(Json(match outcome {
        RecommendOutcome::Recommended(rec) => RecommendResponse {
            status: "recommended",
            total_found: rec.total_found,
            recommendations: rec.recommendations.into_iter().map(Feature::from).collect(),
        },
        RecommendOutcome::NothingNearby => RecommendResponse {
            status: "nothing_nearby",
            total_found: 0,
            recommendations: Vec::new(),
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct DirectionsParams {
    origin_lat: f64,
    origin_lng: f64,
    dest_lat: f64,
    dest_lng: f64,
    /// Stopovers as `lat,lng|lat,lng`
    waypoints: Option<String>,
    priority: Option<Priority>,
    /// Include the polyline (default true)
    path: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct DirectionsResponse {
    #[serde(flatten)]
    summary: RouteSummary,
    distance_text: String,
    duration_text: String,
}

/// Parse `lat,lng|lat,lng`; blank input means no waypoints
fn parse_waypoints(raw: &str) -> Result<Vec<Coordinate>, QueryError> {
    raw.split('|')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let invalid = || QueryError::InvalidWaypoint(part.to_string());
            let (lat, lng) = part.split_once(',').ok_or_else(invalid)?;
            let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
            let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
            Coordinate::new(lat, lng)
        })
        .collect()
}

/// Route preview between two points, optionally through waypoints
pub async fn directions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DirectionsParams>,
) -> Result<Json<DirectionsResponse>, HandlerError> {
    let directions = state.directions.as_ref().ok_or_else(|| not_configured("Directions"))?;

    let origin = Coordinate::new(params.origin_lat, params.origin_lng).map_err(bad_request)?;
    let destination = Coordinate::new(params.dest_lat, params.dest_lng).map_err(bad_request)?;
    let waypoints = parse_waypoints(params.waypoints.as_deref().unwrap_or("")).map_err(bad_request)?;

    let provider = directions
        .clone()
        .with_priority(params.priority.unwrap_or_default())
        .with_path(params.path.unwrap_or(true));
    let summary = tokio::time::timeout(
        state.search.route_timeout(),
        provider.route_via(origin, &waypoints, destination),
    )
    .await
    .map_err(|_| route_failed(RouteError::Timeout(state.search.route_timeout())))?
    .map_err(route_failed)?;

    Ok(Json(DirectionsResponse {
        distance_text: format_distance(summary.distance_meters),
        duration_text: format_duration(summary.duration_seconds),
        summary,
    }))
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    invalidated: bool,
}

/// Drop cached datasets so the next search refetches
pub async fn invalidate_cache(State(state): State<Arc<AppState>>) -> Json<InvalidateResponse> {
    for dataset in [state.parking.as_ref(), state.zones.as_ref()].into_iter().flatten() {
        dataset.search.fetcher().invalidate().await;
    }
    Json(InvalidateResponse { invalidated: true })
}
