//! HTTP server for nearby parking, enforcement zones and place search.
//!
//! Datasets are fetched through caller-owned caches; a fetch failure is
//! reported as `502` so clients can show a retryable error, while an empty
//! result within the radius is a normal `200` with `no_results`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use safeparking::cache::DatasetCache;
use safeparking::config::{Config, SearchConfig};
use safeparking::directions::KakaoDirections;
use safeparking::fetcher::{
    DatasetFetcher, FileDatasetFetcher, KakaoPlaceSearch, NoParkingZoneFetcher, ParkingLotFetcher,
};
use safeparking::search::NearbySearch;
use safeparking::sequence::SearchSequence;
use safeparking::EntityKind;

mod handlers;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "SafeParking proximity search server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    listen: String,

    /// TOML config file (API endpoints, keys, search defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serve parking lots from a local JSON/CSV file instead of the public API
    #[arg(long)]
    parking_file: Option<PathBuf>,

    /// Serve no-parking zones from a local JSON/CSV file instead of the public API
    #[arg(long)]
    zones_file: Option<PathBuf>,
}

pub type CachedSearch = NearbySearch<DatasetCache<Arc<dyn DatasetFetcher>>>;

/// A cached dataset and the tickets of nearby searches against it.
/// Parking and zone searches for the same map view run side by side, so
/// each dataset keeps its own sequence.
pub struct Dataset {
    pub search: CachedSearch,
    pub sequence: SearchSequence,
}

impl Dataset {
    pub fn new(fetcher: Arc<dyn DatasetFetcher>, config: &SearchConfig) -> Self {
        let cache = DatasetCache::new(fetcher, config.cache_ttl()).with_max_filters(config.cache_max_filters);
        Self {
            search: NearbySearch::new(cache),
            sequence: SearchSequence::new(),
        }
    }
}

/// Application state shared across handlers
pub struct AppState {
    pub parking: Option<Dataset>,
    pub zones: Option<Dataset>,
    pub places: Option<KakaoPlaceSearch>,
    pub directions: Option<KakaoDirections>,
    pub search: SearchConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("SafeParking Server");
    let config = Config::load(args.config.as_deref())?;

    let parking_source: Option<Arc<dyn DatasetFetcher>> = match &args.parking_file {
        Some(path) => Some(Arc::new(FileDatasetFetcher::new(path, EntityKind::Parking))),
        None => optional(ParkingLotFetcher::from_config(&config.api), "parking lots")?
            .map(|f| Arc::new(f) as Arc<dyn DatasetFetcher>),
    };
    let zones_source: Option<Arc<dyn DatasetFetcher>> = match &args.zones_file {
        Some(path) => Some(Arc::new(FileDatasetFetcher::new(path, EntityKind::NoParkingZone))),
        None => optional(NoParkingZoneFetcher::from_config(&config.api), "no-parking zones")?
            .map(|f| Arc::new(f) as Arc<dyn DatasetFetcher>),
    };

    let state = Arc::new(AppState {
        parking: parking_source.map(|f| Dataset::new(f, &config.search)),
        zones: zones_source.map(|f| Dataset::new(f, &config.search)),
        places: optional(KakaoPlaceSearch::from_config(&config.api), "place search")?,
        directions: optional(KakaoDirections::from_config(&config.api), "directions")?,
        search: config.search.clone(),
    });

    // Build router
    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/parking/nearby", get(handlers::parking_nearby))
        .route("/v1/parking/search", get(handlers::parking_by_name))
        .route("/v1/zones/nearby", get(handlers::zones_nearby))
        .route("/v1/places/search", get(handlers::places_search))
        .route("/v1/search", get(handlers::combined_search))
        .route("/v1/recommend", get(handlers::recommend))
        .route("/v1/directions", get(handlers::directions))
        .route("/v1/cache/invalidate", post(handlers::invalidate_cache))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Starting server on {}", args.listen);

    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// A missing API key disables the feature; any other setup error is fatal
fn optional<T>(built: Result<T, safeparking::FetchError>, what: &str) -> Result<Option<T>> {
    match built {
        Ok(value) => Ok(Some(value)),
        Err(safeparking::FetchError::MissingApiKey(key)) => {
            warn!("No API key for {}; {} disabled", key, what);
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to set up {}", what)),
    }
}
