//! Command-line nearby search: rank a dataset around a point and print JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use safeparking::annotate::RouteAnnotator;
use safeparking::config::Config;
use safeparking::directions::{KakaoDirections, Priority};
use safeparking::fetcher::{DatasetFetcher, FileDatasetFetcher, NoParkingZoneFetcher, ParkingLotFetcher};
use safeparking::format::{format_distance, format_duration};
use safeparking::models::FilterTokens;
use safeparking::search::NearbySearch;
use safeparking::{Coordinate, EntityKind, SearchQuery};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Dataset {
    Parking,
    Zones,
}

#[derive(Parser, Debug)]
#[command(name = "nearby")]
#[command(about = "Find parking lots or no-parking zones near a point")]
struct Args {
    /// Latitude of the search center
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    /// Longitude of the search center
    #[arg(long, allow_hyphen_values = true)]
    lng: f64,

    /// Search radius in kilometres (defaults to the configured radius)
    #[arg(short, long)]
    radius_km: Option<f64>,

    /// Maximum number of results
    #[arg(long)]
    cap: Option<usize>,

    /// Dataset to search
    #[arg(short, long, value_enum, default_value = "parking")]
    dataset: Dataset,

    /// Region filter passed to the dataset source
    #[arg(long)]
    region: Option<String>,

    /// Sub-region (district) filter
    #[arg(long)]
    sub_region: Option<String>,

    /// Annotate the N nearest results with driving routes
    #[arg(long, default_value = "0")]
    routes: usize,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Read the dataset from a local JSON/CSV file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Print a human-readable table instead of JSON
    #[arg(long)]
    table: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    let kind = match args.dataset {
        Dataset::Parking => EntityKind::Parking,
        Dataset::Zones => EntityKind::NoParkingZone,
    };
    let fetcher: Arc<dyn DatasetFetcher> = match (&args.file, args.dataset) {
        (Some(path), _) => Arc::new(FileDatasetFetcher::new(path, kind)),
        (None, Dataset::Parking) => Arc::new(ParkingLotFetcher::from_config(&config.api)?),
        (None, Dataset::Zones) => Arc::new(NoParkingZoneFetcher::from_config(&config.api)?),
    };

    let center = Coordinate::new(args.lat, args.lng)?;
    let filter = FilterTokens {
        region: args.region.clone().or_else(|| config.search.default_region.clone()),
        sub_region: args.sub_region.clone(),
        keyword: None,
    };
    let query = SearchQuery::new(center, args.radius_km.unwrap_or(config.search.default_radius_km))?
        .with_cap(args.cap.unwrap_or(config.search.default_cap))?
        .with_filter(filter);

    info!("Searching {} within {} km of {}", fetcher.name(), query.radius_km, center);
    let search = NearbySearch::new(fetcher);

    let outcome = if args.routes > 0 {
        let directions = KakaoDirections::from_config(&config.api)
            .context("Route annotation needs a Kakao REST API key")?
            .with_priority(Priority::Recommend);
        let annotator = RouteAnnotator::new(directions).with_timeout(config.search.route_timeout());
        search.search_with_routes(&query, center, &annotator, args.routes).await?
    } else {
        search.search(&query).await?
    };

    if !args.table {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    if outcome.is_empty() {
        println!("Nothing within {} km", query.radius_km);
        return Ok(());
    }
    for (i, ranked) in outcome.results().iter().enumerate() {
        let route = ranked
            .route
            .as_ref()
            .map(|r| match r.summary() {
                Some(s) => format!(
                    "  drive {} / {}",
                    format_distance(s.distance_meters),
                    format_duration(s.duration_seconds)
                ),
                None => "  route unavailable".to_string(),
            })
            .unwrap_or_default();
        println!(
            "{:>3}. {:<40} {:>8}{}",
            i + 1,
            ranked.entity.name,
            format_distance(ranked.distance_meters()),
            route
        );
    }

    Ok(())
}
