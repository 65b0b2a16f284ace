//! Error types for fetchers, directions lookups and query construction.

use thiserror::Error;

/// A dataset could not be retrieved. Always surfaced to the caller; a
/// search never turns this into an empty result list.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Underlying request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status} from {source_name}: {body}")]
    Status {
        source_name: &'static str,
        status: u16,
        body: String,
    },

    #[error("API Error (Code {code}): {message}")]
    Api { code: String, message: String },

    #[error("Failed to parse JSON response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to read dataset file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse CSV dataset: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Missing API key for {0}")]
    MissingApiKey(&'static str),
}

impl FetchError {
    /// Whether retrying the same request later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Request(_) => true,
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            FetchError::Api { .. } => true,
            _ => false,
        }
    }
}

/// A single route lookup failed. The annotator contains this per entity.
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Underlying request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("No route found (code {code}): {message}")]
    NoRoute { code: i64, message: String },

    #[error("Failed to parse JSON response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Route lookup timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("At most {max} waypoints are allowed, got {got}")]
    TooManyWaypoints { max: usize, got: usize },
}

impl RouteError {
    /// Whether retrying the same lookup later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            RouteError::Request(_) | RouteError::Timeout(_) => true,
            RouteError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Invalid caller-supplied query parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Coordinate out of range: lat={lat}, lng={lng}")]
    InvalidCoordinate { lat: f64, lng: f64 },

    #[error("Radius must be a positive number of kilometers, got {0}")]
    InvalidRadius(f64),

    #[error("Result cap must be at least 1")]
    InvalidCap,

    #[error("Malformed waypoint '{0}', expected 'lat,lng'")]
    InvalidWaypoint(String),
}
