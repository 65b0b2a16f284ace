//! SafeParking - nearby parking lots and no-parking zones
//!
//! This library provides the proximity search pipeline shared by the
//! `server` and `nearby` binaries: dataset fetchers, haversine ranking,
//! route annotation and a caller-owned dataset cache.

pub mod annotate;
pub mod cache;
pub mod config;
pub mod directions;
pub mod error;
pub mod fetcher;
pub mod format;
pub mod models;
pub mod proximity;
pub mod search;
pub mod sequence;

pub use error::{FetchError, QueryError, RouteError};
pub use models::{Coordinate, EntityKind, LocatedEntity, RankedEntity, RouteInfo, SearchQuery};
