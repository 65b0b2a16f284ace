//! Core data models for the proximity search pipeline.

pub mod entity;
pub mod query;
pub mod ranked;

pub use entity::{Coordinate, EntityKind, LocatedEntity};
pub use query::{FilterTokens, SearchQuery, DEFAULT_CAP};
pub use ranked::{RankedEntity, RouteFare, RouteInfo, RouteSummary};
