//! Distance math, radius filtering and ranking.
//!
//! Everything in here is synchronous and side-effect free; I/O lives in
//! [`crate::fetcher`] and [`crate::directions`].

mod distance;
mod ranker;
mod rerank;

pub use distance::{distance_km, EARTH_RADIUS_KM};
pub use ranker::rank_nearby;
pub use rerank::{rerank_by_route, weighted_score, RerankWeights};
