//! Search pipelines composed from fetchers, the ranker and the annotator.

mod by_name;
mod nearby;
mod recommend;

pub use by_name::{search_by_name, NameSearchOptions};
pub use nearby::{NearbySearch, SearchOutcome};
pub use recommend::{recommend, Recommendation, RecommendOptions, RecommendOutcome};
