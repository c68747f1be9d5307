//! Hybrid playlist recommendation on top of primitive music-catalog calls.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod recommend;

pub use cache::RecommendationCaches;
pub use catalog::{CatalogClient, CatalogError, SpotifyCatalog, Track};
pub use config::Config;
pub use recommend::{
    GenerationRequest, PreferenceRecord, Recommendation, RecommendError, RecommendationPipeline,
};
