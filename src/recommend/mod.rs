//! # Recommendation Module
//!
//! Rebuilds recommendation-quality playlists from primitive catalog calls:
//! artist lookup, per-artist top tracks, free-text search and batched genre
//! lookup.
//!
//! ## Stages
//!
//! 1. **Signals**: genre normalization, year extraction and artist resolution.
//!    Mentions in the free text skip only the genre words that resolved
//! 2. **Candidates**: top tracks of resolved artists, then structured searches
//! 3. **Enrichment**: genre tags for every artist in the pool
//! 4. **Scoring**: genre affinity, year proximity, keywords and popularity
//! 5. **Selection**: per-artist diversity cap with a relaxed fallback pass
//!
//! Any single failing sub-call is logged and skipped. Only an empty final pool
//! is reported to the caller.

pub mod artists;
pub mod bounded;
pub mod candidates;
pub mod enrich;
pub mod error;
pub mod family;
pub mod genre;
pub mod pipeline;
pub mod preferences;
pub mod scoring;
pub mod select;
pub mod years;

pub use error::{AttemptContext, RecommendError};
pub use genre::{GenreNormalizer, NormalizedGenres};
pub use pipeline::{RecommendSettings, RecommendationPipeline, Stage};
pub use preferences::{GenerationRequest, PreferenceRecord, Recommendation, YearRange};
pub use scoring::ScoringWeights;
pub use select::SelectionPolicy;
pub use years::extract_year_range;
