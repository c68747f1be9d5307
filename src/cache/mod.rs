//! # Cache Module
//!
//! Process-wide caches shared by the catalog client and the recommendation
//! pipeline.
//!
//! Every cache is a [`TtlCache`]: entries carry an absolute expiry instant and
//! a read past that instant is a miss, never stale data. The time source is
//! injected through [`Clock`], so tests drive expiry with a [`ManualClock`]
//! instead of sleeping.
//!
//! ## Cache Types
//!
//! - **Genre seeds**: the catalog's seed-genre vocabulary (~1 hour)
//! - **Artist seeds**: sanitized artist mention -> resolved artist (~6 hours)
//! - **Client token**: bearer token for anonymous catalog calls (provider expiry minus a margin)
//! - **User top data**: per-session snapshot of top artists/tracks (~30 minutes)
//!
//! ## Configuration
//!
//! ```env
//! GENRE_SEED_TTL=1h
//! ARTIST_SEED_TTL=6h
//! USER_TOP_TTL=30m
//! TOKEN_SAFETY_MARGIN=60s
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use open_playlist::cache::{ArtistSeed, RecommendationCaches};
//! use std::time::Duration;
//!
//! let caches = RecommendationCaches::with_system_clock();
//! caches.artist_seeds.insert_with_ttl(
//!     "radiohead".to_string(),
//!     ArtistSeed {
//!         artist_id: "4Z8W4fKeB5YxbusRsdQVPb".to_string(),
//!         top_track_id: None,
//!         canonical_name: "Radiohead".to_string(),
//!     },
//!     Duration::from_secs(6 * 3600),
//! );
//! ```

pub mod clock;
pub mod ttl_cache;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ttl_cache::{CacheMetrics, TtlCache};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::catalog::UserTopSnapshot;

/// Resolved artist stored under the sanitized mention that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistSeed {
    pub artist_id: String,
    /// First entry of the artist's top tracks, if the artist had any
    pub top_track_id: Option<String>,
    pub canonical_name: String,
}

/// Bundle of the four shared caches.
///
/// Cloning is cheap and every clone sees the same entries.
#[derive(Debug, Clone)]
pub struct RecommendationCaches {
    /// Seed-genre vocabulary, stored under the unit key
    pub genre_seeds: TtlCache<(), Vec<String>>,
    pub artist_seeds: TtlCache<String, ArtistSeed>,
    /// Client-credential bearer token, stored under the unit key
    pub client_token: TtlCache<(), String>,
    /// Keyed by session id
    pub user_top: TtlCache<String, UserTopSnapshot>,
}

impl RecommendationCaches {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            genre_seeds: TtlCache::new(clock.clone()),
            artist_seeds: TtlCache::new(clock.clone()),
            client_token: TtlCache::new(clock.clone()),
            user_top: TtlCache::new(clock),
        }
    }

    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// Removes expired entries from every cache.
    ///
    /// Expired entries are already invisible to readers; this only frees memory.
    pub fn cleanup_old_entries(&self) -> usize {
        let removed = self.genre_seeds.cleanup_expired()
            + self.artist_seeds.cleanup_expired()
            + self.client_token.cleanup_expired()
            + self.user_top.cleanup_expired();
        if removed > 0 {
            info!("🧹 Cache cleanup: removed {} expired entries", removed);
        }
        removed
    }
}
