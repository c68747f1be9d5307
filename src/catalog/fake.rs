//! Catálogo en memoria con respuestas guionizadas para los tests del pipeline.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use super::{ArtistRef, CatalogClient, CatalogError, Track, UserTopSnapshot};

#[derive(Debug, Default)]
pub(crate) struct FakeCatalog {
    artists: HashMap<String, Vec<ArtistRef>>,
    top_tracks: HashMap<String, Vec<Track>>,
    searches: HashMap<String, Vec<Track>>,
    failing_queries: HashSet<String>,
    fail_all_searches: bool,
    fail_top_tracks: bool,
    genres: HashMap<String, Vec<String>>,
    fail_genres: bool,
    seeds: Option<Vec<String>>,
    user_top: Option<UserTopSnapshot>,
    pub(crate) search_log: Mutex<Vec<String>>,
    pub(crate) genre_batches: Mutex<Vec<usize>>,
}

impl FakeCatalog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_artist(mut self, mention: &str, id: &str, name: &str) -> Self {
        self.artists
            .entry(mention.to_lowercase())
            .or_default()
            .push(ArtistRef {
                id: id.to_string(),
                name: name.to_string(),
            });
        self
    }

    pub(crate) fn with_top_tracks(mut self, artist_id: &str, tracks: Vec<Track>) -> Self {
        self.top_tracks.insert(artist_id.to_string(), tracks);
        self
    }

    pub(crate) fn with_search(mut self, query: &str, tracks: Vec<Track>) -> Self {
        self.searches.insert(query.to_string(), tracks);
        self
    }

    pub(crate) fn with_failing_query(mut self, query: &str) -> Self {
        self.failing_queries.insert(query.to_string());
        self
    }

    pub(crate) fn failing_all_searches(mut self) -> Self {
        self.fail_all_searches = true;
        self
    }

    pub(crate) fn failing_top_tracks(mut self) -> Self {
        self.fail_top_tracks = true;
        self
    }

    pub(crate) fn with_genres(mut self, artist_id: &str, genres: &[&str]) -> Self {
        self.genres.insert(
            artist_id.to_string(),
            genres.iter().map(|g| g.to_string()).collect(),
        );
        self
    }

    pub(crate) fn failing_genres(mut self) -> Self {
        self.fail_genres = true;
        self
    }

    pub(crate) fn with_seeds(mut self, seeds: &[&str]) -> Self {
        self.seeds = Some(seeds.iter().map(|s| s.to_string()).collect());
        self
    }

    pub(crate) fn with_user_top(mut self, artist_ids: &[&str]) -> Self {
        self.user_top = Some(UserTopSnapshot {
            artist_ids: artist_ids.iter().map(|id| id.to_string()).collect(),
            track_ids: Vec::new(),
            fetched_at: Utc::now(),
        });
        self
    }

    /// Consultas recibidas por `search_tracks`, en orden de llegada
    pub(crate) fn searches(&self) -> Vec<String> {
        self.search_log.lock().clone()
    }

    fn unavailable() -> CatalogError {
        CatalogError::Status {
            status: 503,
            body: "scripted failure".to_string(),
        }
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn search_artists(&self, name: &str) -> Result<Vec<ArtistRef>, CatalogError> {
        if self.fail_all_searches {
            return Err(Self::unavailable());
        }
        Ok(self
            .artists
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn get_artist_top_tracks(&self, artist_id: &str) -> Result<Vec<Track>, CatalogError> {
        if self.fail_top_tracks {
            return Err(Self::unavailable());
        }
        Ok(self.top_tracks.get(artist_id).cloned().unwrap_or_default())
    }

    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<Track>, CatalogError> {
        self.search_log.lock().push(query.to_string());
        if self.fail_all_searches || self.failing_queries.contains(query) {
            return Err(Self::unavailable());
        }
        Ok(self
            .searches
            .get(query)
            .map(|tracks| tracks.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn get_artists_genres(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>, CatalogError> {
        self.genre_batches.lock().push(ids.len());
        if self.fail_genres {
            return Err(Self::unavailable());
        }
        Ok(ids
            .iter()
            .filter_map(|id| self.genres.get(id).map(|g| (id.clone(), g.clone())))
            .collect())
    }

    async fn available_genre_seeds(&self) -> Result<Vec<String>, CatalogError> {
        self.seeds.clone().ok_or_else(Self::unavailable)
    }

    async fn user_top_items(&self) -> Result<UserTopSnapshot, CatalogError> {
        self.user_top
            .clone()
            .ok_or_else(|| CatalogError::Auth("no session".to_string()))
    }
}
