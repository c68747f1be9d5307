pub mod spotify;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use thiserror::Error;

pub use spotify::SpotifyCatalog;

/// Fallo de una sub-llamada al catálogo
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("catalog returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("catalog authentication failed: {0}")]
    Auth(String),
    #[error("catalog call timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("unexpected catalog payload: {0}")]
    Decode(String),
}

/// Interfaz del catálogo que consume el pipeline de recomendación
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Busca artistas por nombre, mejor coincidencia primero
    async fn search_artists(&self, name: &str) -> Result<Vec<ArtistRef>, CatalogError>;

    /// Top tracks de un artista
    async fn get_artist_top_tracks(&self, artist_id: &str) -> Result<Vec<Track>, CatalogError>;

    /// Búsqueda libre de tracks (admite calificadores `genre:` y `year:`)
    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<Track>, CatalogError>;

    /// Géneros por artista; los ids desconocidos simplemente no aparecen
    async fn get_artists_genres(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>, CatalogError>;

    /// Vocabulario vivo de seed genres
    async fn available_genre_seeds(&self) -> Result<Vec<String>, CatalogError>;

    /// Top artists/tracks del usuario de la sesión
    async fn user_top_items(&self) -> Result<UserTopSnapshot, CatalogError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: String,
    pub name: String,
}

/// Track del catálogo. La identidad es el `id`: dos valores con el mismo id
/// son la misma entidad aunque difieran en otros campos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    /// Paralelo a `artists`
    pub artist_ids: Vec<String>,
    pub album: String,
    pub duration_ms: u64,
    pub image_url: Option<String>,
    pub preview_url: Option<String>,
    pub external_url: Option<String>,
    pub release_year: Option<i32>,
    /// 0-100
    pub popularity: Option<u8>,
}

impl Track {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            artists: Vec::new(),
            artist_ids: Vec::new(),
            album: String::new(),
            duration_ms: 0,
            image_url: None,
            preview_url: None,
            external_url: None,
            release_year: None,
            popularity: None,
        }
    }

    pub fn with_artist(mut self, artist_id: impl Into<String>, artist: impl Into<String>) -> Self {
        self.artist_ids.push(artist_id.into());
        self.artists.push(artist.into());
        self
    }

    pub fn with_release_year(mut self, year: i32) -> Self {
        self.release_year = Some(year);
        self
    }

    pub fn with_popularity(mut self, popularity: u8) -> Self {
        self.popularity = Some(popularity.min(100));
        self
    }

    /// Clave de diversidad: primer artist id, o primer nombre si no hay id
    pub fn primary_artist_key(&self) -> String {
        self.artist_ids
            .iter()
            .find(|id| !id.is_empty())
            .cloned()
            .or_else(|| self.artists.first().map(|name| name.to_lowercase()))
            .unwrap_or_else(|| self.id.clone())
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Snapshot de los top items del usuario de una sesión
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTopSnapshot {
    pub artist_ids: Vec<String>,
    pub track_ids: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn track_identity_is_the_catalog_id() {
        let a = Track::new("t1", "Creep").with_popularity(80);
        let b = Track::new("t1", "Creep (Remastered)");
        assert_eq!(a, b);

        let set: HashSet<Track> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn primary_artist_key_prefers_id_then_name() {
        let with_id = Track::new("t1", "x").with_artist("a1", "Blur");
        assert_eq!(with_id.primary_artist_key(), "a1");

        let mut without_id = Track::new("t2", "y");
        without_id.artists.push("Blur".to_string());
        assert_eq!(without_id.primary_artist_key(), "blur");

        assert_eq!(Track::new("t3", "z").primary_artist_key(), "t3");
    }

    #[test]
    fn popularity_is_clamped() {
        assert_eq!(Track::new("t", "n").with_popularity(250).popularity, Some(100));
    }
}
