use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ArtistRef, CatalogClient, CatalogError, Track, UserTopSnapshot};
use crate::cache::TtlCache;

/// Límite de ids por request de `/artists`
pub const ARTIST_BATCH_LIMIT: usize = 50;
const SEARCH_LIMIT_MAX: usize = 50;
const USER_TOP_LIMIT: &str = "10";

/// Parámetros de conexión con la Web API de Spotify
#[derive(Clone)]
pub struct SpotifySettings {
    pub client_id: String,
    pub client_secret: String,
    pub api_base: String,
    pub accounts_url: String,
    pub market: String,
    pub request_timeout: Duration,
    pub token_safety_margin: Duration,
}

impl std::fmt::Debug for SpotifySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifySettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("api_base", &self.api_base)
            .field("accounts_url", &self.accounts_url)
            .field("market", &self.market)
            .field("request_timeout", &self.request_timeout)
            .field("token_safety_margin", &self.token_safety_margin)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct ArtistSearchResponse {
    artists: Paging<ArtistObject>,
}

#[derive(Debug, Deserialize)]
struct TrackSearchResponse {
    tracks: Paging<TrackObject>,
}

#[derive(Debug, Deserialize)]
struct Paging<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TopTracksResponse {
    #[serde(default)]
    tracks: Vec<TrackObject>,
}

#[derive(Debug, Deserialize)]
struct ArtistsResponse {
    #[serde(default)]
    artists: Vec<Option<ArtistObject>>,
}

#[derive(Debug, Deserialize)]
struct GenreSeedsResponse {
    #[serde(default)]
    genres: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ArtistObject {
    id: String,
    name: String,
    #[serde(default)]
    genres: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SimpleArtist {
    id: Option<String>,
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumObject {
    #[serde(default)]
    name: String,
    #[serde(default)]
    images: Vec<Image>,
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    // Los tracks locales llegan con id nulo
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<SimpleArtist>,
    album: Option<AlbumObject>,
    #[serde(default)]
    duration_ms: u64,
    preview_url: Option<String>,
    external_urls: Option<ExternalUrls>,
    popularity: Option<u8>,
}

impl TrackObject {
    fn into_track(self) -> Option<Track> {
        let id = self.id.filter(|id| !id.is_empty())?;
        let mut track = Track::new(id, self.name);

        for artist in self.artists {
            track.artist_ids.push(artist.id.unwrap_or_default());
            track.artists.push(artist.name);
        }

        track.duration_ms = self.duration_ms;
        track.preview_url = self.preview_url;
        track.external_url = self.external_urls.and_then(|urls| urls.spotify);
        track.popularity = self.popularity.map(|p| p.min(100));

        if let Some(album) = self.album {
            track.release_year = album.release_date.as_deref().and_then(parse_release_year);
            track.image_url = album.images.into_iter().next().map(|image| image.url);
            track.album = album.name;
        }

        Some(track)
    }
}

/// `release_date` puede venir como "1997", "1997-05" o "1997-05-21"
fn parse_release_year(release_date: &str) -> Option<i32> {
    release_date.get(..4)?.parse().ok()
}

/// Cliente del catálogo de Spotify.
///
/// Usa el token de la sesión del usuario cuando existe; si no, un token de
/// client credentials cacheado hasta su expiración menos un margen.
pub struct SpotifyCatalog {
    client: reqwest::Client,
    settings: SpotifySettings,
    session_token: Option<String>,
    token_cache: TtlCache<(), String>,
}

impl SpotifyCatalog {
    pub fn new(
        settings: SpotifySettings,
        token_cache: TtlCache<(), String>,
    ) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;

        Ok(Self {
            client,
            settings,
            session_token: None,
            token_cache,
        })
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    async fn bearer_token(&self) -> Result<String, CatalogError> {
        if let Some(token) = &self.session_token {
            return Ok(token.clone());
        }

        if let Some(token) = self.token_cache.get(&()) {
            return Ok(token);
        }

        self.fetch_client_token().await
    }

    async fn fetch_client_token(&self) -> Result<String, CatalogError> {
        debug!("🔑 Solicitando token de client credentials");

        let credentials = base64::engine::general_purpose::STANDARD.encode(format!(
            "{}:{}",
            self.settings.client_id, self.settings.client_secret
        ));

        let response = self
            .client
            .post(&self.settings.accounts_url)
            .header("Authorization", format!("Basic {}", credentials))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Auth(format!(
                "token request failed: {} - {}",
                status, body
            )));
        }

        let token: TokenResponse = decode_body("/api/token", response).await?;
        let ttl = Duration::from_secs(token.expires_in)
            .saturating_sub(self.settings.token_safety_margin);

        if ttl.is_zero() {
            warn!("⚠️ Token con expiración menor al margen de seguridad, no se cachea");
        } else {
            self.token_cache
                .insert_with_ttl((), token.access_token.clone(), ttl);
            info!("🔑 Token de client credentials cacheado por {:?}", ttl);
        }

        Ok(token.access_token)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        let token = self.bearer_token().await?;
        let url = format!("{}{}", self.settings.api_base.trim_end_matches('/'), path);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            if status == reqwest::StatusCode::UNAUTHORIZED && self.session_token.is_none() {
                // El token cacheado ya no sirve: el siguiente intento pide uno nuevo
                self.token_cache.remove(&());
            }
            let body = response.text().await.unwrap_or_default();
            debug!("❌ Spotify {} devolvió {}: {}", path, status, body);
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body,
            });
        }

        decode_body(path, response).await
    }
}

/// Lee el cuerpo completo; un JSON que no encaja es `Decode`
async fn decode_body<T: DeserializeOwned>(
    path: &str,
    response: reqwest::Response,
) -> Result<T, CatalogError> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| {
        debug!("❌ Payload inesperado de {}: {}", path, e);
        CatalogError::Decode(format!("{}: {}", path, e))
    })
}

#[async_trait]
impl CatalogClient for SpotifyCatalog {
    async fn search_artists(&self, name: &str) -> Result<Vec<ArtistRef>, CatalogError> {
        let response: ArtistSearchResponse = self
            .get_json(
                "/search",
                &[("q", name), ("type", "artist"), ("limit", "5")],
            )
            .await?;

        Ok(response
            .artists
            .items
            .into_iter()
            .map(|artist| ArtistRef {
                id: artist.id,
                name: artist.name,
            })
            .collect())
    }

    async fn get_artist_top_tracks(&self, artist_id: &str) -> Result<Vec<Track>, CatalogError> {
        let path = format!("/artists/{}/top-tracks", urlencoding::encode(artist_id));
        let response: TopTracksResponse = self
            .get_json(&path, &[("market", self.settings.market.as_str())])
            .await?;

        Ok(response
            .tracks
            .into_iter()
            .filter_map(TrackObject::into_track)
            .collect())
    }

    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<Track>, CatalogError> {
        let limit = limit.clamp(1, SEARCH_LIMIT_MAX).to_string();
        let response: TrackSearchResponse = self
            .get_json(
                "/search",
                &[
                    ("q", query),
                    ("type", "track"),
                    ("limit", limit.as_str()),
                    ("market", self.settings.market.as_str()),
                ],
            )
            .await?;

        Ok(response
            .tracks
            .items
            .into_iter()
            .filter_map(TrackObject::into_track)
            .collect())
    }

    async fn get_artists_genres(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>, CatalogError> {
        let mut genres = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(ARTIST_BATCH_LIMIT) {
            let joined = chunk.join(",");
            let response: ArtistsResponse = self
                .get_json("/artists", &[("ids", joined.as_str())])
                .await?;

            for artist in response.artists.into_iter().flatten() {
                genres.insert(artist.id, artist.genres);
            }
        }

        Ok(genres)
    }

    async fn available_genre_seeds(&self) -> Result<Vec<String>, CatalogError> {
        let response: GenreSeedsResponse = self
            .get_json("/recommendations/available-genre-seeds", &[])
            .await?;
        Ok(response.genres)
    }

    async fn user_top_items(&self) -> Result<UserTopSnapshot, CatalogError> {
        if self.session_token.is_none() {
            return Err(CatalogError::Auth(
                "user top items require a session token".to_string(),
            ));
        }

        let artists: Paging<ArtistObject> = self
            .get_json(
                "/me/top/artists",
                &[("limit", USER_TOP_LIMIT), ("time_range", "medium_term")],
            )
            .await?;
        let tracks: Paging<TrackObject> = self
            .get_json(
                "/me/top/tracks",
                &[("limit", USER_TOP_LIMIT), ("time_range", "medium_term")],
            )
            .await?;

        Ok(UserTopSnapshot {
            artist_ids: artists.items.into_iter().map(|artist| artist.id).collect(),
            track_ids: tracks
                .items
                .into_iter()
                .filter_map(|track| track.id)
                .collect(),
            fetched_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer) -> SpotifySettings {
        SpotifySettings {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            api_base: format!("{}/v1", server.uri()),
            accounts_url: format!("{}/api/token", server.uri()),
            market: "KR".to_string(),
            request_timeout: Duration::from_secs(5),
            token_safety_margin: Duration::from_secs(60),
        }
    }

    fn catalog(server: &MockServer) -> (SpotifyCatalog, TtlCache<(), String>) {
        let cache = TtlCache::new(Arc::new(ManualClock::new()));
        let catalog = SpotifyCatalog::new(settings(server), cache.clone()).unwrap();
        (catalog, cache)
    }

    async fn mount_token(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "anon-token",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    fn track_json(id: Option<&str>, name: &str, release_date: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "artists": [{ "id": "a1", "name": "Radiohead" }],
            "album": {
                "name": "OK Computer",
                "images": [{ "url": "https://img/1.jpg" }],
                "release_date": release_date
            },
            "duration_ms": 263000,
            "preview_url": null,
            "external_urls": { "spotify": "https://open.spotify.com/track/t1" },
            "popularity": 81
        })
    }

    #[tokio::test]
    async fn client_token_is_fetched_once_and_reused() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(header("authorization", "Bearer anon-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "artists": { "items": [{ "id": "a1", "name": "Radiohead", "genres": [] }] }
            })))
            .expect(2)
            .mount(&server)
            .await;

        let (catalog, cache) = catalog(&server);
        let first = catalog.search_artists("radiohead").await.unwrap();
        let second = catalog.search_artists("radiohead").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0].name, "Radiohead");
        assert_eq!(cache.get(&()), Some("anon-token".to_string()));
    }

    #[tokio::test]
    async fn malformed_payloads_are_decode_errors() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/v1/recommendations/available-genre-seeds"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let (catalog, _) = catalog(&server);
        let err = catalog.available_genre_seeds().await.unwrap_err();

        assert!(matches!(err, CatalogError::Decode(ref msg) if msg.contains("available-genre-seeds")));
    }

    #[tokio::test]
    async fn session_token_skips_client_credentials() {
        let server = MockServer::start().await;
        mount_token(&server, 0).await;
        Mock::given(method("GET"))
            .and(path("/v1/recommendations/available-genre-seeds"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "genres": ["rock", "k-pop"] })),
            )
            .mount(&server)
            .await;

        let (catalog, _) = catalog(&server);
        let catalog = catalog.with_session_token("user-token");

        let seeds = catalog.available_genre_seeds().await.unwrap();
        assert_eq!(seeds, vec!["rock".to_string(), "k-pop".to_string()]);
    }

    #[tokio::test]
    async fn search_tracks_maps_payload_and_drops_local_tracks() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("type", "track"))
            .and(query_param("limit", "20"))
            .and(query_param("market", "KR"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tracks": { "items": [
                    track_json(Some("t1"), "Karma Police", "1997-05-21"),
                    track_json(None, "local file", "2001"),
                ]}
            })))
            .mount(&server)
            .await;

        let (catalog, _) = catalog(&server);
        let tracks = catalog.search_tracks("genre:rock year:1990-1999", 20).await.unwrap();

        assert_eq!(tracks.len(), 1);
        let track = &tracks[0];
        assert_eq!(track.id, "t1");
        assert_eq!(track.artist_ids, vec!["a1".to_string()]);
        assert_eq!(track.artists, vec!["Radiohead".to_string()]);
        assert_eq!(track.album, "OK Computer");
        assert_eq!(track.release_year, Some(1997));
        assert_eq!(track.popularity, Some(81));
        assert_eq!(track.image_url.as_deref(), Some("https://img/1.jpg"));
        assert_eq!(
            track.external_url.as_deref(),
            Some("https://open.spotify.com/track/t1")
        );
    }

    #[tokio::test]
    async fn artist_genres_are_fetched_in_batches_of_fifty() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/v1/artists"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "artists": [
                    { "id": "a1", "name": "Blur", "genres": ["britpop", "alternative rock"] },
                    null
                ]
            })))
            .expect(2)
            .mount(&server)
            .await;

        let (catalog, _) = catalog(&server);
        let ids: Vec<String> = (0..51).map(|i| format!("id{}", i)).collect();
        let genres = catalog.get_artists_genres(&ids).await.unwrap();

        assert_eq!(
            genres.get("a1"),
            Some(&vec!["britpop".to_string(), "alternative rock".to_string()])
        );
    }

    #[tokio::test]
    async fn error_status_is_reported_with_body() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/v1/artists/a1/top-tracks"))
            .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
            .mount(&server)
            .await;

        let (catalog, _) = catalog(&server);
        let err = catalog.get_artist_top_tracks("a1").await.unwrap_err();

        match err {
            CatalogError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "try later");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unauthorized_response_drops_cached_token() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/v1/recommendations/available-genre-seeds"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let (catalog, cache) = catalog(&server);
        assert!(catalog.available_genre_seeds().await.is_err());
        assert_eq!(cache.get(&()), None);
    }

    #[tokio::test]
    async fn user_top_items_require_a_session() {
        let server = MockServer::start().await;
        let (catalog, _) = catalog(&server);

        let err = catalog.user_top_items().await.unwrap_err();
        assert!(matches!(err, CatalogError::Auth(_)));
    }

    #[test]
    fn release_year_accepts_every_precision() {
        assert_eq!(parse_release_year("1997"), Some(1997));
        assert_eq!(parse_release_year("1997-05"), Some(1997));
        assert_eq!(parse_release_year("1997-05-21"), Some(1997));
        assert_eq!(parse_release_year("97"), None);
    }
}
