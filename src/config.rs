use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::catalog::spotify::SpotifySettings;
use crate::recommend::{RecommendSettings, ScoringWeights, SelectionPolicy};

/// Tope para timeouts y TTLs configurables
const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Clone, Serialize)]
pub struct Config {
    // Spotify
    pub spotify_client_id: String,
    #[serde(skip_serializing)]
    pub spotify_client_secret: String,
    pub spotify_api_base: String,
    pub spotify_accounts_url: String,
    pub catalog_market: String,
    pub catalog_request_timeout: Duration,

    // Cachés
    pub genre_seed_ttl: Duration,
    pub artist_seed_ttl: Duration,
    pub user_top_ttl: Duration,
    pub token_safety_margin: Duration,

    // Rendimiento
    pub max_in_flight: usize,

    // Playlist
    pub default_playlist_limit: usize,
    pub diversity_caps: Vec<usize>,
    pub diversity_min_fill: f64,

    // Pesos del scorer
    pub score_genre_match: f64,
    pub score_genre_miss: f64,
    pub score_year_in_range: f64,
    pub score_year_neutral: f64,
    pub score_year_decay_years: u32,
    pub score_keyword_title: f64,
    pub score_keyword_artist: f64,
    pub score_popularity_max: f64,
    pub genre_prefilter_ratio: f64,
}

impl Config {
    /// Carga `.env` si existe y después las variables de entorno.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Construye la configuración desde una fuente de variables arbitraria.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            // Spotify
            spotify_client_id: var("SPOTIFY_CLIENT_ID").context("SPOTIFY_CLIENT_ID is required")?,
            spotify_client_secret: var("SPOTIFY_CLIENT_SECRET")
                .context("SPOTIFY_CLIENT_SECRET is required")?,
            spotify_api_base: var("SPOTIFY_API_BASE").unwrap_or(defaults.spotify_api_base),
            spotify_accounts_url: var("SPOTIFY_ACCOUNTS_URL")
                .unwrap_or(defaults.spotify_accounts_url),
            catalog_market: var("CATALOG_MARKET").unwrap_or(defaults.catalog_market),
            catalog_request_timeout: duration_or(
                var("CATALOG_REQUEST_TIMEOUT"),
                "CATALOG_REQUEST_TIMEOUT",
                defaults.catalog_request_timeout,
            )?,

            // Cachés
            genre_seed_ttl: duration_or(var("GENRE_SEED_TTL"), "GENRE_SEED_TTL", defaults.genre_seed_ttl)?,
            artist_seed_ttl: duration_or(
                var("ARTIST_SEED_TTL"),
                "ARTIST_SEED_TTL",
                defaults.artist_seed_ttl,
            )?,
            user_top_ttl: duration_or(var("USER_TOP_TTL"), "USER_TOP_TTL", defaults.user_top_ttl)?,
            token_safety_margin: duration_or(
                var("TOKEN_SAFETY_MARGIN"),
                "TOKEN_SAFETY_MARGIN",
                defaults.token_safety_margin,
            )?,

            // Rendimiento
            max_in_flight: parse_or(var("MAX_IN_FLIGHT"), "MAX_IN_FLIGHT", defaults.max_in_flight)?,

            // Playlist
            default_playlist_limit: parse_or(
                var("DEFAULT_PLAYLIST_LIMIT"),
                "DEFAULT_PLAYLIST_LIMIT",
                defaults.default_playlist_limit,
            )?,
            diversity_caps: match var("DIVERSITY_CAPS") {
                Some(raw) => parse_caps(&raw)?,
                None => defaults.diversity_caps,
            },
            diversity_min_fill: parse_or(
                var("DIVERSITY_MIN_FILL"),
                "DIVERSITY_MIN_FILL",
                defaults.diversity_min_fill,
            )?,

            // Pesos
            score_genre_match: parse_or(var("SCORE_GENRE_MATCH"), "SCORE_GENRE_MATCH", defaults.score_genre_match)?,
            score_genre_miss: parse_or(var("SCORE_GENRE_MISS"), "SCORE_GENRE_MISS", defaults.score_genre_miss)?,
            score_year_in_range: parse_or(
                var("SCORE_YEAR_IN_RANGE"),
                "SCORE_YEAR_IN_RANGE",
                defaults.score_year_in_range,
            )?,
            score_year_neutral: parse_or(
                var("SCORE_YEAR_NEUTRAL"),
                "SCORE_YEAR_NEUTRAL",
                defaults.score_year_neutral,
            )?,
            score_year_decay_years: parse_or(
                var("SCORE_YEAR_DECAY_YEARS"),
                "SCORE_YEAR_DECAY_YEARS",
                defaults.score_year_decay_years,
            )?,
            score_keyword_title: parse_or(
                var("SCORE_KEYWORD_TITLE"),
                "SCORE_KEYWORD_TITLE",
                defaults.score_keyword_title,
            )?,
            score_keyword_artist: parse_or(
                var("SCORE_KEYWORD_ARTIST"),
                "SCORE_KEYWORD_ARTIST",
                defaults.score_keyword_artist,
            )?,
            score_popularity_max: parse_or(
                var("SCORE_POPULARITY_MAX"),
                "SCORE_POPULARITY_MAX",
                defaults.score_popularity_max,
            )?,
            genre_prefilter_ratio: parse_or(
                var("GENRE_PREFILTER_RATIO"),
                "GENRE_PREFILTER_RATIO",
                defaults.genre_prefilter_ratio,
            )?,
        };

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Spotify credentials must be non-empty
    /// - API and accounts URLs must be absolute http(s) URLs
    /// - Timeouts, TTLs and concurrency must be greater than zero
    /// - Timeouts and TTLs must not exceed one year
    /// - The diversity cap schedule must be non-empty and strictly increasing
    /// - Ratios must lie in (0, 1]
    pub fn validate(&self) -> Result<()> {
        if self.spotify_client_id.trim().is_empty() || self.spotify_client_secret.trim().is_empty() {
            anyhow::bail!("Spotify client credentials must not be empty");
        }

        for (name, raw) in [
            ("SPOTIFY_API_BASE", &self.spotify_api_base),
            ("SPOTIFY_ACCOUNTS_URL", &self.spotify_accounts_url),
        ] {
            let url = Url::parse(raw).with_context(|| format!("{} is not a valid URL: {}", name, raw))?;
            if !matches!(url.scheme(), "http" | "https") {
                anyhow::bail!("{} must be an http(s) URL, got: {}", name, raw);
            }
        }

        for (name, value) in [
            ("CATALOG_REQUEST_TIMEOUT", self.catalog_request_timeout),
            ("GENRE_SEED_TTL", self.genre_seed_ttl),
            ("ARTIST_SEED_TTL", self.artist_seed_ttl),
            ("USER_TOP_TTL", self.user_top_ttl),
        ] {
            if value.is_zero() {
                anyhow::bail!("{} must be greater than 0", name);
            }
            if value > MAX_DURATION {
                anyhow::bail!(
                    "{} must not exceed {}, got: {}",
                    name,
                    humantime::format_duration(MAX_DURATION),
                    humantime::format_duration(value)
                );
            }
        }

        if self.max_in_flight == 0 {
            anyhow::bail!("MAX_IN_FLIGHT must be greater than 0");
        }

        if self.default_playlist_limit == 0 {
            anyhow::bail!("DEFAULT_PLAYLIST_LIMIT must be greater than 0");
        }

        if self.diversity_caps.is_empty() || self.diversity_caps[0] == 0 {
            anyhow::bail!("DIVERSITY_CAPS must start with a cap of at least 1");
        }
        if self.diversity_caps.windows(2).any(|pair| pair[1] <= pair[0]) {
            anyhow::bail!("DIVERSITY_CAPS must be strictly increasing, got: {:?}", self.diversity_caps);
        }

        for (name, ratio) in [
            ("DIVERSITY_MIN_FILL", self.diversity_min_fill),
            ("GENRE_PREFILTER_RATIO", self.genre_prefilter_ratio),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                anyhow::bail!("{} must be in (0, 1], got: {}", name, ratio);
            }
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Never includes the client secret.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Catalog: {} (market {}, timeout {})\n  \
            Client: {}\n  \
            Cache TTLs: genres {}, artists {}, user top {}\n  \
            Concurrency: {} in flight\n  \
            Playlist: {} tracks, caps {:?}, min fill {:.0}%",
            self.spotify_api_base,
            self.catalog_market,
            humantime::format_duration(self.catalog_request_timeout),
            mask(&self.spotify_client_id),
            humantime::format_duration(self.genre_seed_ttl),
            humantime::format_duration(self.artist_seed_ttl),
            humantime::format_duration(self.user_top_ttl),
            self.max_in_flight,
            self.default_playlist_limit,
            self.diversity_caps,
            self.diversity_min_fill * 100.0
        )
    }

    /// Parámetros del pipeline de recomendación
    pub fn recommend_settings(&self) -> RecommendSettings {
        RecommendSettings {
            max_in_flight: self.max_in_flight,
            call_timeout: self.catalog_request_timeout,
            genre_seed_ttl: self.genre_seed_ttl,
            artist_seed_ttl: self.artist_seed_ttl,
            user_top_ttl: self.user_top_ttl,
            default_limit: self.default_playlist_limit,
            selection: SelectionPolicy {
                cap_schedule: self.diversity_caps.clone(),
                min_fill_ratio: self.diversity_min_fill,
            },
            weights: ScoringWeights {
                genre_match: self.score_genre_match,
                genre_miss: self.score_genre_miss,
                year_in_range: self.score_year_in_range,
                year_neutral: self.score_year_neutral,
                year_decay_years: self.score_year_decay_years,
                keyword_title: self.score_keyword_title,
                keyword_artist: self.score_keyword_artist,
                popularity_max: self.score_popularity_max,
                prefilter_ratio: self.genre_prefilter_ratio,
            },
        }
    }

    /// Parámetros de conexión del cliente de Spotify
    pub fn spotify_settings(&self) -> SpotifySettings {
        SpotifySettings {
            client_id: self.spotify_client_id.clone(),
            client_secret: self.spotify_client_secret.clone(),
            api_base: self.spotify_api_base.trim_end_matches('/').to_string(),
            accounts_url: self.spotify_accounts_url.clone(),
            market: self.catalog_market.clone(),
            request_timeout: self.catalog_request_timeout,
            token_safety_margin: self.token_safety_margin,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("spotify_client_id", &mask(&self.spotify_client_id))
            .field("spotify_client_secret", &"***")
            .field("spotify_api_base", &self.spotify_api_base)
            .field("catalog_market", &self.catalog_market)
            .field("max_in_flight", &self.max_in_flight)
            .field("default_playlist_limit", &self.default_playlist_limit)
            .field("diversity_caps", &self.diversity_caps)
            .finish_non_exhaustive()
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        let weights = ScoringWeights::default();
        let selection = SelectionPolicy::default();

        Self {
            // Spotify (no defaults for credentials - must be provided)
            spotify_client_id: String::new(),
            spotify_client_secret: String::new(),
            spotify_api_base: "https://api.spotify.com/v1".to_string(),
            spotify_accounts_url: "https://accounts.spotify.com/api/token".to_string(),
            catalog_market: "US".to_string(),
            catalog_request_timeout: Duration::from_secs(8),

            // Cache defaults
            genre_seed_ttl: Duration::from_secs(3600),
            artist_seed_ttl: Duration::from_secs(6 * 3600),
            user_top_ttl: Duration::from_secs(30 * 60),
            token_safety_margin: Duration::from_secs(60),

            max_in_flight: 4,

            default_playlist_limit: 20,
            diversity_caps: selection.cap_schedule,
            diversity_min_fill: selection.min_fill_ratio,

            score_genre_match: weights.genre_match,
            score_genre_miss: weights.genre_miss,
            score_year_in_range: weights.year_in_range,
            score_year_neutral: weights.year_neutral,
            score_year_decay_years: weights.year_decay_years,
            score_keyword_title: weights.keyword_title,
            score_keyword_artist: weights.keyword_artist,
            score_popularity_max: weights.popularity_max,
            genre_prefilter_ratio: weights.prefilter_ratio,
        }
    }
}

fn parse_or<T>(raw: Option<String>, name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", name, raw)),
        None => Ok(default),
    }
}

fn duration_or(raw: Option<String>, name: &str, default: Duration) -> Result<Duration> {
    match raw {
        Some(raw) => humantime::parse_duration(raw.trim())
            .with_context(|| format!("{} is not a duration (e.g. 90s, 6h): {}", name, raw)),
        None => Ok(default),
    }
}

fn parse_caps(raw: &str) -> Result<Vec<usize>> {
    raw.split(',')
        .map(|cap| {
            cap.trim()
                .parse::<usize>()
                .with_context(|| format!("DIVERSITY_CAPS has an invalid cap: {}", cap))
        })
        .collect()
}

fn mask(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    format!("{}…", visible)
}
