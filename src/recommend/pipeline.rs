//! Orquestación de la generación: etapas, concurrencia y propagación de errores.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::artists::{extract_artist_mentions, ArtistResolver, MAX_MENTIONS};
use super::bounded::BoundedRunner;
use super::candidates::{CandidateGenerator, CandidatePlan};
use super::enrich::enrich_genres;
use super::error::{AttemptContext, RecommendError};
use super::family::GenreHintSet;
use super::genre::{resolve_vocabulary, sanitize, NormalizedGenres, FALLBACK_SEEDS};
use super::preferences::{GenerationRequest, Recommendation};
use super::scoring::{Scorer, ScoringContext, ScoringWeights};
use super::select::SelectionPolicy;
use super::years::extract_year_range;
use crate::cache::RecommendationCaches;
use crate::catalog::CatalogClient;

pub const MAX_PLAYLIST_LIMIT: usize = 100;
/// Artistas del snapshot del usuario que se suman como seeds primarios
const USER_TOP_ARTISTS: usize = 2;

/// Parámetros ajustables del pipeline
#[derive(Debug, Clone)]
pub struct RecommendSettings {
    pub max_in_flight: usize,
    pub call_timeout: Duration,
    pub genre_seed_ttl: Duration,
    pub artist_seed_ttl: Duration,
    pub user_top_ttl: Duration,
    pub default_limit: usize,
    pub selection: SelectionPolicy,
    pub weights: ScoringWeights,
}

impl Default for RecommendSettings {
    fn default() -> Self {
        Self {
            max_in_flight: 4,
            call_timeout: Duration::from_secs(8),
            genre_seed_ttl: Duration::from_secs(3600),
            artist_seed_ttl: Duration::from_secs(6 * 3600),
            user_top_ttl: Duration::from_secs(30 * 60),
            default_limit: 20,
            selection: SelectionPolicy::default(),
            weights: ScoringWeights::default(),
        }
    }
}

/// Etapas de una generación; nunca se vuelve a una anterior
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Idle,
    Generating,
    Scoring,
    Selecting,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Generating => "generating",
            Stage::Scoring => "scoring",
            Stage::Selecting => "selecting",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

struct StageTracker {
    current: Stage,
    started: Instant,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            current: Stage::Idle,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(next > self.current, "stage {} cannot follow {}", next, self.current);
        debug!(
            "🔄 {} → {} ({:?})",
            self.current,
            next,
            self.started.elapsed()
        );
        self.current = next;
    }

    fn fail(&mut self, err: RecommendError) -> RecommendError {
        self.advance(Stage::Failed);
        match &err {
            RecommendError::Cancelled => info!("🛑 Generación cancelada"),
            other => error!("❌ Generación fallida: {}", other),
        }
        err
    }
}

/// Pipeline de recomendación híbrido sobre primitivas del catálogo.
pub struct RecommendationPipeline {
    catalog: Arc<dyn CatalogClient>,
    caches: RecommendationCaches,
    settings: RecommendSettings,
    scorer: Scorer,
}

impl RecommendationPipeline {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        caches: RecommendationCaches,
        settings: RecommendSettings,
    ) -> Self {
        let scorer = Scorer::new(settings.weights.clone());
        Self {
            catalog,
            caches,
            settings,
            scorer,
        }
    }

    pub fn caches(&self) -> &RecommendationCaches {
        &self.caches
    }

    pub async fn generate(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Recommendation, RecommendError> {
        let mut stage = StageTracker::new();

        let limit = match request.limit {
            0 => self.settings.default_limit,
            n if n > MAX_PLAYLIST_LIMIT => {
                return Err(stage.fail(RecommendError::InvalidRequest(format!(
                    "limit {} exceeds the maximum of {}",
                    n, MAX_PLAYLIST_LIMIT
                ))));
            }
            n => n,
        };
        if cancel.is_cancelled() {
            return Err(stage.fail(RecommendError::Cancelled));
        }

        let prefs = request.preferences.normalized();
        info!(
            "🎵 Generando playlist de {} tracks (géneros: {:?}, artistas: {:?})",
            limit, prefs.genres, prefs.artists
        );

        stage.advance(Stage::Generating);

        // Un rango explícito gana al extraído del texto
        let year_range = prefs.year_range.or_else(|| {
            let mut text = request.raw_text.clone();
            for term in prefs.genres.iter().chain(prefs.keywords.iter()) {
                text.push(' ');
                text.push_str(term);
            }
            extract_year_range(&text)
        });

        let catalog = self.catalog.as_ref();
        let resolver = ArtistResolver::new(
            catalog,
            &self.caches.artist_seeds,
            self.settings.artist_seed_ttl,
            self.settings.call_timeout,
        );
        // Las menciones de artista dependen de qué géneros resolvieron
        let signals_fut = async {
            let normalizer = resolve_vocabulary(
                catalog,
                &self.caches.genre_seeds,
                self.settings.genre_seed_ttl,
                self.settings.call_timeout,
            )
            .await;
            let genres = normalizer.normalize(&prefs.genres);

            let artist_terms = artist_terms(&prefs.artists, &genres, &request.raw_text);
            debug!("🎤 Términos de artista: {:?}", artist_terms);
            let artists = resolver.resolve(&artist_terms, cancel).await;
            (genres, artists)
        };

        let ((genres, artists), top_artists) = tokio::join!(
            signals_fut,
            self.user_top_artists(request.session_id.as_deref()),
        );
        info!(
            "🎼 Seeds de género: {:?} (sin resolver: {:?}, reserva: {})",
            genres.seeds, genres.unmatched, genres.used_fallback
        );

        let keywords: Vec<String> = dedup_terms(genres.unmatched.iter().chain(prefs.keywords.iter()));
        let context = AttemptContext {
            genre_seeds: genres.seeds.clone(),
            year_range,
            keywords: keywords.clone(),
        };

        if cancel.is_cancelled() {
            return Err(stage.fail(RecommendError::Cancelled));
        }

        // Solo los artistas pedidos explícitamente caen a búsqueda libre
        let explicit: HashSet<String> = prefs.artists.iter().map(|a| sanitize(a)).collect();
        let unresolved_explicit = artists
            .unresolved
            .iter()
            .filter(|term| explicit.contains(&sanitize(term)));

        let mut artist_ids = artists.artist_ids.clone();
        for id in top_artists {
            if !artist_ids.contains(&id) {
                artist_ids.push(id);
            }
        }

        let plan = CandidatePlan {
            artist_ids,
            genre_seeds: genres.seeds.clone(),
            year_range,
            free_terms: dedup_terms(keywords.iter().chain(unresolved_explicit)),
            limit,
        };

        let runner = BoundedRunner::new(self.settings.max_in_flight, self.settings.call_timeout, cancel.clone());
        let outcome = CandidateGenerator::new(catalog, &runner).generate(&plan).await;

        if cancel.is_cancelled() {
            return Err(stage.fail(RecommendError::Cancelled));
        }
        if outcome.pool.is_empty() {
            let err = if outcome.catalog_unavailable() {
                RecommendError::CatalogUnavailable { context }
            } else {
                RecommendError::NoCandidates { context }
            };
            return Err(stage.fail(err));
        }
        let candidate_count = outcome.pool.len();

        stage.advance(Stage::Scoring);
        let artist_genres = enrich_genres(catalog, &runner, &outcome.pool.artist_ids()).await;
        if cancel.is_cancelled() {
            return Err(stage.fail(RecommendError::Cancelled));
        }

        let hints = GenreHintSet::from_seeds(&genres.seeds);
        let scoring_ctx = ScoringContext {
            hints: &hints,
            genre_filter: !genres.used_fallback && !genres.seeds.is_empty(),
            year_range,
            keywords: &keywords,
            artist_genres: &artist_genres,
        };
        let scored = self.scorer.score(outcome.pool.into_tracks(), &scoring_ctx, limit);

        stage.advance(Stage::Selecting);
        let tracks = self.settings.selection.select(scored, limit);
        if tracks.is_empty() {
            return Err(stage.fail(RecommendError::NoCandidates { context }));
        }

        stage.advance(Stage::Done);
        info!(
            "✅ Playlist generada: {} tracks de {} candidatos",
            tracks.len(),
            candidate_count
        );

        Ok(Recommendation {
            tracks,
            genre_seeds: genres.seeds,
            year_range,
            resolved_artists: artists.names,
            candidate_count,
        })
    }

    /// Ids de los top artists del usuario, vía la caché de la sesión
    async fn user_top_artists(&self, session_id: Option<&str>) -> Vec<String> {
        let Some(session_id) = session_id else {
            return Vec::new();
        };

        let key = session_id.to_string();
        let snapshot = match self.caches.user_top.get(&key) {
            Some(snapshot) => snapshot,
            None => match timeout(self.settings.call_timeout, self.catalog.user_top_items()).await {
                Ok(Ok(snapshot)) => {
                    self.caches
                        .user_top
                        .insert_with_ttl(key, snapshot.clone(), self.settings.user_top_ttl);
                    snapshot
                }
                Ok(Err(e)) => {
                    warn!("⚠️ Top items de la sesión '{}' no disponibles: {}", session_id, e);
                    return Vec::new();
                }
                Err(_) => {
                    warn!("⏰ Timeout obteniendo top items de la sesión '{}'", session_id);
                    return Vec::new();
                }
            },
        };

        snapshot
            .artist_ids
            .into_iter()
            .take(USER_TOP_ARTISTS)
            .collect()
    }
}

/// Artistas explícitos primero, después menciones extraídas del texto libre.
/// Solo se excluyen los fragmentos de género que resolvieron a un seed.
fn artist_terms(explicit: &[String], genres: &NormalizedGenres, raw_text: &str) -> Vec<String> {
    let mut exclude: HashSet<String> = FALLBACK_SEEDS.iter().map(|s| s.to_string()).collect();
    for fragment in genres.matched.iter().chain(genres.seeds.iter()) {
        exclude.extend(fragment.split(|c: char| c.is_whitespace() || c == '-').map(str::to_string));
        exclude.insert(fragment.clone());
    }
    exclude.remove("");

    let mentions = extract_artist_mentions(raw_text, &exclude);
    let mut terms = dedup_terms(explicit.iter().chain(mentions.iter()));
    terms.truncate(explicit.len().max(MAX_MENTIONS));
    terms
}

/// Quita vacíos y duplicados (comparando en forma saneada), conservando el orden
fn dedup_terms<'a>(terms: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    terms
        .into_iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty() && seen.insert(sanitize(t)))
        .map(str::to_string)
        .collect()
}
