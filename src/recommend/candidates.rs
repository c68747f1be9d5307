use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::bounded::{BoundedRunner, Settled};
use super::preferences::YearRange;
use crate::catalog::{CatalogClient, Track};

pub const TOP_TRACKS_PER_ARTIST: usize = 3;
pub const MAX_SECONDARY_QUERIES: usize = 6;
pub const RESULTS_PER_QUERY: usize = 20;
/// El pool secundario se corta al llegar a `limit * POOL_TARGET_FACTOR`
pub const POOL_TARGET_FACTOR: usize = 2;

/// Conjunto de candidatos sin ids repetidos, en orden de llegada.
///
/// El orden estable alimenta el desempate posicional del scorer.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    tracks: Vec<Track>,
    ids: HashSet<String>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Añade el track si su id aún no está; devuelve si entró
    pub fn push(&mut self, track: Track) -> bool {
        if track.id.is_empty() || !self.ids.insert(track.id.clone()) {
            return false;
        }
        self.tracks.push(track);
        true
    }

    /// Fusiona por id; devuelve cuántos tracks nuevos entraron
    pub fn merge(&mut self, tracks: impl IntoIterator<Item = Track>) -> usize {
        tracks.into_iter().filter(|t| self.push(t.clone())).count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn into_tracks(self) -> Vec<Track> {
        self.tracks
    }

    /// Ids de artista distintos referenciados por el pool
    pub fn artist_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.tracks
            .iter()
            .flat_map(|t| t.artist_ids.iter())
            .filter(|id| !id.is_empty() && seen.insert(id.as_str()))
            .cloned()
            .collect()
    }
}

/// Sub-llamadas intentadas y fallidas en un camino de generación
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathStats {
    pub attempted: usize,
    pub failed: usize,
}

impl PathStats {
    /// Se intentó algo y todo falló
    pub fn failed_entirely(&self) -> bool {
        self.attempted > 0 && self.failed == self.attempted
    }
}

/// Entradas del generador de candidatos
#[derive(Debug, Clone, Default)]
pub struct CandidatePlan {
    pub artist_ids: Vec<String>,
    pub genre_seeds: Vec<String>,
    pub year_range: Option<YearRange>,
    /// Keywords sin género y artistas explícitos sin resolver
    pub free_terms: Vec<String>,
    pub limit: usize,
}

impl CandidatePlan {
    /// Consultas estructuradas del camino secundario, como máximo 6
    pub fn search_queries(&self) -> Vec<String> {
        let qualifier = self.year_range.map(|r| r.search_qualifier());

        let genre_queries = self.genre_seeds.iter().map(|seed| match &qualifier {
            Some(q) => format!("genre:{} {}", seed, q),
            None => format!("genre:{}", seed),
        });
        let free_queries = self
            .free_terms
            .iter()
            .map(|term| term.trim().to_string())
            .filter(|term| !term.is_empty());

        let mut seen = HashSet::new();
        genre_queries
            .chain(free_queries)
            .filter(|q| seen.insert(q.to_lowercase()))
            .take(MAX_SECONDARY_QUERIES)
            .collect()
    }
}

/// Pool generado más las estadísticas de cada camino
#[derive(Debug, Default)]
pub struct CandidateOutcome {
    pub pool: CandidatePool,
    pub primary: PathStats,
    pub secondary: PathStats,
}

impl CandidateOutcome {
    /// Ambos caminos se intentaron y ninguna sub-llamada tuvo éxito
    pub fn catalog_unavailable(&self) -> bool {
        self.primary.failed_entirely() && self.secondary.failed_entirely()
    }
}

/// Construye el pool a partir de top tracks de artistas y búsquedas estructuradas.
pub struct CandidateGenerator<'a> {
    catalog: &'a dyn CatalogClient,
    runner: &'a BoundedRunner,
}

impl<'a> CandidateGenerator<'a> {
    pub fn new(catalog: &'a dyn CatalogClient, runner: &'a BoundedRunner) -> Self {
        Self { catalog, runner }
    }

    pub async fn generate(&self, plan: &CandidatePlan) -> CandidateOutcome {
        let mut outcome = CandidateOutcome::default();

        self.primary_path(plan, &mut outcome).await;
        info!(
            "🎤 Camino primario: {} candidatos ({} artistas)",
            outcome.pool.len(),
            plan.artist_ids.len()
        );

        if outcome.pool.len() < plan.limit {
            self.secondary_path(plan, &mut outcome).await;
        } else {
            debug!("⏭️ Pool suficiente, se omite la búsqueda estructurada");
        }

        info!("📦 Pool de candidatos: {} tracks", outcome.pool.len());
        outcome
    }

    async fn primary_path(&self, plan: &CandidatePlan, outcome: &mut CandidateOutcome) {
        if plan.artist_ids.is_empty() {
            return;
        }

        let catalog = self.catalog;
        let results = self
            .runner
            .run_all(plan.artist_ids.clone(), |artist_id| async move {
                catalog.get_artist_top_tracks(&artist_id).await
            })
            .await;

        outcome.primary.attempted = results.len();
        for (artist_id, settled) in plan.artist_ids.iter().zip(results) {
            match settled {
                Settled::Done(tracks) => {
                    outcome
                        .pool
                        .merge(tracks.into_iter().take(TOP_TRACKS_PER_ARTIST));
                }
                Settled::Skipped { reason } => {
                    warn!("⚠️ Top tracks de '{}' omitidos: {}", artist_id, reason);
                    outcome.primary.failed += 1;
                }
            }
        }
    }

    async fn secondary_path(&self, plan: &CandidatePlan, outcome: &mut CandidateOutcome) {
        let queries = plan.search_queries();
        if queries.is_empty() {
            debug!("🔍 Sin consultas estructuradas que ejecutar");
            return;
        }
        debug!("🔍 Consultas estructuradas: {:?}", queries);

        let catalog = self.catalog;
        let results = self
            .runner
            .run_all(queries.clone(), |query| async move {
                catalog.search_tracks(&query, RESULTS_PER_QUERY).await
            })
            .await;

        let target = plan.limit.saturating_mul(POOL_TARGET_FACTOR);
        outcome.secondary.attempted = results.len();
        for (query, settled) in queries.iter().zip(results) {
            match settled {
                Settled::Done(tracks) => {
                    if outcome.pool.len() >= target {
                        continue;
                    }
                    let room = target - outcome.pool.len();
                    let fresh: Vec<Track> = tracks
                        .into_iter()
                        .filter(|t| !outcome.pool.contains(&t.id))
                        .take(room)
                        .collect();
                    let added = outcome.pool.merge(fresh);
                    debug!("🔍 '{}' aportó {} tracks nuevos", query, added);
                }
                Settled::Skipped { reason } => {
                    warn!("⚠️ Consulta '{}' omitida: {}", query, reason);
                    outcome.secondary.failed += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fake::FakeCatalog;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn runner() -> BoundedRunner {
        BoundedRunner::new(4, Duration::from_secs(1), CancellationToken::new())
    }

    fn tracks(prefix: &str, count: usize) -> Vec<Track> {
        (0..count)
            .map(|i| Track::new(format!("{}{}", prefix, i), format!("song {}", i)))
            .collect()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn pool_rejects_duplicate_ids() {
        let mut pool = CandidatePool::new();
        assert!(pool.push(Track::new("a", "one")));
        assert!(!pool.push(Track::new("a", "one again")));
        assert_eq!(pool.merge(vec![Track::new("a", "x"), Track::new("b", "y")]), 1);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.tracks()[0].name, "one");
    }

    #[test]
    fn queries_combine_genre_year_and_free_terms() {
        let plan = CandidatePlan {
            genre_seeds: strings(&["rock", "alt-rock"]),
            year_range: Some(YearRange::new(1990, 1999)),
            free_terms: strings(&["drive", "  ", "Drive", "night", "rain", "sea", "sun"]),
            limit: 10,
            ..Default::default()
        };

        assert_eq!(
            plan.search_queries(),
            strings(&[
                "genre:rock year:1990-1999",
                "genre:alt-rock year:1990-1999",
                "drive",
                "night",
                "rain",
                "sea",
            ])
        );
    }

    #[tokio::test]
    async fn primary_path_caps_top_tracks_per_artist() {
        let catalog = FakeCatalog::new()
            .with_top_tracks("a1", tracks("x", 10))
            .with_top_tracks("a2", tracks("y", 10));
        let runner = runner();
        let plan = CandidatePlan {
            artist_ids: strings(&["a1", "a2"]),
            limit: 4,
            ..Default::default()
        };

        let outcome = CandidateGenerator::new(&catalog, &runner).generate(&plan).await;

        assert_eq!(outcome.pool.len(), 6);
        assert_eq!(outcome.primary, PathStats { attempted: 2, failed: 0 });
        assert_eq!(outcome.secondary, PathStats::default());
        assert!(catalog.searches().is_empty());
    }

    #[tokio::test]
    async fn both_paths_never_duplicate_ids() {
        let catalog = FakeCatalog::new()
            .with_top_tracks("a1", tracks("x", 3))
            .with_search("genre:rock", tracks("x", 5));
        let runner = runner();
        let plan = CandidatePlan {
            artist_ids: strings(&["a1"]),
            genre_seeds: strings(&["rock"]),
            limit: 10,
            ..Default::default()
        };

        let outcome = CandidateGenerator::new(&catalog, &runner).generate(&plan).await;

        let ids: HashSet<&str> = outcome.pool.tracks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), outcome.pool.len());
        assert_eq!(outcome.pool.len(), 5);
    }

    #[tokio::test]
    async fn secondary_path_stops_near_twice_the_limit() {
        let catalog = FakeCatalog::new()
            .with_search("genre:rock", tracks("r", 20))
            .with_search("genre:pop", tracks("p", 20));
        let runner = runner();
        let plan = CandidatePlan {
            genre_seeds: strings(&["rock", "pop"]),
            limit: 5,
            ..Default::default()
        };

        let outcome = CandidateGenerator::new(&catalog, &runner).generate(&plan).await;

        assert_eq!(outcome.pool.len(), 10);
        assert!(outcome.pool.tracks().iter().all(|t| t.id.starts_with('r')));
    }

    #[tokio::test]
    async fn failing_queries_are_skipped_and_counted() {
        let catalog = FakeCatalog::new()
            .with_failing_query("genre:jazz")
            .with_search("blue note", tracks("b", 4))
            .failing_top_tracks();
        let runner = runner();
        let plan = CandidatePlan {
            artist_ids: strings(&["a1"]),
            genre_seeds: strings(&["jazz"]),
            free_terms: strings(&["blue note"]),
            limit: 10,
            ..Default::default()
        };

        let outcome = CandidateGenerator::new(&catalog, &runner).generate(&plan).await;

        assert_eq!(outcome.pool.len(), 4);
        assert_eq!(outcome.primary, PathStats { attempted: 1, failed: 1 });
        assert_eq!(outcome.secondary, PathStats { attempted: 2, failed: 1 });
        assert!(!outcome.catalog_unavailable());
    }

    #[tokio::test]
    async fn everything_failing_marks_the_catalog_unavailable() {
        let catalog = FakeCatalog::new().failing_all_searches().failing_top_tracks();
        let runner = runner();
        let plan = CandidatePlan {
            artist_ids: strings(&["a1"]),
            genre_seeds: strings(&["rock"]),
            limit: 10,
            ..Default::default()
        };

        let outcome = CandidateGenerator::new(&catalog, &runner).generate(&plan).await;

        assert!(outcome.pool.is_empty());
        assert!(outcome.catalog_unavailable());
    }
}
