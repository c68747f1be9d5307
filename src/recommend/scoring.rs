use tracing::debug;

use super::enrich::ArtistGenres;
use super::family::GenreHintSet;
use super::genre::sanitize;
use super::preferences::YearRange;
use crate::catalog::Track;

/// Peso máximo del desempate posicional; menor que un punto de popularidad
const TIEBREAK_SPAN: f64 = 1e-3;

/// Pesos del score compuesto. Todos son configurables.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringWeights {
    pub genre_match: f64,
    pub genre_miss: f64,
    pub year_in_range: f64,
    pub year_neutral: f64,
    /// Años fuera del rango en los que el bonus de año decae a 0
    pub year_decay_years: u32,
    pub keyword_title: f64,
    pub keyword_artist: f64,
    pub popularity_max: f64,
    /// Fracción del límite que debe casar con la familia para podar el pool
    pub prefilter_ratio: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            genre_match: 1.5,
            genre_miss: -0.7,
            year_in_range: 1.2,
            year_neutral: 0.2,
            year_decay_years: 10,
            keyword_title: 0.8,
            keyword_artist: 0.6,
            popularity_max: 0.6,
            prefilter_ratio: 0.6,
        }
    }
}

/// Desglose del score de un track, para los logs de depuración
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreBreakdown {
    pub genre: f64,
    pub year: f64,
    pub keyword: f64,
    pub popularity: f64,
    pub tiebreak: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.genre + self.year + self.keyword + self.popularity + self.tiebreak
    }
}

#[derive(Debug, Clone)]
pub struct ScoredTrack {
    pub track: Track,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Señales extraídas de la petición contra las que se puntúa
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub hints: &'a GenreHintSet,
    /// El usuario pidió géneros (los seeds de reserva no cuentan)
    pub genre_filter: bool,
    pub year_range: Option<YearRange>,
    pub keywords: &'a [String],
    pub artist_genres: &'a ArtistGenres,
}

impl ScoringContext<'_> {
    fn family_match(&self, track: &Track) -> bool {
        !self.hints.is_empty()
            && track
                .artist_ids
                .iter()
                .filter_map(|id| self.artist_genres.get(id))
                .any(|tags| self.hints.matches_any(tags))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scorer {
    weights: ScoringWeights,
}

impl Scorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Puntúa el pool en su orden de llegada, tras la poda por familia de género.
    pub fn score(&self, pool: Vec<Track>, ctx: &ScoringContext<'_>, limit: usize) -> Vec<ScoredTrack> {
        let keywords: Vec<String> = ctx
            .keywords
            .iter()
            .map(|k| sanitize(k))
            .filter(|k| !k.is_empty())
            .collect();

        let pool = self.prefilter(pool, ctx, limit);
        let total = pool.len().max(1) as f64;

        pool.into_iter()
            .enumerate()
            .map(|(position, track)| {
                let breakdown = ScoreBreakdown {
                    genre: self.genre_affinity(&track, ctx),
                    year: self.year_proximity(track.release_year, ctx.year_range),
                    keyword: self.keyword_match(&track, &keywords),
                    popularity: self.popularity_term(track.popularity),
                    tiebreak: TIEBREAK_SPAN * (1.0 - position as f64 / total),
                };
                let score = breakdown.total();
                debug!("🧮 '{}' → {:.3} {:?}", track.name, score, breakdown);
                ScoredTrack {
                    track,
                    score,
                    breakdown,
                }
            })
            .collect()
    }

    /// Si suficientes candidatos casan con la familia pedida, solo se puntúan esos.
    fn prefilter(&self, pool: Vec<Track>, ctx: &ScoringContext<'_>, limit: usize) -> Vec<Track> {
        if !ctx.genre_filter || ctx.hints.is_empty() {
            return pool;
        }

        let matching = pool.iter().filter(|t| ctx.family_match(t)).count();
        let threshold = self.weights.prefilter_ratio * limit as f64;
        if matching == 0 || (matching as f64) < threshold {
            return pool;
        }

        debug!(
            "🎯 Poda por familia de género: {}/{} candidatos",
            matching,
            pool.len()
        );
        pool.into_iter().filter(|t| ctx.family_match(t)).collect()
    }

    pub fn genre_affinity(&self, track: &Track, ctx: &ScoringContext<'_>) -> f64 {
        if !ctx.genre_filter {
            0.0
        } else if ctx.family_match(track) {
            self.weights.genre_match
        } else {
            self.weights.genre_miss
        }
    }

    pub fn year_proximity(&self, release_year: Option<i32>, range: Option<YearRange>) -> f64 {
        let Some(range) = range else {
            return self.weights.year_neutral;
        };
        let Some(year) = release_year else {
            return 0.0;
        };

        let distance = range.distance_from(year);
        if distance == 0 {
            return self.weights.year_in_range;
        }
        if self.weights.year_decay_years == 0 {
            return 0.0;
        }

        let decay = 1.0 - distance as f64 / self.weights.year_decay_years as f64;
        self.weights.year_in_range * decay.max(0.0)
    }

    /// `keywords` ya saneadas
    pub fn keyword_match(&self, track: &Track, keywords: &[String]) -> f64 {
        let title = sanitize(&track.name);
        let artists: Vec<String> = track.artists.iter().map(|a| sanitize(a)).collect();

        keywords
            .iter()
            .map(|keyword| {
                let mut bonus = 0.0;
                if title.contains(keyword.as_str()) {
                    bonus += self.weights.keyword_title;
                }
                if artists.iter().any(|a| a.contains(keyword.as_str())) {
                    bonus += self.weights.keyword_artist;
                }
                bonus
            })
            .sum()
    }

    pub fn popularity_term(&self, popularity: Option<u8>) -> f64 {
        popularity.map_or(0.0, |p| f64::from(p.min(100)) / 100.0 * self.weights.popularity_max)
    }
}
