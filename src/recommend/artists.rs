use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::genre::sanitize;
use super::years::strip_year_expressions;
use crate::cache::{ArtistSeed, TtlCache};
use crate::catalog::{CatalogClient, CatalogError};

pub const MAX_MENTIONS: usize = 6;
const STOP_AFTER_DISTINCT: usize = 4;
const MAX_ARTIST_IDS: usize = 3;
const MAX_TOP_TRACK_IDS: usize = 2;
const MAX_NAMES: usize = 3;
const MIN_MENTION_CHARS: usize = 2;

/// Palabras genéricas de petición que nunca son nombres de artista
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        // en
        "playlist", "song", "songs", "music", "track", "tracks", "recommend", "recommendation",
        "recommendations", "please", "play", "some", "like", "similar", "to", "and", "or",
        "the", "a", "an", "for", "me", "my", "with", "of", "by", "in", "on", "vibe", "vibes",
        "mood", "style", "genre", "feat", "ft", "listen", "want", "i", "give", "make",
        "create", "good", "best", "new", "old", "more", "from", "any", "artist", "artists",
        "band", "bands", "stuff", "chill", "driving", "study", "workout",
        // es
        "canciones", "cancion", "musica", "lista", "como", "estilo", "de", "y",
        // ko
        "노래", "노래들", "플레이리스트", "추천", "추천해줘", "추천해주세요", "음악", "곡", "곡들",
        "들려줘", "틀어줘", "만들어줘", "신나는", "조용한", "좋은", "분위기", "느낌", "스타일",
        "같은", "비슷한", "가수", "밴드", "장르", "요즘", "최신", "그리고", "좀", "듣고", "싶어",
        "싶은", "위한", "할때", "드라이브", "공부", "운동", "감성",
    ])
});

/// Partículas coreanas pegadas al nombre ("아이유의" → "아이유")
const HANGUL_SUFFIXES: &[&str] = &[
    "같은", "느낌", "스타일", "처럼", "이랑", "노래", "하고", "의", "랑", "와", "과",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Hangul,
    Cjk,
    Latin,
}

fn script_of(c: char) -> Option<Script> {
    match c {
        '\u{AC00}'..='\u{D7A3}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}' => {
            Some(Script::Hangul)
        }
        '\u{3040}'..='\u{30FF}' | '\u{4E00}'..='\u{9FFF}' => Some(Script::Cjk),
        c if c.is_alphanumeric() => Some(Script::Latin),
        _ => None,
    }
}

struct Run {
    script: Script,
    text: String,
}

/// Corta el texto en tramos de un mismo sistema de escritura.
/// Los espacios se conservan dentro del tramo; la puntuación lo cierra.
fn script_runs(text: &str) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut current: Option<Run> = None;

    for c in text.chars() {
        if c.is_whitespace() {
            if let Some(run) = current.as_mut() {
                run.text.push(' ');
            }
            continue;
        }

        // Apóstrofos y puntos internos forman parte de nombres latinos ("guns n' roses", "t.rex")
        let joins_latin = matches!(c, '\'' | '.' | '&')
            && current.as_ref().is_some_and(|run| run.script == Script::Latin);
        let script = if joins_latin { Some(Script::Latin) } else { script_of(c) };

        match (script, current.as_mut()) {
            (Some(script), Some(run)) if run.script == script => run.text.push(c),
            (Some(script), _) => {
                if let Some(run) = current.take() {
                    runs.push(run);
                }
                current = Some(Run {
                    script,
                    text: c.to_string(),
                });
            }
            (None, _) => {
                if let Some(run) = current.take() {
                    runs.push(run);
                }
            }
        }
    }

    if let Some(run) = current {
        runs.push(run);
    }
    runs
}

fn strip_hangul_suffix(word: &str) -> &str {
    for suffix in HANGUL_SUFFIXES {
        if let Some(stem) = word.strip_suffix(suffix) {
            if stem.chars().count() >= MIN_MENTION_CHARS {
                return stem;
            }
        }
    }
    word
}

fn is_candidate(token: &str, exclude: &HashSet<String>) -> bool {
    token.chars().count() >= MIN_MENTION_CHARS
        && !token.chars().all(|c| c.is_ascii_digit())
        && !STOP_WORDS.contains(token)
        && !exclude.contains(token)
}

/// Extrae posibles menciones de artistas del texto libre del usuario.
///
/// Heurística: tramos por sistema de escritura; en hangul/CJK cada palabra es un
/// candidato (sin partículas), en latín las palabras no vacías contiguas forman
/// una frase ("play some arctic monkeys songs" → "arctic monkeys"). `exclude`
/// contiene términos ya usados como género o keyword.
pub fn extract_artist_mentions(text: &str, exclude: &HashSet<String>) -> Vec<String> {
    let cleaned = sanitize(&strip_year_expressions(text));
    let mut mentions: Vec<String> = Vec::new();
    let push = |token: String, mentions: &mut Vec<String>| {
        if is_candidate(&token, exclude) && !mentions.contains(&token) {
            mentions.push(token);
        }
    };

    for run in script_runs(&cleaned) {
        match run.script {
            Script::Hangul | Script::Cjk => {
                for word in run.text.split_whitespace() {
                    let word = strip_hangul_suffix(word);
                    push(word.to_string(), &mut mentions);
                }
            }
            Script::Latin => {
                let mut phrase: Vec<&str> = Vec::new();
                for word in run.text.split_whitespace() {
                    let bare = word.trim_matches('.');
                    let breaks_phrase = STOP_WORDS.contains(bare)
                        || exclude.contains(bare)
                        || bare.chars().all(|c| c.is_ascii_digit());
                    if breaks_phrase {
                        if !phrase.is_empty() {
                            push(phrase.join(" "), &mut mentions);
                            phrase.clear();
                        }
                    } else if !bare.is_empty() {
                        phrase.push(bare);
                    }
                }
                if !phrase.is_empty() {
                    push(phrase.join(" "), &mut mentions);
                }
            }
        }
    }

    mentions.truncate(MAX_MENTIONS);
    mentions
}

/// Artistas resueltos contra el catálogo
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedArtists {
    pub artist_ids: Vec<String>,
    pub top_track_ids: Vec<String>,
    /// Nombres canónicos para confirmar al usuario
    pub names: Vec<String>,
    /// Términos sin artista (sin resultados o con error)
    pub unresolved: Vec<String>,
}

/// Resuelve menciones de artistas a ids del catálogo, con caché por nombre saneado.
pub struct ArtistResolver<'a> {
    catalog: &'a dyn CatalogClient,
    cache: &'a TtlCache<String, ArtistSeed>,
    ttl: Duration,
    call_timeout: Duration,
}

impl<'a> ArtistResolver<'a> {
    pub fn new(
        catalog: &'a dyn CatalogClient,
        cache: &'a TtlCache<String, ArtistSeed>,
        ttl: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            cache,
            ttl,
            call_timeout,
        }
    }

    pub async fn resolve(&self, terms: &[String], cancel: &CancellationToken) -> ResolvedArtists {
        let mut seeds: Vec<ArtistSeed> = Vec::new();
        let mut seen_keys: HashSet<String> = HashSet::new();
        let mut unresolved = Vec::new();

        for term in terms {
            if seeds.len() >= STOP_AFTER_DISTINCT {
                break;
            }
            if cancel.is_cancelled() {
                debug!("🛑 Resolución de artistas cancelada");
                break;
            }

            let key = sanitize(term);
            if key.is_empty() || !seen_keys.insert(key.clone()) {
                continue;
            }

            let seed = match self.cache.get(&key) {
                Some(seed) => {
                    debug!("✅ Cache hit para artista: '{}'", key);
                    seed
                }
                None => match self.lookup(&key).await {
                    Ok(Some(seed)) => {
                        self.cache.insert_with_ttl(key.clone(), seed.clone(), self.ttl);
                        seed
                    }
                    Ok(None) => {
                        debug!("🔍 Sin artista para: '{}'", key);
                        unresolved.push(term.clone());
                        continue;
                    }
                    Err(e) => {
                        warn!("⚠️ Búsqueda de artista '{}' falló: {}", key, e);
                        unresolved.push(term.clone());
                        continue;
                    }
                },
            };

            if !seeds.iter().any(|s| s.artist_id == seed.artist_id) {
                seeds.push(seed);
            }
        }

        let mut resolved = ResolvedArtists {
            unresolved,
            ..Default::default()
        };
        for seed in seeds {
            if resolved.artist_ids.len() < MAX_ARTIST_IDS {
                resolved.artist_ids.push(seed.artist_id.clone());
            }
            if let Some(track_id) = seed.top_track_id {
                if resolved.top_track_ids.len() < MAX_TOP_TRACK_IDS
                    && !resolved.top_track_ids.contains(&track_id)
                {
                    resolved.top_track_ids.push(track_id);
                }
            }
            if resolved.names.len() < MAX_NAMES && !resolved.names.contains(&seed.canonical_name) {
                resolved.names.push(seed.canonical_name);
            }
        }

        info!(
            "🎤 Artistas resueltos: {:?} ({} sin resolver)",
            resolved.names,
            resolved.unresolved.len()
        );
        resolved
    }

    async fn lookup(&self, name: &str) -> Result<Option<ArtistSeed>, CatalogError> {
        let hits = timeout(self.call_timeout, self.catalog.search_artists(name))
            .await
            .map_err(|_| CatalogError::Timeout(self.call_timeout))??;

        let Some(artist) = hits.into_iter().next() else {
            return Ok(None);
        };

        let top_tracks = timeout(
            self.call_timeout,
            self.catalog.get_artist_top_tracks(&artist.id),
        )
        .await
        .map_err(|_| CatalogError::Timeout(self.call_timeout))??;

        Ok(Some(ArtistSeed {
            artist_id: artist.id,
            top_track_id: top_tracks.into_iter().next().map(|track| track.id),
            canonical_name: artist.name,
        }))
    }
}
