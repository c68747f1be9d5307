use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use super::years::strip_year_expressions;
use crate::cache::TtlCache;
use crate::catalog::CatalogClient;

/// Vocabulario fijo cuando el catálogo no entrega seeds vivos.
/// Los dos primeros se inyectan si ningún término resuelve.
pub const FALLBACK_SEEDS: &[&str] = &[
    "pop", "rock", "hip-hop", "k-pop", "r-n-b", "indie", "jazz", "electronic", "dance",
    "acoustic", "classical", "metal", "folk", "soul", "blues", "country", "latin", "reggae",
    "punk", "ambient", "alt-rock", "hard-rock", "edm", "house", "j-pop", "funk", "disco",
    "chill", "soundtrack", "piano",
];

pub const MAX_SEEDS: usize = 3;
const FALLBACK_INJECTED: usize = 2;
const MAX_NORMALIZED_DISTANCE: f64 = 0.4;
const MIN_SUBSTRING_LEN: usize = 3;

/// Alias curados (ya saneados) → seed canónico
static GENRE_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // rock
        ("록", "rock"),
        ("락", "rock"),
        ("rock n roll", "rock"),
        ("rock and roll", "rock"),
        ("rocknroll", "rock"),
        ("rock en espanol", "rock"),
        ("밴드", "rock"),
        ("얼터너티브", "alt-rock"),
        ("alternative", "alt-rock"),
        ("alternative rock", "alt-rock"),
        ("하드록", "hard-rock"),
        ("메탈", "metal"),
        ("heavy metal", "metal"),
        ("펑크록", "punk"),
        // hip-hop
        ("힙합", "hip-hop"),
        ("hiphop", "hip-hop"),
        ("hip hop", "hip-hop"),
        ("rap", "hip-hop"),
        ("랩", "hip-hop"),
        ("trap", "hip-hop"),
        // r&b / soul
        ("r&b", "r-n-b"),
        ("rnb", "r-n-b"),
        ("r and b", "r-n-b"),
        ("알앤비", "r-n-b"),
        ("소울", "soul"),
        // pop
        ("케이팝", "k-pop"),
        ("kpop", "k-pop"),
        ("k pop", "k-pop"),
        ("아이돌", "k-pop"),
        ("가요", "k-pop"),
        ("팝", "pop"),
        ("발라드", "pop"),
        ("ballad", "pop"),
        ("제이팝", "j-pop"),
        ("jpop", "j-pop"),
        // electronic
        ("일렉", "electronic"),
        ("일렉트로닉", "electronic"),
        ("electronica", "electronic"),
        ("electronico", "electronic"),
        ("musica electronica", "electronic"),
        ("이디엠", "edm"),
        ("하우스", "house"),
        ("댄스", "dance"),
        ("baile", "dance"),
        // acoustic / chill
        ("어쿠스틱", "acoustic"),
        ("acustico", "acoustic"),
        ("lofi", "chill"),
        ("lo-fi", "chill"),
        ("로파이", "chill"),
        ("잔잔한", "chill"),
        // other
        ("재즈", "jazz"),
        ("클래식", "classical"),
        ("classic", "classical"),
        ("musica clasica", "classical"),
        ("포크", "folk"),
        ("인디", "indie"),
        ("블루스", "blues"),
        ("컨트리", "country"),
        ("라틴", "latin"),
        ("latino", "latin"),
        ("레게", "reggae"),
        ("디스코", "disco"),
        ("앰비언트", "ambient"),
        ("피아노", "piano"),
        ("ost", "soundtrack"),
        ("사운드트랙", "soundtrack"),
        ("영화음악", "soundtrack"),
    ])
});

/// Minúsculas, sin diacríticos, espacios colapsados.
///
/// La recomposición NFC final es necesaria: NFKD separa las sílabas hangul en jamo.
pub fn sanitize(term: &str) -> String {
    let stripped: String = term
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .nfc()
        .collect();

    stripped
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Espacios y puntuación colapsados a guiones: "Alt Rock!" → "alt-rock"
pub fn slugify(term: &str) -> String {
    let mut slug = String::with_capacity(term.len());
    let mut pending_dash = false;

    for c in term.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Seeds resueltos más los términos que no resolvieron (pasan a ser keywords)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedGenres {
    pub seeds: Vec<String>,
    pub unmatched: Vec<String>,
    /// Fragmentos saneados que resolvieron a algún seed (término completo o palabra suelta)
    pub matched: Vec<String>,
    /// Los seeds vienen del fallback porque ningún término resolvió
    pub used_fallback: bool,
}

/// Mapea términos libres de género al vocabulario de seeds del catálogo.
#[derive(Debug, Clone)]
pub struct GenreNormalizer {
    vocabulary: Vec<String>,
}

impl GenreNormalizer {
    pub fn new(vocabulary: Vec<String>) -> Self {
        let mut normalized: Vec<String> = Vec::with_capacity(vocabulary.len());
        for entry in vocabulary {
            let entry = entry.trim().to_lowercase();
            if !entry.is_empty() && !normalized.contains(&entry) {
                normalized.push(entry);
            }
        }
        Self {
            vocabulary: normalized,
        }
    }

    pub fn with_fallback_vocabulary() -> Self {
        Self::new(FALLBACK_SEEDS.iter().map(|s| s.to_string()).collect())
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn normalize(&self, terms: &[String]) -> NormalizedGenres {
        let mut seeds: Vec<String> = Vec::new();
        let mut unmatched: Vec<String> = Vec::new();
        let mut matched: Vec<String> = Vec::new();

        for term in terms {
            let cleaned = sanitize(&strip_year_expressions(term));
            if cleaned.is_empty() {
                continue;
            }

            let resolved = self.resolve_term_or_words(&cleaned);
            if resolved.is_empty() {
                debug!("🔍 Género sin coincidencia: '{}'", cleaned);
                if !unmatched.contains(&cleaned) {
                    unmatched.push(cleaned);
                }
                continue;
            }

            for (fragment, seed) in resolved {
                if !matched.contains(&fragment) {
                    matched.push(fragment);
                }
                if !seeds.contains(&seed) {
                    seeds.push(seed);
                }
            }
        }

        seeds.truncate(MAX_SEEDS);
        unmatched.retain(|term| !seeds.contains(term));

        let used_fallback = seeds.is_empty();
        if used_fallback {
            seeds = FALLBACK_SEEDS
                .iter()
                .take(FALLBACK_INJECTED)
                .map(|s| s.to_string())
                .collect();
        }

        NormalizedGenres {
            seeds,
            unmatched,
            matched,
            used_fallback,
        }
    }

    /// Término completo primero; si falla, palabra por palabra ("90년대 록" → "록")
    /// Devuelve pares (fragmento que resolvió, seed)
    fn resolve_term_or_words(&self, term: &str) -> Vec<(String, String)> {
        let words: Vec<&str> = term.split_whitespace().collect();

        if let Some(seed) = self.resolve_term(term) {
            // "rock like radiohead" resuelve entero, pero solo "rock" es género
            let fragments: Vec<&str> = if words.len() < 2 {
                Vec::new()
            } else {
                words
                    .iter()
                    .copied()
                    .filter(|word| self.resolve_term(word).is_some())
                    .collect()
            };
            if fragments.is_empty() {
                return vec![(term.to_string(), seed)];
            }
            return fragments
                .into_iter()
                .map(|word| (word.to_string(), seed.clone()))
                .collect();
        }

        if words.len() < 2 {
            return Vec::new();
        }

        let mut resolved: Vec<(String, String)> = Vec::new();
        for word in words {
            if let Some(seed) = self.resolve_term(word) {
                resolved.push((word.to_string(), seed));
            }
        }
        resolved
    }

    /// Resuelve un término ya saneado a un seed del vocabulario
    pub fn resolve_term(&self, term: &str) -> Option<String> {
        if term.is_empty() {
            return None;
        }

        if let Some(target) = GENRE_ALIASES.get(term) {
            if self.contains(target) {
                return Some(target.to_string());
            }
        }

        if self.contains(term) {
            return Some(term.to_string());
        }

        let slug = slugify(term);
        if slug.is_empty() {
            return None;
        }
        if self.contains(&slug) {
            return Some(slug);
        }

        if let Some(seed) = self.substring_match(&slug) {
            return Some(seed);
        }

        self.fuzzy_match(&slug)
    }

    fn contains(&self, entry: &str) -> bool {
        self.vocabulary.iter().any(|v| v == entry)
    }

    fn substring_match(&self, slug: &str) -> Option<String> {
        if slug.chars().count() < MIN_SUBSTRING_LEN {
            return None;
        }

        // Entrada contenida en el término: gana la más larga ("indie-rock-music" → "indie")
        let contained = self
            .vocabulary
            .iter()
            .filter(|entry| entry.chars().count() >= MIN_SUBSTRING_LEN && slug.contains(entry.as_str()))
            .fold(None::<&String>, |best, entry| match best {
                Some(current) if current.len() >= entry.len() => Some(current),
                _ => Some(entry),
            });
        if let Some(entry) = contained {
            return Some(entry.clone());
        }

        // Término contenido en una entrada: gana la más corta ("hop" → "hip-hop")
        self.vocabulary
            .iter()
            .filter(|entry| entry.contains(slug))
            .fold(None::<&String>, |best, entry| match best {
                Some(current) if current.len() <= entry.len() => Some(current),
                _ => Some(entry),
            })
            .cloned()
    }

    fn fuzzy_match(&self, slug: &str) -> Option<String> {
        let term_len = slug.chars().count();

        self.vocabulary
            .iter()
            .map(|entry| {
                let longest = term_len.max(entry.chars().count()).max(1);
                let distance = strsim::levenshtein(slug, entry) as f64 / longest as f64;
                (entry, distance)
            })
            .filter(|(_, distance)| *distance <= MAX_NORMALIZED_DISTANCE)
            .fold(None::<(&String, f64)>, |best, candidate| match best {
                Some(current) if current.1 <= candidate.1 => Some(current),
                _ => Some(candidate),
            })
            .map(|(entry, _)| entry.clone())
    }
}

/// Vocabulario de seeds: caché → catálogo → lista fija. Nunca falla.
pub async fn resolve_vocabulary(
    catalog: &dyn CatalogClient,
    cache: &TtlCache<(), Vec<String>>,
    ttl: Duration,
    call_timeout: Duration,
) -> GenreNormalizer {
    if let Some(seeds) = cache.get(&()) {
        debug!("✅ Cache hit para vocabulario de géneros ({} seeds)", seeds.len());
        return GenreNormalizer::new(seeds);
    }

    match timeout(call_timeout, catalog.available_genre_seeds()).await {
        Ok(Ok(seeds)) if !seeds.is_empty() => {
            info!("🎼 Vocabulario de géneros obtenido del catálogo: {} seeds", seeds.len());
            let normalizer = GenreNormalizer::new(seeds);
            cache.insert_with_ttl((), normalizer.vocabulary().to_vec(), ttl);
            normalizer
        }
        Ok(Ok(_)) => {
            warn!("⚠️ El catálogo devolvió un vocabulario vacío, usando lista fija");
            GenreNormalizer::with_fallback_vocabulary()
        }
        Ok(Err(e)) => {
            warn!("⚠️ No se pudo obtener el vocabulario de géneros: {}", e);
            GenreNormalizer::with_fallback_vocabulary()
        }
        Err(_) => {
            warn!("⏰ Timeout obteniendo el vocabulario de géneros");
            GenreNormalizer::with_fallback_vocabulary()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::catalog::fake::FakeCatalog;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn terms(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn normalizer() -> GenreNormalizer {
        GenreNormalizer::with_fallback_vocabulary()
    }

    #[test]
    fn sanitize_strips_diacritics_and_keeps_hangul() {
        assert_eq!(sanitize("  Electrónica  "), "electronica");
        assert_eq!(sanitize("록"), "록");
        assert_eq!(sanitize("Música   Clásica"), "musica clasica");
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Alt Rock!"), "alt-rock");
        assert_eq!(slugify("hip  hop"), "hip-hop");
        assert_eq!(slugify("--"), "");
    }

    #[test]
    fn cross_language_aliases_resolve_to_one_seed() {
        let result = normalizer().normalize(&terms(&["록", "락", "Rock"]));
        assert_eq!(result.seeds, vec!["rock".to_string()]);
        assert!(result.unmatched.is_empty());
        assert!(!result.used_fallback);
    }

    #[test]
    fn year_words_are_ignored_and_words_are_retried() {
        let result = normalizer().normalize(&terms(&["90년대 록"]));
        assert_eq!(result.seeds, vec!["rock".to_string()]);
        assert_eq!(result.matched, vec!["록".to_string()]);
    }

    #[test]
    fn only_resolved_fragments_are_reported_as_matched() {
        let result = normalizer().normalize(&terms(&["Radiohead", "jazz"]));
        assert_eq!(result.seeds, vec!["jazz".to_string()]);
        assert_eq!(result.matched, vec!["jazz".to_string()]);
        assert_eq!(result.unmatched, vec!["radiohead".to_string()]);

        let result = normalizer().normalize(&terms(&["rock like radiohead"]));
        assert_eq!(result.seeds, vec!["rock".to_string()]);
        assert_eq!(result.matched, vec!["rock".to_string()]);

        let result = normalizer().normalize(&terms(&["hip hop"]));
        assert_eq!(result.seeds, vec!["hip-hop".to_string()]);
    }

    #[test]
    fn fuzzy_distance_limit_is_inclusive() {
        // 2 ediciones sobre 5 caracteres: 0.4 exacto
        let n = GenreNormalizer::new(terms(&["abcde"]));
        assert_eq!(n.resolve_term("abcxy"), Some("abcde".to_string()));
        // 5 ediciones sobre 12 caracteres: ~0.417
        let n = GenreNormalizer::new(terms(&["abcdefghijkl"]));
        assert_eq!(n.resolve_term("abcdefgvwxyz"), None);
    }

    #[test]
    fn slug_substring_and_fuzzy_steps() {
        let n = normalizer();
        assert_eq!(n.resolve_term("alt rock"), Some("alt-rock".to_string()));
        assert_eq!(n.resolve_term("indie-music"), Some("indie".to_string()));
        assert_eq!(n.resolve_term("hop"), Some("hip-hop".to_string()));
        assert_eq!(n.resolve_term("jaz"), Some("jazz".to_string()));
        assert_eq!(n.resolve_term("clasical"), Some("classical".to_string()));
        assert_eq!(n.resolve_term("zzzzzz"), None);
    }

    #[test]
    fn unmatched_terms_fall_back_to_default_seeds() {
        let result = normalizer().normalize(&terms(&["드라이브할때"]));
        assert_eq!(result.seeds, vec!["pop".to_string(), "rock".to_string()]);
        assert_eq!(result.unmatched, vec!["드라이브할때".to_string()]);
        assert!(result.used_fallback);
    }

    #[test]
    fn seeds_are_capped_and_deduplicated() {
        let result =
            normalizer().normalize(&terms(&["jazz", "재즈", "rock", "hip hop", "metal"]));
        assert_eq!(
            result.seeds,
            vec!["jazz".to_string(), "rock".to_string(), "hip-hop".to_string()]
        );
    }

    #[test]
    fn alias_targets_outside_the_vocabulary_are_not_used() {
        let n = GenreNormalizer::new(terms(&["rock", "jazz"]));
        assert_eq!(n.resolve_term("힙합"), None);
        assert_eq!(n.resolve_term("록"), Some("rock".to_string()));
    }

    #[test]
    fn resolved_seeds_always_belong_to_the_vocabulary() {
        let n = normalizer();
        let inputs = terms(&["록", "electro", "chil", "r&b", "k pop", "soundtrack music", "xyz"]);
        let result = n.normalize(&inputs);

        for seed in &result.seeds {
            assert!(n.vocabulary().contains(seed), "{seed} not in vocabulary");
        }
        for term in &result.unmatched {
            assert!(!result.seeds.contains(term));
        }
        assert_eq!(result, n.normalize(&inputs));
    }

    #[tokio::test]
    async fn vocabulary_falls_back_when_catalog_fails() {
        let cache = TtlCache::new(Arc::new(ManualClock::new()));
        let catalog = FakeCatalog::new();

        let n = resolve_vocabulary(&catalog, &cache, Duration::from_secs(3600), Duration::from_secs(1)).await;

        assert_eq!(n.vocabulary().len(), FALLBACK_SEEDS.len());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn live_vocabulary_is_cached_until_expiry() {
        let clock = ManualClock::new();
        let cache = TtlCache::new(Arc::new(clock.clone()));
        let catalog = FakeCatalog::new().with_seeds(&["Rock", "k-pop"]);

        let n = resolve_vocabulary(&catalog, &cache, Duration::from_secs(3600), Duration::from_secs(1)).await;
        assert_eq!(n.vocabulary(), &["rock".to_string(), "k-pop".to_string()]);
        assert_eq!(cache.get(&()), Some(vec!["rock".to_string(), "k-pop".to_string()]));

        clock.advance(Duration::from_secs(3601));
        assert_eq!(cache.get(&()), None);
    }
}
