use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::scoring::ScoredTrack;
use crate::catalog::Track;

/// Política de diversificación: caps por artista a probar en orden y
/// relleno mínimo que acepta una pasada.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPolicy {
    pub cap_schedule: Vec<usize>,
    pub min_fill_ratio: f64,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            cap_schedule: vec![1, 2],
            min_fill_ratio: 0.7,
        }
    }
}

impl SelectionPolicy {
    /// Ordena por score y selecciona con el primer cap que llena lo suficiente.
    ///
    /// Si ningún cap llega al relleno mínimo se queda la pasada del último cap.
    pub fn select(&self, mut scored: Vec<ScoredTrack>, limit: usize) -> Vec<Track> {
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let min_fill = self.min_fill_ratio * limit as f64;
        let mut selected = Vec::new();

        for (pass, &cap) in self.cap_schedule.iter().enumerate() {
            selected = greedy_pass(&scored, limit, cap);
            debug!(
                "🎚️ Pasada {} (cap {} por artista): {}/{} tracks",
                pass + 1,
                cap,
                selected.len(),
                limit
            );
            if selected.len() as f64 >= min_fill {
                break;
            }
        }

        info!("✅ Seleccionados {} de {} candidatos", selected.len(), scored.len());
        selected
    }
}

/// Selección voraz con un máximo de `cap` tracks por artista principal
fn greedy_pass(scored: &[ScoredTrack], limit: usize, cap: usize) -> Vec<Track> {
    let mut per_artist: HashMap<String, usize> = HashMap::new();
    let mut ids: HashSet<&str> = HashSet::new();
    let mut selected = Vec::with_capacity(limit);

    for candidate in scored {
        if selected.len() >= limit {
            break;
        }
        if ids.contains(candidate.track.id.as_str()) {
            continue;
        }

        let count = per_artist
            .entry(candidate.track.primary_artist_key())
            .or_insert(0);
        if *count >= cap {
            continue;
        }

        *count += 1;
        ids.insert(candidate.track.id.as_str());
        selected.push(candidate.track.clone());
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommend::scoring::ScoreBreakdown;
    use pretty_assertions::assert_eq;

    fn scored(id: &str, artist: &str, score: f64) -> ScoredTrack {
        ScoredTrack {
            track: Track::new(id, id).with_artist(artist, artist),
            score,
            breakdown: ScoreBreakdown::default(),
        }
    }

    fn distinct_artists(tracks: &[Track]) -> usize {
        tracks
            .iter()
            .map(|t| t.primary_artist_key())
            .collect::<HashSet<_>>()
            .len()
    }

    #[test]
    fn many_artists_fill_the_limit_with_one_track_each() {
        let pool: Vec<ScoredTrack> = (0..20)
            .map(|i| scored(&format!("t{}", i), &format!("a{}", i), i as f64))
            .collect();

        let selected = SelectionPolicy::default().select(pool, 10);

        assert_eq!(selected.len(), 10);
        assert_eq!(distinct_artists(&selected), 10);
        assert_eq!(selected[0].id, "t19");
    }

    #[test]
    fn few_artists_trigger_the_relaxed_pass() {
        // 4 artistas < 0.5 × 10
        let pool: Vec<ScoredTrack> = (0..20)
            .map(|i| scored(&format!("t{}", i), &format!("a{}", i % 4), 20.0 - i as f64))
            .collect();

        let selected = SelectionPolicy::default().select(pool, 10);

        assert_eq!(selected.len(), 8);
        let ids: HashSet<&str> = selected.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), selected.len());
        assert_eq!(distinct_artists(&selected), 4);
    }

    #[test]
    fn duplicate_ids_are_never_selected() {
        let pool = vec![scored("x", "a1", 3.0), scored("x", "a2", 2.0), scored("y", "a3", 1.0)];

        let selected = SelectionPolicy::default().select(pool, 5);

        let ids: Vec<&str> = selected.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
    }

    #[test]
    fn custom_schedule_is_tried_in_order() {
        let pool: Vec<ScoredTrack> = (0..9)
            .map(|i| scored(&format!("t{}", i), "solo", 9.0 - i as f64))
            .collect();
        let policy = SelectionPolicy {
            cap_schedule: vec![1, 3, 5],
            min_fill_ratio: 0.5,
        };

        assert_eq!(policy.select(pool, 8).len(), 5);
    }

    #[test]
    fn never_exceeds_the_limit() {
        let pool: Vec<ScoredTrack> = (0..5)
            .map(|i| scored(&format!("t{}", i), &format!("a{}", i), 1.0))
            .collect();

        assert_eq!(SelectionPolicy::default().select(pool.clone(), 3).len(), 3);
        assert!(SelectionPolicy::default().select(pool, 0).is_empty());
    }
}
