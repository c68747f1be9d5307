use std::collections::HashMap;
use tracing::{debug, warn};

use super::bounded::{BoundedRunner, Settled};
use crate::catalog::CatalogClient;

/// Límite de ids por petición del catálogo
pub const ARTIST_BATCH_SIZE: usize = 50;

/// Tags de género por id de artista. Una entrada ausente significa "sin señal".
pub type ArtistGenres = HashMap<String, Vec<String>>;

/// Obtiene los tags de género de los artistas del pool, por lotes.
///
/// Si cualquier lote falla se devuelve un mapa vacío: el scorer trata la
/// ausencia como falta de señal, nunca como error.
pub async fn enrich_genres(
    catalog: &dyn CatalogClient,
    runner: &BoundedRunner,
    artist_ids: &[String],
) -> ArtistGenres {
    if artist_ids.is_empty() {
        return ArtistGenres::new();
    }

    let batches: Vec<Vec<String>> = artist_ids
        .chunks(ARTIST_BATCH_SIZE)
        .map(|chunk| chunk.to_vec())
        .collect();
    let batch_count = batches.len();

    let results = runner
        .run_all(batches, |batch| async move {
            catalog.get_artists_genres(&batch).await
        })
        .await;

    let mut genres = ArtistGenres::with_capacity(artist_ids.len());
    for (index, settled) in results.into_iter().enumerate() {
        match settled {
            Settled::Done(batch) => genres.extend(batch),
            Settled::Skipped { reason } => {
                warn!(
                    "⚠️ Lote de géneros {}/{} falló, se descarta el enriquecimiento: {}",
                    index + 1,
                    batch_count,
                    reason
                );
                return ArtistGenres::new();
            }
        }
    }

    debug!(
        "🏷️ Géneros obtenidos para {}/{} artistas en {} lotes",
        genres.len(),
        artist_ids.len(),
        batch_count
    );
    genres
}
