use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use open_playlist::{
    Config, GenerationRequest, PreferenceRecord, Recommendation, RecommendationCaches,
    RecommendationPipeline, SpotifyCatalog,
};

/// Genera una playlist a partir de preferencias ya analizadas
#[derive(Parser, Debug)]
#[command(name = "open-playlist")]
#[command(about = "Hybrid playlist recommendations from catalog primitives")]
#[command(version)]
struct Args {
    /// PreferenceRecord en JSON producido por el analizador
    #[arg(long)]
    prefs: Option<PathBuf>,

    /// Número de tracks (por defecto DEFAULT_PLAYLIST_LIMIT)
    #[arg(short, long)]
    limit: Option<usize>,

    /// Token de sesión de usuario; sin él se usan client credentials
    #[arg(long, env = "SPOTIFY_SESSION_TOKEN", hide_env_values = true)]
    session_token: Option<String>,

    /// Sesión cuyos top items siembran la búsqueda
    #[arg(long)]
    session_id: Option<String>,

    /// Imprime el resultado como JSON
    #[arg(long)]
    json: bool,

    /// Texto libre original del usuario
    text: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("open_playlist=debug".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    info!("🎵 Iniciando Open Playlist v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load().context("Failed to load configuration")?;
    info!("{}", config.summary());

    let raw_text = args.text.join(" ");
    let preferences = load_preferences(args.prefs.as_deref(), &raw_text).await?;

    let caches = RecommendationCaches::with_system_clock();
    let mut catalog = SpotifyCatalog::new(config.spotify_settings(), caches.client_token.clone())
        .context("Failed to build the catalog client")?;
    if let Some(token) = args.session_token {
        catalog = catalog.with_session_token(token);
    }

    let pipeline = RecommendationPipeline::new(Arc::new(catalog), caches, config.recommend_settings());

    // Ctrl+C cancela la generación en curso
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ Señal de interrupción recibida, cancelando...");
            signal_cancel.cancel();
        }
    });

    let request = GenerationRequest {
        preferences,
        raw_text,
        limit: args.limit.unwrap_or(config.default_playlist_limit),
        session_id: args.session_id,
    };

    let recommendation = pipeline.generate(request, &cancel).await?;
    pipeline.caches().cleanup_old_entries();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&recommendation)?);
    } else {
        print_playlist(&recommendation);
    }

    Ok(())
}

/// Sin `--prefs`, el texto libre hace de término de género
async fn load_preferences(path: Option<&std::path::Path>, raw_text: &str) -> Result<PreferenceRecord> {
    let Some(path) = path else {
        let genres = if raw_text.trim().is_empty() {
            Vec::new()
        } else {
            vec![raw_text.to_string()]
        };
        return Ok(PreferenceRecord {
            genres,
            ..Default::default()
        });
    };

    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read preferences from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid preference record in {}", path.display()))
}

fn print_playlist(recommendation: &Recommendation) {
    println!(
        "🎼 Géneros: {}",
        recommendation.genre_seeds.join(", ")
    );
    if let Some(range) = recommendation.year_range {
        println!("📅 Años: {}-{}", range.from, range.to);
    }
    if !recommendation.resolved_artists.is_empty() {
        println!("🎤 Artistas: {}", recommendation.resolved_artists.join(", "));
    }
    println!();

    for (index, track) in recommendation.tracks.iter().enumerate() {
        let year = track
            .release_year
            .map(|y| format!(" ({})", y))
            .unwrap_or_default();
        println!(
            "{:>2}. {} - {}{}",
            index + 1,
            track.artists.join(", "),
            track.name,
            year
        );
    }
}
