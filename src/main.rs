//! HK Racing Strategy Statistics Engine
//!
//! REST API and CLI for scoring recommendation strategies against
//! recorded Hong Kong race results.

mod cli;
mod config;
mod parlay;
mod results;
mod routes;
mod scoring;
mod settlement;
mod sources;
mod stats;
mod storage;
mod types;

use axum::{routing::get, routing::post, Router};
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::routes::AppState;
use crate::scoring::ScoringConfig;
use crate::storage::RaceRepository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => run_server(Some(host), Some(port)).await,
        Commands::Import { input } => cli::run_import(input),
        Commands::Stats {
            start,
            end,
            source,
            format,
        } => cli::run_stats(start, end, source, format),
        Commands::Daily {
            start,
            end,
            source,
            format,
        } => cli::run_daily(start, end, source, format),
        Commands::Composite {
            sources,
            start,
            end,
            format,
        } => cli::run_composite(sources, start, end, format),
        Commands::System { start, end, format } => cli::run_system(start, end, format),
        Commands::Parlay {
            start,
            end,
            source,
            top_k,
            legs,
            format,
        } => cli::run_parlay(start, end, source, top_k, legs, format),
        Commands::Score { race_id, format } => cli::run_score(race_id, format),
        Commands::SetPicks {
            strategy_id,
            race_id,
            horses,
        } => cli::run_set_picks(strategy_id, race_id, horses),
        Commands::Adjust {
            race_id,
            horse_no,
            points,
            condition,
        } => cli::run_adjust(race_id, horse_no, points, condition),
    }
}

/// Run the API server.
async fn run_server(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hkrace=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let mut config = AppConfig::load()?;

    // Override with CLI args
    if let Some(h) = host {
        config.server.host = h;
    }
    if let Some(p) = port {
        config.server.port = p;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("Database path: {}", config.database.path);

    let repo = RaceRepository::new(Path::new(&config.database.path))?;
    tracing::info!("Database ready, {} races", repo.get_race_count()?);

    // Load scoring factor table
    let scoring = match &config.scoring.config_file {
        Some(path) => {
            tracing::info!("Loading scoring config from: {}", path);
            match ScoringConfig::from_file(path) {
                Ok(sc) => {
                    tracing::info!("Scoring config loaded, {} factors", sc.factors.len());
                    sc
                }
                Err(e) => {
                    tracing::warn!("Failed to load scoring config: {}, using defaults", e);
                    ScoringConfig::default()
                }
            }
        }
        None => ScoringConfig::default(),
    };

    // Create application state
    let state = Arc::new(AppState {
        repo: Mutex::new(repo),
        scoring,
    });

    // Build router
    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/stats", get(routes::stats))
        .route("/stats/daily", get(routes::daily))
        .route("/stats/composite", post(routes::composite))
        .route("/stats/system", get(routes::system))
        .route("/parlay", get(routes::parlay))
        .route("/score/{race_id}", get(routes::score))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
