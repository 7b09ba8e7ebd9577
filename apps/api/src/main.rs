mod auth;
mod config;
mod errors;
mod feed;
mod ideas;
mod jobs;
mod llm_client;
mod models;
mod projects;
mod routes;
mod state;
mod store;
mod uploads;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::ideas::recommend::Recommender;
use crate::jobs::skills::SkillCatalog;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CareerHub API v{}", env!("CARGO_PKG_VERSION"));

    tokio::fs::create_dir_all(&config.data_dir).await?;
    tokio::fs::create_dir_all(&config.upload_dir).await?;
    info!(
        "Data in {}, uploads in {}",
        config.data_dir.display(),
        config.upload_dir.display()
    );

    let recommender = Recommender::from_config(&config)?;
    let skills = SkillCatalog::load(&config.skills_csv, &config.skills_file);

    let state = AppState::new(config.clone(), recommender, skills);
    state.stores.ideas.ensure_exists().await?;
    info!(
        "Recommendation mode: {}",
        if state.recommender.is_live() { "live" } else { "offline fallback" }
    );

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
