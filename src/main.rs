use std::time::Duration;

use actix_web::{web, App, HttpServer};
use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod app;
mod db;
mod model;
mod notify;
mod provider;
mod service;
mod similarity;

use app::AppState;
use model::Config;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (ignore if missing)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let bind_addr = config.bind_addr();

    let state = match AppState::new(&config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize application");
            return Err(std::io::Error::other(e.to_string()));
        }
    };

    // Background sweep keeps the dedup map bounded
    if config.dedup.enabled {
        let dedup = state.dedup.clone();
        let period = Duration::from_secs(config.dedup.sweep_interval_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                dedup.evict_expired(Utc::now());
            }
        });
    }

    let db_pool = web::Data::new(state.db_pool.clone());
    let cache = web::Data::new(state.cache.clone());
    let repository = web::Data::new(state.repository.clone());
    let pipeline = web::Data::new(state.pipeline.clone());

    tracing::info!("Starting Alert Triage Agent server on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(db_pool.clone())
            .app_data(cache.clone())
            .app_data(repository.clone())
            .app_data(pipeline.clone())
            .configure(api::ingest::configure)
            .configure(api::alerts::configure)
            .configure(api::health::configure)
            .configure(api::openapi::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await
}
