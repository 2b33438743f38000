//! Application state and service initialization
//!
//! This module centralizes all service initialization and dependency injection,
//! making it easier to manage the application lifecycle and test services.

use std::sync::Arc;

use sqlx::PgPool;

use crate::db::repository::AlertRepository;
use crate::model::Config;
use crate::notify::{NotificationChannel, SlackChannel};
use crate::provider::build_provider;
use crate::service::{
    CorrelationEngine, DeduplicationFilter, DeliveryCoordinator, ExplanationCache, IngestFilter,
    PipelineOrchestrator,
};
use crate::similarity::WeaviateClient;

/// Application state containing all services and shared resources
///
/// This struct centralizes service initialization and makes it easy to inject
/// dependencies into Actix-web handlers.
pub struct AppState {
    /// Database connection pool
    pub db_pool: PgPool,
    /// Redis explanation cache (optional)
    pub cache: Option<ExplanationCache>,
    /// Alert persistence
    pub repository: AlertRepository,
    /// Dedup map shared across pipeline runs
    pub dedup: Arc<DeduplicationFilter>,
    /// The per-alert processing pipeline
    pub pipeline: Arc<PipelineOrchestrator>,
}

impl AppState {
    /// Initialize all services and build application state
    ///
    /// This performs:
    /// 1. Database connection and schema initialization
    /// 2. Redis cache initialization (optional)
    /// 3. Completion provider initialization (requires the provider's API key)
    /// 4. Service dependency graph construction
    pub async fn new(config: &Config) -> Result<Self, AppError> {
        // Initialize PostgreSQL database
        let db_pool = crate::db::create_pool()
            .await
            .map_err(|e| AppError::DatabaseInit(e.to_string()))?;

        // Initialize database schema
        crate::db::init_schema(&db_pool)
            .await
            .map_err(|e| AppError::DatabaseInit(e.to_string()))?;

        // Initialize Redis cache (optional - will log warning if Redis is unavailable)
        let cache = match ExplanationCache::new().await {
            Ok(cache) => {
                tracing::info!("Redis explanation cache enabled");
                Some(cache)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis cache unavailable, running without cache");
                None
            }
        };

        // Completion provider (required)
        let provider =
            build_provider(&config.provider).map_err(|e| AppError::Provider(e.to_string()))?;

        // Notification channels: only the enabled ones participate
        let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();
        if let Some(slack) = SlackChannel::from_config(&config.notify.slack) {
            channels.push(Arc::new(slack));
        }
        if channels.is_empty() {
            tracing::warn!("No notification channel configured, alerts will only be persisted");
        }

        // Historical correlation (optional)
        let correlation = if config.correlation.enabled {
            let similarity = Arc::new(WeaviateClient::new(&config.correlation));
            Some(Arc::new(CorrelationEngine::new(
                similarity,
                &config.correlation,
            )))
        } else {
            tracing::info!("Correlation disabled by configuration");
            None
        };

        let repository = AlertRepository::new(db_pool.clone());
        let dedup = Arc::new(DeduplicationFilter::new(&config.dedup));

        let pipeline = Arc::new(PipelineOrchestrator::new(
            IngestFilter::new(config.filters.clone()),
            Arc::clone(&dedup),
            provider,
            config.provider.clone(),
            correlation,
            DeliveryCoordinator::new(repository.clone(), channels),
            cache.clone(),
        ));

        Ok(Self {
            db_pool,
            cache,
            repository,
            dedup,
            pipeline,
        })
    }
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    /// Database initialization failed
    #[error("Database initialization failed: {0}")]
    DatabaseInit(String),

    /// Completion provider could not be constructed
    #[error("Provider initialization failed: {0}")]
    Provider(String),
}
