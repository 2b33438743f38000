//! HTTP API surface

pub mod alerts;
pub mod error;
pub mod health;
pub mod ingest;
pub mod openapi;

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Alert Triage Agent API",
        description = "Security alert ingestion, enrichment, correlation, and management"
    ),
    paths(
        ingest::ingest_event,
        alerts::list_alerts,
        alerts::get_alert,
        alerts::update_alert_status,
        alerts::bulk_update_alert_status,
        alerts::reprocess_alert,
        alerts::alert_counts,
        alerts::alert_statistics,
        health::liveness,
        health::readiness,
    ),
    tags(
        (name = "events", description = "Webhook ingestion"),
        (name = "alerts", description = "Stored alert management"),
        (name = "health", description = "Service health probes")
    )
)]
pub struct ApiDoc;
