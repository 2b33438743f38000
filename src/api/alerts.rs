//! REST API endpoints for stored alerts

use std::sync::Arc;

use actix_web::{get, post, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::error::ApiError;
use crate::db::models::ListAlertsQuery;
use crate::db::repository::AlertRepository;
use crate::model::{AlertRecord, AlertStatus};
use crate::service::PipelineOrchestrator;

/// Query parameters for listing alerts
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListAlertsParams {
    /// Page number (1-indexed, default: 1)
    pub page: Option<u32>,
    /// Page size (default: 20, max: 100)
    pub page_size: Option<u32>,
    /// Filter by status (unread, read, dismissed)
    pub status: Option<String>,
    /// Filter by priority level
    pub priority: Option<String>,
    /// Filter by exact rule name
    pub rule: Option<String>,
}

/// Paginated response for alerts
#[derive(Debug, Serialize, ToSchema)]
pub struct AlertListResponse {
    pub alerts: Vec<AlertRecord>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: i64,
    pub total_pages: u32,
}

/// Body for single and bulk status updates
#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusUpdateRequest {
    pub status: AlertStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkStatusUpdateRequest {
    pub ids: Vec<i64>,
    pub status: AlertStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkStatusUpdateResponse {
    pub updated: u64,
}

/// Query parameters for the statistics endpoint
#[derive(Debug, Deserialize, IntoParams)]
pub struct StatisticsParams {
    /// Inclusive lower bound (RFC 3339)
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound (RFC 3339)
    pub until: Option<DateTime<Utc>>,
}

/// List alerts with pagination and filters
#[utoipa::path(
    get,
    path = "/v1/alerts",
    params(ListAlertsParams),
    responses(
        (status = 200, description = "Alerts retrieved successfully", body = AlertListResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "alerts"
)]
#[get("/v1/alerts")]
pub async fn list_alerts(
    repository: web::Data<AlertRepository>,
    query: web::Query<ListAlertsParams>,
) -> Result<HttpResponse, ApiError> {
    let db_query = ListAlertsQuery {
        page: query.page,
        page_size: query.page_size,
        status: query.status.clone(),
        priority: query.priority.clone(),
        rule: query.rule.clone(),
    };

    let paginated = repository.list(db_query).await?;

    Ok(HttpResponse::Ok().json(AlertListResponse {
        alerts: paginated.alerts,
        page: paginated.page,
        page_size: paginated.page_size,
        total_count: paginated.total_count,
        total_pages: paginated.total_pages,
    }))
}

/// Get one alert by id
#[utoipa::path(
    get,
    path = "/v1/alerts/{id}",
    params(("id" = i64, Path, description = "Alert id")),
    responses(
        (status = 200, description = "Alert retrieved successfully", body = AlertRecord),
        (status = 404, description = "Alert not found")
    ),
    tag = "alerts"
)]
#[get("/v1/alerts/{id}")]
pub async fn get_alert(
    repository: web::Data<AlertRepository>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let record = repository.get_by_id(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Update the status of one alert
#[utoipa::path(
    post,
    path = "/v1/alerts/{id}/status",
    params(("id" = i64, Path, description = "Alert id")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status updated"),
        (status = 404, description = "Alert not found")
    ),
    tag = "alerts"
)]
#[post("/v1/alerts/{id}/status")]
pub async fn update_alert_status(
    repository: web::Data<AlertRepository>,
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    let updated = repository.update_status(id, body.status).await?;
    if !updated {
        return Err(ApiError::AlertNotFound(id.to_string()));
    }

    tracing::info!(id = id, status = %body.status, "Alert status updated");
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "id": id,
        "status": body.status,
    })))
}

/// Update the status of many alerts at once
#[utoipa::path(
    post,
    path = "/v1/alerts/status",
    request_body = BulkStatusUpdateRequest,
    responses(
        (status = 200, description = "Statuses updated", body = BulkStatusUpdateResponse),
        (status = 400, description = "Empty id list")
    ),
    tag = "alerts"
)]
#[post("/v1/alerts/status")]
pub async fn bulk_update_alert_status(
    repository: web::Data<AlertRepository>,
    body: web::Json<BulkStatusUpdateRequest>,
) -> Result<HttpResponse, ApiError> {
    if body.ids.is_empty() {
        return Err(ApiError::Validation("ids must not be empty".to_string()));
    }

    let updated = repository.bulk_update_status(&body.ids, body.status).await?;

    Ok(HttpResponse::Ok().json(BulkStatusUpdateResponse { updated }))
}

/// Re-run enrichment for an existing alert
///
/// Overwrites the stored explanation and marks the alert processed.
/// Concurrent reprocess calls for the same id are serialized.
#[utoipa::path(
    post,
    path = "/v1/alerts/{id}/reprocess",
    params(("id" = i64, Path, description = "Alert id")),
    responses(
        (status = 200, description = "Alert reprocessed", body = AlertRecord),
        (status = 404, description = "Alert not found")
    ),
    tag = "alerts"
)]
#[post("/v1/alerts/{id}/reprocess")]
pub async fn reprocess_alert(
    pipeline: web::Data<Arc<PipelineOrchestrator>>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let record = pipeline.reprocess(id).await?;

    tracing::info!(id = id, rule = %record.rule, "Alert reprocessed");
    Ok(HttpResponse::Ok().json(record))
}

/// Alert counts grouped by status
#[utoipa::path(
    get,
    path = "/v1/alerts/counts",
    responses(
        (status = 200, description = "Counts retrieved", body = crate::db::models::StatusCounts)
    ),
    tag = "alerts"
)]
#[get("/v1/alerts/counts")]
pub async fn alert_counts(
    repository: web::Data<AlertRepository>,
) -> Result<HttpResponse, ApiError> {
    let counts = repository.count_by_status().await?;
    Ok(HttpResponse::Ok().json(counts))
}

/// Aggregate statistics by priority and rule over a time range
#[utoipa::path(
    get,
    path = "/v1/alerts/stats",
    params(StatisticsParams),
    responses(
        (status = 200, description = "Statistics retrieved", body = crate::db::models::AlertStatistics)
    ),
    tag = "alerts"
)]
#[get("/v1/alerts/stats")]
pub async fn alert_statistics(
    repository: web::Data<AlertRepository>,
    query: web::Query<StatisticsParams>,
) -> Result<HttpResponse, ApiError> {
    let stats = repository.statistics(query.since, query.until).await?;
    Ok(HttpResponse::Ok().json(stats))
}

/// Configure alert routes
///
/// The collection-level routes must register before the `{id}` routes so
/// `/v1/alerts/counts` and `/v1/alerts/stats` match literally.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_alerts)
        .service(alert_counts)
        .service(alert_statistics)
        .service(bulk_update_alert_status)
        .service(get_alert)
        .service(update_alert_status)
        .service(reprocess_alert);
}
