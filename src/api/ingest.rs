//! Webhook ingest endpoint

use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::{post, web, HttpMessage, HttpRequest, HttpResponse};
use serde::Serialize;
use utoipa::ToSchema;

use super::error::ApiError;
use crate::model::{AlertEvent, CorrelationContext, DeliveryOutcome, PipelineOutcome};
use crate::service::ingest::parse_alert_time;
use crate::service::PipelineOrchestrator;

/// Outcome of one webhook submission
#[derive(Debug, Serialize, ToSchema)]
pub struct IngestResponse {
    /// One of: ignored, duplicate, success, partial_success, no_channel, channel_error
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Running occurrence count for duplicates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enriched: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outcomes: Vec<DeliveryOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<CorrelationContext>,
}

impl From<PipelineOutcome> for IngestResponse {
    fn from(outcome: PipelineOutcome) -> Self {
        match outcome {
            PipelineOutcome::Ignored { reason } => Self {
                status: "ignored".to_string(),
                reason: Some(reason.as_str().to_string()),
                count: None,
                alert_id: None,
                enriched: None,
                outcomes: Vec::new(),
                correlation: None,
            },
            PipelineOutcome::Duplicate { count } => Self {
                status: "duplicate".to_string(),
                reason: None,
                count: Some(count),
                alert_id: None,
                enriched: None,
                outcomes: Vec::new(),
                correlation: None,
            },
            PipelineOutcome::Processed {
                alert_id,
                delivery,
                outcomes,
                enriched,
                correlation,
            } => Self {
                status: delivery.as_str().to_string(),
                reason: None,
                count: None,
                alert_id: Some(alert_id),
                enriched: Some(enriched),
                outcomes,
                correlation,
            },
        }
    }
}

/// Ingest one alert event
///
/// Always returns 200 with a terminal outcome for processed alerts;
/// 400 is reserved for malformed payloads.
#[utoipa::path(
    post,
    path = "/v1/events",
    responses(
        (status = 200, description = "Alert processed to a terminal outcome", body = IngestResponse),
        (status = 400, description = "Malformed payload or missing Content-Type"),
        (status = 500, description = "Persistence failed")
    ),
    tag = "events"
)]
#[post("/v1/events")]
pub async fn ingest_event(
    req: HttpRequest,
    body: web::Bytes,
    pipeline: web::Data<Arc<PipelineOrchestrator>>,
) -> Result<HttpResponse, ApiError> {
    if req.content_type() != "application/json" {
        return Err(ApiError::Validation(
            "Content-Type must be application/json".to_string(),
        ));
    }

    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("Malformed JSON: {}", e)))?;

    let event = parse_event(&payload)?;

    tracing::info!(rule = %event.rule, priority = %event.priority_raw, "Received alert");

    // Detached task: a client disconnect drops this handler future but
    // must not cancel persistence or delivery
    let pipeline = pipeline.get_ref().clone();
    let outcome = tokio::spawn(async move { pipeline.process(event).await })
        .await
        .map_err(|e| ApiError::Internal(format!("Pipeline task failed: {}", e)))??;

    Ok(HttpResponse::Ok().json(IngestResponse::from(outcome)))
}

/// Validate the payload shape and build the pipeline event.
/// `rule`, `priority`, and `output` must be present non-empty strings.
fn parse_event(payload: &serde_json::Value) -> Result<AlertEvent, ApiError> {
    let object = payload
        .as_object()
        .ok_or_else(|| ApiError::Validation("Payload must be a JSON object".to_string()))?;

    let required = |key: &str| -> Result<String, ApiError> {
        object
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                ApiError::Validation(format!("Missing or empty required field: {}", key))
            })
    };

    let rule = required("rule")?;
    let priority_raw = required("priority")?;
    let output = required("output")?;

    let occurred_at = object
        .get("time")
        .and_then(|v| v.as_str())
        .and_then(parse_alert_time);

    let source = object
        .get("source")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown")
        .to_string();

    let fields: BTreeMap<String, serde_json::Value> = object
        .get("output_fields")
        .and_then(|v| v.as_object())
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();

    let priority = priority_raw.parse().ok();

    Ok(AlertEvent {
        rule,
        priority_raw,
        priority,
        output,
        occurred_at,
        source,
        fields,
    })
}

/// Configure ingest routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(ingest_event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_event_requires_rule_priority_output() {
        let missing = serde_json::json!({"rule": "R", "priority": "warning"});
        assert!(parse_event(&missing).is_err());

        let empty = serde_json::json!({"rule": "R", "priority": "warning", "output": "  "});
        assert!(parse_event(&empty).is_err());

        let not_object = serde_json::json!(["not", "an", "object"]);
        assert!(parse_event(&not_object).is_err());
    }

    #[test]
    fn parse_event_extracts_optional_fields() {
        let payload = serde_json::json!({
            "rule": "Terminal shell in container",
            "priority": "Warning",
            "output": "A shell was spawned",
            "time": "2026-08-01T10:00:00Z",
            "source": "syscall",
            "output_fields": {"proc.name": "bash", "container.id": "abc123"}
        });

        let event = parse_event(&payload).unwrap();
        assert_eq!(event.rule, "Terminal shell in container");
        assert_eq!(event.priority, Some(crate::model::AlertPriority::Warning));
        assert!(event.occurred_at.is_some());
        assert_eq!(event.source, "syscall");
        assert_eq!(event.fields.len(), 2);
    }

    #[test]
    fn unknown_priority_and_bad_time_stay_fail_open() {
        let payload = serde_json::json!({
            "rule": "R",
            "priority": "whatever",
            "output": "O",
            "time": "garbage"
        });

        let event = parse_event(&payload).unwrap();
        assert!(event.priority.is_none());
        assert!(event.occurred_at.is_none());
        assert_eq!(event.source, "unknown");
    }
}
