//! Per-alert pipeline orchestration
//!
//! One pass: admission filters, enrichment, correlation, delivery. Every
//! stage failure except persistence degrades the pass instead of failing
//! it, and ends in one of the defined terminal outcomes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::cache::{explanation_cache_key, ExplanationCache};
use super::correlation::CorrelationEngine;
use super::dedup::{DedupDecision, DeduplicationFilter};
use super::delivery::DeliveryCoordinator;
use super::explanation::ExplanationParser;
use super::ingest::{AdmissionDecision, IngestFilter};
use super::prompts::{build_explanation_prompt, EXPLANATION_SYSTEM_PROMPT};
use crate::db::DbError;
use crate::model::{
    AlertEvent, AlertRecord, AlertStatus, CanonicalExplanation, CorrelationContext,
    PipelineOutcome, ProviderConfig,
};
use crate::provider::{CompletionProvider, CompletionRequest, ProviderError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Store write failed: the only fatal error for an alert
    #[error("persistence failed: {0}")]
    Persistence(#[from] DbError),
}

pub struct PipelineOrchestrator {
    ingest: IngestFilter,
    dedup: Arc<DeduplicationFilter>,
    provider: Arc<dyn CompletionProvider>,
    provider_settings: ProviderConfig,
    parser: ExplanationParser,
    correlation: Option<Arc<CorrelationEngine>>,
    delivery: DeliveryCoordinator,
    cache: Option<ExplanationCache>,
}

impl PipelineOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ingest: IngestFilter,
        dedup: Arc<DeduplicationFilter>,
        provider: Arc<dyn CompletionProvider>,
        provider_settings: ProviderConfig,
        correlation: Option<Arc<CorrelationEngine>>,
        delivery: DeliveryCoordinator,
        cache: Option<ExplanationCache>,
    ) -> Self {
        Self {
            ingest,
            dedup,
            provider,
            provider_settings,
            parser: ExplanationParser::new(),
            correlation,
            delivery,
            cache,
        }
    }

    /// Run one alert through the full pipeline.
    pub async fn process(&self, event: AlertEvent) -> Result<PipelineOutcome, PipelineError> {
        let now = Utc::now();

        if let AdmissionDecision::Reject(reason) = self.ingest.evaluate(&event, now) {
            tracing::debug!(rule = %event.rule, reason = reason.as_str(), "Alert ignored");
            return Ok(PipelineOutcome::Ignored { reason });
        }

        if let DedupDecision::Duplicate { count } = self.dedup.check(&event, now) {
            tracing::debug!(rule = %event.rule, count = count, "Duplicate alert suppressed");
            return Ok(PipelineOutcome::Duplicate { count });
        }

        let (explanation, enrichment_error) = self.enrich(&event).await;

        let correlation = self.correlate(&event).await;

        let report = self
            .delivery
            .deliver(
                &event,
                explanation.as_ref(),
                enrichment_error.as_deref(),
                correlation.as_ref(),
            )
            .await?;

        self.index_in_corpus(&event, report.alert_id, explanation.clone());

        Ok(PipelineOutcome::Processed {
            alert_id: report.alert_id,
            delivery: report.status,
            outcomes: report.outcomes,
            enriched: explanation.is_some(),
            correlation,
        })
    }

    /// Re-enrich an existing record and overwrite its explanation.
    /// Serialized per id by the delivery coordinator.
    pub async fn reprocess(&self, id: i64) -> Result<AlertRecord, DbError> {
        let record = self.delivery.repository().get_by_id(id).await?;
        let event = Self::event_from_record(&record);

        let (explanation, enrichment_error) = self.enrich(&event).await;
        if let Some(ref error) = enrichment_error {
            tracing::warn!(
                alert_id = id,
                rule = %event.rule,
                error = %error,
                stage = "reprocess_enrichment",
                "Reprocessing produced no explanation"
            );
        }

        self.delivery
            .apply_reprocessed(id, explanation.as_ref())
            .await?;

        self.delivery.repository().get_by_id(id).await
    }

    /// Generate and parse the explanation, degrading to None on any
    /// provider or parser failure.
    async fn enrich(&self, event: &AlertEvent) -> (Option<CanonicalExplanation>, Option<String>) {
        let cache_key = explanation_cache_key(
            &event.rule,
            &event.output,
            self.provider.name(),
            self.provider.model(),
            EXPLANATION_SYSTEM_PROMPT,
        );

        if let Some(cache) = &self.cache {
            if let Ok(cached) = cache.get_explanation(&cache_key).await {
                tracing::debug!(rule = %event.rule, "Explanation served from cache");
                return (Some(cached), None);
            }
        }

        let request = CompletionRequest {
            system_prompt: EXPLANATION_SYSTEM_PROMPT.to_string(),
            user_prompt: build_explanation_prompt(event),
            max_tokens: self.provider_settings.max_tokens,
            temperature: self.provider_settings.temperature,
        };

        let timeout = Duration::from_secs(self.provider_settings.timeout_secs);
        let completion = match tokio::time::timeout(timeout, self.provider.complete(&request)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.provider_settings.timeout_secs)),
        };

        let text = match completion {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    rule = %event.rule,
                    provider = self.provider.name(),
                    stage = "enrichment",
                    "Explanation generation failed"
                );
                return (None, Some(e.to_string()));
            }
        };

        match self.parser.parse(&text, self.provider.name()) {
            Ok(explanation) => {
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.set_explanation(&cache_key, &explanation).await {
                        tracing::debug!(error = %e, "Failed to cache explanation");
                    }
                }
                (Some(explanation), None)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    rule = %event.rule,
                    stage = "explanation_parse",
                    "Explanation parsing failed"
                );
                (None, Some(e.to_string()))
            }
        }
    }

    /// Query historical context, degrading to None on failure.
    async fn correlate(&self, event: &AlertEvent) -> Option<CorrelationContext> {
        let engine = self.correlation.as_ref()?;

        match engine.correlate(event, Utc::now()).await {
            Ok(context) => Some(context),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    rule = %event.rule,
                    stage = "correlation",
                    "Correlation failed, continuing without context"
                );
                None
            }
        }
    }

    /// Append the stored alert to the similarity corpus, detached from
    /// the request so indexing latency never delays the response.
    fn index_in_corpus(
        &self,
        event: &AlertEvent,
        alert_id: i64,
        explanation: Option<CanonicalExplanation>,
    ) {
        let Some(engine) = self.correlation.clone() else {
            return;
        };

        let record = AlertRecord {
            id: alert_id,
            occurred_at: event.occurred_at_or(Utc::now()),
            rule: event.rule.clone(),
            priority: event.priority_raw.clone(),
            output: event.output.clone(),
            source: event.source.clone(),
            fields: event.fields.clone(),
            processed: explanation.is_some(),
            explanation,
            status: AlertStatus::Unread,
        };

        tokio::spawn(async move {
            engine.index_alert(&record).await;
        });
    }

    fn event_from_record(record: &AlertRecord) -> AlertEvent {
        AlertEvent {
            rule: record.rule.clone(),
            priority_raw: record.priority.clone(),
            priority: record.priority.parse().ok(),
            output: record.output.clone(),
            occurred_at: Some(record.occurred_at),
            source: record.source.clone(),
            fields: record.fields.clone(),
        }
    }
}
