//! Persistence and notification fan-out
//!
//! Linear per-alert progression: persist first, then attempt every
//! enabled channel and record an outcome for each. Only the persistence
//! step can fail the alert.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Mutex;

use crate::db::repository::AlertRepository;
use crate::db::DbError;
use crate::model::{
    AlertEvent, CanonicalExplanation, CorrelationContext, DeliveryOutcome, DeliveryStatus,
};
use crate::notify::{ChannelMessage, NotificationChannel};

/// Result of one delivery pass.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub alert_id: i64,
    pub status: DeliveryStatus,
    pub outcomes: Vec<DeliveryOutcome>,
}

pub struct DeliveryCoordinator {
    repository: AlertRepository,
    channels: Vec<Arc<dyn NotificationChannel>>,
    reprocess_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl DeliveryCoordinator {
    pub fn new(repository: AlertRepository, channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self {
            repository,
            channels,
            reprocess_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn repository(&self) -> &AlertRepository {
        &self.repository
    }

    /// Persist the alert and fan out to every enabled channel.
    ///
    /// The persistence error is the only one propagated; channel failures
    /// are folded into the returned status and outcomes.
    pub async fn deliver(
        &self,
        event: &AlertEvent,
        explanation: Option<&CanonicalExplanation>,
        enrichment_error: Option<&str>,
        correlation: Option<&CorrelationContext>,
    ) -> Result<DeliveryReport, DbError> {
        let alert_id = self
            .repository
            .insert(event, explanation, explanation.is_some())
            .await?;

        let outcomes = self
            .fan_out(event, explanation, enrichment_error, correlation)
            .await;

        let status = Self::aggregate_status(&self.channels, &outcomes, explanation.is_some());

        if status != DeliveryStatus::Success {
            tracing::info!(
                alert_id = alert_id,
                rule = %event.rule,
                status = status.as_str(),
                "Alert delivered with degraded status"
            );
        }

        Ok(DeliveryReport {
            alert_id,
            status,
            outcomes,
        })
    }

    async fn fan_out(
        &self,
        event: &AlertEvent,
        explanation: Option<&CanonicalExplanation>,
        enrichment_error: Option<&str>,
        correlation: Option<&CorrelationContext>,
    ) -> Vec<DeliveryOutcome> {
        let message = match explanation {
            Some(explanation) => ChannelMessage::Enriched {
                event,
                explanation,
                correlation,
            },
            None => ChannelMessage::Degraded {
                event,
                enrichment_error: enrichment_error.unwrap_or("explanation unavailable"),
            },
        };

        let attempts = self.channels.iter().map(|channel| {
            let message = &message;
            async move {
                let result = channel.deliver(message).await;
                let outcome = DeliveryOutcome {
                    channel: channel.id().to_string(),
                    success: result.is_ok(),
                    error: result.as_ref().err().map(|e| e.to_string()),
                    attempted_at: Utc::now(),
                };
                if let Err(e) = result {
                    tracing::warn!(
                        error = %e,
                        channel = channel.id(),
                        rule = %event.rule,
                        stage = "delivery",
                        "Channel delivery failed"
                    );
                }
                outcome
            }
        });

        join_all(attempts).await
    }

    fn aggregate_status(
        channels: &[Arc<dyn NotificationChannel>],
        outcomes: &[DeliveryOutcome],
        enriched: bool,
    ) -> DeliveryStatus {
        if channels.is_empty() {
            return DeliveryStatus::NoChannel;
        }

        let failed = outcomes.iter().filter(|o| !o.success).count();

        if failed == outcomes.len() {
            DeliveryStatus::ChannelError
        } else if failed > 0 || !enriched {
            DeliveryStatus::PartialSuccess
        } else {
            DeliveryStatus::Success
        }
    }

    /// Overwrite an existing record's explanation, serialized per id so
    /// concurrent reprocess calls cannot interleave.
    pub async fn apply_reprocessed(
        &self,
        id: i64,
        explanation: Option<&CanonicalExplanation>,
    ) -> Result<(), DbError> {
        let lock = self.lock_for(id).await;
        let guard = lock.lock().await;

        let result = self.repository.update_explanation(id, explanation).await;

        drop(guard);
        self.release_lock(id, &lock).await;

        result
    }

    async fn lock_for(&self, id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.reprocess_locks.lock().await;
        locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn release_lock(&self, id: i64, held: &Arc<Mutex<()>>) {
        let mut locks = self.reprocess_locks.lock().await;
        // Two references mean nobody else is waiting: the map's and ours
        if let Some(existing) = locks.get(&id) {
            if Arc::ptr_eq(existing, held) && Arc::strong_count(existing) == 2 {
                locks.remove(&id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ChannelError;
    use async_trait::async_trait;

    struct FixedChannel {
        id: &'static str,
        ok: bool,
    }

    #[async_trait]
    impl NotificationChannel for FixedChannel {
        fn id(&self) -> &'static str {
            self.id
        }

        async fn deliver(&self, _message: &ChannelMessage<'_>) -> Result<(), ChannelError> {
            if self.ok {
                Ok(())
            } else {
                Err(ChannelError::Rejected("410: channel gone".to_string()))
            }
        }
    }

    fn channels(specs: &[(&'static str, bool)]) -> Vec<Arc<dyn NotificationChannel>> {
        specs
            .iter()
            .map(|(id, ok)| Arc::new(FixedChannel { id, ok: *ok }) as Arc<dyn NotificationChannel>)
            .collect()
    }

    fn outcome(channel: &str, success: bool) -> DeliveryOutcome {
        DeliveryOutcome {
            channel: channel.to_string(),
            success,
            error: (!success).then(|| "boom".to_string()),
            attempted_at: Utc::now(),
        }
    }

    #[test]
    fn no_channels_means_no_channel_status() {
        let status = DeliveryCoordinator::aggregate_status(&[], &[], true);
        assert_eq!(status, DeliveryStatus::NoChannel);
    }

    #[test]
    fn all_ok_and_enriched_is_success() {
        let chans = channels(&[("slack", true)]);
        let outcomes = vec![outcome("slack", true)];
        let status = DeliveryCoordinator::aggregate_status(&chans, &outcomes, true);
        assert_eq!(status, DeliveryStatus::Success);
    }

    #[test]
    fn enrichment_failure_downgrades_to_partial() {
        let chans = channels(&[("slack", true)]);
        let outcomes = vec![outcome("slack", true)];
        let status = DeliveryCoordinator::aggregate_status(&chans, &outcomes, false);
        assert_eq!(status, DeliveryStatus::PartialSuccess);
    }

    #[test]
    fn every_channel_failing_is_channel_error() {
        let chans = channels(&[("slack", false)]);
        let outcomes = vec![outcome("slack", false)];
        let status = DeliveryCoordinator::aggregate_status(&chans, &outcomes, true);
        assert_eq!(status, DeliveryStatus::ChannelError);
    }

    #[test]
    fn mixed_channel_results_are_partial() {
        let chans = channels(&[("slack", true), ("pager", false)]);
        let outcomes = vec![outcome("slack", true), outcome("pager", false)];
        let status = DeliveryCoordinator::aggregate_status(&chans, &outcomes, true);
        assert_eq!(status, DeliveryStatus::PartialSuccess);
    }
}
