//! Priority and age admission control

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::model::{AlertEvent, FilterConfig, IgnoreReason};

/// Result of evaluating an alert against the admission filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    Accept,
    Reject(IgnoreReason),
}

/// Stateless admission filter. Pure function of (event, config, now).
#[derive(Debug, Clone)]
pub struct IngestFilter {
    config: FilterConfig,
}

impl IngestFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, event: &AlertEvent, now: DateTime<Utc>) -> AdmissionDecision {
        // Priority gate. Unrecognized priorities pass fail-open.
        match event.priority {
            Some(priority) => {
                if priority.rank() < self.config.min_priority.rank() {
                    return AdmissionDecision::Reject(IgnoreReason::PriorityTooLow);
                }
            }
            None => {
                tracing::warn!(
                    rule = %event.rule,
                    priority = %event.priority_raw,
                    "Unrecognized priority, accepting fail-open"
                );
            }
        }

        // Age gate, only when a positive threshold is configured.
        // A missing or unparseable timestamp passes fail-open.
        if self.config.max_age_minutes > 0 {
            if let Some(occurred_at) = event.occurred_at {
                let age_minutes = (now - occurred_at).num_minutes();
                if age_minutes > self.config.max_age_minutes {
                    return AdmissionDecision::Reject(IgnoreReason::TooOld);
                }
            }
        }

        AdmissionDecision::Accept
    }
}

/// Parse an event timestamp. RFC 3339 offsets are honored; a timestamp
/// without a timezone is assumed to be UTC. Returns None on malformed input.
pub fn parse_alert_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.to_utc());
    }

    // No offset: try the common ISO-8601 naive forms
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AlertPriority;
    use chrono::Duration;
    use std::collections::BTreeMap;

    fn event(priority: &str, occurred_at: Option<DateTime<Utc>>) -> AlertEvent {
        AlertEvent {
            rule: "Test rule".to_string(),
            priority_raw: priority.to_string(),
            priority: priority.parse().ok(),
            output: "test output".to_string(),
            occurred_at,
            source: "syscall".to_string(),
            fields: BTreeMap::new(),
        }
    }

    fn filter(min_priority: AlertPriority, max_age_minutes: i64) -> IngestFilter {
        IngestFilter::new(FilterConfig {
            min_priority,
            max_age_minutes,
        })
    }

    #[test]
    fn rejects_priority_below_minimum() {
        let f = filter(AlertPriority::Warning, 0);
        let now = Utc::now();
        assert_eq!(
            f.evaluate(&event("notice", None), now),
            AdmissionDecision::Reject(IgnoreReason::PriorityTooLow)
        );
        assert_eq!(f.evaluate(&event("warning", None), now), AdmissionDecision::Accept);
        assert_eq!(f.evaluate(&event("emergency", None), now), AdmissionDecision::Accept);
    }

    #[test]
    fn unknown_priority_is_fail_open() {
        let f = filter(AlertPriority::Critical, 0);
        assert_eq!(
            f.evaluate(&event("mystery", None), Utc::now()),
            AdmissionDecision::Accept
        );
    }

    #[test]
    fn rejects_events_older_than_threshold() {
        let f = filter(AlertPriority::Debug, 30);
        let now = Utc::now();
        let old = now - Duration::minutes(45);
        assert_eq!(
            f.evaluate(&event("critical", Some(old)), now),
            AdmissionDecision::Reject(IgnoreReason::TooOld)
        );
        let fresh = now - Duration::minutes(5);
        assert_eq!(
            f.evaluate(&event("critical", Some(fresh)), now),
            AdmissionDecision::Accept
        );
    }

    #[test]
    fn zero_threshold_disables_age_check() {
        let f = filter(AlertPriority::Debug, 0);
        let ancient = Utc::now() - Duration::days(3650);
        assert_eq!(
            f.evaluate(&event("critical", Some(ancient)), Utc::now()),
            AdmissionDecision::Accept
        );
    }

    #[test]
    fn missing_timestamp_is_fail_open() {
        let f = filter(AlertPriority::Debug, 10);
        assert_eq!(
            f.evaluate(&event("critical", None), Utc::now()),
            AdmissionDecision::Accept
        );
    }

    #[test]
    fn parses_rfc3339_and_naive_timestamps() {
        assert!(parse_alert_time("2026-08-01T10:00:00.123456789Z").is_some());
        assert!(parse_alert_time("2026-08-01T10:00:00+02:00").is_some());

        // Naive timestamp is taken as UTC
        let naive = parse_alert_time("2026-08-01T10:00:00").unwrap();
        let explicit = parse_alert_time("2026-08-01T10:00:00Z").unwrap();
        assert_eq!(naive, explicit);

        assert!(parse_alert_time("not a timestamp").is_none());
        assert!(parse_alert_time("").is_none());
    }
}
