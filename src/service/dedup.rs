//! Duplicate-alert suppression within a bounded time window

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::model::{AlertEvent, DedupConfig};

/// Leading characters of the alert output that participate in the key.
const KEY_OUTPUT_PREFIX: usize = 50;

/// Tracking state for one dedup key.
#[derive(Debug, Clone)]
pub struct DedupEntry {
    pub count: u32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupDecision {
    Accept,
    Duplicate { count: u32 },
}

/// Suppresses repeats of the same (rule, leading output) within the window.
///
/// Each key's read-modify-write happens under one lock, so concurrent
/// pipeline runs observe a consistent occurrence count. An entry expires
/// a full window after its first occurrence, so a persistently repeating
/// alert re-fires once per window instead of being suppressed forever.
pub struct DeduplicationFilter {
    enabled: bool,
    window: Duration,
    entries: Mutex<HashMap<String, DedupEntry>>,
}

impl DeduplicationFilter {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            enabled: config.enabled,
            window: Duration::minutes(config.window_minutes.max(1)),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Dedup key: rule + "-" + first 50 characters of output.
    pub fn key(event: &AlertEvent) -> String {
        let prefix: String = event.output.chars().take(KEY_OUTPUT_PREFIX).collect();
        format!("{}-{}", event.rule, prefix)
    }

    pub fn check(&self, event: &AlertEvent, now: DateTime<Utc>) -> DedupDecision {
        if !self.enabled {
            return DedupDecision::Accept;
        }

        let key = Self::key(event);
        let mut entries = self.entries.lock().expect("dedup map lock poisoned");

        match entries.get_mut(&key) {
            Some(entry) if now - entry.first_seen <= self.window => {
                entry.count += 1;
                entry.last_seen = now;
                DedupDecision::Duplicate { count: entry.count }
            }
            _ => {
                // First occurrence, or an expired entry re-arming
                entries.insert(
                    key,
                    DedupEntry {
                        count: 1,
                        first_seen: now,
                        last_seen: now,
                    },
                );
                DedupDecision::Accept
            }
        }
    }

    /// Drop entries whose window has elapsed. Returns how many were evicted.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock().expect("dedup map lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| now - entry.first_seen <= self.window);
        let evicted = before - entries.len();
        if evicted > 0 {
            tracing::debug!(evicted = evicted, remaining = entries.len(), "Dedup sweep");
        }
        evicted
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn event(rule: &str, output: &str) -> AlertEvent {
        AlertEvent {
            rule: rule.to_string(),
            priority_raw: "warning".to_string(),
            priority: Some(crate::model::AlertPriority::Warning),
            output: output.to_string(),
            occurred_at: None,
            source: "syscall".to_string(),
            fields: BTreeMap::new(),
        }
    }

    fn filter(window_minutes: i64) -> DeduplicationFilter {
        DeduplicationFilter::new(&DedupConfig {
            enabled: true,
            window_minutes,
            sweep_interval_secs: 60,
        })
    }

    #[test]
    fn key_uses_rule_and_leading_output() {
        let long_output = "x".repeat(200);
        let key = DeduplicationFilter::key(&event("Rule", &long_output));
        assert_eq!(key.len(), "Rule-".len() + 50);
    }

    #[test]
    fn repeats_within_window_count_up() {
        let f = filter(15);
        let now = Utc::now();
        let e = event("Rule", "same output");

        assert_eq!(f.check(&e, now), DedupDecision::Accept);
        assert_eq!(f.check(&e, now), DedupDecision::Duplicate { count: 2 });
        assert_eq!(f.check(&e, now), DedupDecision::Duplicate { count: 3 });
    }

    #[test]
    fn different_outputs_do_not_collide() {
        let f = filter(15);
        let now = Utc::now();
        assert_eq!(f.check(&event("Rule", "first"), now), DedupDecision::Accept);
        assert_eq!(f.check(&event("Rule", "second"), now), DedupDecision::Accept);
    }

    #[test]
    fn outputs_sharing_fifty_chars_collide() {
        let f = filter(15);
        let now = Utc::now();
        let prefix = "y".repeat(50);
        let a = event("Rule", &format!("{}-tail-one", prefix));
        let b = event("Rule", &format!("{}-tail-two", prefix));
        assert_eq!(f.check(&a, now), DedupDecision::Accept);
        assert_eq!(f.check(&b, now), DedupDecision::Duplicate { count: 2 });
    }

    #[test]
    fn entry_rearms_after_window_elapses() {
        let f = filter(15);
        let now = Utc::now();
        let e = event("Rule", "same output");

        assert_eq!(f.check(&e, now), DedupDecision::Accept);
        let later = now + Duration::minutes(16);
        assert_eq!(f.check(&e, later), DedupDecision::Accept);
        assert_eq!(
            f.check(&e, later),
            DedupDecision::Duplicate { count: 2 }
        );
    }

    #[test]
    fn disabled_filter_accepts_everything() {
        let f = DeduplicationFilter::new(&DedupConfig {
            enabled: false,
            window_minutes: 15,
            sweep_interval_secs: 60,
        });
        let now = Utc::now();
        let e = event("Rule", "same output");
        assert_eq!(f.check(&e, now), DedupDecision::Accept);
        assert_eq!(f.check(&e, now), DedupDecision::Accept);
    }

    #[test]
    fn sweep_evicts_expired_entries_only() {
        let f = filter(15);
        let now = Utc::now();
        f.check(&event("Old", "old output"), now - Duration::minutes(30));
        f.check(&event("Fresh", "fresh output"), now);
        assert_eq!(f.len(), 2);

        let evicted = f.evict_expired(now);
        assert_eq!(evicted, 1);
        assert_eq!(f.len(), 1);
    }
}
