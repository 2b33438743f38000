//! Historical correlation: risk scoring, threat classification, and
//! attack-chain prediction over similarity-provider neighbors

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::model::{
    AlertEvent, AlertPriority, AlertRecord, AttackPhase, CorrelationConfig, CorrelationContext,
    NeighborSummary, ThreatCategory,
};
use crate::similarity::{SimilarityError, SimilarityProvider};

/// Risk score reported when the corpus has nothing comparable.
pub const NEUTRAL_RISK_SCORE: f64 = 5.0;

/// Confidence reported alongside the neutral score.
pub const INSUFFICIENT_DATA_CONFIDENCE: f64 = 0.25;

/// Neighbors within this span count toward the recency factor.
const RECENCY_WINDOW_DAYS: i64 = 7;

/// Keyword sets per category, in tie-breaking declaration order.
const TAXONOMY: &[(ThreatCategory, &[&str])] = &[
    (
        ThreatCategory::Malware,
        &["malware", "virus", "trojan", "backdoor", "rootkit", "miner", "cryptomining"],
    ),
    (
        ThreatCategory::Intrusion,
        &["unauthorized", "intrusion", "breach", "compromise", "exploit", "shell"],
    ),
    (
        ThreatCategory::DataExfiltration,
        &["exfiltration", "data theft", "upload", "outbound", "sensitive file", "leak"],
    ),
    (
        ThreatCategory::Reconnaissance,
        &["scan", "probe", "enumerat", "discovery", "reconnaissance", "fingerprint"],
    ),
    (
        ThreatCategory::LateralMovement,
        &["lateral", "pivot", "remote execution", "ssh", "smb", "internal connection"],
    ),
    (
        ThreatCategory::Persistence,
        &["persistence", "cron", "startup", "autorun", "scheduled task", "systemd"],
    ),
    (
        ThreatCategory::Evasion,
        &["evasion", "obfuscat", "encoded", "bypass", "tamper", "delete log"],
    ),
    (
        ThreatCategory::Misconfiguration,
        &["misconfig", "permissive", "exposed", "default password", "world-writable", "privileged container"],
    ),
];

/// Predicted next phases per category: up to two, decreasing likelihood.
const ATTACK_TRANSITIONS: &[(ThreatCategory, &[(&str, f64)])] = &[
    (ThreatCategory::Reconnaissance, &[("intrusion", 0.7), ("lateral_movement", 0.5)]),
    (ThreatCategory::Intrusion, &[("reconnaissance", 0.7), ("privilege_escalation", 0.6)]),
    (ThreatCategory::Malware, &[("persistence", 0.8), ("lateral_movement", 0.6)]),
    (ThreatCategory::DataExfiltration, &[("evasion", 0.6), ("persistence", 0.4)]),
    (ThreatCategory::LateralMovement, &[("privilege_escalation", 0.7), ("data_exfiltration", 0.6)]),
    (ThreatCategory::Persistence, &[("privilege_escalation", 0.6), ("evasion", 0.5)]),
    (ThreatCategory::Evasion, &[("data_exfiltration", 0.6), ("persistence", 0.5)]),
    (ThreatCategory::Misconfiguration, &[("intrusion", 0.6), ("reconnaissance", 0.5)]),
];

/// Risk and confidence derived from a neighbor set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskAssessment {
    pub risk_score: f64,
    pub confidence: f64,
}

/// Scoring seam: the heuristic below is the default; a learned model can
/// replace it without touching orchestration.
pub trait ScoringStrategy: Send + Sync {
    fn score(&self, neighbors: &[NeighborSummary], now: DateTime<Utc>) -> RiskAssessment;
}

/// Weighted-heuristic scoring over neighbor priority, recency, and
/// source diversity.
pub struct HeuristicScoring;

impl ScoringStrategy for HeuristicScoring {
    fn score(&self, neighbors: &[NeighborSummary], now: DateTime<Utc>) -> RiskAssessment {
        if neighbors.is_empty() {
            return RiskAssessment {
                risk_score: NEUTRAL_RISK_SCORE,
                confidence: INSUFFICIENT_DATA_CONFIDENCE,
            };
        }

        // a: mean priority weight on the 2..16 scale. Unparseable
        // priorities fall back to the neutral midpoint.
        let weight_sum: f64 = neighbors
            .iter()
            .map(|n| {
                n.priority
                    .parse::<AlertPriority>()
                    .map(AlertPriority::weight)
                    .unwrap_or(9.0)
            })
            .sum();
        let a = weight_sum / neighbors.len() as f64;

        // b: recent-occurrence pressure
        let recent = neighbors
            .iter()
            .filter(|n| {
                n.occurred_at
                    .map(|ts| now - ts <= Duration::days(RECENCY_WINDOW_DAYS))
                    .unwrap_or(false)
            })
            .count();
        let b = f64::min(10.0, recent as f64 / 2.0);

        // c: source diversity
        let distinct_sources = neighbors
            .iter()
            .map(|n| n.source.as_str())
            .collect::<std::collections::BTreeSet<_>>()
            .len();
        let c = f64::min(5.0, distinct_sources as f64);

        let risk_score = (0.5 * a + 0.3 * b + 0.2 * c).clamp(1.0, 10.0);
        let confidence = f64::min(1.0, neighbors.len() as f64 / 20.0);

        RiskAssessment {
            risk_score,
            confidence,
        }
    }
}

/// Classify alert text against the fixed taxonomy. Most keyword hits wins;
/// ties go to the earlier category; no hits is Unknown.
pub fn classify_threat(text: &str) -> ThreatCategory {
    let lower = text.to_lowercase();

    let mut best = ThreatCategory::Unknown;
    let mut best_hits = 0usize;

    for (category, keywords) in TAXONOMY {
        let hits = keywords.iter().filter(|k| lower.contains(*k)).count();
        if hits > best_hits {
            best = *category;
            best_hits = hits;
        }
    }

    best
}

/// Current phase at likelihood 1.0 plus the category's predicted next
/// phases. Categories without a transition entry yield a one-phase chain.
pub fn predict_attack_chain(category: ThreatCategory) -> Vec<AttackPhase> {
    let mut chain = vec![AttackPhase {
        phase: category.as_str().to_string(),
        likelihood: 1.0,
    }];

    if let Some((_, next_phases)) = ATTACK_TRANSITIONS.iter().find(|(c, _)| *c == category) {
        chain.extend(next_phases.iter().map(|(phase, likelihood)| AttackPhase {
            phase: (*phase).to_string(),
            likelihood: *likelihood,
        }));
    }

    chain
}

fn histogram<'a>(values: impl Iterator<Item = &'a str>) -> BTreeMap<String, usize> {
    let mut map = BTreeMap::new();
    for value in values {
        *map.entry(value.to_string()).or_insert(0) += 1;
    }
    map
}

fn build_insights(neighbors: &[NeighborSummary], priority_histogram: &BTreeMap<String, usize>) -> Vec<String> {
    let mut insights = Vec::new();

    if neighbors.len() >= 2 {
        insights.push(format!(
            "Recurring pattern: {} similar alerts in the historical corpus",
            neighbors.len()
        ));
    }

    // Majority priority, if one exists
    if let Some((priority, count)) = priority_histogram.iter().max_by_key(|(_, count)| **count) {
        if *count * 2 > neighbors.len() {
            insights.push(format!(
                "Most similar alerts were {} priority ({} of {})",
                priority,
                count,
                neighbors.len()
            ));
        }
    }

    insights
}

/// Correlates one alert against the historical corpus.
pub struct CorrelationEngine {
    provider: Arc<dyn SimilarityProvider>,
    scoring: Arc<dyn ScoringStrategy>,
    top_k: u32,
    certainty_threshold: f64,
}

impl CorrelationEngine {
    pub fn new(provider: Arc<dyn SimilarityProvider>, config: &CorrelationConfig) -> Self {
        Self::with_scoring(provider, config, Arc::new(HeuristicScoring))
    }

    pub fn with_scoring(
        provider: Arc<dyn SimilarityProvider>,
        config: &CorrelationConfig,
        scoring: Arc<dyn ScoringStrategy>,
    ) -> Self {
        Self {
            provider,
            scoring,
            top_k: config.top_k,
            certainty_threshold: config.certainty_threshold,
        }
    }

    /// Query neighbors and derive the full correlation context.
    ///
    /// An empty neighbor set is a defined insufficient-data result, not
    /// an error; only the similarity call itself can fail.
    pub async fn correlate(
        &self,
        event: &AlertEvent,
        now: DateTime<Utc>,
    ) -> Result<CorrelationContext, SimilarityError> {
        let query_text = format!("{} {}", event.rule, event.output);

        let neighbors = self
            .provider
            .query(&query_text, self.top_k, self.certainty_threshold)
            .await?;

        Ok(self.build_context(event, neighbors, now))
    }

    /// Pure context derivation, split out for direct testing.
    pub fn build_context(
        &self,
        event: &AlertEvent,
        neighbors: Vec<NeighborSummary>,
        now: DateTime<Utc>,
    ) -> CorrelationContext {
        let alert_text = format!("{} {}", event.rule, event.output);
        let threat_category = classify_threat(&alert_text);

        if neighbors.is_empty() {
            return CorrelationContext {
                similar_count: 0,
                neighbors: Vec::new(),
                priority_histogram: BTreeMap::new(),
                source_histogram: BTreeMap::new(),
                insights: vec!["no similar alerts found".to_string()],
                risk_score: NEUTRAL_RISK_SCORE,
                confidence: INSUFFICIENT_DATA_CONFIDENCE,
                threat_category,
                attack_chain: vec![AttackPhase {
                    phase: threat_category.as_str().to_string(),
                    likelihood: 1.0,
                }],
            };
        }

        let assessment = self.scoring.score(&neighbors, now);
        let priority_histogram = histogram(neighbors.iter().map(|n| n.priority.as_str()));
        let source_histogram = histogram(neighbors.iter().map(|n| n.source.as_str()));
        let insights = build_insights(&neighbors, &priority_histogram);

        CorrelationContext {
            similar_count: neighbors.len(),
            priority_histogram,
            source_histogram,
            insights,
            risk_score: assessment.risk_score,
            confidence: assessment.confidence,
            threat_category,
            attack_chain: predict_attack_chain(threat_category),
            neighbors,
        }
    }

    /// Append a processed alert to the similarity corpus. Failures are
    /// logged and swallowed; indexing never affects the pipeline outcome.
    pub async fn index_alert(&self, record: &AlertRecord) {
        if let Err(e) = self.provider.index(record).await {
            tracing::warn!(
                error = %e,
                rule = %record.rule,
                stage = "similarity_index",
                "Failed to index alert in similarity corpus"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct StaticNeighbors(Vec<NeighborSummary>);

    #[async_trait]
    impl SimilarityProvider for StaticNeighbors {
        async fn query(
            &self,
            _query_text: &str,
            _limit: u32,
            _certainty: f64,
        ) -> Result<Vec<NeighborSummary>, SimilarityError> {
            Ok(self.0.clone())
        }

        async fn index(&self, _record: &AlertRecord) -> Result<(), SimilarityError> {
            Ok(())
        }
    }

    fn neighbor(priority: &str, source: &str, age_days: i64) -> NeighborSummary {
        NeighborSummary {
            rule: "Historical rule".to_string(),
            priority: priority.to_string(),
            output: "historical output".to_string(),
            source: source.to_string(),
            occurred_at: Some(Utc::now() - Duration::days(age_days)),
            certainty: 0.8,
        }
    }

    fn event(rule: &str, output: &str) -> AlertEvent {
        AlertEvent {
            rule: rule.to_string(),
            priority_raw: "critical".to_string(),
            priority: Some(AlertPriority::Critical),
            output: output.to_string(),
            occurred_at: None,
            source: "syscall".to_string(),
            fields: BTreeMap::new(),
        }
    }

    fn engine(neighbors: Vec<NeighborSummary>) -> CorrelationEngine {
        CorrelationEngine::new(
            Arc::new(StaticNeighbors(neighbors)),
            &crate::model::CorrelationConfig::default(),
        )
    }

    #[tokio::test]
    async fn zero_neighbors_yields_neutral_context_not_error() {
        let ctx = engine(Vec::new())
            .correlate(&event("Rule", "output"), Utc::now())
            .await
            .unwrap();

        assert_eq!(ctx.similar_count, 0);
        assert_eq!(ctx.risk_score, NEUTRAL_RISK_SCORE);
        assert!(ctx.confidence < 0.5);
        assert_eq!(ctx.insights, vec!["no similar alerts found".to_string()]);
        assert_eq!(ctx.attack_chain.len(), 1);
    }

    #[tokio::test]
    async fn risk_score_is_monotone_in_priority_weight() {
        let now = Utc::now();
        let e = event("Rule", "output");

        let mut previous = 0.0;
        for priority in ["notice", "error", "alert"] {
            let ctx = engine(vec![
                neighbor(priority, "syscall", 1),
                neighbor(priority, "syscall", 2),
            ])
            .correlate(&e, now)
            .await
            .unwrap();

            assert!(
                ctx.risk_score >= previous,
                "risk for {} ({}) regressed below {}",
                priority,
                ctx.risk_score,
                previous
            );
            previous = ctx.risk_score;
        }
    }

    #[test]
    fn risk_score_stays_clamped() {
        let now = Utc::now();
        let maxed: Vec<NeighborSummary> = (0..30)
            .map(|i| neighbor("emergency", &format!("source-{}", i), 0))
            .collect();
        let assessment = HeuristicScoring.score(&maxed, now);
        assert!(assessment.risk_score <= 10.0);
        assert_eq!(assessment.confidence, 1.0);

        let minimal = vec![neighbor("debug", "syscall", 400)];
        let assessment = HeuristicScoring.score(&minimal, now);
        assert!(assessment.risk_score >= 1.0);
    }

    #[test]
    fn source_diversity_raises_risk() {
        let now = Utc::now();
        let same_source = vec![
            neighbor("error", "syscall", 1),
            neighbor("error", "syscall", 1),
            neighbor("error", "syscall", 1),
        ];
        let diverse = vec![
            neighbor("error", "syscall", 1),
            neighbor("error", "k8s_audit", 1),
            neighbor("error", "cloudtrail", 1),
        ];
        let base = HeuristicScoring.score(&same_source, now);
        let spread = HeuristicScoring.score(&diverse, now);
        assert!(spread.risk_score > base.risk_score);
    }

    #[test]
    fn classifies_by_most_keyword_hits() {
        assert_eq!(
            classify_threat("cryptomining malware with a backdoor"),
            ThreatCategory::Malware
        );
        assert_eq!(
            classify_threat("outbound upload of sensitive file detected"),
            ThreatCategory::DataExfiltration
        );
        assert_eq!(classify_threat("a perfectly mundane message"), ThreatCategory::Unknown);
    }

    #[test]
    fn classification_ties_break_by_declaration_order() {
        // One malware hit, one persistence hit: malware is declared first
        assert_eq!(
            classify_threat("trojan installed a cron job"),
            ThreatCategory::Malware
        );
    }

    #[test]
    fn attack_chain_starts_with_current_phase() {
        let chain = predict_attack_chain(ThreatCategory::Intrusion);
        assert_eq!(chain[0].phase, "intrusion");
        assert_eq!(chain[0].likelihood, 1.0);
        assert_eq!(chain.len(), 3);
        assert!(chain[1].likelihood > chain[2].likelihood);

        let unknown = predict_attack_chain(ThreatCategory::Unknown);
        assert_eq!(unknown.len(), 1);
    }

    #[tokio::test]
    async fn insights_note_recurring_patterns_and_majority_priority() {
        let ctx = engine(vec![
            neighbor("error", "syscall", 1),
            neighbor("error", "syscall", 2),
            neighbor("warning", "syscall", 3),
        ])
        .correlate(&event("Rule", "output"), Utc::now())
        .await
        .unwrap();

        assert!(ctx.insights.iter().any(|i| i.contains("Recurring pattern")));
        assert!(ctx.insights.iter().any(|i| i.contains("error")));
        assert_eq!(ctx.priority_histogram.get("error"), Some(&2));
        assert_eq!(ctx.source_histogram.get("syscall"), Some(&3));
    }
}
