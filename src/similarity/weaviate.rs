//! Weaviate-compatible similarity client (GraphQL nearText + object store)

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use url::Url;

use super::{SimilarityError, SimilarityProvider};
use crate::model::{AlertRecord, CorrelationConfig, NeighborSummary};

pub struct WeaviateClient {
    client: Client,
    base_url: Url,
    class_name: String,
}

impl WeaviateClient {
    pub fn new(config: &CorrelationConfig) -> Self {
        Self {
            client: Client::builder()
                .user_agent("alert-triage-agent/1.0")
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: config.url.clone(),
            class_name: config.class_name.clone(),
        }
    }

    fn graphql_endpoint(&self) -> Result<Url, SimilarityError> {
        self.base_url
            .join("/v1/graphql")
            .map_err(|e| SimilarityError::Parse(e.to_string()))
    }

    fn objects_endpoint(&self) -> Result<Url, SimilarityError> {
        self.base_url
            .join("/v1/objects")
            .map_err(|e| SimilarityError::Parse(e.to_string()))
    }

    fn build_near_text_query(&self, query_text: &str, limit: u32, certainty: f64) -> String {
        // serde_json string encoding doubles as GraphQL string escaping here
        let concepts = serde_json::to_string(query_text).unwrap_or_else(|_| "\"\"".to_string());
        format!(
            r#"{{
  Get {{
    {class}(
      nearText: {{concepts: [{concepts}], certainty: {certainty}}}
      limit: {limit}
    ) {{
      rule
      priority
      output
      source
      occurredAt
      _additional {{ certainty }}
    }}
  }}
}}"#,
            class = self.class_name,
            concepts = concepts,
            certainty = certainty,
            limit = limit,
        )
    }

    fn parse_neighbors(&self, body: serde_json::Value) -> Result<Vec<NeighborSummary>, SimilarityError> {
        if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
            if !errors.is_empty() {
                let message = errors[0]
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown GraphQL error");
                return Err(SimilarityError::Engine(message.to_string()));
            }
        }

        let hits = body
            .get("data")
            .and_then(|d| d.get("Get"))
            .and_then(|g| g.get(&self.class_name))
            .and_then(|c| c.as_array())
            .cloned()
            .unwrap_or_default();

        let neighbors = hits
            .into_iter()
            .filter_map(|hit| {
                let as_str =
                    |key: &str| hit.get(key).and_then(|v| v.as_str()).map(str::to_string);

                let certainty = hit
                    .get("_additional")
                    .and_then(|a| a.get("certainty"))
                    .and_then(|c| c.as_f64())?;

                let occurred_at = as_str("occurredAt").and_then(|ts| {
                    DateTime::parse_from_rfc3339(&ts)
                        .ok()
                        .map(|dt| dt.to_utc())
                });

                Some(NeighborSummary {
                    rule: as_str("rule")?,
                    priority: as_str("priority").unwrap_or_else(|| "unknown".to_string()),
                    output: as_str("output").unwrap_or_default(),
                    source: as_str("source").unwrap_or_else(|| "unknown".to_string()),
                    occurred_at,
                    certainty,
                })
            })
            .collect();

        Ok(neighbors)
    }
}

#[async_trait]
impl SimilarityProvider for WeaviateClient {
    async fn query(
        &self,
        query_text: &str,
        limit: u32,
        certainty: f64,
    ) -> Result<Vec<NeighborSummary>, SimilarityError> {
        let graphql = self.build_near_text_query(query_text, limit, certainty);

        let response = self
            .client
            .post(self.graphql_endpoint()?)
            .json(&serde_json::json!({ "query": graphql }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SimilarityError::Engine(format!(
                "similarity query returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SimilarityError::Parse(e.to_string()))?;

        self.parse_neighbors(body)
    }

    async fn index(&self, record: &AlertRecord) -> Result<(), SimilarityError> {
        let object = serde_json::json!({
            "class": self.class_name,
            "properties": {
                "rule": record.rule,
                "priority": record.priority,
                "output": record.output,
                "source": record.source,
                "occurredAt": record.occurred_at.to_rfc3339(),
            }
        });

        let response = self
            .client
            .post(self.objects_endpoint()?)
            .json(&object)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SimilarityError::Engine(format!(
                "object indexing returned {}",
                response.status()
            )));
        }

        tracing::debug!(id = record.id, rule = %record.rule, "Indexed alert in similarity corpus");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> WeaviateClient {
        WeaviateClient::new(&CorrelationConfig::default())
    }

    #[test]
    fn near_text_query_escapes_quotes_in_concepts() {
        let q = client().build_near_text_query(r#"rule "X" fired"#, 5, 0.6);
        assert!(q.contains(r#"[\""#) || q.contains(r#"\"X\""#));
        assert!(q.contains("limit: 5"));
        assert!(q.contains("certainty: 0.6"));
    }

    #[test]
    fn parse_neighbors_reads_hits_and_certainty() {
        let body = serde_json::json!({
            "data": {"Get": {"SecurityAlert": [
                {
                    "rule": "Terminal shell in container",
                    "priority": "notice",
                    "output": "A shell was spawned",
                    "source": "syscall",
                    "occurredAt": "2026-08-01T10:00:00+00:00",
                    "_additional": {"certainty": 0.83}
                }
            ]}}
        });
        let neighbors = client().parse_neighbors(body).unwrap();
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].rule, "Terminal shell in container");
        assert!((neighbors[0].certainty - 0.83).abs() < 1e-9);
        assert!(neighbors[0].occurred_at.is_some());
    }

    #[test]
    fn parse_neighbors_surfaces_graphql_errors() {
        let body = serde_json::json!({
            "errors": [{"message": "class SecurityAlert not found"}]
        });
        let err = client().parse_neighbors(body).unwrap_err();
        assert!(matches!(err, SimilarityError::Engine(_)));
    }

    #[test]
    fn parse_neighbors_tolerates_missing_data() {
        let body = serde_json::json!({"data": {"Get": {}}});
        let neighbors = client().parse_neighbors(body).unwrap();
        assert!(neighbors.is_empty());
    }
}
