//! Similarity-search collaborator interface
//!
//! The historical alert corpus lives in an external nearest-neighbor
//! engine; the core only queries it and appends to it.

mod weaviate;

use async_trait::async_trait;

use crate::model::{AlertRecord, NeighborSummary};

pub use weaviate::WeaviateClient;

#[derive(Debug, thiserror::Error)]
pub enum SimilarityError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Similarity engine error: {0}")]
    Engine(String),
}

/// Ranked nearest-neighbor search over previously stored alerts.
#[async_trait]
pub trait SimilarityProvider: Send + Sync {
    /// Top `limit` historical neighbors of `query_text` at or above
    /// `certainty`, most similar first.
    async fn query(
        &self,
        query_text: &str,
        limit: u32,
        certainty: f64,
    ) -> Result<Vec<NeighborSummary>, SimilarityError>;

    /// Append a processed alert to the corpus.
    async fn index(&self, record: &AlertRecord) -> Result<(), SimilarityError>;
}
