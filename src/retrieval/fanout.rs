//! Multi-query fan-out retrieval over a similarity index

use crate::retrieval::{deduplicate_passages, Passage, QuerySet};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Similarity index unavailable: {0}")]
    Unavailable(String),

    #[error("Query embedding failed: {0}")]
    Embedding(String),

    #[error("Vector search failed: {0}")]
    Search(String),
}

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("All {attempted} sub-queries failed; last error: {last}")]
    AllQueriesFailed { attempted: usize, last: IndexError },
}

/// Nearest-neighbour search over indexed passages
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Top-k passages for a query, best match first
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, IndexError>;
}

/// Runs every query of a set against the index and merges the results
pub struct FanoutRetriever {
    index: Arc<dyn SimilarityIndex>,
}

impl FanoutRetriever {
    pub fn new(index: Arc<dyn SimilarityIndex>) -> Self {
        Self { index }
    }

    /// Retrieve candidates for every query, deduplicated by passage identity
    ///
    /// Lookups run concurrently, but the merge follows query-set order: the
    /// original's results first, then passages first seen for each variant.
    /// A failed lookup counts as empty unless every lookup fails.
    pub async fn retrieve(
        &self,
        queries: &QuerySet,
        k_per_query: usize,
    ) -> Result<Vec<Passage>, RetrievalError> {
        let lookups = queries.iter().map(|query| self.index.search(query, k_per_query));
        let results = join_all(lookups).await;

        let attempted = results.len();
        let mut merged = Vec::new();
        let mut last_error = None;
        let mut failures = 0;

        for (query, result) in queries.iter().zip(results) {
            match result {
                Ok(passages) => {
                    tracing::debug!("Sub-query {:?} returned {} passages", query, passages.len());
                    merged.extend(passages);
                }
                Err(e) => {
                    tracing::warn!("Sub-query {:?} failed, treating as empty: {}", query, e);
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        if failures == attempted {
            if let Some(last) = last_error {
                return Err(RetrievalError::AllQueriesFailed { attempted, last });
            }
        }

        let fetched = merged.len();
        let unique = deduplicate_passages(merged);

        tracing::debug!(
            "Fan-out over {} queries: {} fetched, {} unique",
            attempted,
            fetched,
            unique.len()
        );

        Ok(unique)
    }
}
