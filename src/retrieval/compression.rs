//! Fan-out retrieval followed by reranking, as one retrieval unit

use crate::retrieval::{
    FanoutRetriever, PipelineError, QuerySet, RerankError, Reranker, RetrievalResult,
};

/// Widens recall with every query, then narrows to the best `top_n`
/// passages for the original question
pub struct CompressionRetriever {
    fanout: FanoutRetriever,
    reranker: Reranker,
    fetch_k: usize,
    top_n: usize,
}

impl CompressionRetriever {
    pub fn new(fanout: FanoutRetriever, reranker: Reranker, fetch_k: usize, top_n: usize) -> Self {
        Self {
            fanout,
            reranker,
            fetch_k,
            top_n,
        }
    }

    /// Fan out over every query, then rerank against the original
    ///
    /// Scoring runs on the blocking pool, so dropping this future (timeout or
    /// cancellation) returns control immediately.
    pub async fn retrieve(&self, queries: &QuerySet) -> Result<RetrievalResult, PipelineError> {
        let candidates = self.fanout.retrieve(queries, self.fetch_k).await?;
        let candidate_count = candidates.len();

        let reranker = self.reranker.clone();
        let query = queries.original().to_string();
        let top_n = self.top_n;

        let ranked = tokio::task::spawn_blocking(move || reranker.rerank(&query, candidates, top_n))
            .await
            .map_err(|e| RerankError::RerankingError(format!("Reranking task failed: {}", e)))??;

        tracing::info!(
            "Retrieved {} candidates over {} queries, kept {}",
            candidate_count,
            queries.len(),
            ranked.len()
        );

        Ok(ranked)
    }

    pub fn fetch_k(&self) -> usize {
        self.fetch_k
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::{IndexError, Passage, RelevanceScorer, RerankError, SimilarityIndex};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Returns the same candidates for every query and records the requested k
    struct FixedIndex {
        passages: Vec<Passage>,
        ks: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl SimilarityIndex for FixedIndex {
        async fn search(&self, _query: &str, k: usize) -> Result<Vec<Passage>, IndexError> {
            self.ks.lock().unwrap().push(k);
            Ok(self.passages.iter().take(k).cloned().collect())
        }
    }

    /// Scores passages by their length, recording the query it was asked about
    struct LengthScorer {
        queries: Mutex<Vec<String>>,
    }

    impl RelevanceScorer for LengthScorer {
        fn score(&self, query: &str, passage: &str) -> Result<f32, RerankError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(passage.len() as f32)
        }
    }

    #[tokio::test]
    async fn test_rerank_against_original_with_fetch_k() {
        let index = Arc::new(FixedIndex {
            passages: vec![
                Passage::new("aa", "doc", None),
                Passage::new("aaaa", "doc", None),
                Passage::new("a", "doc", None),
                Passage::new("aaa", "doc", None),
            ],
            ks: Mutex::new(Vec::new()),
        });
        let scorer = Arc::new(LengthScorer {
            queries: Mutex::new(Vec::new()),
        });

        let retriever = CompressionRetriever::new(
            FanoutRetriever::new(index.clone()),
            Reranker::new(scorer.clone()),
            3,
            2,
        );

        let queries = QuerySet::with_variants("original", vec!["variant".to_string()]);
        let result = retriever.retrieve(&queries).await.unwrap();

        let contents: Vec<&str> = result.iter().map(|p| p.content()).collect();
        assert_eq!(contents, vec!["aaaa", "aa"]);

        assert_eq!(*index.ks.lock().unwrap(), vec![3, 3]);
        assert!(scorer.queries.lock().unwrap().iter().all(|q| q == "original"));
    }
}
