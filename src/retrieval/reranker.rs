//! Cross-encoder reranking

use crate::retrieval::{Passage, RetrievalResult, ScoredPassage};
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use std::sync::Arc;
use thiserror::Error;

/// Default number of passages kept after reranking
pub const DEFAULT_TOP_N: usize = 6;

/// Default cross-encoder model
pub const DEFAULT_RERANKER_MODEL: &str = "BAAI/bge-reranker-base";

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("Reranker initialization failed: {0}")]
    InitializationError(String),

    #[error("Reranking failed: {0}")]
    RerankingError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Joint (query, passage) relevance model
///
/// Implementations must be deterministic: identical inputs give identical scores.
pub trait RelevanceScorer: Send + Sync {
    /// Score one pair; higher is more relevant
    fn score(&self, query: &str, passage: &str) -> Result<f32, RerankError>;

    /// Score many passages against one query, in input order
    fn score_batch(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>, RerankError> {
        passages.iter().map(|p| self.score(query, p)).collect()
    }
}

/// Cross-encoder scorer backed by FastEmbed
pub struct CrossEncoderScorer {
    model: Arc<TextRerank>,
    model_name: String,
}

impl CrossEncoderScorer {
    /// Create a new scorer with the specified model
    ///
    /// # Arguments
    /// * `model_name` - Model name (e.g., "BAAI/bge-reranker-base")
    pub fn new(model_name: &str) -> Result<Self, RerankError> {
        let reranker_model = match model_name {
            "BAAI/bge-reranker-base" | "bge-reranker-base" => RerankerModel::BGERerankerBase,
            "rozgo/bge-reranker-v2-m3" | "bge-reranker-v2-m3" => RerankerModel::BGERerankerV2M3,
            "jinaai/jina-reranker-v1-turbo-en" => RerankerModel::JINARerankerV1TurboEn,
            _ => {
                return Err(RerankError::InitializationError(format!(
                    "Unsupported reranker model: {}. Supported: BAAI/bge-reranker-base, \
                     rozgo/bge-reranker-v2-m3, jinaai/jina-reranker-v1-turbo-en",
                    model_name
                )));
            }
        };

        tracing::info!("Initializing reranker model: {}", model_name);

        let init_options = RerankInitOptions::new(reranker_model).with_show_download_progress(true);

        let model = TextRerank::try_new(init_options)
            .map_err(|e| RerankError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
        })
    }

    /// Create scorer with default model
    pub fn with_default_model() -> Result<Self, RerankError> {
        Self::new(DEFAULT_RERANKER_MODEL)
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl RelevanceScorer for CrossEncoderScorer {
    fn score(&self, query: &str, passage: &str) -> Result<f32, RerankError> {
        self.score_batch(query, &[passage])?
            .into_iter()
            .next()
            .ok_or_else(|| RerankError::RerankingError("No score returned".to_string()))
    }

    fn score_batch(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>, RerankError> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let results = self
            .model
            .rerank(query, passages.to_vec(), false, None)
            .map_err(|e| RerankError::RerankingError(e.to_string()))?;

        // FastEmbed returns results sorted by score; put them back in input order
        let mut scores = vec![f32::NEG_INFINITY; passages.len()];
        for result in results {
            let slot = scores.get_mut(result.index).ok_or_else(|| {
                RerankError::RerankingError(format!("Result index {} out of range", result.index))
            })?;
            *slot = result.score;
        }

        Ok(scores)
    }
}

/// Orders candidate passages by cross-encoder relevance and keeps the best
#[derive(Clone)]
pub struct Reranker {
    scorer: Arc<dyn RelevanceScorer>,
}

impl Reranker {
    pub fn new(scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self { scorer }
    }

    /// Score passages against the query and keep the top `top_n`, best first
    ///
    /// Ties keep their input order. Empty input returns an empty result
    /// without calling the scorer.
    pub fn rerank(
        &self,
        query: &str,
        passages: Vec<Passage>,
        top_n: usize,
    ) -> Result<RetrievalResult, RerankError> {
        let scored = self.score(query, passages)?;

        Ok(RetrievalResult::new(
            scored
                .into_iter()
                .take(top_n)
                .map(|scored| scored.passage)
                .collect(),
        ))
    }

    /// Score and sort every passage without truncating
    pub fn score(&self, query: &str, passages: Vec<Passage>) -> Result<Vec<ScoredPassage>, RerankError> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        if query.is_empty() {
            return Err(RerankError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }

        let texts: Vec<&str> = passages.iter().map(Passage::content).collect();
        let scores = self.scorer.score_batch(query, &texts)?;

        if scores.len() != passages.len() {
            return Err(RerankError::RerankingError(format!(
                "Scorer returned {} scores for {} passages",
                scores.len(),
                passages.len()
            )));
        }

        let mut scored: Vec<ScoredPassage> = passages
            .into_iter()
            .zip(scores)
            .map(|(passage, score)| ScoredPassage::new(passage, score))
            .collect();

        // Stable sort: equal scores keep encounter order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));

        tracing::debug!(
            "Reranked {} passages (best score: {:.4})",
            scored.len(),
            scored[0].score
        );

        Ok(scored)
    }
}
