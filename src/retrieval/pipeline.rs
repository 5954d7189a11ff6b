//! Question → expanded queries → fan-out → rerank → grounded answer

use crate::config::RetrievalConfig;
use crate::llm::{GenerationError, TextGenerationService};
use crate::retrieval::{
    AnswerResult, AnswerSynthesizer, CompressionRetriever, FanoutRetriever, QueryExpander,
    QuerySet, RelevanceScorer, RerankError, Reranker, RetrievalError, SimilarityIndex,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    #[error("Generation service error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Retrieval service error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Reranking failed: {0}")]
    Rerank(#[from] RerankError),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// Tunables for one question-answer round trip
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Paraphrases requested from the expander
    pub num_variants: usize,
    /// Nearest neighbours fetched per sub-query
    pub fetch_k: usize,
    /// Passages kept after reranking
    pub top_n: usize,
    /// Retrieve with the original question alone when expansion fails
    pub fallback_on_expansion_error: bool,
    /// Whole-request deadline
    pub timeout: Option<Duration>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for PipelineSettings {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            num_variants: config.num_variants,
            fetch_k: config.fetch_k,
            top_n: config.top_n,
            fallback_on_expansion_error: config.fallback_on_expansion_error,
            timeout: (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs)),
        }
    }
}

/// Wires expansion, compression retrieval and synthesis for single questions
///
/// Holds no per-call state; one orchestrator can serve concurrent calls.
pub struct PipelineOrchestrator {
    expander: QueryExpander,
    retriever: CompressionRetriever,
    synthesizer: AnswerSynthesizer,
    settings: PipelineSettings,
}

impl PipelineOrchestrator {
    /// Build the pipeline over injected collaborators
    pub fn new(
        index: Arc<dyn SimilarityIndex>,
        generator: Arc<dyn TextGenerationService>,
        scorer: Arc<dyn RelevanceScorer>,
        settings: PipelineSettings,
    ) -> Self {
        let retriever = CompressionRetriever::new(
            FanoutRetriever::new(index),
            Reranker::new(scorer),
            settings.fetch_k,
            settings.top_n,
        );

        Self {
            expander: QueryExpander::new(generator.clone()),
            retriever,
            synthesizer: AnswerSynthesizer::new(generator),
            settings,
        }
    }

    /// Answer a question from the indexed documents
    pub async fn answer(&self, question: &str) -> Result<AnswerResult, PipelineError> {
        self.answer_with_cancel(question, &CancellationToken::new())
            .await
    }

    /// Answer a question, aborting the current stage when `cancel` fires
    ///
    /// Cancellation and timeout never yield partial results.
    pub async fn answer_with_cancel(
        &self,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<AnswerResult, PipelineError> {
        if question.trim().is_empty() {
            return Err(PipelineError::InvalidQuestion(
                "Question cannot be empty".to_string(),
            ));
        }

        match self.settings.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(question, cancel))
                .await
                .map_err(|_| PipelineError::Timeout(limit))?,
            None => self.run(question, cancel).await,
        }
    }

    async fn run(
        &self,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<AnswerResult, PipelineError> {
        tracing::info!("Answering: {}", question);

        let expansion = until_cancelled(
            cancel,
            self.expander.expand(question, self.settings.num_variants),
        )
        .await?;

        let queries = match expansion {
            Ok(queries) => queries,
            Err(e) if self.settings.fallback_on_expansion_error => {
                tracing::warn!("Query expansion failed, using original question only: {}", e);
                QuerySet::original_only(question)
            }
            Err(e) => return Err(e.into()),
        };

        let context = until_cancelled(cancel, self.retriever.retrieve(&queries)).await??;

        let result = until_cancelled(cancel, self.synthesizer.synthesize(question, context)).await??;

        tracing::info!("Answer ready ({} sources)", result.sources.len());

        Ok(result)
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }
}

/// Race a stage against the cancellation token
async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    stage: F,
) -> Result<F::Output, PipelineError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        output = stage => Ok(output),
    }
}
