//! Retrieval pipeline
//!
//! Turns one question into a ranked, deduplicated, size-bounded set of
//! passages and a grounded answer:
//! - QueryExpander: question → original + generated paraphrases
//! - FanoutRetriever: one index lookup per query, merged and deduplicated
//! - Reranker: cross-encoder scoring against the original, top-n kept
//! - CompressionRetriever: fan-out then rerank as one unit
//! - AnswerSynthesizer: stuffs the passages into a grounded prompt
//! - PipelineOrchestrator: runs the stages in order for each question

mod compression;
mod deduplication;
mod expander;
mod fanout;
mod passage;
mod pipeline;
pub mod prompt;
mod reranker;
mod synthesizer;

pub use compression::CompressionRetriever;
pub use deduplication::deduplicate_passages;
pub use expander::{QueryExpander, QuerySet, DEFAULT_NUM_VARIANTS};
pub use fanout::{FanoutRetriever, IndexError, RetrievalError, SimilarityIndex};
pub use passage::{
    Metadata, Passage, PassageId, RetrievalResult, ScoredPassage, LOCATOR_KEY, SOURCE_KEY,
};
pub use pipeline::{PipelineError, PipelineOrchestrator, PipelineSettings};
pub use prompt::{parse_lines, PromptError, PromptTemplate};
pub use reranker::{
    CrossEncoderScorer, RelevanceScorer, RerankError, Reranker, DEFAULT_RERANKER_MODEL,
    DEFAULT_TOP_N,
};
pub use synthesizer::{
    AnswerResponse, AnswerResult, AnswerSynthesizer, SourceRef, UNKNOWN_ANSWER,
};
