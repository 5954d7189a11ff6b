//! Query expansion: one question in, the question plus paraphrases out

use crate::llm::{GenerationError, TextGenerationService};
use crate::retrieval::prompt::{parse_lines, PromptTemplate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default number of generated variants
pub const DEFAULT_NUM_VARIANTS: usize = 5;

const EXPANSION_TEMPLATE: &str = "\
You are a helpful and creative assistant with a goal to assist users.
When the user asks a question, your task is to generate {count} semantically
similar questions to it, to help them find the information they need.
Make sure that the questions are diverse and cover different aspects
of the topic. Suggest only short queries without compound sentences.
Output one question per line. Do not number the questions.
User question: {question}

Similar questions:
";

/// Ordered queries: the original first, then generated variants
///
/// Never empty. Duplicate variants are kept as generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySet {
    original: String,
    variants: Vec<String>,
}

impl QuerySet {
    /// A set holding only the original question
    pub fn original_only(original: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            variants: Vec::new(),
        }
    }

    pub fn with_variants(original: impl Into<String>, variants: Vec<String>) -> Self {
        Self {
            original: original.into(),
            variants,
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// All queries in order, original first
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.original.as_str()).chain(self.variants.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        1 + self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Generates paraphrases of a question with the text generation service
pub struct QueryExpander {
    generator: Arc<dyn TextGenerationService>,
    template: PromptTemplate,
}

impl QueryExpander {
    pub fn new(generator: Arc<dyn TextGenerationService>) -> Self {
        let template = PromptTemplate::new(EXPANSION_TEMPLATE, &["count", "question"])
            .expect("built-in expansion template declares its slots");
        Self {
            generator,
            template,
        }
    }

    /// Use a custom expansion prompt with `{count}` and `{question}` slots
    pub fn with_template(generator: Arc<dyn TextGenerationService>, template: PromptTemplate) -> Self {
        Self {
            generator,
            template,
        }
    }

    /// Expand a question into `n` requested variants plus the original
    ///
    /// The model may return more or fewer lines than asked for; every
    /// non-empty line becomes a variant.
    pub async fn expand(&self, question: &str, n: usize) -> Result<QuerySet, GenerationError> {
        let count = n.to_string();
        let prompt = self
            .template
            .render(&[("count", count.as_str()), ("question", question)])
            .map_err(|e| GenerationError::Configuration(e.to_string()))?;

        let raw = self.generator.complete(&prompt).await?;
        let variants = parse_lines(&raw);

        tracing::debug!(
            "Query expansion: {} -> {} variants (requested {})",
            question,
            variants.len(),
            n
        );

        Ok(QuerySet::with_variants(question, variants))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedGenerator {
        reply: Result<String, ()>,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedGenerator {
        fn new(reply: Result<&str, ()>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerationService for CannedGenerator {
        async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply
                .clone()
                .map_err(|_| GenerationError::Unreachable("down".to_string()))
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn test_blank_lines_dropped() {
        let generator = CannedGenerator::new(Ok(
            "How are refunds handled?\n\nCan I get my money back?\n\nWhat is the return window?\n",
        ));
        let expander = QueryExpander::new(generator.clone());

        let queries = expander
            .expand("What is the refund policy?", 5)
            .await
            .unwrap();

        assert_eq!(queries.len(), 4);
        assert_eq!(queries.original(), "What is the refund policy?");
        assert_eq!(queries.iter().next(), Some("What is the refund policy?"));

        let prompt = generator.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("generate 5 semantically"));
        assert!(prompt.contains("User question: What is the refund policy?"));
    }

    #[tokio::test]
    async fn test_empty_reply_keeps_original() {
        let expander = QueryExpander::new(CannedGenerator::new(Ok("")));
        let queries = expander.expand("anything?", 5).await.unwrap();

        assert_eq!(queries.len(), 1);
        assert!(queries.variants().is_empty());
        assert!(!queries.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_variants_kept() {
        let expander = QueryExpander::new(CannedGenerator::new(Ok("same?\nsame?")));
        let queries = expander.expand("q", 2).await.unwrap();
        assert_eq!(queries.variants(), &["same?".to_string(), "same?".to_string()]);
    }

    #[tokio::test]
    async fn test_service_error_propagates() {
        let expander = QueryExpander::new(CannedGenerator::new(Err(())));
        let result = expander.expand("q", 5).await;
        assert!(matches!(result, Err(GenerationError::Unreachable(_))));
    }
}
