//! Grounded answer generation ("stuff" strategy)

use crate::llm::{GenerationError, TextGenerationService};
use crate::retrieval::prompt::PromptTemplate;
use crate::retrieval::RetrievalResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Reply the model is told to give when the context is insufficient
pub const UNKNOWN_ANSWER: &str = "I don't know";

const ANSWER_TEMPLATE: &str = "\
You are an expert helpful assistant.
Answer the following question based on the provided context. For any question,
if you cannot answer the question from the context, just say \"{unknown}\".
Keep the answers concise for the most part.

Context: {context}

Question: {question}

Answer:
";

/// Separator between passages in the stuffed context
const PASSAGE_SEPARATOR: &str = "\n\n";

/// Answer text plus the passages it was grounded in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    pub sources: RetrievalResult,
}

impl AnswerResult {
    /// Flatten into the caller-facing shape
    pub fn to_response(&self) -> AnswerResponse {
        AnswerResponse {
            answer: self.answer.clone(),
            sources: self
                .sources
                .iter()
                .map(|passage| SourceRef {
                    content: passage.content().to_string(),
                    source_id: passage.source_id().map(str::to_string),
                    locator: passage.locator().map(str::to_string),
                })
                .collect(),
        }
    }
}

/// Answer as exposed to the CLI and other front ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub content: String,
    pub source_id: Option<String>,
    pub locator: Option<String>,
}

/// Builds the grounding prompt and asks the generation service once
pub struct AnswerSynthesizer {
    generator: Arc<dyn TextGenerationService>,
    template: PromptTemplate,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerationService>) -> Self {
        let template = PromptTemplate::new(ANSWER_TEMPLATE, &["unknown", "context", "question"])
            .expect("built-in answer template declares its slots");
        Self {
            generator,
            template,
        }
    }

    /// Use a custom answer prompt with `{unknown}`, `{context}` and `{question}` slots
    pub fn with_template(generator: Arc<dyn TextGenerationService>, template: PromptTemplate) -> Self {
        Self {
            generator,
            template,
        }
    }

    /// Render the prompt for a question and its ranked context
    pub fn build_prompt(
        &self,
        question: &str,
        context: &RetrievalResult,
    ) -> Result<String, GenerationError> {
        let stuffed = context
            .iter()
            .map(|passage| passage.content())
            .collect::<Vec<_>>()
            .join(PASSAGE_SEPARATOR);

        self.template
            .render(&[
                ("unknown", UNKNOWN_ANSWER),
                ("context", stuffed.as_str()),
                ("question", question),
            ])
            .map_err(|e| GenerationError::Configuration(e.to_string()))
    }

    /// Generate an answer grounded in `context`
    ///
    /// An empty context is valid: the prompt instructs the model to reply
    /// with [`UNKNOWN_ANSWER`].
    pub async fn synthesize(
        &self,
        question: &str,
        context: RetrievalResult,
    ) -> Result<AnswerResult, GenerationError> {
        let prompt = self.build_prompt(question, &context)?;

        tracing::debug!(
            "Synthesizing answer from {} passages ({} prompt chars)",
            context.len(),
            prompt.len()
        );

        let answer = self.generator.complete(&prompt).await?;

        Ok(AnswerResult {
            answer: answer.trim().to_string(),
            sources: context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::Passage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerationService for RecordingGenerator {
        async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("  Thirty days.\n".to_string())
        }

        fn model_name(&self) -> &str {
            "recording"
        }
    }

    #[tokio::test]
    async fn test_context_stuffed_in_rank_order() {
        let generator = Arc::new(RecordingGenerator {
            prompts: Mutex::new(Vec::new()),
        });
        let synthesizer = AnswerSynthesizer::new(generator.clone());

        let context = RetrievalResult::new(vec![
            Passage::new("Refunds are issued within 30 days.", "doc1", Some("p3".to_string())),
            Passage::new("Contact support for returns.", "doc1", Some("p4".to_string())),
        ]);

        let result = synthesizer
            .synthesize("What is the refund policy?", context.clone())
            .await
            .unwrap();

        assert_eq!(result.answer, "Thirty days.");
        assert_eq!(result.sources, context);

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        let prompt = &prompts[0];
        let first = prompt.find("Refunds are issued").unwrap();
        let second = prompt.find("Contact support").unwrap();
        assert!(first < second);
        assert!(prompt.contains("Question: What is the refund policy?"));
        assert!(prompt.contains("just say \"I don't know\""));
    }

    #[test]
    fn test_empty_context_prompt() {
        let generator = Arc::new(RecordingGenerator {
            prompts: Mutex::new(Vec::new()),
        });
        let synthesizer = AnswerSynthesizer::new(generator);

        let prompt = synthesizer
            .build_prompt("anything?", &RetrievalResult::default())
            .unwrap();

        assert!(prompt.contains("Context: \n"));
        assert!(prompt.contains("Question: anything?"));
    }
}
