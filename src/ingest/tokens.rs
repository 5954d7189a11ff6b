//! Token-window re-splitting
//!
//! Character chunks can still exceed the embedding model's input window.
//! Each chunk is tokenized with the embedding model's own tokenizer and cut
//! into windows of at most `tokens_per_chunk` tokens. Window text is sliced
//! from the original chunk, so casing and spacing survive.

use super::IngestError;
use crate::retrieval::Passage;
use std::sync::Arc;

/// Token boundaries of a text
pub trait TokenSpans: Send + Sync {
    /// Byte range of every token in `text`, in order, special tokens excluded
    fn token_spans(&self, text: &str) -> Result<Vec<(usize, usize)>, IngestError>;
}

impl TokenSpans for tokenizers::Tokenizer {
    fn token_spans(&self, text: &str) -> Result<Vec<(usize, usize)>, IngestError> {
        let encoding = self
            .encode(text, false)
            .map_err(|e| IngestError::Tokenization(e.to_string()))?;
        Ok(encoding.get_offsets().to_vec())
    }
}

#[derive(Clone)]
pub struct TokenSplitter {
    tokenizer: Arc<dyn TokenSpans>,
    tokens_per_chunk: usize,
}

impl TokenSplitter {
    pub fn new(tokenizer: Arc<dyn TokenSpans>, tokens_per_chunk: usize) -> Self {
        Self {
            tokenizer,
            tokens_per_chunk: tokens_per_chunk.max(1),
        }
    }

    /// Cut text into trimmed, non-empty windows of at most `tokens_per_chunk` tokens
    pub fn split(&self, text: &str) -> Result<Vec<String>, IngestError> {
        let spans = self.tokenizer.token_spans(text)?;

        let mut windows = Vec::new();
        for window in spans.chunks(self.tokens_per_chunk) {
            let (Some(first), Some(last)) = (window.first(), window.last()) else {
                continue;
            };
            let piece = text.get(first.0..last.1).ok_or_else(|| {
                IngestError::Tokenization(format!(
                    "Token span {}..{} is not a valid range of the text",
                    first.0, last.1
                ))
            })?;

            let piece = piece.trim();
            if !piece.is_empty() {
                windows.push(piece.to_string());
            }
        }

        Ok(windows)
    }

    pub fn tokens_per_chunk(&self) -> usize {
        self.tokens_per_chunk
    }
}

/// Re-split passages so none exceeds the token window
///
/// Passages that already fit are kept as they are. Longer ones are replaced
/// by their windows, each carrying the parent's metadata.
pub fn split_by_tokens(
    passages: Vec<Passage>,
    splitter: &TokenSplitter,
) -> Result<Vec<Passage>, IngestError> {
    let before = passages.len();
    let mut split = Vec::with_capacity(before);

    for passage in passages {
        let mut windows = splitter.split(passage.content())?;

        if windows.len() <= 1 {
            match windows.pop() {
                Some(window) if window != passage.content() => {
                    split.push(Passage::with_metadata(window, passage.metadata().clone()));
                }
                Some(_) => split.push(passage),
                None => {}
            }
            continue;
        }

        split.extend(
            windows
                .into_iter()
                .map(|window| Passage::with_metadata(window, passage.metadata().clone())),
        );
    }

    tracing::info!(
        "Token re-split: {} passages -> {} (max {} tokens each)",
        before,
        split.len(),
        splitter.tokens_per_chunk()
    );

    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One token per whitespace-separated word
    struct WordSpans;

    impl TokenSpans for WordSpans {
        fn token_spans(&self, text: &str) -> Result<Vec<(usize, usize)>, IngestError> {
            let mut spans = Vec::new();
            let mut start = None;
            for (i, c) in text.char_indices() {
                match (c.is_whitespace(), start) {
                    (false, None) => start = Some(i),
                    (true, Some(s)) => {
                        spans.push((s, i));
                        start = None;
                    }
                    _ => {}
                }
            }
            if let Some(s) = start {
                spans.push((s, text.len()));
            }
            Ok(spans)
        }
    }

    fn splitter(tokens: usize) -> TokenSplitter {
        TokenSplitter::new(Arc::new(WordSpans), tokens)
    }

    #[test]
    fn test_windows_keep_original_text() {
        let windows = splitter(3).split("The Refund policy.\nReturns within 30 days").unwrap();
        assert_eq!(
            windows,
            vec!["The Refund policy.", "Returns within 30", "days"]
        );
    }

    #[test]
    fn test_short_text_single_window() {
        assert_eq!(splitter(256).split("  short text ").unwrap(), vec!["short text"]);
        assert!(splitter(256).split("   ").unwrap().is_empty());
    }

    #[test]
    fn test_split_passages_inherits_metadata() {
        let long = Passage::new("a b c d e", "doc1", Some("page-3".to_string()));
        let short = Passage::new("f g", "doc2", Some("chunk-0".to_string()));

        let passages = split_by_tokens(vec![long, short.clone()], &splitter(2)).unwrap();
        let contents: Vec<&str> = passages.iter().map(Passage::content).collect();

        assert_eq!(contents, vec!["a b", "c d", "e", "f g"]);
        assert!(passages[..3]
            .iter()
            .all(|p| p.source_id() == Some("doc1") && p.locator() == Some("page-3")));
        // fitting passages are untouched
        assert_eq!(passages[3], short);
    }

    #[test]
    fn test_invalid_span_is_an_error() {
        struct Broken;
        impl TokenSpans for Broken {
            fn token_spans(&self, _text: &str) -> Result<Vec<(usize, usize)>, IngestError> {
                Ok(vec![(0, 99)])
            }
        }

        let splitter = TokenSplitter::new(Arc::new(Broken), 4);
        assert!(matches!(
            splitter.split("tiny"),
            Err(IngestError::Tokenization(_))
        ));
    }
}
