//! Recursive character text splitter
//!
//! Tries separators from coarsest to finest: pieces short enough are merged
//! back up to `chunk_size`, pieces still too long are split again with the
//! next separator. Separators stay attached to the end of the piece they
//! close, so a sentence keeps its period. Lengths are counted in characters.

use std::collections::VecDeque;

/// Paragraph, line, sentence, word, character
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_separators(mut self, separators: &[&str]) -> Self {
        self.separators = separators.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Split text into trimmed, non-empty chunks
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        // First separator present in the text; "" always matches
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep.as_str()))
            .unwrap_or(separators.len().saturating_sub(1));

        let separator = separators.get(position).map(String::as_str).unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split_inclusive(separator)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut short = Vec::new();

        for piece in pieces {
            if char_len(&piece) < self.chunk_size {
                short.push(piece);
                continue;
            }

            if !short.is_empty() {
                chunks.extend(self.merge(&short));
                short.clear();
            }

            if finer.is_empty() {
                chunks.push(piece.trim().to_string());
            } else {
                chunks.extend(self.split_with(&piece, finer));
            }
        }

        if !short.is_empty() {
            chunks.extend(self.merge(&short));
        }

        chunks.retain(|c| !c.is_empty());
        chunks
    }

    /// Concatenate short pieces into chunks of at most `chunk_size`
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !current.is_empty() {
                push_joined(&mut chunks, &current);

                // Keep a tail of at most `chunk_overlap` characters
                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    let Some(first) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(first);
                }
            }

            current.push_back(piece);
            total += len;
        }

        push_joined(&mut chunks, &current);
        chunks
    }
}

fn push_joined(chunks: &mut Vec<String>, current: &VecDeque<&str>) {
    let joined: String = current.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_single_chunk() {
        let splitter = TextSplitter::new(1000, 0);
        assert_eq!(splitter.split("  Hello world.  "), vec!["Hello world."]);
    }

    #[test]
    fn test_empty_text() {
        let splitter = TextSplitter::new(1000, 0);
        assert!(splitter.split("").is_empty());
        assert!(splitter.split("\n\n\n").is_empty());
    }

    #[test]
    fn test_paragraphs_merged_up_to_chunk_size() {
        let splitter = TextSplitter::new(20, 0);
        let chunks = splitter.split("aaaa\n\nbbbb\n\ncccccccccccccccc");

        assert_eq!(chunks, vec!["aaaa\n\nbbbb", "cccccccccccccccc"]);
    }

    #[test]
    fn test_sentences_keep_their_period() {
        let splitter = TextSplitter::new(20, 0);
        let chunks = splitter.split("Alpha beta. Gamma delta. Epsilon zeta.");

        assert_eq!(chunks, vec!["Alpha beta.", "Gamma delta.", "Epsilon zeta."]);
    }

    #[test]
    fn test_long_piece_split_recursively() {
        let splitter = TextSplitter::new(10, 0);
        let chunks = splitter.split("one two three four five");

        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.join(" "), "one two three four five");
    }

    #[test]
    fn test_no_separator_falls_back_to_characters() {
        let splitter = TextSplitter::new(4, 0);
        let chunks = splitter.split("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_overlap() {
        let splitter = TextSplitter::new(9, 4).with_separators(&[" "]);
        let chunks = splitter.split("aa bb cc dd ee");
        assert_eq!(chunks, vec!["aa bb cc", "cc dd ee"]);
    }

    #[test]
    fn test_multibyte_lengths() {
        let splitter = TextSplitter::new(3, 0);
        let chunks = splitter.split("äöüß");
        assert_eq!(chunks, vec!["äöü", "ß"]);
    }
}
