//! Passages, identities and ranked results

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Metadata key holding the source document identifier
pub const SOURCE_KEY: &str = "source_id";

/// Metadata key holding the page/offset locator inside the source
pub const LOCATOR_KEY: &str = "locator";

/// Passage metadata, ordered by key so identity hashing is canonical
pub type Metadata = BTreeMap<String, Value>;

/// Stable identity of a passage (BLAKE3 over content and metadata)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassageId([u8; 32]);

impl PassageId {
    fn compute(content: &str, metadata: &Metadata) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(content.len() as u64).to_le_bytes());
        hasher.update(content.as_bytes());
        for (key, value) in metadata {
            let value = value.to_string();
            hasher.update(&(key.len() as u64).to_le_bytes());
            hasher.update(key.as_bytes());
            hasher.update(&(value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }
        Self(*hasher.finalize().as_bytes())
    }
}

impl fmt::Display for PassageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 16 bytes is plenty for display purposes
        for byte in &self.0[..16] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Immutable unit of retrieved text with its source metadata
///
/// Fields are private: once built, neither content nor metadata can change,
/// so the identity computed at construction stays valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PassageRecord", into = "PassageRecord")]
pub struct Passage {
    content: String,
    metadata: Metadata,
    id: PassageId,
}

impl Passage {
    /// Create a passage from a source document identifier and optional locator
    pub fn new(
        content: impl Into<String>,
        source_id: impl Into<String>,
        locator: Option<String>,
    ) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), Value::String(source_id.into()));
        if let Some(locator) = locator {
            metadata.insert(LOCATOR_KEY.to_string(), Value::String(locator));
        }
        Self::with_metadata(content, metadata)
    }

    /// Create a passage from arbitrary metadata
    pub fn with_metadata(content: impl Into<String>, metadata: Metadata) -> Self {
        let content = content.into();
        let id = PassageId::compute(&content, &metadata);
        Self {
            content,
            metadata,
            id,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn id(&self) -> PassageId {
        self.id
    }

    /// Source document identifier, if recorded
    pub fn source_id(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(Value::as_str)
    }

    /// Page/offset locator, if recorded
    pub fn locator(&self) -> Option<&str> {
        self.metadata.get(LOCATOR_KEY).and_then(Value::as_str)
    }

    /// Get a short preview of the content (first N characters)
    pub fn preview(&self, max_chars: usize) -> String {
        match self.content.char_indices().nth(max_chars) {
            Some((end, _)) => format!("{}...", &self.content[..end]),
            None => self.content.clone(),
        }
    }
}

/// Serialized form of a passage; identity is recomputed on load
#[derive(Serialize, Deserialize)]
struct PassageRecord {
    content: String,
    metadata: Metadata,
}

impl From<PassageRecord> for Passage {
    fn from(record: PassageRecord) -> Self {
        Passage::with_metadata(record.content, record.metadata)
    }
}

impl From<Passage> for PassageRecord {
    fn from(passage: Passage) -> Self {
        Self {
            content: passage.content,
            metadata: passage.metadata,
        }
    }
}

/// A passage with a relevance score from one reranking call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub passage: Passage,

    /// Relevance score (higher is better, comparable only within one call)
    pub score: f32,
}

impl ScoredPassage {
    pub fn new(passage: Passage, score: f32) -> Self {
        Self { passage, score }
    }
}

/// Ranked passages after reranking and truncation, best first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetrievalResult {
    passages: Vec<Passage>,
}

impl RetrievalResult {
    pub fn new(passages: Vec<Passage>) -> Self {
        Self { passages }
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Passage> {
        self.passages.iter()
    }

    pub fn into_passages(self) -> Vec<Passage> {
        self.passages
    }
}

impl<'a> IntoIterator for &'a RetrievalResult {
    type Item = &'a Passage;
    type IntoIter = std::slice::Iter<'a, Passage>;

    fn into_iter(self) -> Self::IntoIter {
        self.passages.iter()
    }
}
