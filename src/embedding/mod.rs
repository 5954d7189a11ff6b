/// Embedding & indexing
///
/// Local embedding generation and the in-memory similarity index the
/// retrieval pipeline searches.
/// Architecture:
/// - EmbeddingProvider trait for abstraction
/// - FastEmbedProvider for local embedding (all-MiniLM-L6-v2, 384-dim)
/// - HNSW for vector similarity search
/// - PassageIndex tying both to the passage table (implements SimilarityIndex)
mod passage_index;
mod provider;
mod vector_index;

pub use passage_index::{IndexingReport, PassageIndex};
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
pub use vector_index::{SearchResult, VectorIndex, VectorIndexError};
