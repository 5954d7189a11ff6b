/// Similarity index over passages: embedding provider + HNSW + passage table
use super::{EmbeddingError, EmbeddingProvider, VectorIndex, VectorIndexError};
use crate::config::IndexingConfig;
use crate::retrieval::{IndexError, Passage, PassageId, SimilarityIndex};
use ahash::{HashSet, HashSetExt};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Outcome of adding passages to the index
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexingReport {
    pub indexed: usize,
    pub skipped_duplicates: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

/// In-memory semantic index of passages
pub struct PassageIndex {
    provider: Arc<dyn EmbeddingProvider>,
    vectors: VectorIndex,
    passages: RwLock<Vec<Passage>>,
    ids: RwLock<HashSet<PassageId>>,
    ef_search: usize,
    batch_size: usize,
}

impl PassageIndex {
    /// Create an empty index sized for roughly `capacity` passages
    ///
    /// Fails when `config.vector_dim` disagrees with the provider.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        config: &IndexingConfig,
        batch_size: usize,
        capacity: usize,
    ) -> Result<Self, VectorIndexError> {
        if config.vector_dim != provider.dimension() {
            return Err(VectorIndexError::InvalidParameter(format!(
                "indexing.vector_dim is {} but {} produces {}-dimensional vectors",
                config.vector_dim,
                provider.model_name(),
                provider.dimension()
            )));
        }

        let vectors = VectorIndex::new(
            provider.dimension(),
            capacity,
            config.hnsw_ef_construction,
            config.hnsw_m,
        )?;

        Ok(Self {
            provider,
            vectors,
            passages: RwLock::new(Vec::with_capacity(capacity)),
            ids: RwLock::new(HashSet::new()),
            ef_search: config.hnsw_ef_search,
            batch_size: batch_size.max(1),
        })
    }

    /// Embed and index passages in batches
    ///
    /// Passages already in the index are skipped. A batch whose embedding
    /// fails is logged and counted as failed; the rest still get indexed.
    pub async fn add_passages(&self, passages: Vec<Passage>) -> IndexingReport {
        let start = std::time::Instant::now();
        let mut report = IndexingReport::default();

        let fresh = {
            let mut ids = self.ids.write().await;
            let mut fresh = Vec::with_capacity(passages.len());
            for passage in passages {
                if ids.insert(passage.id()) {
                    fresh.push(passage);
                } else {
                    report.skipped_duplicates += 1;
                }
            }
            fresh
        };

        info!("Indexing {} passages", fresh.len());

        for batch in fresh.chunks(self.batch_size) {
            match self.index_batch(batch).await {
                Ok(count) => {
                    report.indexed += count;
                    debug!("Indexed batch of {} passages", count);
                }
                Err(e) => {
                    warn!("Failed to index batch of {} passages: {}", batch.len(), e);
                    report.failed += batch.len();
                    let mut ids = self.ids.write().await;
                    for passage in batch {
                        ids.remove(&passage.id());
                    }
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Indexing complete: {} indexed, {} duplicates, {} failed, {}ms",
            report.indexed, report.skipped_duplicates, report.failed, report.duration_ms
        );

        report
    }

    async fn index_batch(&self, batch: &[Passage]) -> Result<usize, EmbeddingError> {
        let texts: Vec<String> = batch.iter().map(|p| p.content().to_string()).collect();
        let embeddings = self.provider.embed_batch(&texts)?;

        // Nothing becomes searchable unless the whole batch is insertable
        if embeddings.len() != batch.len() {
            return Err(EmbeddingError::GenerationError(format!(
                "Embedding count mismatch: expected {}, got {}",
                batch.len(),
                embeddings.len()
            )));
        }
        if let Some(bad) = embeddings
            .iter()
            .find(|e| e.len() != self.vectors.dimension())
        {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.vectors.dimension(),
                actual: bad.len(),
            });
        }

        let mut table = self.passages.write().await;
        for (passage, embedding) in batch.iter().zip(embeddings.iter()) {
            let id = table.len();
            self.vectors
                .insert(id, embedding)
                .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;
            table.push(passage.clone());
        }

        Ok(batch.len())
    }

    /// Number of indexed passages
    pub async fn len(&self) -> usize {
        self.passages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SimilarityIndex for PassageIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, IndexError> {
        let provider = self.provider.clone();
        let text = query.to_string();
        let embedding = tokio::task::spawn_blocking(move || provider.embed(&text))
            .await
            .map_err(|e| IndexError::Embedding(format!("Embedding task failed: {}", e)))?
            .map_err(|e| IndexError::Embedding(e.to_string()))?;

        let hits = self
            .vectors
            .search(&embedding, k, self.ef_search)
            .map_err(|e| IndexError::Search(e.to_string()))?;

        let table = self.passages.read().await;
        Ok(hits
            .into_iter()
            .filter_map(|hit| table.get(hit.id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bag-of-letters embedding: deterministic and model-free. Texts
    /// starting with '!' get a wrong-sized vector.
    struct LetterEmbedder;

    impl EmbeddingProvider for LetterEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if text.is_empty() {
                return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
            }
            if text.starts_with('!') {
                return Ok(vec![1.0; 3]);
            }
            let mut v = vec![0.01; 26];
            for c in text.to_ascii_lowercase().bytes() {
                if c.is_ascii_lowercase() {
                    v[(c - b'a') as usize] += 1.0;
                }
            }
            Ok(v)
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn dimension(&self) -> usize {
            26
        }

        fn model_name(&self) -> &str {
            "letters"
        }
    }

    fn letters_config() -> IndexingConfig {
        IndexingConfig {
            vector_dim: 26,
            ..IndexingConfig::default()
        }
    }

    fn index() -> PassageIndex {
        PassageIndex::new(Arc::new(LetterEmbedder), &letters_config(), 2, 16).unwrap()
    }

    #[test]
    fn test_configured_dimension_must_match_provider() {
        let result = PassageIndex::new(Arc::new(LetterEmbedder), &IndexingConfig::default(), 2, 16);
        assert!(matches!(result, Err(VectorIndexError::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn test_add_and_search() {
        let index = index();
        let report = index
            .add_passages(vec![
                Passage::new("aaaa", "doc1", Some("chunk-0".to_string())),
                Passage::new("zzzz", "doc1", Some("chunk-1".to_string())),
                Passage::new("aaab", "doc2", Some("chunk-0".to_string())),
            ])
            .await;

        assert_eq!(report.indexed, 3);
        assert_eq!(index.len().await, 3);

        let hits = index.search("aaaa", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content(), "aaaa");
        assert_eq!(hits[1].content(), "aaab");
    }

    #[tokio::test]
    async fn test_duplicates_skipped() {
        let index = index();
        let passage = Passage::new("same", "doc1", None);

        index.add_passages(vec![passage.clone()]).await;
        let report = index.add_passages(vec![passage]).await;

        assert_eq!(report.indexed, 0);
        assert_eq!(report.skipped_duplicates, 1);
        assert_eq!(index.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_batch_counted() {
        let index = index();
        let report = index
            .add_passages(vec![
                Passage::new("", "doc1", None),
                Passage::new("ok", "doc1", None),
                Passage::new("fine", "doc1", None),
            ])
            .await;

        // batch size 2: first batch holds the empty passage and fails
        assert_eq!(report.failed, 2);
        assert_eq!(report.indexed, 1);
    }

    #[tokio::test]
    async fn test_empty_query_is_index_error() {
        let index = index();
        assert!(matches!(
            index.search("", 3).await,
            Err(IndexError::Embedding(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_vector_rolls_back_whole_batch() {
        let index = index();
        let good = Passage::new("aaaa", "doc1", None);
        let report = index
            .add_passages(vec![good.clone(), Passage::new("!bad", "doc1", None)])
            .await;

        assert_eq!(report.indexed, 0);
        assert_eq!(report.failed, 2);
        assert_eq!(index.len().await, 0);
        assert!(index.search("aaaa", 3).await.unwrap().is_empty());

        // ids were released, so the good passage can still be added
        let report = index.add_passages(vec![good]).await;
        assert_eq!(report.indexed, 1);
        assert_eq!(report.skipped_duplicates, 0);
        assert_eq!(index.len().await, 1);
    }
}
