/// HNSW vector index for similarity search
use hnsw_rs::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// Maximum number of HNSW layers
const MAX_LAYERS: usize = 16;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Invalid index parameter: {0}")]
    InvalidParameter(String),
}

/// Search result with ID and similarity score
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// ID of the item (position in the passage table)
    pub id: usize,
    /// Cosine similarity score (higher is more similar)
    pub score: f32,
}

/// In-memory HNSW index over passage embeddings
///
/// Uses cosine distance. Nothing is written to disk: the index is rebuilt
/// from the documents on every run.
pub struct VectorIndex {
    index: Hnsw<'static, f32, DistCosine>,
    dimension: usize,
    count: AtomicUsize,
}

impl VectorIndex {
    /// Create a new vector index
    ///
    /// # Arguments
    /// * `dimension` - Vector dimension (must match embedding dimension)
    /// * `max_elements` - Expected number of vectors (sizing hint)
    /// * `ef_construction` - HNSW construction parameter (higher = better recall, slower build)
    /// * `m` - HNSW M parameter (number of connections per layer)
    pub fn new(
        dimension: usize,
        max_elements: usize,
        ef_construction: usize,
        m: usize,
    ) -> Result<Self, VectorIndexError> {
        if dimension == 0 || ef_construction == 0 || m == 0 {
            return Err(VectorIndexError::InvalidParameter(format!(
                "dimension={}, ef_construction={}, m={} must all be positive",
                dimension, ef_construction, m
            )));
        }

        let index = Hnsw::<f32, DistCosine>::new(
            m,
            max_elements.max(1),
            MAX_LAYERS,
            ef_construction,
            DistCosine,
        );

        Ok(Self {
            index,
            dimension,
            count: AtomicUsize::new(0),
        })
    }

    /// Insert a vector into the index
    pub fn insert(&self, id: usize, vector: &[f32]) -> Result<(), VectorIndexError> {
        self.check_dimension(vector)?;

        let data = vector.to_vec();
        self.index.insert((&data, id));
        self.count.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }

    /// Search for k nearest neighbors
    ///
    /// # Returns
    /// Results sorted by similarity, best first
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
    ) -> Result<Vec<SearchResult>, VectorIndexError> {
        self.check_dimension(query)?;

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<SearchResult> = self
            .index
            .search(query, k, ef_search.max(k))
            .into_iter()
            .map(|neighbour| SearchResult {
                id: neighbour.d_id,
                score: 1.0 - neighbour.distance,
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(k);

        Ok(results)
    }

    /// Get the number of vectors in the index
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), VectorIndexError> {
        if vector.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    #[test]
    fn test_index_creation() {
        let index = VectorIndex::new(8, 100, 200, 16).unwrap();
        assert_eq!(index.dimension(), 8);
        assert_eq!(index.len(), 0);
        assert!(index.is_empty());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(VectorIndex::new(0, 100, 200, 16).is_err());
        assert!(VectorIndex::new(8, 100, 0, 16).is_err());
    }

    #[test]
    fn test_insert_and_search() {
        let index = VectorIndex::new(8, 100, 200, 16).unwrap();

        let mut near = vec![0.0; 8];
        near[0] = 0.9;
        near[1] = 0.1;

        index.insert(0, &unit(8, 0)).unwrap();
        index.insert(1, &unit(8, 1)).unwrap();
        index.insert(2, &near).unwrap();
        assert_eq!(index.len(), 3);

        let results = index.search(&unit(8, 0), 2, 50).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 0);
        assert_eq!(results[1].id, 2);
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn test_search_empty_index() {
        let index = VectorIndex::new(8, 100, 200, 16).unwrap();
        assert!(index.search(&unit(8, 0), 5, 50).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_validation() {
        let index = VectorIndex::new(8, 100, 200, 16).unwrap();
        assert!(index.insert(1, &[1.0; 4]).is_err());
        assert!(index.search(&[1.0; 4], 1, 50).is_err());
    }
}
