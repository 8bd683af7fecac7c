//! Recommendation engine: builds the similarity snapshot for a catalog and
//! answers nearest-neighbor queries against it.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use rayon::prelude::*;

use crate::catalog::Catalog;
use crate::errors::{ArtifactVersionError, RecommenderResult};
use crate::similarity_search::SimilarityMatrix;
use crate::types::Recommendation;
use crate::vectorizer::{FeatureMatrix, TfidfVectorizer, VectorizerConfig};

/// Default number of recommendations per query
pub const DEFAULT_K: usize = 5;

/// Immutable similarity snapshot over one catalog
#[derive(Debug, Clone)]
pub struct Recommender {
    catalog: Arc<Catalog>,
    /// Present after a fresh build; not persisted in artifacts
    features: Option<FeatureMatrix>,
    vocabulary: Vec<String>,
    similarity: SimilarityMatrix,
}

impl Recommender {
    /// Vectorize the catalog's tags and compute the full similarity matrix
    pub fn build(catalog: Catalog, config: &VectorizerConfig) -> RecommenderResult<Self> {
        let start = Instant::now();
        let features = TfidfVectorizer::new(config.clone()).fit_transform(&catalog.tags())?;
        let similarity = SimilarityMatrix::from_features(&features);

        log::info!(
            "Built recommender over {} items ({} features) in {:?}",
            catalog.len(),
            features.dimension(),
            start.elapsed()
        );

        Ok(Self {
            catalog: Arc::new(catalog),
            vocabulary: features.vocabulary().to_vec(),
            features: Some(features),
            similarity,
        })
    }

    /// Reassemble a snapshot from persisted parts
    pub fn from_parts(
        catalog: Catalog,
        vocabulary: Vec<String>,
        similarity: SimilarityMatrix,
    ) -> Result<Self, ArtifactVersionError> {
        if similarity.size() != catalog.len() {
            return Err(ArtifactVersionError::MatrixShape {
                header_rows: catalog.len(),
                matrix_rows: similarity.size(),
            });
        }
        Ok(Self {
            catalog: Arc::new(catalog),
            features: None,
            vocabulary,
            similarity,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn features(&self) -> Option<&FeatureMatrix> {
        self.features.as_ref()
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn similarity(&self) -> &SimilarityMatrix {
        &self.similarity
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    /// Up to `k` items most similar to the first item titled `title`
    ///
    /// An unknown title yields an empty list.
    pub fn recommend(&self, title: &str, k: usize) -> Vec<Recommendation> {
        match self.catalog.find_by_title(title) {
            Some(index) => self.recommend_index(index, k),
            None => {
                log::debug!("No catalog item titled '{}'", title);
                Vec::new()
            }
        }
    }

    /// Up to `k` items most similar to catalog row `index`
    pub fn recommend_index(&self, index: usize, k: usize) -> Vec<Recommendation> {
        self.similarity
            .top_k(index, k)
            .into_iter()
            .enumerate()
            .filter_map(|(rank, neighbor)| {
                let item = self.catalog.get(neighbor.index)?;
                Some(Recommendation {
                    rank,
                    index: neighbor.index,
                    title: item.title.clone(),
                    id: item.id,
                    score: neighbor.score,
                })
            })
            .collect()
    }

    /// Answer many queries in parallel; results follow the order of `titles`
    pub fn recommend_batch<S>(&self, titles: &[S], k: usize) -> Vec<Vec<Recommendation>>
    where
        S: AsRef<str> + Sync,
    {
        titles
            .par_iter()
            .map(|title| self.recommend(title.as_ref(), k))
            .collect()
    }
}

/// Holds the live snapshot and swaps in rebuilt ones
///
/// Readers clone the `Arc` and keep querying their snapshot while a rebuild
/// replaces it.
#[derive(Debug)]
pub struct RecommenderService {
    current: RwLock<Arc<Recommender>>,
}

impl RecommenderService {
    pub fn new(recommender: Recommender) -> Self {
        Self {
            current: RwLock::new(Arc::new(recommender)),
        }
    }

    /// Snapshot in effect right now
    pub fn current(&self) -> Arc<Recommender> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Install `recommender` and return the snapshot it replaced
    pub fn swap(&self, recommender: Recommender) -> Arc<Recommender> {
        let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = std::mem::replace(&mut *guard, Arc::new(recommender));
        log::info!(
            "Swapped recommender snapshot ({} -> {} items)",
            previous.len(),
            guard.len()
        );
        previous
    }

    /// Build a snapshot for `catalog` and swap it in; the old one stays live on failure
    pub fn rebuild(&self, catalog: Catalog, config: &VectorizerConfig) -> RecommenderResult<Arc<Recommender>> {
        let recommender = Recommender::build(catalog, config)?;
        Ok(self.swap(recommender))
    }

    pub fn recommend(&self, title: &str, k: usize) -> Vec<Recommendation> {
        self.current().recommend(title, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{RecommenderError, VectorizationError};
    use crate::types::Item;

    fn catalog(entries: &[(u64, &str, &str)]) -> Catalog {
        Catalog::from_items(
            entries.iter().map(|(id, title, tags)| Item::new(*id, *title, *tags)).collect(),
            vec!["tags".to_string()],
        )
    }

    fn abc() -> Recommender {
        let catalog = catalog(&[(1, "A", "space war"), (2, "B", "space love"), (3, "C", "love story")]);
        Recommender::build(catalog, &VectorizerConfig::default()).unwrap()
    }

    #[test]
    fn test_recommend_ranks_by_similarity() {
        let recommender = abc();
        let pairs: Vec<(String, u64)> = recommender
            .recommend("A", 2)
            .iter()
            .map(|r| (r.title.clone(), r.id))
            .collect();
        assert_eq!(pairs, vec![("B".to_string(), 2), ("C".to_string(), 3)]);
    }

    #[test]
    fn test_ranks_are_sequential() {
        let recs = abc().recommend("B", 5);
        let ranks: Vec<usize> = recs.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![0, 1]);
    }

    #[test]
    fn test_unknown_title_and_zero_k_are_empty() {
        let recommender = abc();
        assert!(recommender.recommend("Z", 5).is_empty());
        assert!(recommender.recommend("A", 0).is_empty());
        assert!(recommender.recommend("a", 5).is_empty());
    }

    #[test]
    fn test_single_item_catalog_has_no_neighbors() {
        let recommender =
            Recommender::build(catalog(&[(1, "Solo", "space")]), &VectorizerConfig::default()).unwrap();
        assert!(recommender.recommend("Solo", 5).is_empty());
    }

    #[test]
    fn test_empty_catalog_is_vectorization_error() {
        let result = Recommender::build(catalog(&[]), &VectorizerConfig::default());
        assert!(matches!(
            result,
            Err(RecommenderError::Vectorization(VectorizationError::EmptyCorpus))
        ));
    }

    #[test]
    fn test_duplicate_title_uses_first_row() {
        let catalog = catalog(&[(1, "A", "space war"), (2, "A", "love story"), (3, "B", "space war")]);
        let recommender = Recommender::build(catalog, &VectorizerConfig::default()).unwrap();
        let recs = recommender.recommend("A", 1);
        assert_eq!(recs[0].id, 3);
    }

    #[test]
    fn test_batch_matches_sequential() {
        let recommender = abc();
        let titles = ["A", "missing", "C"];
        let batch = recommender.recommend_batch(&titles[..], 2);
        assert_eq!(batch.len(), 3);
        for (title, result) in titles.iter().zip(&batch) {
            assert_eq!(result, &recommender.recommend(title, 2));
        }
    }

    #[test]
    fn test_from_parts_checks_matrix_size() {
        let recommender = abc();
        let result = Recommender::from_parts(
            catalog(&[(1, "A", "")]),
            recommender.vocabulary().to_vec(),
            recommender.similarity().clone(),
        );
        assert!(matches!(
            result,
            Err(ArtifactVersionError::MatrixShape { header_rows: 1, matrix_rows: 3 })
        ));
    }

    #[test]
    fn test_service_swap_keeps_old_snapshot_alive() {
        let service = RecommenderService::new(abc());
        let before = service.current();

        let replacement = catalog(&[(10, "X", "heist crew"), (11, "Y", "heist vault")]);
        let previous = service.rebuild(replacement, &VectorizerConfig::default()).unwrap();

        assert_eq!(previous.len(), 3);
        assert_eq!(before.recommend("A", 1)[0].title, "B");
        assert_eq!(service.recommend("X", 1)[0].title, "Y");
        assert!(service.recommend("A", 1).is_empty());
    }

    #[test]
    fn test_failed_rebuild_keeps_current_snapshot() {
        let service = RecommenderService::new(abc());
        let result = service.rebuild(catalog(&[(1, "A", "the of")]), &VectorizerConfig::default());
        assert!(result.is_err());
        assert_eq!(service.current().len(), 3);
    }
}
