//! Similarity matrix construction and nearest-neighbor ranking.
//!
//! ## Cosine Similarity
//!
//! ```text
//! cosine_similarity(A, B) = (A · B) / (||A|| * ||B||)
//! ```
//!
//! Defined as 0.0 when either vector has zero magnitude (a document with no
//! recognized terms). TF-IDF rows are non-negative, so every entry of the
//! matrix lies in [0, 1].
//!
//! ## Matrix layout
//!
//! The N×N matrix is stored row-major as a flat `Vec<f32>`. Only the upper
//! triangle is computed; each value is mirrored so `(i, j)` and `(j, i)` are
//! bit-identical. The diagonal is exactly 1.0 for non-zero rows.
//!
//! ## Ranking
//!
//! Neighbors are ordered by score descending, then by ascending catalog index.
//! A bounded `BinaryHeap` keeps the k best candidates so a query is
//! O(N log k).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::vectorizer::FeatureMatrix;

/// A candidate neighbor and its similarity to the query row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub index: usize,
    pub score: f32,
}

impl Neighbor {
    /// Rank order: higher score first, then lower index first
    fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.index.cmp(&other.index))
    }
}

/// Heap entry ordered so the worst-ranked candidate sits on top
#[derive(Debug, Clone, Copy, PartialEq)]
struct HeapEntry(Neighbor);

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.rank_cmp(&other.0)
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Immutable, symmetric N×N cosine similarity matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatrix {
    size: usize,
    values: Vec<f32>,
}

impl SimilarityMatrix {
    /// Compute all pairwise similarities of the (L2-normalized) feature rows
    pub fn from_features(features: &FeatureMatrix) -> Self {
        let rows = features.rows();
        let size = rows.len();
        let norms: Vec<f32> = rows.iter().map(|row| row.norm()).collect();
        let mut values = vec![0.0f32; size * size];

        for i in 0..size {
            if norms[i] == 0.0 {
                continue;
            }
            values[i * size + i] = 1.0;
            for j in (i + 1)..size {
                if norms[j] == 0.0 {
                    continue;
                }
                let score = (rows[i].dot(&rows[j]) / (norms[i] * norms[j])).clamp(0.0, 1.0);
                values[i * size + j] = score;
                values[j * size + i] = score;
            }
        }

        log::debug!("Computed {}x{} similarity matrix", size, size);
        Self { size, values }
    }

    /// Rebuild from persisted parts; `None` when the value count is not size²
    pub fn from_parts(size: usize, values: Vec<f32>) -> Option<Self> {
        (size.checked_mul(size)? == values.len()).then_some(Self { size, values })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f32> {
        if i < self.size && j < self.size {
            Some(self.values[i * self.size + j])
        } else {
            None
        }
    }

    /// Similarity vector of one row (length N)
    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index < self.size {
            Some(&self.values[index * self.size..(index + 1) * self.size])
        } else {
            None
        }
    }

    /// Top `k` neighbors of `index`, excluding `index` itself
    ///
    /// Returns an empty vector for an out-of-range index or `k == 0`.
    pub fn top_k(&self, index: usize, k: usize) -> Vec<Neighbor> {
        let Some(row) = self.row(index) else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(k + 1);
        for (candidate, &score) in row.iter().enumerate() {
            if candidate == index {
                continue;
            }
            let entry = HeapEntry(Neighbor { index: candidate, score });
            if heap.len() < k {
                heap.push(entry);
            } else if let Some(worst) = heap.peek() {
                if entry < *worst {
                    heap.pop();
                    heap.push(entry);
                }
            }
        }

        let mut neighbors: Vec<Neighbor> = heap.into_iter().map(|entry| entry.0).collect();
        neighbors.sort_by(|a, b| a.rank_cmp(b));
        neighbors
    }
}
