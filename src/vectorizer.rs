//! TF-IDF vectorization of the tags corpus.
//!
//! ## Weighting scheme
//!
//! ```text
//! tf(t, d)  = number of occurrences of t in d       (1 + ln(count) when sublinear_tf)
//! idf(t)    = ln((1 + n) / (1 + df(t))) + 1         (smooth_idf, default)
//! idf(t)    = ln(n / df(t)) + 1                     (smooth_idf = false)
//! w(t, d)   = tf(t, d) * idf(t), then each row is L2-normalized
//! ```
//!
//! The vocabulary keeps the `max_features` terms with the highest corpus-wide
//! counts (ties broken by ascending term) and orders the selected columns
//! alphabetically. The whole corpus is fitted in one pass, so identical input
//! always produces identical vectors.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::errors::VectorizationError;
use crate::text_processing::TextProcessor;

/// Configuration for the term-weighting transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizerConfig {
    /// Upper bound on vocabulary size (feature dimension)
    pub max_features: usize,
    /// Add one to document frequencies as if an extra document held every term
    pub smooth_idf: bool,
    /// Replace raw counts with 1 + ln(count)
    pub sublinear_tf: bool,
    /// Stop words added to the built-in English list
    pub extra_stop_words: Vec<String>,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            max_features: 5000,
            smooth_idf: true,
            sublinear_tf: false,
            extra_stop_words: Vec::new(),
        }
    }
}

/// Sparse, L2-normalized feature row; indices are strictly increasing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Dot product by merging the two sorted index lists
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0f32;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}

/// One feature row per catalog item, in catalog order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    rows: Vec<SparseVector>,
    vocabulary: Vec<String>,
    idf: Vec<f32>,
}

impl FeatureMatrix {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Feature dimension: min(distinct terms, max_features)
    pub fn dimension(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn row(&self, index: usize) -> Option<&SparseVector> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[SparseVector] {
        &self.rows
    }

    /// Alphabetically ordered terms; position = feature column
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn idf(&self) -> &[f32] {
        &self.idf
    }
}

/// Fits the vocabulary and IDF statistics over a full corpus
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    config: VectorizerConfig,
    processor: TextProcessor,
}

impl TfidfVectorizer {
    pub fn new(config: VectorizerConfig) -> Self {
        let processor = TextProcessor::new().with_extra_stop_words(&config.extra_stop_words);
        Self { config, processor }
    }

    pub fn config(&self) -> &VectorizerConfig {
        &self.config
    }

    /// Learn the vocabulary from `documents` and return their weighted rows
    pub fn fit_transform<S: AsRef<str>>(
        &self,
        documents: &[S],
    ) -> Result<FeatureMatrix, VectorizationError> {
        if self.config.max_features == 0 {
            return Err(VectorizationError::InvalidConfig {
                reason: "max_features must be greater than 0".to_string(),
            });
        }
        if documents.is_empty() {
            return Err(VectorizationError::EmptyCorpus);
        }

        let n_docs = documents.len();
        let tokenized: Vec<Vec<String>> = documents
            .iter()
            .map(|doc| self.processor.terms(doc.as_ref()))
            .collect();

        let mut term_count: HashMap<&str, usize> = HashMap::new();
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for tokens in &tokenized {
            let mut seen: HashSet<&str> = HashSet::new();
            for token in tokens {
                *term_count.entry(token.as_str()).or_insert(0) += 1;
                if seen.insert(token.as_str()) {
                    *doc_freq.entry(token.as_str()).or_insert(0) += 1;
                }
            }
        }

        if term_count.is_empty() {
            return Err(VectorizationError::NoTerms { documents: n_docs });
        }

        let mut ranked: Vec<(&str, usize)> = term_count.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(self.config.max_features);

        let mut vocabulary: Vec<String> = ranked.iter().map(|(term, _)| term.to_string()).collect();
        vocabulary.sort();

        let column: HashMap<&str, u32> = vocabulary
            .iter()
            .enumerate()
            .map(|(idx, term)| (term.as_str(), idx as u32))
            .collect();

        let idf: Vec<f64> = vocabulary
            .iter()
            .map(|term| {
                let df = doc_freq.get(term.as_str()).copied().unwrap_or(0) as f64;
                let n = n_docs as f64;
                if self.config.smooth_idf {
                    ((1.0 + n) / (1.0 + df)).ln() + 1.0
                } else {
                    (n / df).ln() + 1.0
                }
            })
            .collect();

        let rows = tokenized
            .iter()
            .map(|tokens| self.weigh(tokens, &column, &idf))
            .collect();

        let matrix = FeatureMatrix {
            rows,
            vocabulary,
            idf: idf.iter().map(|v| *v as f32).collect(),
        };

        log::debug!(
            "Fitted TF-IDF over {} documents, vocabulary size {}",
            n_docs,
            matrix.dimension()
        );

        Ok(matrix)
    }

    fn weigh(&self, tokens: &[String], column: &HashMap<&str, u32>, idf: &[f64]) -> SparseVector {
        let mut counts: BTreeMap<u32, f64> = BTreeMap::new();
        for token in tokens {
            if let Some(&idx) = column.get(token.as_str()) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let weighted: Vec<(u32, f64)> = counts
            .into_iter()
            .map(|(idx, count)| {
                let tf = if self.config.sublinear_tf { 1.0 + count.ln() } else { count };
                (idx, tf * idf[idx as usize])
            })
            .collect();

        let norm = weighted.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm == 0.0 {
            return SparseVector::default();
        }

        SparseVector {
            indices: weighted.iter().map(|(idx, _)| *idx).collect(),
            values: weighted.iter().map(|(_, w)| (w / norm) as f32).collect(),
        }
    }
}
