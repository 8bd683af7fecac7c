use serde::{Deserialize, Serialize};

/// Stable catalog identifier (the TMDB movie id for the bundled dataset)
pub type ItemId = u64;

/// A cleaned catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier
    pub id: ItemId,
    /// User-facing title, not guaranteed unique
    pub title: String,
    /// Composite text blob used for vectorization (never null, may be empty)
    pub tags: String,
}

impl Item {
    pub fn new(id: ItemId, title: impl Into<String>, tags: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            tags: tags.into(),
        }
    }
}

/// One ranked result of a nearest-neighbor query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Zero-based rank (0 = most similar)
    pub rank: usize,
    /// Catalog row index of the recommended item
    pub index: usize,
    pub title: String,
    pub id: ItemId,
    /// Cosine similarity to the queried item
    pub score: f32,
}

impl Recommendation {
    /// The `(title, id)` pair presented to callers
    pub fn as_pair(&self) -> (&str, ItemId) {
        (self.title.as_str(), self.id)
    }
}

/// How to treat duplicate titles introduced by joining an auxiliary table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DuplicateTitlePolicy {
    /// Fail the merge with `MergeError::DuplicateTitles`
    #[default]
    Reject,
    /// Keep the rows, log a warning and report the titles as degraded
    Warn,
}

/// Outcome of an auxiliary-table join
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub primary_rows: usize,
    pub auxiliary_rows: usize,
    pub merged_rows: usize,
    /// Primary rows that found no auxiliary match and were dropped
    pub unmatched_rows: usize,
    /// Titles duplicated by the join (only non-empty under `DuplicateTitlePolicy::Warn`)
    pub duplicated_titles: Vec<String>,
}

impl MergeReport {
    /// True when duplicates were kept and title lookup may be ambiguous
    pub fn is_degraded(&self) -> bool {
        !self.duplicated_titles.is_empty()
    }
}
