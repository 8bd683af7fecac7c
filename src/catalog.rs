//! Catalog loading and tag construction.
//!
//! A `RawTable` is read from CSV with empty cells treated as missing. An
//! optional auxiliary table (TMDB credits) can be inner-joined by title.
//! `build_catalog` then replaces missing tag attributes with empty strings and
//! concatenates them, in the configured order, into each item's `tags`.
//! Output row order always matches input row order; that order is the index
//! space of the similarity matrix.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{LoadError, MergeError};
use crate::types::{DuplicateTitlePolicy, Item, MergeReport};

/// Attribute order used by default when building tags
pub const DEFAULT_TAG_COLUMNS: &[&str] = &["overview", "genres", "keywords", "tagline", "cast", "crew"];

/// Column layout and tag construction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub id_column: String,
    pub title_column: String,
    /// Attributes concatenated into `tags`, in this exact order
    pub tag_columns: Vec<String>,
    /// Flatten JSON arrays like `[{"name": "Action"}]` to their names
    pub flatten_json_lists: bool,
    pub duplicate_title_policy: DuplicateTitlePolicy,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            id_column: "id".to_string(),
            title_column: "title".to_string(),
            tag_columns: DEFAULT_TAG_COLUMNS.iter().map(|c| c.to_string()).collect(),
            flatten_json_lists: true,
            duplicate_title_policy: DuplicateTitlePolicy::Reject,
        }
    }
}

/// Tabular records as read from CSV; `None` marks a missing cell
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    /// Primary row each row was joined from; empty unless produced by a join
    source_rows: Vec<usize>,
}

impl RawTable {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
            source_rows: Vec::new(),
        }
    }

    /// Append a row; short rows are padded with missing cells
    pub fn push_row(&mut self, mut row: Vec<Option<String>>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    fn push_joined_row(&mut self, row: Vec<Option<String>>, source_row: usize) {
        self.push_row(row);
        self.source_rows.push(source_row);
    }

    /// Whether rows `a` and `b` were both joined from the same primary row
    pub fn same_source(&self, a: usize, b: usize) -> bool {
        match (self.source_rows.get(a), self.source_rows.get(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    pub fn from_csv_path(path: &Path) -> Result<Self, LoadError> {
        let file = std::fs::File::open(path).map_err(|e| LoadError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_csv_reader(name, file)
    }

    pub fn from_csv_reader<R: Read>(name: impl Into<String>, reader: R) -> Result<Self, LoadError> {
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
        let columns: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let mut table = Self::new(name, columns);

        for result in reader.records() {
            let record = result?;
            let row = record
                .iter()
                .map(|cell| if cell.is_empty() { None } else { Some(cell.to_string()) })
                .collect();
            table.push_row(row);
        }

        log::info!("Loaded {} rows from {}", table.len(), table.name);
        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column)?.as_deref()
    }

    fn require_column(&self, column: &str) -> Result<usize, LoadError> {
        self.column_index(column).ok_or_else(|| LoadError::MissingColumn {
            column: column.to_string(),
            table: self.name.clone(),
        })
    }
}

/// Inner-join `auxiliary` onto `primary` by title
///
/// Each primary row yields one output row per matching auxiliary row, in
/// auxiliary order; unmatched primary rows are dropped. Auxiliary columns that
/// already exist in the primary table are ignored.
pub fn merge_by_title(
    primary: &RawTable,
    auxiliary: &RawTable,
    config: &CatalogConfig,
) -> Result<(RawTable, MergeReport), MergeError> {
    let key = config.title_column.as_str();
    let missing_key = |table: &RawTable| MergeError::MissingKeyColumn {
        column: key.to_string(),
        table: table.name.clone(),
    };
    let primary_key = primary.column_index(key).ok_or_else(|| missing_key(primary))?;
    let auxiliary_key = auxiliary.column_index(key).ok_or_else(|| missing_key(auxiliary))?;

    let extra_columns: Vec<usize> = (0..auxiliary.columns.len())
        .filter(|&idx| idx != auxiliary_key && primary.column_index(&auxiliary.columns[idx]).is_none())
        .collect();
    for (idx, column) in auxiliary.columns.iter().enumerate() {
        if idx != auxiliary_key && !extra_columns.contains(&idx) {
            log::debug!("Ignoring auxiliary column '{}' already present in {}", column, primary.name);
        }
    }

    let mut by_title: HashMap<&str, Vec<usize>> = HashMap::new();
    for row in 0..auxiliary.len() {
        if let Some(title) = auxiliary.cell(row, auxiliary_key) {
            by_title.entry(title).or_default().push(row);
        }
    }

    let mut columns = primary.columns.clone();
    columns.extend(extra_columns.iter().map(|&idx| auxiliary.columns[idx].clone()));
    let mut merged = RawTable::new(format!("{} + {}", primary.name, auxiliary.name), columns);

    let mut report = MergeReport {
        primary_rows: primary.len(),
        auxiliary_rows: auxiliary.len(),
        ..MergeReport::default()
    };

    for (row, primary_row) in primary.rows.iter().enumerate() {
        let matches = primary
            .cell(row, primary_key)
            .and_then(|title| by_title.get(title));
        let Some(matches) = matches else {
            report.unmatched_rows += 1;
            continue;
        };
        for &aux_row in matches {
            let mut combined = primary_row.clone();
            combined.extend(extra_columns.iter().map(|&idx| auxiliary.rows[aux_row][idx].clone()));
            merged.push_joined_row(combined, row);
        }
    }
    report.merged_rows = merged.len();

    if merged.is_empty() {
        return Err(MergeError::NoMatchingRows {
            primary_rows: primary.len(),
            auxiliary_rows: auxiliary.len(),
        });
    }

    let duplicated = introduced_duplicates(primary, primary_key, &merged, primary_key);
    if !duplicated.is_empty() {
        match config.duplicate_title_policy {
            DuplicateTitlePolicy::Reject => {
                return Err(MergeError::DuplicateTitles { titles: duplicated });
            }
            DuplicateTitlePolicy::Warn => {
                log::warn!(
                    "Join introduced {} duplicate title(s); lookups resolve to the first match: {}",
                    duplicated.len(),
                    duplicated.join(", ")
                );
                report.duplicated_titles = duplicated;
            }
        }
    }

    log::info!(
        "Merged {} of {} rows by title ({} unmatched)",
        report.merged_rows,
        report.primary_rows,
        report.unmatched_rows
    );

    Ok((merged, report))
}

/// Titles that occur more often in `merged` than in `primary`, in first-seen order
fn introduced_duplicates(primary: &RawTable, primary_key: usize, merged: &RawTable, merged_key: usize) -> Vec<String> {
    fn count(table: &RawTable, key: usize) -> HashMap<&str, usize> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for row in 0..table.len() {
            if let Some(title) = table.cell(row, key) {
                *counts.entry(title).or_insert(0) += 1;
            }
        }
        counts
    }
    let before = count(primary, primary_key);
    let after = count(merged, merged_key);

    let mut titles = Vec::new();
    for row in 0..merged.len() {
        if let Some(title) = merged.cell(row, merged_key) {
            let grew = after.get(title).copied().unwrap_or(0) > before.get(title).copied().unwrap_or(0);
            if grew && !titles.iter().any(|t: &String| t == title) {
                titles.push(title.to_string());
            }
        }
    }
    titles
}

/// Names from a JSON array of objects, or `None` if the value is not one
fn json_list_names(value: &str) -> Option<String> {
    let trimmed = value.trim_start();
    if !trimmed.starts_with('[') {
        return None;
    }
    let Value::Array(entries) = serde_json::from_str::<Value>(trimmed).ok()? else {
        return None;
    };
    let names: Vec<&str> = entries
        .iter()
        .filter_map(|entry| entry.get("name").and_then(Value::as_str))
        .collect();
    if names.is_empty() && !entries.is_empty() {
        return None;
    }
    Some(names.join(" "))
}

/// Cleaned, immutable catalog in row order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    items: Vec<Item>,
    tag_columns: Vec<String>,
}

impl Catalog {
    /// Build directly from already-tagged items (fixtures, reloaded artifacts)
    pub fn from_items(items: Vec<Item>, tag_columns: Vec<String>) -> Self {
        Self { items, tag_columns }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Tag attributes in concatenation order
    pub fn tag_columns(&self) -> &[String] {
        &self.tag_columns
    }

    /// Row of the first item whose title matches exactly
    pub fn find_by_title(&self, title: &str) -> Option<usize> {
        self.items.iter().position(|item| item.title == title)
    }

    pub fn find_by_id(&self, id: u64) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// Tags corpus in row order
    pub fn tags(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.tags.as_str()).collect()
    }

    /// Distinct titles sorted for presentation in a picker
    pub fn sorted_unique_titles(&self) -> Vec<&str> {
        let mut titles: Vec<&str> = self.items.iter().map(|item| item.title.as_str()).collect();
        titles.sort_unstable();
        titles.dedup();
        titles
    }
}

/// Clean `table` into a catalog: validate columns and ids, fill missing tag
/// attributes with empty strings and concatenate them into `tags`
pub fn build_catalog(table: &RawTable, config: &CatalogConfig) -> Result<Catalog, LoadError> {
    let id_idx = table.require_column(&config.id_column)?;
    let title_idx = table.require_column(&config.title_column)?;
    let tag_idx = config
        .tag_columns
        .iter()
        .map(|column| table.require_column(column))
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen_ids: HashMap<u64, usize> = HashMap::new();
    let mut items = Vec::with_capacity(table.len());

    for row in 0..table.len() {
        let raw_id = table.cell(row, id_idx).unwrap_or("").trim();
        let id: u64 = raw_id.parse().map_err(|_| LoadError::InvalidId {
            row,
            value: raw_id.to_string(),
        })?;
        if let Some(&first_row) = seen_ids.get(&id) {
            // a join kept under the Warn policy repeats primary rows, ids included
            let repeated_by_join =
                config.duplicate_title_policy == DuplicateTitlePolicy::Warn && table.same_source(first_row, row);
            if !repeated_by_join {
                return Err(LoadError::DuplicateId { id, first_row, second_row: row });
            }
        } else {
            seen_ids.insert(id, row);
        }

        let title = table.cell(row, title_idx).unwrap_or("").to_string();

        let parts: Vec<String> = tag_idx
            .iter()
            .map(|&col| {
                let value = table.cell(row, col).unwrap_or("");
                if config.flatten_json_lists {
                    json_list_names(value).unwrap_or_else(|| value.to_string())
                } else {
                    value.to_string()
                }
            })
            .collect();

        items.push(Item::new(id, title, parts.join(" ")));
    }

    log::info!(
        "Built catalog of {} items from [{}]",
        items.len(),
        config.tag_columns.join(", ")
    );

    Ok(Catalog::from_items(items, config.tag_columns.clone()))
}

/// Read the primary CSV, join the optional auxiliary CSV, and clean the result
pub fn load_catalog(
    primary_path: &Path,
    auxiliary_path: Option<&Path>,
    config: &CatalogConfig,
) -> crate::errors::RecommenderResult<(Catalog, Option<MergeReport>)> {
    let primary = RawTable::from_csv_path(primary_path)?;
    match auxiliary_path {
        Some(path) => {
            let auxiliary = RawTable::from_csv_path(path)?;
            let (merged, report) = merge_by_title(&primary, &auxiliary, config)?;
            Ok((build_catalog(&merged, config)?, Some(report)))
        }
        None => Ok((build_catalog(&primary, config)?, None)),
    }
}
