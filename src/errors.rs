use thiserror::Error;

use crate::metadata_client::MetadataError;

/// Structural problems found while reading or cleaning the primary catalog table
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Required column '{column}' is missing from {table}")]
    MissingColumn { column: String, table: String },

    #[error("Invalid item id '{value}' at row {row}")]
    InvalidId { row: usize, value: String },

    #[error("Duplicate item id {id} (rows {first_row} and {second_row})")]
    DuplicateId { id: u64, first_row: usize, second_row: usize },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error reading {path}: {message}")]
    Io { path: String, message: String },
}

/// Integrity problems found while joining an auxiliary table by title
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Join key column '{column}' is missing from {table}")]
    MissingKeyColumn { column: String, table: String },

    #[error("Joining by title matched no rows ({primary_rows} primary, {auxiliary_rows} auxiliary)")]
    NoMatchingRows { primary_rows: usize, auxiliary_rows: usize },

    #[error("Join introduced duplicate titles: {}", .titles.join(", "))]
    DuplicateTitles { titles: Vec<String> },
}

/// Failures while fitting the term-weighting model over the tags corpus
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VectorizationError {
    #[error("Cannot vectorize an empty corpus")]
    EmptyCorpus,

    #[error("All {documents} documents reduced to zero terms after stop-word removal")]
    NoTerms { documents: usize },

    #[error("Invalid vectorizer configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// A persisted artifact does not match the current format or catalog
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArtifactVersionError {
    #[error("Artifact format version {found} is not readable by version {expected}")]
    FormatVersion { expected: String, found: String },

    #[error("Artifact holds {artifact_rows} rows but the catalog has {catalog_rows}")]
    RowCount { artifact_rows: usize, catalog_rows: usize },

    #[error("Artifact matrix is {matrix_rows}x{matrix_rows} but header declares {header_rows} rows")]
    MatrixShape { header_rows: usize, matrix_rows: usize },

    #[error("Artifact tag columns [{}] differ from catalog tag columns [{}]", .artifact.join(", "), .catalog.join(", "))]
    ColumnSet { artifact: Vec<String>, catalog: Vec<String> },

    #[error("Artifact checksum mismatch")]
    ChecksumMismatch,
}

/// Failures reading or parsing configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to write config file {path}: {message}")]
    Write { path: String, message: String },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidOverride { key: String, value: String },
}

/// Top-level error for catalog, engine and artifact operations
#[derive(Error, Debug)]
pub enum RecommenderError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Vectorization(#[from] VectorizationError),

    #[error(transparent)]
    ArtifactVersion(#[from] ArtifactVersionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("Artifact error: {message}")]
    Artifact { message: String },
}

impl RecommenderError {
    /// Create a user-friendly error message for display
    pub fn user_message(&self) -> String {
        match self {
            RecommenderError::Load(LoadError::MissingColumn { column, table }) => {
                format!("The {} is missing the '{}' column. Check the input file.", table, column)
            }
            RecommenderError::Load(e) => format!("The catalog could not be loaded: {}", e),
            RecommenderError::Merge(MergeError::DuplicateTitles { titles }) => {
                format!(
                    "Joining the credits table produced {} duplicated title(s); title lookup would be ambiguous.",
                    titles.len()
                )
            }
            RecommenderError::Merge(e) => format!("The auxiliary table could not be joined: {}", e),
            RecommenderError::Vectorization(e) => {
                format!("No usable text was found to compare items: {}", e)
            }
            RecommenderError::ArtifactVersion(e) => {
                format!("The saved model does not match this catalog and must be rebuilt: {}", e)
            }
            RecommenderError::Config(e) => format!("Configuration problem: {}", e),
            RecommenderError::Metadata(e) => format!("Movie details could not be fetched: {}", e),
            RecommenderError::Artifact { message } => {
                format!("The saved model could not be read or written: {}", message)
            }
        }
    }

    /// Whether this error means a persisted artifact is stale or incompatible
    pub fn is_artifact_version(&self) -> bool {
        matches!(self, RecommenderError::ArtifactVersion(_))
    }
}

/// Convert RecommenderError to String for presentation layers
impl From<RecommenderError> for String {
    fn from(error: RecommenderError) -> Self {
        error.user_message()
    }
}

pub type RecommenderResult<T> = Result<T, RecommenderError>;
