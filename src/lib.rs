// Module declarations
pub mod artifact;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod metadata_client;
pub mod recommender;
pub mod similarity_search;
pub mod text_processing;
pub mod types;
pub mod vectorizer;

use std::path::Path;

// Re-exports for commonly used types
pub use artifact::{ArtifactConfig, ArtifactHeader, CompressionAlgorithm};
pub use catalog::{Catalog, CatalogConfig, RawTable};
pub use config::RecommenderConfig;
pub use errors::{
    ArtifactVersionError, ConfigError, LoadError, MergeError, RecommenderError, RecommenderResult,
    VectorizationError,
};
pub use metadata_client::{
    CastMember, EnrichedRecommendation, Enrichment, MetadataError, MetadataProvider, MovieDetails, TmdbClient,
    TmdbConfig,
};
pub use recommender::{Recommender, RecommenderService, DEFAULT_K};
pub use similarity_search::SimilarityMatrix;
pub use types::{DuplicateTitlePolicy, Item, ItemId, MergeReport, Recommendation};
pub use vectorizer::{FeatureMatrix, VectorizerConfig};

/// Load the catalog CSV(s) and build a recommender over them
pub fn build_from_csv(
    movies: &Path,
    credits: Option<&Path>,
    config: &RecommenderConfig,
) -> RecommenderResult<(Recommender, Option<MergeReport>)> {
    let (catalog, report) = catalog::load_catalog(movies, credits, &config.catalog)?;
    let recommender = Recommender::build(catalog, &config.vectorizer)?;
    Ok((recommender, report))
}
