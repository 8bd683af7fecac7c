use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::{Item, ItemId, Recommendation};

/// Connection settings for the TMDB metadata API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    pub base_url: String,
    /// Sent as the `api_key` query parameter; requests fail without it
    pub api_key: Option<String>,
    pub language: String,
    /// Prefix joined with `poster_path` / `profile_path`
    pub image_base_url: String,
    /// Shown when an item has no poster or profile image
    pub placeholder_image_url: String,
    pub timeout_ms: u64,
    /// Cast members returned per item
    pub max_cast: usize,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.themoviedb.org/3".to_string(),
            api_key: None,
            language: "en-US".to_string(),
            image_base_url: "https://image.tmdb.org/t/p/w500".to_string(),
            placeholder_image_url: "https://via.placeholder.com/500x750?text=No+Image".to_string(),
            timeout_ms: 10_000,
            max_cast: 5,
        }
    }
}

impl TmdbConfig {
    /// Full image URL for a TMDB image path, or the placeholder when absent
    pub fn image_url(&self, path: Option<&str>) -> String {
        match path.map(str::trim).filter(|p| !p.is_empty()) {
            Some(path) => format!(
                "{}/{}",
                self.image_base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            None => self.placeholder_image_url.clone(),
        }
    }
}

/// Errors from the metadata service
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetadataError {
    #[error("Network error: {message}")]
    Network { message: String, is_timeout: bool },

    #[error("HTTP error: {status_code} - {message}")]
    Http { status_code: u16, message: String },

    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl From<reqwest::Error> for MetadataError {
    fn from(error: reqwest::Error) -> Self {
        MetadataError::Network {
            message: error.to_string(),
            is_timeout: error.is_timeout(),
        }
    }
}

impl From<serde_json::Error> for MetadataError {
    fn from(error: serde_json::Error) -> Self {
        MetadataError::MalformedResponse {
            message: format!("JSON parsing error: {}", error),
        }
    }
}

/// Details of a single movie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetails {
    pub id: ItemId,
    pub title: String,
    pub overview: String,
    pub release_date: Option<String>,
    pub rating: Option<f64>,
    pub poster_url: String,
    pub runtime: Option<u32>,
    pub tagline: String,
    pub genres: Vec<String>,
    /// English names of the spoken languages
    pub languages: Vec<String>,
    pub vote_count: Option<u64>,
    pub popularity: Option<f64>,
    pub production_companies: Vec<String>,
    pub trailer_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub name: String,
    pub character: String,
    pub profile_url: String,
}

/// Source of per-item metadata, injected so ranking never depends on it
pub trait MetadataProvider: Sync {
    fn get_details(&self, id: ItemId) -> impl Future<Output = Result<MovieDetails, MetadataError>> + Send;

    /// At most `top_n` billed cast members, in billing order
    fn get_cast(&self, id: ItemId, top_n: usize) -> impl Future<Output = Result<Vec<CastMember>, MetadataError>> + Send;

    /// First YouTube trailer, if any
    fn get_trailer(&self, id: ItemId) -> impl Future<Output = Result<Option<String>, MetadataError>> + Send;
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Named {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SpokenLanguage {
    english_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DetailsResponse {
    title: Option<String>,
    overview: Option<String>,
    release_date: Option<String>,
    vote_average: Option<f64>,
    poster_path: Option<String>,
    runtime: Option<u32>,
    tagline: Option<String>,
    genres: Vec<Named>,
    spoken_languages: Vec<SpokenLanguage>,
    vote_count: Option<u64>,
    popularity: Option<f64>,
    production_companies: Vec<Named>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreditsResponse {
    cast: Vec<CastEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CastEntry {
    name: Option<String>,
    character: Option<String>,
    profile_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VideosResponse {
    results: Vec<Video>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Video {
    site: String,
    #[serde(rename = "type")]
    kind: String,
    key: String,
}

fn youtube_trailer(videos: &VideosResponse) -> Option<String> {
    videos
        .results
        .iter()
        .find(|v| v.site == "YouTube" && v.kind == "Trailer" && !v.key.is_empty())
        .map(|v| format!("https://www.youtube.com/watch?v={}", v.key))
}

fn names(entries: &[Named]) -> Vec<String> {
    entries
        .iter()
        .filter(|e| !e.name.is_empty())
        .map(|e| e.name.clone())
        .collect()
}

/// HTTP client for the TMDB v3 API
#[derive(Debug, Clone)]
pub struct TmdbClient {
    config: TmdbConfig,
    client: Client,
}

impl TmdbClient {
    pub fn new(config: TmdbConfig) -> Result<Self, MetadataError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| MetadataError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &TmdbConfig {
        &self.config
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, MetadataError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| MetadataError::Configuration {
            message: "TMDB API key is not set".to_string(),
        })?;
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        log::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[("api_key", api_key), ("language", self.config.language.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match status {
                StatusCode::NOT_FOUND => "Resource not found".to_string(),
                StatusCode::UNAUTHORIZED => "Invalid API key".to_string(),
                _ => status.canonical_reason().unwrap_or("Request failed").to_string(),
            };
            return Err(MetadataError::Http {
                status_code: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl MetadataProvider for TmdbClient {
    async fn get_details(&self, id: ItemId) -> Result<MovieDetails, MetadataError> {
        let details_path = format!("/movie/{}", id);
        let (details, trailer) = futures::join!(
            self.get_json::<DetailsResponse>(&details_path),
            self.get_trailer(id)
        );
        let details = details?;
        let trailer_url = trailer.unwrap_or_else(|e| {
            log::warn!("Trailer lookup failed for {}: {}", id, e);
            None
        });

        Ok(MovieDetails {
            id,
            title: details.title.unwrap_or_else(|| "N/A".to_string()),
            overview: details
                .overview
                .filter(|o| !o.is_empty())
                .unwrap_or_else(|| "No overview available.".to_string()),
            release_date: details.release_date.filter(|d| !d.is_empty()),
            rating: details.vote_average,
            poster_url: self.config.image_url(details.poster_path.as_deref()),
            runtime: details.runtime,
            tagline: details.tagline.unwrap_or_default(),
            genres: names(&details.genres),
            languages: details
                .spoken_languages
                .into_iter()
                .map(|l| l.english_name)
                .filter(|n| !n.is_empty())
                .collect(),
            vote_count: details.vote_count,
            popularity: details.popularity,
            production_companies: names(&details.production_companies),
            trailer_url,
        })
    }

    async fn get_cast(&self, id: ItemId, top_n: usize) -> Result<Vec<CastMember>, MetadataError> {
        let credits: CreditsResponse = self.get_json(&format!("/movie/{}/credits", id)).await?;
        Ok(credits
            .cast
            .into_iter()
            .take(top_n)
            .map(|member| CastMember {
                name: member.name.unwrap_or_else(|| "N/A".to_string()),
                character: member.character.unwrap_or_else(|| "N/A".to_string()),
                profile_url: self.config.image_url(member.profile_path.as_deref()),
            })
            .collect())
    }

    async fn get_trailer(&self, id: ItemId) -> Result<Option<String>, MetadataError> {
        let videos: VideosResponse = self.get_json(&format!("/movie/{}/videos", id)).await?;
        Ok(youtube_trailer(&videos))
    }
}

/// Metadata for one result; failures never remove the result itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Enrichment {
    Available {
        details: MovieDetails,
        cast: Vec<CastMember>,
    },
    Unavailable {
        reason: String,
    },
}

impl Enrichment {
    pub fn is_available(&self) -> bool {
        matches!(self, Enrichment::Available { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecommendation {
    pub recommendation: Recommendation,
    pub enrichment: Enrichment,
}

async fn enrich_id<P: MetadataProvider>(provider: &P, id: ItemId, cast_size: usize) -> Enrichment {
    let (details, cast) = futures::join!(provider.get_details(id), provider.get_cast(id, cast_size));
    match details {
        Ok(details) => {
            let cast = cast.unwrap_or_else(|e| {
                log::warn!("Cast lookup failed for {}: {}", id, e);
                Vec::new()
            });
            Enrichment::Available { details, cast }
        }
        Err(e) => {
            log::warn!("Metadata unavailable for {}: {}", id, e);
            Enrichment::Unavailable { reason: e.to_string() }
        }
    }
}

/// Fetch metadata for every recommendation concurrently, preserving rank order
pub async fn enrich<P: MetadataProvider>(
    recommendations: Vec<Recommendation>,
    provider: &P,
    cast_size: usize,
) -> Vec<EnrichedRecommendation> {
    let lookups = recommendations
        .iter()
        .map(|rec| enrich_id(provider, rec.id, cast_size));
    let enrichments = futures::future::join_all(lookups).await;

    recommendations
        .into_iter()
        .zip(enrichments)
        .map(|(recommendation, enrichment)| EnrichedRecommendation {
            recommendation,
            enrichment,
        })
        .collect()
}

/// Metadata for the item the user selected
pub async fn enrich_selection<P: MetadataProvider>(item: &Item, provider: &P, cast_size: usize) -> Enrichment {
    enrich_id(provider, item.id, cast_size).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_url_joins_path_and_falls_back() {
        let config = TmdbConfig::default();
        assert_eq!(
            config.image_url(Some("/abc.jpg")),
            "https://image.tmdb.org/t/p/w500/abc.jpg"
        );
        assert_eq!(config.image_url(None), config.placeholder_image_url);
        assert_eq!(config.image_url(Some("")), config.placeholder_image_url);
    }

    #[test]
    fn test_trailer_selection_requires_youtube_trailer() {
        let videos: VideosResponse = serde_json::from_str(
            r#"{"results": [
                {"site": "Vimeo", "type": "Trailer", "key": "v1"},
                {"site": "YouTube", "type": "Teaser", "key": "t1"},
                {"site": "YouTube", "type": "Trailer", "key": "abc"},
                {"site": "YouTube", "type": "Trailer", "key": "def"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            youtube_trailer(&videos).as_deref(),
            Some("https://www.youtube.com/watch?v=abc")
        );
        assert_eq!(youtube_trailer(&VideosResponse::default()), None);
    }

    #[test]
    fn test_details_response_tolerates_missing_fields() {
        let details: DetailsResponse = serde_json::from_str(r#"{"title": "Heat"}"#).unwrap();
        assert_eq!(details.title.as_deref(), Some("Heat"));
        assert!(details.genres.is_empty());
        assert_eq!(details.runtime, None);
    }

    #[test]
    fn test_error_display() {
        let error = MetadataError::Http {
            status_code: 404,
            message: "Resource not found".to_string(),
        };
        assert_eq!(error.to_string(), "HTTP error: 404 - Resource not found");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_configuration_error() {
        let client = TmdbClient::new(TmdbConfig::default()).unwrap();
        let result = client.get_trailer(1).await;
        assert!(matches!(result, Err(MetadataError::Configuration { .. })));
    }
}
