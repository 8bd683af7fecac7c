use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactConfig;
use crate::catalog::CatalogConfig;
use crate::errors::ConfigError;
use crate::metadata_client::TmdbConfig;
use crate::vectorizer::VectorizerConfig;

pub const ENV_TMDB_API_KEY: &str = "TMDB_API_KEY";
pub const ENV_TMDB_BASE_URL: &str = "TMDB_BASE_URL";
pub const ENV_MAX_FEATURES: &str = "REELMATCH_MAX_FEATURES";

/// All settings, grouped per component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    pub catalog: CatalogConfig,
    pub vectorizer: VectorizerConfig,
    pub artifact: ArtifactConfig,
    pub tmdb: TmdbConfig,
}

impl RecommenderConfig {
    /// `<config_dir>/reelmatch/config.json`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("reelmatch").join("config.json"))
    }

    /// Load from `path` (or the default location), then apply environment overrides
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) => {
                log::debug!("No config file at {}, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |message: String| ConfigError::Write {
            path: path.display().to_string(),
            message,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| write_error(format!("Failed to create config directory: {}", e)))?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| write_error(e.to_string()))?;
        fs::write(path, content).map_err(|e| write_error(e.to_string()))
    }

    /// Apply overrides looked up by environment variable name
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_TMDB_API_KEY).filter(|v| !v.is_empty()) {
            self.tmdb.api_key = Some(key);
        }
        if let Some(url) = lookup(ENV_TMDB_BASE_URL).filter(|v| !v.is_empty()) {
            self.tmdb.base_url = url;
        }
        if let Some(value) = lookup(ENV_MAX_FEATURES) {
            self.vectorizer.max_features = value
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidOverride {
                    key: ENV_MAX_FEATURES.to_string(),
                    value,
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = RecommenderConfig::from_file(&temp_dir.path().join("absent.json"));
        assert!(matches!(config, Err(ConfigError::Read { .. })));

        let mut defaults = RecommenderConfig::default();
        defaults.apply_overrides(env(&[])).unwrap();
        assert_eq!(defaults.vectorizer.max_features, 5000);
        assert_eq!(defaults.catalog.tag_columns.len(), 6);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"vectorizer": {"max_features": 100}, "catalog": {"tag_columns": ["overview"]}}"#).unwrap();

        let config = RecommenderConfig::from_file(&path).unwrap();
        assert_eq!(config.vectorizer.max_features, 100);
        assert!(config.vectorizer.smooth_idf);
        assert_eq!(config.catalog.tag_columns, vec!["overview".to_string()]);
        assert_eq!(config.catalog.id_column, "id");
        assert_eq!(config.tmdb.max_cast, 5);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(RecommenderConfig::from_file(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");
        let mut config = RecommenderConfig::default();
        config.tmdb.language = "de-DE".to_string();
        config.save(&path).unwrap();
        assert_eq!(RecommenderConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RecommenderConfig::default();
        config
            .apply_overrides(env(&[
                (ENV_TMDB_API_KEY, "secret"),
                (ENV_TMDB_BASE_URL, "http://localhost:9000"),
                (ENV_MAX_FEATURES, "250"),
            ]))
            .unwrap();
        assert_eq!(config.tmdb.api_key.as_deref(), Some("secret"));
        assert_eq!(config.tmdb.base_url, "http://localhost:9000");
        assert_eq!(config.vectorizer.max_features, 250);
    }

    #[test]
    fn test_invalid_max_features_override() {
        let mut config = RecommenderConfig::default();
        for bad in ["zero", "0", "-3"] {
            let result = config.apply_overrides(env(&[(ENV_MAX_FEATURES, bad)]));
            assert!(matches!(result, Err(ConfigError::InvalidOverride { .. })), "{} accepted", bad);
        }
    }
}
