//! Engine configuration
//!
//! Loaded from an optional TOML file, then environment variables prefixed
//! with `SCHEMAFORGE` (nested keys separated by `__`, e.g.
//! `SCHEMAFORGE_SEARCH__DEFAULT_LIMIT=50`). Missing keys fall back to defaults.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{Result, TemplateError},
    merge_engine::MergeStrategy,
};

/// Recommendation scoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Points for category and keyword relevance
    pub relevance_weight: f64,
    /// Points for matching user preferences
    pub preference_weight: f64,
    /// Points for the quality composite
    pub quality_weight: f64,
    /// Points for popularity
    pub popularity_weight: f64,
    /// Usage count at which the usage half of popularity saturates
    pub popularity_saturation: u64,
    /// Number of recommendations returned when no limit is given
    pub default_limit: usize,
    /// Lowest score graded `perfect`
    pub perfect_threshold: f64,
    /// Lowest score graded `good`
    pub good_threshold: f64,
    /// Lowest score graded `partial`
    pub partial_threshold: f64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            relevance_weight: 40.0,
            preference_weight: 25.0,
            quality_weight: 20.0,
            popularity_weight: 15.0,
            popularity_saturation: 10_000,
            default_limit: 10,
            perfect_threshold: 85.0,
            good_threshold: 65.0,
            partial_threshold: 40.0,
        }
    }
}

impl RecommendationConfig {
    /// Sum of all term weights
    pub fn total_weight(&self) -> f64 {
        self.relevance_weight + self.preference_weight + self.quality_weight + self.popularity_weight
    }
}

/// Search configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Page size when the filter gives none
    pub default_limit: usize,
    /// Maximum number of tag facet entries
    pub max_tag_facets: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_tag_facets: 20,
        }
    }
}

/// Defaults applied to template applications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationDefaults {
    /// Merge strategy
    pub merge_strategy: MergeStrategy,
    /// Keep existing elements
    pub preserve_existing: bool,
    /// Snapshot existing elements before applying
    pub make_backup: bool,
    /// Run the schema validator after merging
    pub validate_after_apply: bool,
}

impl Default for ApplicationDefaults {
    fn default() -> Self {
        Self {
            merge_strategy: MergeStrategy::Additive,
            preserve_existing: true,
            make_backup: true,
            validate_after_apply: true,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Recommendation scoring
    pub recommendation: RecommendationConfig,
    /// Search and facets
    pub search: SearchConfig,
    /// Application defaults
    pub application: ApplicationDefaults,
}

impl EngineConfig {
    /// Check the configuration for consistency
    pub fn validate(&self) -> Result<()> {
        let rec = &self.recommendation;
        let weights = [
            rec.relevance_weight,
            rec.preference_weight,
            rec.quality_weight,
            rec.popularity_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(TemplateError::invalid_config(
                "Recommendation weights must be finite and non-negative",
            ));
        }
        if rec.total_weight() <= 0.0 {
            return Err(TemplateError::invalid_config(
                "Recommendation weights must not all be zero",
            ));
        }
        if !(rec.perfect_threshold > rec.good_threshold && rec.good_threshold > rec.partial_threshold)
        {
            return Err(TemplateError::invalid_config(
                "Compatibility thresholds must be strictly descending",
            ));
        }
        if self.search.default_limit == 0 {
            return Err(TemplateError::invalid_config(
                "Search default limit must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}

/// Loads [`EngineConfig`] from file and environment
pub struct ConfigLoader {
    /// Configuration file path
    config_path: PathBuf,
    /// Environment prefix
    env_prefix: String,
}

impl ConfigLoader {
    /// Create a loader for the default config path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
            env_prefix: "SCHEMAFORGE".to_string(),
        }
    }

    /// Create with custom config path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            env_prefix: "SCHEMAFORGE".to_string(),
        }
    }

    /// Override the environment prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Path this loader reads
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get default config path
    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("schemaforge")
            .join("engine.toml")
    }

    /// Load, merge and validate the configuration
    pub fn load(&self) -> Result<EngineConfig> {
        let builder = Config::builder()
            .add_source(File::from(self.config_path.clone()).required(false))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__"),
            );

        let engine_config: EngineConfig = builder.build()?.try_deserialize()?;
        engine_config.validate()?;
        debug!(path = %self.config_path.display(), "Loaded engine configuration");
        Ok(engine_config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
