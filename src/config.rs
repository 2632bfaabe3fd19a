//! Layered configuration: defaults → optional TOML file → environment
//!
//! Environment keys use the `MATCHFEED__<SECTION>__<KEY>` form. The legacy
//! variables `API_KEY`, `API_BASE_URL` and `PREDICTION_SERVICE_URL` are
//! honored last.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::Result;

/// Default config file stem looked up in the working directory
const DEFAULT_CONFIG_STEM: &str = "matchfeed";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub archive: ArchiveConfig,
    pub pipeline: PipelineConfig,
    pub cache: CacheConfig,
    pub prediction: PredictionConfig,
}

/// Live football API (rate limited)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub key: String,
    pub base_url: String,
    pub requests_per_minute: u32,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            base_url: "https://api.football-data.org/v4".into(),
            requests_per_minute: 10,
            timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Static historical archive
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub base_url: String,
    pub seasons: Vec<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: "https://raw.githubusercontent.com/openfootball/football.json/master".into(),
            seasons: vec!["2022-23".into(), "2023-24".into(), "2024-25".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Live API season year (start year of the season)
    pub current_season: i32,
    /// Pause between competitions during a full aggregation
    pub pacing_ms: u64,
    /// Fixtures window length after today, in days
    pub fixture_window_days: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            current_season: 2025,
            pacing_ms: 500,
            fixture_window_days: 2,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Defaults to `~/.matchfeed/cache`
    pub dir: Option<PathBuf>,
}

/// Dependent prediction subprocess
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub base_url: String,
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub max_attempts: u32,
    pub interval_ms: u64,
    pub health_timeout_ms: u64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5001".into(),
            command: "python".into(),
            args: vec!["prediction_api.py".into()],
            working_dir: None,
            max_attempts: 30,
            interval_ms: 1000,
            health_timeout_ms: 500,
        }
    }
}

impl AppConfig {
    /// Load from `path`, or from `./matchfeed.{toml,json,...}` when absent
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_STEM).required(false),
        };

        let builder = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("MATCHFEED")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("archive.seasons")
                    .with_list_parse_key("prediction.args"),
            )
            .set_override_option("api.key", std::env::var("API_KEY").ok())?
            .set_override_option("api.base_url", std::env::var("API_BASE_URL").ok())?
            .set_override_option(
                "prediction.base_url",
                std::env::var("PREDICTION_SERVICE_URL").ok(),
            )?;

        let config: AppConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }
}
