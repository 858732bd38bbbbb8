use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::{self, TableDefinition};
use crate::domain::ShareLinkId;
use crate::error::OtfsError;

pub const DEFAULT_CONFIG_FILE: &str = "otfs-provision.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub share_link_id: Option<String>,
    #[serde(default)]
    pub share_base_url: Option<String>,
    #[serde(default)]
    pub bucket_prefix: Option<String>,
    #[serde(default)]
    pub workgroup: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub results_prefix: Option<String>,
    #[serde(default)]
    pub dataset: Option<DatasetLayoutEntry>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub query_timeout_secs: Option<u64>,
    #[serde(default)]
    pub tables: Option<Vec<TableDefinition>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DatasetLayoutEntry {
    #[serde(default)]
    pub canonical_parent: Option<String>,
    #[serde(default)]
    pub dataset_dir: Option<String>,
    #[serde(default)]
    pub required_subdirs: Option<Vec<String>>,
    #[serde(default)]
    pub remote_prefix: Option<String>,
}

/// Shape the extracted archive must have before anything is uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    pub canonical_parent: String,
    pub dataset_dir: String,
    pub required_subdirs: Vec<String>,
    pub remote_prefix: String,
}

impl Default for DatasetLayout {
    fn default() -> Self {
        Self {
            canonical_parent: "data".to_string(),
            dataset_dir: "aula".to_string(),
            required_subdirs: vec!["csv".to_string(), "parquet".to_string()],
            remote_prefix: "aula".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Some(Duration::from_secs(900)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub region: Option<String>,
    pub share_link: Option<ShareLinkId>,
    pub share_base_url: String,
    pub bucket_prefix: String,
    pub workgroup: String,
    pub database: String,
    pub results_prefix: String,
    pub layout: DatasetLayout,
    pub poll: PollSettings,
    pub tables: Vec<TableDefinition>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        let bucket_prefix = "otfs-aula".to_string();
        let layout = DatasetLayout::default();
        let tables = catalog::default_catalog(&bucket_prefix, &layout.remote_prefix);
        Self {
            region: None,
            share_link: None,
            share_base_url: crate::share::DEFAULT_SHARE_BASE_URL.to_string(),
            bucket_prefix,
            workgroup: "otfs-aula-wg".to_string(),
            database: "otfs_aula".to_string(),
            results_prefix: "athena-results".to_string(),
            layout,
            poll: PollSettings::default(),
            tables,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, OtfsError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if !config_path.exists() {
            if path.is_some() {
                return Err(OtfsError::MissingConfig(config_path));
            }
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| OtfsError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| OtfsError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, OtfsError> {
        let defaults = ResolvedConfig::default();
        let default_layout = defaults.layout.clone();

        let layout = match config.dataset {
            Some(entry) => DatasetLayout {
                canonical_parent: entry
                    .canonical_parent
                    .unwrap_or(default_layout.canonical_parent),
                dataset_dir: entry.dataset_dir.unwrap_or(default_layout.dataset_dir),
                required_subdirs: entry
                    .required_subdirs
                    .unwrap_or(default_layout.required_subdirs),
                remote_prefix: entry.remote_prefix.unwrap_or(default_layout.remote_prefix),
            },
            None => default_layout,
        };
        if layout.remote_prefix.trim_matches('/').is_empty() {
            return Err(OtfsError::ConfigParse(
                "dataset.remote_prefix must not be empty".to_string(),
            ));
        }

        let share_link = config
            .share_link_id
            .as_deref()
            .map(str::parse::<ShareLinkId>)
            .transpose()?;

        let bucket_prefix = config.bucket_prefix.unwrap_or(defaults.bucket_prefix);
        let tables = match config.tables {
            Some(tables) => tables,
            None => catalog::default_catalog(&bucket_prefix, &layout.remote_prefix),
        };

        let poll = PollSettings {
            interval: config
                .poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll.interval),
            timeout: match config.query_timeout_secs {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.poll.timeout,
            },
        };

        Ok(ResolvedConfig {
            region: config.region.filter(|value| !value.trim().is_empty()),
            share_link,
            share_base_url: config.share_base_url.unwrap_or(defaults.share_base_url),
            bucket_prefix,
            workgroup: config.workgroup.unwrap_or(defaults.workgroup),
            database: config.database.unwrap_or(defaults.database),
            results_prefix: config.results_prefix.unwrap_or(defaults.results_prefix),
            layout,
            poll,
            tables,
        })
    }
}
