use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::OtfsError;

/// Names derived once from the caller identity and threaded through every later step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedContext {
    pub region: String,
    pub account_id: String,
    pub bucket_name: String,
    pub result_location: String,
}

impl ResolvedContext {
    pub fn new(region: &str, account_id: &str, bucket_prefix: &str, results_prefix: &str) -> Self {
        let bucket_name = format!("{bucket_prefix}-{account_id}");
        let result_location = format!(
            "s3://{bucket_name}/{}/",
            results_prefix.trim_matches('/')
        );
        Self {
            region: region.to_string(),
            account_id: account_id.to_string(),
            bucket_name,
            result_location,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShareLinkId(String);

impl ShareLinkId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShareLinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ShareLinkId {
    type Err = OtfsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty()
            && trimmed
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !is_valid {
            return Err(OtfsError::Configuration(format!(
                "invalid share link id: {value}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadArtifact {
    pub source_link_id: Option<String>,
    pub local_path: Utf8PathBuf,
    pub content_type: String,
    pub size_bytes: u64,
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTree {
    pub root_path: Utf8PathBuf,
    pub canonical_subpath: Utf8PathBuf,
}

impl ExtractedTree {
    pub fn canonical_root(&self) -> Utf8PathBuf {
        self.root_path.join(&self.canonical_subpath)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QueryState::Queued => "QUEUED",
            QueryState::Running => "RUNNING",
            QueryState::Succeeded => "SUCCEEDED",
            QueryState::Failed => "FAILED",
            QueryState::Cancelled => "CANCELLED",
        };
        write!(f, "{label}")
    }
}

impl FromStr for QueryState {
    type Err = OtfsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "QUEUED" => Ok(QueryState::Queued),
            "RUNNING" => Ok(QueryState::Running),
            "SUCCEEDED" => Ok(QueryState::Succeeded),
            "FAILED" => Ok(QueryState::Failed),
            "CANCELLED" => Ok(QueryState::Cancelled),
            other => Err(OtfsError::Cli {
                command: "athena get-query-execution".to_string(),
                message: format!("unknown query state {other}"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryStatus {
    pub state: QueryState,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkgroupConfig {
    pub output_location: String,
    pub enforce_configuration: bool,
    pub publish_metrics: bool,
}

impl WorkgroupConfig {
    pub fn declared(output_location: &str) -> Self {
        Self {
            output_location: output_location.to_string(),
            enforce_configuration: true,
            publish_metrics: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceAction {
    Created,
    Existing,
    Updated,
}

impl fmt::Display for ResourceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceAction::Created => write!(f, "created"),
            ResourceAction::Existing => write!(f, "existing"),
            ResourceAction::Updated => write!(f, "updated"),
        }
    }
}
