use std::fmt;

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::aws::CloudConnector;
use crate::config::ResolvedConfig;
use crate::domain::{DownloadArtifact, ResolvedContext, ResourceAction, WorkgroupConfig};
use crate::error::OtfsError;
use crate::fetch::{self, VerifiedFetcher};
use crate::identity::{IdentityClient, resolve_region};
use crate::layout;
use crate::provision::Provisioner;
use crate::schema::SchemaApplier;
use crate::share::ShareHost;
use crate::workspace::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Prerequisites,
    Resolve,
    Bucket,
    Download,
    Extract,
    Upload,
    Workgroup,
    Database,
    Tables,
    Validate,
}

impl Step {
    pub const ALL: [Step; 10] = [
        Step::Prerequisites,
        Step::Resolve,
        Step::Bucket,
        Step::Download,
        Step::Extract,
        Step::Upload,
        Step::Workgroup,
        Step::Database,
        Step::Tables,
        Step::Validate,
    ];

    pub fn index(self) -> usize {
        Step::ALL
            .iter()
            .position(|step| *step == self)
            .map(|pos| pos + 1)
            .unwrap_or(0)
    }

    pub fn total() -> usize {
        Step::ALL.len()
    }

    pub fn label(self) -> &'static str {
        match self {
            Step::Prerequisites => "check prerequisites",
            Step::Resolve => "resolve account and region",
            Step::Bucket => "ensure bucket",
            Step::Download => "download and verify dataset",
            Step::Extract => "extract and normalize dataset",
            Step::Upload => "upload dataset",
            Step::Workgroup => "ensure workgroup",
            Step::Database => "create database",
            Step::Tables => "create tables",
            Step::Validate => "validate schema",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Started,
    Progress,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub step: Step,
    pub index: usize,
    pub total: usize,
    pub status: StepStatus,
    pub message: String,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub region_override: Option<String>,
    /// Use this archive instead of downloading from the share link.
    pub local_archive: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub context: ResolvedContext,
    pub bucket: ResourceAction,
    pub artifact: DownloadArtifact,
    pub dataset_uri: String,
    pub workgroup: ResourceAction,
    pub database: String,
    pub tables_applied: Vec<String>,
    pub tables_listed: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct App<I: IdentityClient, H: ShareHost, C: CloudConnector> {
    config: ResolvedConfig,
    workspace: Workspace,
    identity: I,
    host: H,
    cloud: C,
}

impl<I: IdentityClient, H: ShareHost, C: CloudConnector> App<I, H, C> {
    pub fn new(config: ResolvedConfig, workspace: Workspace, identity: I, host: H, cloud: C) -> Self {
        Self {
            config,
            workspace,
            identity,
            host,
            cloud,
        }
    }

    /// Runs every step in order and stops at the first failure. Each step converges,
    /// so a failed run is repaired by running again from the start.
    pub fn run(&self, options: &RunOptions, sink: &dyn ProgressSink) -> Result<RunReport, OtfsError> {
        let started_at = Utc::now();
        let config = &self.config;

        step(sink, Step::Prerequisites, |_| {
            if options.local_archive.is_none() && config.share_link.is_none() {
                return Err(OtfsError::Configuration(
                    "no share link id configured (use --share-link or --archive)".to_string(),
                ));
            }
            self.workspace.ensure_root()?;
            Ok(format!("workspace {}", self.workspace.root()))
        })?;

        let mut context = None;
        step(sink, Step::Resolve, |_| {
            let override_region = options
                .region_override
                .as_deref()
                .or(config.region.as_deref());
            let (region, source) = resolve_region(&self.identity, override_region)?;
            let account_id = self.identity.caller_account_id()?;
            let resolved = ResolvedContext::new(
                &region,
                &account_id,
                &config.bucket_prefix,
                &config.results_prefix,
            );
            let message = format!(
                "account {} in {} (region from {source:?})",
                resolved.account_id, resolved.region
            );
            context = Some(resolved);
            Ok(message)
        })?;
        let context = context.ok_or_else(|| {
            OtfsError::Configuration("context was not resolved".to_string())
        })?;
        info!(bucket = %context.bucket_name, region = %context.region, "context resolved");

        let storage = self.cloud.storage(&context.region);
        let query = self.cloud.query(&context.region);
        let provisioner = Provisioner::new(&storage, &query);

        let mut bucket = ResourceAction::Existing;
        step(sink, Step::Bucket, |_| {
            bucket = provisioner.ensure_bucket(&context.bucket_name, &context.region)?;
            Ok(format!("{} ({bucket})", context.bucket_name))
        })?;

        let mut artifact = None;
        step(sink, Step::Download, |_| {
            let verified = match &options.local_archive {
                Some(path) => fetch::verify_archive(path.as_std_path())?,
                None => {
                    let link = config.share_link.as_ref().ok_or_else(|| {
                        OtfsError::Configuration("no share link id configured".to_string())
                    })?;
                    let destination = self.workspace.archive_path();
                    VerifiedFetcher::new(&self.host).fetch(link, destination.as_std_path())?
                }
            };
            let message = format!(
                "{} ({} bytes, {})",
                verified.local_path, verified.size_bytes, verified.content_type
            );
            artifact = Some(verified);
            Ok(message)
        })?;
        let artifact = artifact
            .ok_or_else(|| OtfsError::Download("no artifact was produced".to_string()))?;

        let mut tree = None;
        step(sink, Step::Extract, |_| {
            let extracted = layout::normalize(&artifact, &self.workspace.extract_dir(), &config.layout)?;
            let message = format!("{}", extracted.canonical_root());
            tree = Some(extracted);
            Ok(message)
        })?;
        let tree = tree.ok_or_else(|| OtfsError::Filesystem("no extracted tree".to_string()))?;

        let mut dataset_uri = String::new();
        step(sink, Step::Upload, |_| {
            dataset_uri = provisioner.upload_dataset(
                &tree,
                &context.bucket_name,
                &config.layout.remote_prefix,
                &config.results_prefix,
            )?;
            Ok(dataset_uri.clone())
        })?;

        let mut workgroup = ResourceAction::Existing;
        step(sink, Step::Workgroup, |_| {
            let declared = WorkgroupConfig::declared(&context.result_location);
            workgroup = provisioner.ensure_workgroup(&config.workgroup, &declared)?;
            Ok(format!("{} ({workgroup})", config.workgroup))
        })?;

        let applier = SchemaApplier::new(
            &query,
            &config.workgroup,
            &context.result_location,
            config.poll,
        );

        step(sink, Step::Database, |_| {
            applier.apply_database(&config.database)?;
            Ok(config.database.clone())
        })?;

        let mut tables_applied = Vec::with_capacity(config.tables.len());
        step(sink, Step::Tables, |progress| {
            for (position, table) in config.tables.iter().enumerate() {
                applier.apply_table(&config.database, table, &context.account_id)?;
                tables_applied.push(table.name.clone());
                progress(format!(
                    "{} ({}/{})",
                    table.name,
                    position + 1,
                    config.tables.len()
                ));
            }
            Ok(format!("{} tables", tables_applied.len()))
        })?;

        let mut tables_listed = Vec::new();
        step(sink, Step::Validate, |_| {
            tables_listed = applier.list_tables(&config.database)?;
            Ok(format!(
                "{} tables in {}: {}",
                tables_listed.len(),
                config.database,
                tables_listed.join(", ")
            ))
        })?;

        Ok(RunReport {
            context,
            bucket,
            artifact,
            dataset_uri,
            workgroup,
            database: config.database.clone(),
            tables_applied,
            tables_listed,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Wraps one step with started/done/failed events.
fn step<F>(sink: &dyn ProgressSink, step: Step, body: F) -> Result<(), OtfsError>
where
    F: FnOnce(&dyn Fn(String)) -> Result<String, OtfsError>,
{
    let emit = |status: StepStatus, message: String| {
        sink.event(ProgressEvent {
            step,
            index: step.index(),
            total: Step::total(),
            status,
            message,
        });
    };
    emit(StepStatus::Started, step.label().to_string());
    let progress = |message: String| emit(StepStatus::Progress, message);
    match body(&progress) {
        Ok(message) => {
            emit(StepStatus::Done, message);
            Ok(())
        }
        Err(err) => {
            emit(StepStatus::Failed, err.to_string());
            Err(err)
        }
    }
}
