use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum OtfsError {
    #[error("configuration error: {0}")]
    #[diagnostic(
        code(otfs::configuration),
        help("set a region with --region, AWS_REGION or `aws configure set region <region>`")
    )]
    Configuration(String),

    #[error("missing config file {0}")]
    MissingConfig(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("download failed: {0}")]
    #[diagnostic(code(otfs::download), help("check network connectivity to the share host"))]
    Download(String),

    #[error("share host returned status {status}: {message}")]
    #[diagnostic(code(otfs::download), help("check that the share link id is correct"))]
    DownloadStatus { status: u16, message: String },

    #[error("download produced an empty file: {0}")]
    #[diagnostic(code(otfs::download))]
    EmptyDownload(PathBuf),

    #[error("share host returned a confirmation page without a recoverable token for {link}")]
    #[diagnostic(
        code(otfs::confirmation_token),
        help("the file is probably not shared publicly; set sharing to \"anyone with the link\"")
    )]
    ConfirmationTokenMissing { link: String },

    #[error("download verification failed: {0}")]
    #[diagnostic(code(otfs::verification))]
    Verification(#[from] VerificationFailure),

    #[error("dataset layout error: {0}")]
    #[diagnostic(
        code(otfs::layout),
        help("the archive does not contain the expected dataset folders; nothing was uploaded")
    )]
    Layout(#[from] LayoutFailure),

    #[error("provisioning failed: {0}")]
    #[diagnostic(
        code(otfs::provision),
        help("check that the caller has S3 and Athena permissions in the target region")
    )]
    Provision(String),

    #[error("query service did not return a query id for: {0}")]
    #[diagnostic(code(otfs::submission))]
    Submission(String),

    #[error("query {id} ended in state {state}: {reason}")]
    #[diagnostic(code(otfs::query))]
    QueryExecution {
        id: String,
        state: String,
        reason: String,
    },

    #[error("query {id} did not finish within {seconds}s")]
    #[diagnostic(code(otfs::query_timeout))]
    QueryTimeout { id: String, seconds: u64 },

    #[error("required tool not found: {0}")]
    #[diagnostic(help("install the AWS CLI v2 and make sure it is on PATH"))]
    MissingTool(String),

    #[error("`aws {command}` failed: {message}")]
    Cli { command: String, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

#[derive(Debug, Error)]
pub enum VerificationFailure {
    #[error("payload is an HTML page instead of the archive (is the file shared publicly?)")]
    HtmlPayload,

    #[error("share host reports the download quota for this file is exceeded")]
    QuotaExceeded,

    #[error("archive integrity check failed: {0}")]
    CorruptArchive(String),
}

#[derive(Debug, Error)]
pub enum LayoutFailure {
    #[error("neither {expected} nor {inner} exists in the extracted archive")]
    CanonicalRootMissing { expected: String, inner: String },

    #[error("required directory is missing: {0}")]
    MissingSubdirectory(PathBuf),

    #[error("required directory contains no files: {0}")]
    EmptySubdirectory(PathBuf),
}
