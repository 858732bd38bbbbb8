use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use otfs_provision::app::{App, ProgressSink, RunOptions};
use otfs_provision::aws::{AwsCli, AwsCliConnector};
use otfs_provision::config::ConfigLoader;
use otfs_provision::error::OtfsError;
use otfs_provision::identity::AwsCliIdentity;
use otfs_provision::output::{ConsoleOutput, JsonOutput, OutputMode};
use otfs_provision::share::HttpShareHost;
use otfs_provision::workspace::Workspace;

#[derive(Parser)]
#[command(name = "otfs-provision")]
#[command(about = "Provision the OTFS classroom warehouse: S3 bucket, dataset upload, Athena workgroup, database and tables")]
#[command(version, author)]
struct Cli {
    /// Path to a JSON config file (defaults to ./otfs-provision.json when present)
    #[arg(long)]
    config: Option<String>,

    /// AWS region; overrides the profile, environment and instance metadata
    #[arg(long, env = "OTFS_REGION")]
    region: Option<String>,

    /// Share link id of the dataset archive
    #[arg(long)]
    share_link: Option<String>,

    /// Use a local zip archive instead of downloading it
    #[arg(long)]
    archive: Option<Utf8PathBuf>,

    /// Scratch directory for the download and extraction
    #[arg(long)]
    work_dir: Option<Utf8PathBuf>,

    /// Print the final report as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<OtfsError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &OtfsError) -> u8 {
    match error {
        OtfsError::Configuration(_)
        | OtfsError::MissingConfig(_)
        | OtfsError::ConfigRead(_)
        | OtfsError::ConfigParse(_) => 2,
        OtfsError::Download(_)
        | OtfsError::DownloadStatus { .. }
        | OtfsError::EmptyDownload(_)
        | OtfsError::ConfirmationTokenMissing { .. }
        | OtfsError::Verification(_) => 3,
        OtfsError::Layout(_) => 4,
        OtfsError::Provision(_) => 5,
        OtfsError::Submission(_)
        | OtfsError::QueryExecution { .. }
        | OtfsError::QueryTimeout { .. } => 6,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Console
    };

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(link) = &cli.share_link {
        config.share_link = Some(link.parse()?);
    }
    let workspace = match cli.work_dir {
        Some(root) => Workspace::new_with_root(root),
        None => Workspace::new()?,
    };

    let aws = AwsCli::new()?;
    let identity = AwsCliIdentity::new(aws.clone())?;
    let host = HttpShareHost::new(&config.share_base_url)?;
    let app = App::new(config, workspace, identity, host, AwsCliConnector::new(aws));

    let options = RunOptions {
        region_override: cli.region,
        local_archive: cli.archive,
    };
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Console => &ConsoleOutput,
        OutputMode::Json => &JsonOutput,
    };
    let report = app.run(&options, sink)?;

    match output_mode {
        OutputMode::Console => ConsoleOutput::print_summary(&report),
        OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
    }
    Ok(())
}
