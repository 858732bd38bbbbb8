use std::path::PathBuf;
use std::process::Command;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::athena::{AthenaCliClient, QueryService};
use crate::error::OtfsError;
use crate::storage::{ObjectStorage, S3CliClient};

/// Hands out storage and query clients bound to the resolved region.
pub trait CloudConnector {
    type Storage: ObjectStorage;
    type Query: QueryService;

    fn storage(&self, region: &str) -> Self::Storage;
    fn query(&self, region: &str) -> Self::Query;
}

#[derive(Debug, Clone)]
pub struct CliOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Thin wrapper over the `aws` executable; every call asks for JSON output.
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: PathBuf,
    region: Option<String>,
}

impl AwsCli {
    pub fn new() -> Result<Self, OtfsError> {
        let program = find_in_path("aws").ok_or_else(|| OtfsError::MissingTool("aws".to_string()))?;
        Ok(Self {
            program,
            region: None,
        })
    }

    pub fn with_region(&self, region: &str) -> Self {
        Self {
            program: self.program.clone(),
            region: Some(region.to_string()),
        }
    }

    pub fn run(&self, args: &[String]) -> Result<CliOutput, OtfsError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        if let Some(region) = &self.region {
            cmd.arg("--region").arg(region);
        }
        cmd.arg("--output").arg("json");
        debug!(command = %command_label(args), "aws cli call");
        let output = cmd.output().map_err(|err| OtfsError::Cli {
            command: command_label(args),
            message: err.to_string(),
        })?;
        Ok(CliOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    pub fn run_checked(&self, args: &[String]) -> Result<String, OtfsError> {
        let output = self.run(args)?;
        if output.success {
            return Ok(output.stdout);
        }
        let message = if output.stderr.is_empty() {
            "command failed".to_string()
        } else {
            output.stderr
        };
        Err(OtfsError::Cli {
            command: command_label(args),
            message,
        })
    }

    pub fn run_json<T: DeserializeOwned>(&self, args: &[String]) -> Result<T, OtfsError> {
        let stdout = self.run_checked(args)?;
        serde_json::from_str(&stdout).map_err(|err| OtfsError::Cli {
            command: command_label(args),
            message: format!("unexpected output: {err}"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AwsCliConnector {
    cli: AwsCli,
}

impl AwsCliConnector {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

impl CloudConnector for AwsCliConnector {
    type Storage = S3CliClient;
    type Query = AthenaCliClient;

    fn storage(&self, region: &str) -> Self::Storage {
        S3CliClient::new(self.cli.with_region(region))
    }

    fn query(&self, region: &str) -> Self::Query {
        AthenaCliClient::new(self.cli.with_region(region))
    }
}

pub fn args<const N: usize>(values: [&str; N]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn command_label(args: &[String]) -> String {
    args.iter()
        .take(2)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}
