use camino::Utf8Path;
use tracing::debug;

use crate::aws::{AwsCli, args};
use crate::error::OtfsError;

/// Region whose bucket creation call must omit the location constraint.
pub const DEFAULT_REGION: &str = "us-east-1";

pub trait ObjectStorage {
    fn head_bucket(&self, name: &str) -> Result<bool, OtfsError>;
    fn create_bucket(&self, name: &str, region: &str) -> Result<(), OtfsError>;
    /// Mirrors `local` under `remote_prefix`, optionally deleting remote objects absent locally.
    fn sync_directory(
        &self,
        local: &Utf8Path,
        remote_prefix: &str,
        delete_extraneous: bool,
    ) -> Result<(), OtfsError>;
}

#[derive(Debug, Clone)]
pub struct S3CliClient {
    cli: AwsCli,
}

impl S3CliClient {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

impl ObjectStorage for S3CliClient {
    fn head_bucket(&self, name: &str) -> Result<bool, OtfsError> {
        let output = self.cli.run(&args(["s3api", "head-bucket", "--bucket", name]))?;
        if !output.success {
            debug!(bucket = name, stderr = %output.stderr, "head-bucket failed");
        }
        Ok(output.success)
    }

    fn create_bucket(&self, name: &str, region: &str) -> Result<(), OtfsError> {
        self.cli.run_checked(&create_bucket_args(name, region))?;
        Ok(())
    }

    fn sync_directory(
        &self,
        local: &Utf8Path,
        remote_prefix: &str,
        delete_extraneous: bool,
    ) -> Result<(), OtfsError> {
        let mut command = args(["s3", "sync", local.as_str(), remote_prefix, "--only-show-errors"]);
        if delete_extraneous {
            command.push("--delete".to_string());
        }
        self.cli.run_checked(&command)?;
        Ok(())
    }
}

pub fn create_bucket_args(name: &str, region: &str) -> Vec<String> {
    let mut command = args(["s3api", "create-bucket", "--bucket", name]);
    if region != DEFAULT_REGION {
        command.push("--create-bucket-configuration".to_string());
        command.push(format!("LocationConstraint={region}"));
    }
    command
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_region_omits_location_constraint() {
        let cmd = create_bucket_args("b", "us-east-1");
        assert!(!cmd.iter().any(|arg| arg.contains("LocationConstraint")));

        let cmd = create_bucket_args("b", "eu-west-1");
        assert_eq!(cmd.last().unwrap(), "LocationConstraint=eu-west-1");
    }
}
