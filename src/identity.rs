use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::aws::{AwsCli, args};
use crate::error::OtfsError;

pub const METADATA_TIMEOUT: Duration = Duration::from_secs(2);
const METADATA_BASE: &str = "http://169.254.169.254/latest";

pub trait IdentityClient {
    fn caller_account_id(&self) -> Result<String, OtfsError>;
    /// Region from the local CLI profile, if one is configured.
    fn configured_region(&self) -> Option<String>;
    fn environment_region(&self) -> Option<String>;
    fn instance_metadata_region(&self, timeout: Duration) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionSource {
    Override,
    Profile,
    Environment,
    InstanceMetadata,
}

/// First non-empty region wins: explicit override, CLI profile, environment, then instance metadata.
pub fn resolve_region<I: IdentityClient + ?Sized>(
    identity: &I,
    override_region: Option<&str>,
) -> Result<(String, RegionSource), OtfsError> {
    let candidates: [(RegionSource, Box<dyn Fn() -> Option<String> + '_>); 4] = [
        (
            RegionSource::Override,
            Box::new(|| override_region.map(str::to_string)),
        ),
        (RegionSource::Profile, Box::new(|| identity.configured_region())),
        (
            RegionSource::Environment,
            Box::new(|| identity.environment_region()),
        ),
        (
            RegionSource::InstanceMetadata,
            Box::new(|| identity.instance_metadata_region(METADATA_TIMEOUT)),
        ),
    ];

    for (source, probe) in candidates {
        if let Some(region) = probe().map(|value| value.trim().to_string())
            && !region.is_empty()
        {
            debug!(?source, %region, "region resolved");
            return Ok((region, source));
        }
    }
    Err(OtfsError::Configuration(
        "no AWS region could be resolved from flags, profile, environment or instance metadata"
            .to_string(),
    ))
}

#[derive(Debug, Clone)]
pub struct AwsCliIdentity {
    cli: AwsCli,
    metadata: Client,
}

impl AwsCliIdentity {
    pub fn new(cli: AwsCli) -> Result<Self, OtfsError> {
        let metadata = Client::builder()
            .timeout(METADATA_TIMEOUT)
            .connect_timeout(METADATA_TIMEOUT)
            .build()
            .map_err(|err| OtfsError::Configuration(err.to_string()))?;
        Ok(Self { cli, metadata })
    }

    fn metadata_token(&self, timeout: Duration) -> Option<String> {
        let response = self
            .metadata
            .put(format!("{METADATA_BASE}/api/token"))
            .header("X-aws-ec2-metadata-token-ttl-seconds", "21600")
            .timeout(timeout)
            .send()
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.text().ok().filter(|token| !token.trim().is_empty())
    }

    fn metadata_region(&self, token: Option<&str>, timeout: Duration) -> Option<String> {
        let mut request = self
            .metadata
            .get(format!("{METADATA_BASE}/meta-data/placement/region"))
            .timeout(timeout);
        if let Some(token) = token {
            request = request.header("X-aws-ec2-metadata-token", token.trim());
        }
        let response = request.send().ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.text().ok().filter(|region| !region.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentity {
    account: String,
}

impl IdentityClient for AwsCliIdentity {
    fn caller_account_id(&self) -> Result<String, OtfsError> {
        let identity: CallerIdentity = self
            .cli
            .run_json(&args(["sts", "get-caller-identity"]))
            .map_err(|err| {
                OtfsError::Configuration(format!(
                    "unable to resolve caller account (are credentials configured?): {err}"
                ))
            })?;
        info!(account = %identity.account, "caller identity resolved");
        Ok(identity.account)
    }

    fn configured_region(&self) -> Option<String> {
        let output = self.cli.run(&args(["configure", "get", "region"])).ok()?;
        output.success.then_some(output.stdout).filter(|value| !value.is_empty())
    }

    fn environment_region(&self) -> Option<String> {
        ["AWS_REGION", "AWS_DEFAULT_REGION"]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.trim().is_empty())
    }

    fn instance_metadata_region(&self, timeout: Duration) -> Option<String> {
        // IMDSv2 first; older hosts only answer tokenless requests.
        if let Some(token) = self.metadata_token(timeout) {
            if let Some(region) = self.metadata_region(Some(&token), timeout) {
                return Some(region);
            }
        }
        self.metadata_region(None, timeout)
    }
}
