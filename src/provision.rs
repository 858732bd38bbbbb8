use tracing::{info, warn};

use crate::athena::QueryService;
use crate::domain::{ExtractedTree, ResourceAction, WorkgroupConfig};
use crate::error::OtfsError;
use crate::storage::ObjectStorage;

pub struct Provisioner<'a, S: ObjectStorage, Q: QueryService> {
    storage: &'a S,
    query: &'a Q,
}

impl<'a, S: ObjectStorage, Q: QueryService> Provisioner<'a, S, Q> {
    pub fn new(storage: &'a S, query: &'a Q) -> Self {
        Self { storage, query }
    }

    /// Creation failures are tolerated as long as the bucket exists afterwards;
    /// a concurrent creator or an existing bucket both end up here.
    pub fn ensure_bucket(&self, name: &str, region: &str) -> Result<ResourceAction, OtfsError> {
        if self.storage.head_bucket(name)? {
            info!(bucket = name, "bucket already exists");
            return Ok(ResourceAction::Existing);
        }

        if let Err(err) = self.storage.create_bucket(name, region) {
            warn!(bucket = name, error = %err, "bucket creation failed, re-checking existence");
        }

        if self.storage.head_bucket(name)? {
            info!(bucket = name, region, "bucket ready");
            Ok(ResourceAction::Created)
        } else {
            Err(OtfsError::Provision(format!(
                "bucket {name} does not exist after creation attempt in {region}"
            )))
        }
    }

    pub fn ensure_workgroup(
        &self,
        name: &str,
        config: &WorkgroupConfig,
    ) -> Result<ResourceAction, OtfsError> {
        if self.query.workgroup_exists(name)? {
            self.query.update_workgroup(name, config)?;
            info!(workgroup = name, output = %config.output_location, "workgroup updated");
            return Ok(ResourceAction::Updated);
        }

        let created = match self.query.create_workgroup(name, config) {
            Ok(()) => true,
            Err(err) => {
                warn!(workgroup = name, error = %err, "workgroup creation failed, re-checking existence");
                false
            }
        };
        if !self.query.workgroup_exists(name)? {
            return Err(OtfsError::Provision(format!(
                "workgroup {name} does not exist after creation attempt"
            )));
        }
        if !created {
            self.query.update_workgroup(name, config)?;
            info!(workgroup = name, output = %config.output_location, "workgroup updated");
            return Ok(ResourceAction::Updated);
        }
        info!(workgroup = name, output = %config.output_location, "workgroup created");
        Ok(ResourceAction::Created)
    }

    /// Syncs the canonical dataset tree into `s3://<bucket>/<prefix>/` with deletion,
    /// refusing prefixes that would overlap the query-result location.
    pub fn upload_dataset(
        &self,
        tree: &ExtractedTree,
        bucket: &str,
        prefix: &str,
        results_prefix: &str,
    ) -> Result<String, OtfsError> {
        let prefix = prefix.trim_matches('/');
        let results_prefix = results_prefix.trim_matches('/');
        if prefix.is_empty() {
            return Err(OtfsError::Provision(
                "refusing to sync with deletion into the bucket root".to_string(),
            ));
        }
        if overlaps(prefix, results_prefix) {
            return Err(OtfsError::Provision(format!(
                "dataset prefix {prefix} overlaps query results prefix {results_prefix}"
            )));
        }

        let remote = format!("s3://{bucket}/{prefix}/");
        let local = tree.canonical_root();
        info!(from = %local, to = %remote, "syncing dataset");
        self.storage.sync_directory(&local, &remote, true)?;
        Ok(remote)
    }
}

fn overlaps(a: &str, b: &str) -> bool {
    if b.is_empty() {
        return true;
    }
    let a_dir = format!("{a}/");
    let b_dir = format!("{b}/");
    a_dir.starts_with(&b_dir) || b_dir.starts_with(&a_dir)
}
