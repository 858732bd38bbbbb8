#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use zip::write::SimpleFileOptions;

use otfs_provision::athena::{QueryRequest, QueryService};
use otfs_provision::aws::CloudConnector;
use otfs_provision::domain::{QueryState, QueryStatus, ShareLinkId, WorkgroupConfig};
use otfs_provision::error::OtfsError;
use otfs_provision::identity::IdentityClient;
use otfs_provision::share::{ConfirmToken, HostResponse, ShareHost};
use otfs_provision::storage::ObjectStorage;

/// Builds an in-memory zip; names ending in `/` become directory entries.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        if name.ends_with('/') {
            writer
                .add_directory(*name, SimpleFileOptions::default())
                .unwrap();
            continue;
        }
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn dataset_zip() -> Vec<u8> {
    zip_bytes(&[
        ("data/aula/csv/students/students.csv", b"student_id\n1\n"),
        ("data/aula/parquet/students/part-0.parquet", b"PAR1"),
    ])
}

pub fn utf8_dir(temp: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap()
}

// Share host

pub struct CannedResponse {
    pub content_type: Option<String>,
    pub cookies: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CannedResponse {
    pub fn binary(body: Vec<u8>) -> Self {
        Self {
            content_type: Some("application/octet-stream".to_string()),
            cookies: Vec::new(),
            body,
        }
    }

    pub fn html(body: &str) -> Self {
        Self {
            content_type: Some("text/html; charset=utf-8".to_string()),
            cookies: Vec::new(),
            body: body.as_bytes().to_vec(),
        }
    }
}

#[derive(Default)]
pub struct MockHost {
    responses: Mutex<VecDeque<CannedResponse>>,
    pub requests: Mutex<Vec<String>>,
}

impl MockHost {
    pub fn with(responses: Vec<CannedResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl ShareHost for MockHost {
    fn download_url(&self, link: &ShareLinkId, token: Option<&ConfirmToken>) -> String {
        match token {
            Some(token) => format!("https://share.test/uc?id={link}&confirm={}", token.confirm),
            None => format!("https://share.test/uc?id={link}"),
        }
    }

    fn get(&self, url: &str) -> Result<HostResponse, OtfsError> {
        self.requests.lock().unwrap().push(url.to_string());
        let canned = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| OtfsError::Download("no canned response left".to_string()))?;
        Ok(HostResponse {
            content_type: canned.content_type,
            cookies: canned.cookies,
            body: Box::new(Cursor::new(canned.body)),
        })
    }
}

// Identity

pub struct FixedIdentity {
    pub account: String,
    pub region: Option<String>,
}

impl IdentityClient for FixedIdentity {
    fn caller_account_id(&self) -> Result<String, OtfsError> {
        Ok(self.account.clone())
    }

    fn configured_region(&self) -> Option<String> {
        self.region.clone()
    }

    fn environment_region(&self) -> Option<String> {
        None
    }

    fn instance_metadata_region(&self, _timeout: Duration) -> Option<String> {
        None
    }
}

// Object storage

#[derive(Default)]
pub struct S3State {
    pub buckets: BTreeSet<String>,
    pub create_calls: Vec<(String, String)>,
    pub fail_create: bool,
    /// Creation call errors but the bucket appears anyway, as in a concurrent create.
    pub create_race: bool,
    pub syncs: Vec<(Utf8PathBuf, String, bool)>,
}

#[derive(Clone, Default)]
pub struct MockS3 {
    pub state: Arc<Mutex<S3State>>,
}

impl ObjectStorage for MockS3 {
    fn head_bucket(&self, name: &str) -> Result<bool, OtfsError> {
        Ok(self.state.lock().unwrap().buckets.contains(name))
    }

    fn create_bucket(&self, name: &str, region: &str) -> Result<(), OtfsError> {
        let mut state = self.state.lock().unwrap();
        state
            .create_calls
            .push((name.to_string(), region.to_string()));
        if state.create_race {
            state.buckets.insert(name.to_string());
            return Err(OtfsError::Cli {
                command: "s3api create-bucket".to_string(),
                message: "BucketAlreadyOwnedByYou".to_string(),
            });
        }
        if state.fail_create {
            return Err(OtfsError::Cli {
                command: "s3api create-bucket".to_string(),
                message: "AccessDenied".to_string(),
            });
        }
        state.buckets.insert(name.to_string());
        Ok(())
    }

    fn sync_directory(
        &self,
        local: &Utf8Path,
        remote_prefix: &str,
        delete_extraneous: bool,
    ) -> Result<(), OtfsError> {
        self.state.lock().unwrap().syncs.push((
            local.to_path_buf(),
            remote_prefix.to_string(),
            delete_extraneous,
        ));
        Ok(())
    }
}

// Query service

#[derive(Default)]
pub struct AthenaState {
    pub workgroups: HashMap<String, WorkgroupConfig>,
    pub workgroup_creates: usize,
    pub workgroup_updates: usize,
    /// Creation call errors but the workgroup appears anyway, as in a concurrent create.
    pub workgroup_create_race: bool,
    pub fail_workgroup_create: bool,
    pub workgroup_exists_calls: usize,
    pub databases: BTreeSet<String>,
    /// Table name to the statement that created it.
    pub tables: BTreeMap<String, String>,
    pub table_creates: HashMap<String, usize>,
    pub statements: Vec<(String, Option<String>)>,
    /// States reported before a job's own outcome, consumed in order.
    pub scripted: VecDeque<QueryStatus>,
    pub omit_ids: bool,
    pub polls: usize,
    jobs: HashMap<String, (QueryStatus, Vec<String>)>,
}

#[derive(Clone, Default)]
pub struct MockAthena {
    pub state: Arc<Mutex<AthenaState>>,
}

impl MockAthena {
    pub fn script(&self, states: Vec<QueryStatus>) {
        self.state.lock().unwrap().scripted = states.into();
    }
}

pub fn status(state: QueryState, reason: Option<&str>) -> QueryStatus {
    QueryStatus {
        state,
        reason: reason.map(str::to_string),
    }
}

fn created_table(statement: &str) -> Option<(String, bool)> {
    let tokens = statement.split_whitespace().collect::<Vec<_>>();
    if !tokens.first()?.eq_ignore_ascii_case("CREATE") {
        return None;
    }
    let idx = tokens
        .iter()
        .position(|token| token.eq_ignore_ascii_case("TABLE"))?;
    let guarded = tokens
        .get(idx + 1)
        .map(|token| token.eq_ignore_ascii_case("IF"))
        .unwrap_or(false);
    let name = if guarded {
        tokens.get(idx + 4)?
    } else {
        tokens.get(idx + 1)?
    };
    Some((name.trim_end_matches('(').to_string(), guarded))
}

impl QueryService for MockAthena {
    fn workgroup_exists(&self, name: &str) -> Result<bool, OtfsError> {
        let mut state = self.state.lock().unwrap();
        state.workgroup_exists_calls += 1;
        Ok(state.workgroups.contains_key(name))
    }

    fn create_workgroup(&self, name: &str, config: &WorkgroupConfig) -> Result<(), OtfsError> {
        let mut state = self.state.lock().unwrap();
        if state.workgroup_create_race {
            state.workgroups.insert(name.to_string(), WorkgroupConfig::declared("s3://other/"));
        }
        if state.fail_workgroup_create {
            return Err(OtfsError::Cli {
                command: "athena create-work-group".to_string(),
                message: "AccessDeniedException".to_string(),
            });
        }
        if state.workgroups.contains_key(name) {
            return Err(OtfsError::Cli {
                command: "athena create-work-group".to_string(),
                message: "WorkGroup is already created".to_string(),
            });
        }
        state.workgroups.insert(name.to_string(), config.clone());
        state.workgroup_creates += 1;
        Ok(())
    }

    fn update_workgroup(&self, name: &str, config: &WorkgroupConfig) -> Result<(), OtfsError> {
        let mut state = self.state.lock().unwrap();
        state.workgroups.insert(name.to_string(), config.clone());
        state.workgroup_updates += 1;
        Ok(())
    }

    fn start_query(&self, request: &QueryRequest<'_>) -> Result<Option<String>, OtfsError> {
        let mut state = self.state.lock().unwrap();
        state.statements.push((
            request.statement.to_string(),
            request.database.map(str::to_string),
        ));
        if state.omit_ids {
            return Ok(None);
        }

        let statement = request.statement.trim();
        let mut rows = Vec::new();
        let outcome = if let Some(database) = statement
            .strip_prefix("CREATE DATABASE IF NOT EXISTS ")
        {
            state.databases.insert(database.trim().to_string());
            status(QueryState::Succeeded, None)
        } else if let Some((name, guarded)) = created_table(statement) {
            if state.tables.contains_key(&name) {
                if guarded {
                    status(QueryState::Succeeded, None)
                } else {
                    status(
                        QueryState::Failed,
                        Some(&format!("AlreadyExistsException: Table {name} already exists")),
                    )
                }
            } else {
                state.tables.insert(name.clone(), statement.to_string());
                *state.table_creates.entry(name).or_default() += 1;
                status(QueryState::Succeeded, None)
            }
        } else if statement.starts_with("SHOW TABLES") {
            rows = state.tables.keys().cloned().collect();
            status(QueryState::Succeeded, None)
        } else {
            status(QueryState::Succeeded, None)
        };

        let id = format!("q-{}", state.statements.len());
        state.jobs.insert(id.clone(), (outcome, rows));
        Ok(Some(id))
    }

    fn query_status(&self, id: &str) -> Result<QueryStatus, OtfsError> {
        let mut state = self.state.lock().unwrap();
        state.polls += 1;
        if let Some(next) = state.scripted.pop_front() {
            return Ok(next);
        }
        state
            .jobs
            .get(id)
            .map(|(outcome, _)| outcome.clone())
            .ok_or_else(|| OtfsError::Cli {
                command: "athena get-query-execution".to_string(),
                message: format!("unknown query {id}"),
            })
    }

    fn query_rows(&self, id: &str) -> Result<Vec<String>, OtfsError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .jobs
            .get(id)
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }
}

#[derive(Clone, Default)]
pub struct MockCloud {
    pub s3: MockS3,
    pub athena: MockAthena,
    pub regions: Arc<Mutex<Vec<String>>>,
}

impl CloudConnector for MockCloud {
    type Storage = MockS3;
    type Query = MockAthena;

    fn storage(&self, region: &str) -> Self::Storage {
        self.regions.lock().unwrap().push(region.to_string());
        self.s3.clone()
    }

    fn query(&self, region: &str) -> Self::Query {
        self.regions.lock().unwrap().push(region.to_string());
        self.athena.clone()
    }
}
