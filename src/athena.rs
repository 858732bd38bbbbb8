use serde::Deserialize;
use serde_json::json;

use crate::aws::{AwsCli, args};
use crate::domain::{QueryStatus, WorkgroupConfig};
use crate::error::OtfsError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest<'a> {
    pub statement: &'a str,
    pub database: Option<&'a str>,
    pub workgroup: &'a str,
    pub output_location: &'a str,
}

pub trait QueryService {
    fn workgroup_exists(&self, name: &str) -> Result<bool, OtfsError>;
    fn create_workgroup(&self, name: &str, config: &WorkgroupConfig) -> Result<(), OtfsError>;
    fn update_workgroup(&self, name: &str, config: &WorkgroupConfig) -> Result<(), OtfsError>;
    /// Returns the job id, or `None` when the service accepted the call without one.
    fn start_query(&self, request: &QueryRequest<'_>) -> Result<Option<String>, OtfsError>;
    fn query_status(&self, id: &str) -> Result<QueryStatus, OtfsError>;
    /// First-column values of the result set, header row excluded.
    fn query_rows(&self, id: &str) -> Result<Vec<String>, OtfsError>;
}

#[derive(Debug, Clone)]
pub struct AthenaCliClient {
    cli: AwsCli,
}

impl AthenaCliClient {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

impl QueryService for AthenaCliClient {
    fn workgroup_exists(&self, name: &str) -> Result<bool, OtfsError> {
        let output = self
            .cli
            .run(&args(["athena", "get-work-group", "--work-group", name]))?;
        if output.success {
            return Ok(true);
        }
        if is_not_found(&output.stderr) {
            return Ok(false);
        }
        Err(OtfsError::Cli {
            command: "athena get-work-group".to_string(),
            message: output.stderr,
        })
    }

    fn create_workgroup(&self, name: &str, config: &WorkgroupConfig) -> Result<(), OtfsError> {
        let configuration = json!({
            "ResultConfiguration": { "OutputLocation": config.output_location },
            "EnforceWorkGroupConfiguration": config.enforce_configuration,
            "PublishCloudWatchMetricsEnabled": config.publish_metrics,
        });
        self.cli.run_checked(&args([
            "athena",
            "create-work-group",
            "--name",
            name,
            "--configuration",
            &configuration.to_string(),
        ]))?;
        Ok(())
    }

    fn update_workgroup(&self, name: &str, config: &WorkgroupConfig) -> Result<(), OtfsError> {
        let updates = json!({
            "ResultConfigurationUpdates": { "OutputLocation": config.output_location },
            "EnforceWorkGroupConfiguration": config.enforce_configuration,
            "PublishCloudWatchMetricsEnabled": config.publish_metrics,
        });
        self.cli.run_checked(&args([
            "athena",
            "update-work-group",
            "--work-group",
            name,
            "--configuration-updates",
            &updates.to_string(),
        ]))?;
        Ok(())
    }

    fn start_query(&self, request: &QueryRequest<'_>) -> Result<Option<String>, OtfsError> {
        let output_location = format!("OutputLocation={}", request.output_location);
        let mut command = args([
            "athena",
            "start-query-execution",
            "--query-string",
            request.statement,
            "--work-group",
            request.workgroup,
            "--result-configuration",
            &output_location,
        ]);
        if let Some(database) = request.database {
            command.push("--query-execution-context".to_string());
            command.push(format!("Database={database}"));
        }
        let started: StartQueryOutput = self.cli.run_json(&command)?;
        Ok(started.query_execution_id.filter(|id| !id.is_empty()))
    }

    fn query_status(&self, id: &str) -> Result<QueryStatus, OtfsError> {
        let stdout = self.cli.run_checked(&args([
            "athena",
            "get-query-execution",
            "--query-execution-id",
            id,
        ]))?;
        parse_query_status(&stdout)
    }

    fn query_rows(&self, id: &str) -> Result<Vec<String>, OtfsError> {
        let stdout = self.cli.run_checked(&args([
            "athena",
            "get-query-results",
            "--query-execution-id",
            id,
        ]))?;
        parse_query_rows(&stdout)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StartQueryOutput {
    #[serde(default)]
    query_execution_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueryExecutionOutput {
    query_execution: QueryExecution,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecution {
    status: ExecutionStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExecutionStatus {
    state: String,
    #[serde(default)]
    state_change_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueryResultsOutput {
    result_set: ResultSet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResultSet {
    #[serde(default)]
    rows: Vec<Row>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Row {
    #[serde(default)]
    data: Vec<Datum>,
}

#[derive(Debug, Deserialize)]
struct Datum {
    #[serde(rename = "VarCharValue", default)]
    value: Option<String>,
}

pub fn parse_query_status(stdout: &str) -> Result<QueryStatus, OtfsError> {
    let output: GetQueryExecutionOutput =
        serde_json::from_str(stdout).map_err(|err| OtfsError::Cli {
            command: "athena get-query-execution".to_string(),
            message: format!("unexpected output: {err}"),
        })?;
    let status = output.query_execution.status;
    Ok(QueryStatus {
        state: status.state.parse()?,
        reason: status.state_change_reason.filter(|reason| !reason.is_empty()),
    })
}

/// `SHOW TABLES` results have no header row; other queries repeat column names first.
pub fn parse_query_rows(stdout: &str) -> Result<Vec<String>, OtfsError> {
    let output: GetQueryResultsOutput =
        serde_json::from_str(stdout).map_err(|err| OtfsError::Cli {
            command: "athena get-query-results".to_string(),
            message: format!("unexpected output: {err}"),
        })?;
    Ok(output
        .result_set
        .rows
        .into_iter()
        .filter_map(|row| row.data.into_iter().next().and_then(|datum| datum.value))
        .collect())
}

fn is_not_found(stderr: &str) -> bool {
    let lowered = stderr.to_ascii_lowercase();
    lowered.contains("not found") || lowered.contains("does not exist")
}
