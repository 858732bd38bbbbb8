use std::sync::LazyLock;
use std::thread;
use std::time::Instant;

use regex::Regex;
use tracing::{debug, info};

use crate::athena::{QueryRequest, QueryService};
use crate::catalog::{ACCOUNT_PLACEHOLDER, TableDefinition};
use crate::config::PollSettings;
use crate::domain::QueryState;
use crate::error::OtfsError;

static CREATE_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*CREATE\s+(?:EXTERNAL\s+)?TABLE\b(\s+IF\s+NOT\s+EXISTS\b)?")
        .expect("valid regex")
});

/// Substitutes every occurrence of the account placeholder token with `account_id`.
pub fn render_template(raw: &str, account_id: &str) -> String {
    raw.replace(ACCOUNT_PLACEHOLDER, account_id)
}

/// Inserts `IF NOT EXISTS` after the leading `CREATE [EXTERNAL] TABLE` keywords.
/// Statements that already carry the qualifier, or do not start with a table creation,
/// come back untouched.
pub fn ensure_if_not_exists(statement: &str) -> String {
    let Some(caps) = CREATE_TABLE.captures(statement) else {
        return statement.to_string();
    };
    if caps.get(1).is_some() {
        return statement.to_string();
    }
    let Some(keywords) = caps.get(0) else {
        return statement.to_string();
    };
    let end = keywords.end();
    format!("{} IF NOT EXISTS{}", &statement[..end], &statement[end..])
}

pub fn database_statement(database: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {database}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedQuery {
    pub id: String,
    pub polls: usize,
}

pub struct SchemaApplier<'a, Q: QueryService> {
    query: &'a Q,
    workgroup: &'a str,
    output_location: &'a str,
    poll: PollSettings,
}

impl<'a, Q: QueryService> SchemaApplier<'a, Q> {
    pub fn new(query: &'a Q, workgroup: &'a str, output_location: &'a str, poll: PollSettings) -> Self {
        Self {
            query,
            workgroup,
            output_location,
            poll,
        }
    }

    pub fn apply_database(&self, database: &str) -> Result<CompletedQuery, OtfsError> {
        let completed = self.execute(&database_statement(database), None)?;
        info!(database, "database ready");
        Ok(completed)
    }

    pub fn apply_table(
        &self,
        database: &str,
        table: &TableDefinition,
        account_id: &str,
    ) -> Result<CompletedQuery, OtfsError> {
        let statement = ensure_if_not_exists(&render_template(&table.render(), account_id));
        let completed = self.execute(&statement, Some(database))?;
        info!(table = %table.name, "table ready");
        Ok(completed)
    }

    /// Lists tables in `database`; used as the final check of a run.
    pub fn list_tables(&self, database: &str) -> Result<Vec<String>, OtfsError> {
        let completed = self.execute(&format!("SHOW TABLES IN {database}"), None)?;
        self.query.query_rows(&completed.id)
    }

    pub fn execute(&self, statement: &str, database: Option<&str>) -> Result<CompletedQuery, OtfsError> {
        let request = QueryRequest {
            statement,
            database,
            workgroup: self.workgroup,
            output_location: self.output_location,
        };
        let id = self
            .query
            .start_query(&request)?
            .ok_or_else(|| OtfsError::Submission(first_line(statement)))?;
        debug!(%id, "query submitted");
        self.wait(&id)
    }

    /// Polls at a fixed interval until the job reaches a terminal state.
    pub fn wait(&self, id: &str) -> Result<CompletedQuery, OtfsError> {
        let started = Instant::now();
        let mut polls = 0usize;
        loop {
            let status = self.query.query_status(id)?;
            polls += 1;
            debug!(%id, state = %status.state, polls, "query state");
            match status.state {
                QueryState::Succeeded => {
                    return Ok(CompletedQuery {
                        id: id.to_string(),
                        polls,
                    });
                }
                QueryState::Failed | QueryState::Cancelled => {
                    return Err(OtfsError::QueryExecution {
                        id: id.to_string(),
                        state: status.state.to_string(),
                        reason: status
                            .reason
                            .unwrap_or_else(|| "no reason reported".to_string()),
                    });
                }
                QueryState::Queued | QueryState::Running => {}
            }
            if let Some(timeout) = self.poll.timeout {
                if started.elapsed() >= timeout {
                    return Err(OtfsError::QueryTimeout {
                        id: id.to_string(),
                        seconds: timeout.as_secs(),
                    });
                }
            }
            thread::sleep(self.poll.interval);
        }
    }
}

fn first_line(statement: &str) -> String {
    statement.lines().next().unwrap_or_default().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_inserts_qualifier_once() {
        let ddl = "CREATE EXTERNAL TABLE t (a INT)\nCOMMENT 'CREATE EXTERNAL TABLE'";
        assert_eq!(
            ensure_if_not_exists(ddl),
            "CREATE EXTERNAL TABLE IF NOT EXISTS t (a INT)\nCOMMENT 'CREATE EXTERNAL TABLE'"
        );
    }

    #[test]
    fn rewrite_is_idempotent() {
        let once = ensure_if_not_exists("create table t (a int)");
        assert_eq!(once, "create table IF NOT EXISTS t (a int)");
        assert_eq!(ensure_if_not_exists(&once), once);
    }

    #[test]
    fn rewrite_leaves_other_statements_alone() {
        assert_eq!(ensure_if_not_exists("SHOW TABLES"), "SHOW TABLES");
        assert_eq!(
            ensure_if_not_exists("CREATE TABLESPACE x"),
            "CREATE TABLESPACE x"
        );
    }

    #[test]
    fn template_substitutes_only_whole_token() {
        let raw = "LOCATION 's3://otfs-aula-${ACCOUNT_ID}/aula/' -- $ACCOUNT_ID ${ACCOUNT_ID_X}";
        assert_eq!(
            render_template(raw, "ABC123"),
            "LOCATION 's3://otfs-aula-ABC123/aula/' -- $ACCOUNT_ID ${ACCOUNT_ID_X}"
        );
    }
}
