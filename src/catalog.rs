//! External table catalog kept as data, rendered to DDL on demand.

use serde::{Deserialize, Serialize};

/// Literal token replaced with the caller account id when a definition is applied.
pub const ACCOUNT_PLACEHOLDER: &str = "${ACCOUNT_ID}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TableFormat {
    Csv {
        #[serde(default = "default_delimiter")]
        delimiter: String,
        #[serde(default = "default_true")]
        header: bool,
    },
    Parquet,
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<Column>,
    pub format: TableFormat,
    /// Storage URI; may contain [`ACCOUNT_PLACEHOLDER`].
    pub location: String,
}

impl TableDefinition {
    /// Raw creation statement, still carrying the account placeholder.
    pub fn render(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|column| format!("  `{}` {}", column.name, column.data_type))
            .collect::<Vec<_>>()
            .join(",\n");
        let mut ddl = format!("CREATE EXTERNAL TABLE {} (\n{columns}\n)\n", self.name);
        match &self.format {
            TableFormat::Csv { delimiter, header } => {
                ddl.push_str("ROW FORMAT DELIMITED\n");
                ddl.push_str(&format!("FIELDS TERMINATED BY '{delimiter}'\n"));
                ddl.push_str("STORED AS TEXTFILE\n");
                ddl.push_str(&format!("LOCATION '{}'", self.location));
                if *header {
                    ddl.push_str("\nTBLPROPERTIES ('skip.header.line.count'='1')");
                }
            }
            TableFormat::Parquet => {
                ddl.push_str("STORED AS PARQUET\n");
                ddl.push_str(&format!("LOCATION '{}'", self.location));
            }
        }
        ddl
    }
}

struct Entity {
    name: &'static str,
    columns: &'static [(&'static str, &'static str)],
}

const ENTITIES: &[Entity] = &[
    Entity {
        name: "students",
        columns: &[
            ("student_id", "INT"),
            ("first_name", "STRING"),
            ("last_name", "STRING"),
            ("email", "STRING"),
            ("enrolled_on", "DATE"),
        ],
    },
    Entity {
        name: "courses",
        columns: &[
            ("course_id", "INT"),
            ("title", "STRING"),
            ("department", "STRING"),
            ("credits", "INT"),
        ],
    },
    Entity {
        name: "enrollments",
        columns: &[
            ("enrollment_id", "INT"),
            ("student_id", "INT"),
            ("course_id", "INT"),
            ("term", "STRING"),
            ("grade", "DOUBLE"),
        ],
    },
];

/// The six tables of the classroom dataset: one CSV and one Parquet table per entity.
pub fn default_catalog(bucket_prefix: &str, remote_prefix: &str) -> Vec<TableDefinition> {
    let remote_prefix = remote_prefix.trim_matches('/');
    let mut tables = Vec::with_capacity(ENTITIES.len() * 2);
    for (suffix, format) in [
        (
            "csv",
            TableFormat::Csv {
                delimiter: default_delimiter(),
                header: true,
            },
        ),
        ("parquet", TableFormat::Parquet),
    ] {
        for entity in ENTITIES {
            tables.push(TableDefinition {
                name: format!("{}_{suffix}", entity.name),
                columns: entity
                    .columns
                    .iter()
                    .map(|(name, data_type)| Column {
                        name: name.to_string(),
                        data_type: data_type.to_string(),
                    })
                    .collect(),
                format: format.clone(),
                location: format!(
                    "s3://{bucket_prefix}-{ACCOUNT_PLACEHOLDER}/{remote_prefix}/{suffix}/{}/",
                    entity.name
                ),
            });
        }
    }
    tables
}
