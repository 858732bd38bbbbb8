use std::io::{self, Write};

use crossterm::style::Stylize;
use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink, RunReport, StepStatus};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Console,
    Json,
}

/// Step lines on stderr, coloured by status.
pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn format_event(event: &ProgressEvent) -> String {
        format!(
            "[{}/{}] {}: {}",
            event.index, event.total, event.step, event.message
        )
    }

    pub fn print_summary(report: &RunReport) {
        println!("{}", "OTFS environment ready".green().bold());
        println!("  account:   {}", report.context.account_id);
        println!("  region:    {}", report.context.region);
        println!("  bucket:    {} ({})", report.context.bucket_name, report.bucket);
        println!("  dataset:   {}", report.dataset_uri);
        println!("  results:   {}", report.context.result_location);
        println!("  database:  {}", report.database);
        println!("  tables:    {}", report.tables_listed.join(", "));
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        let line = Self::format_event(&event);
        let styled = match event.status {
            StepStatus::Started => line.cyan(),
            StepStatus::Progress => line.dark_grey(),
            StepStatus::Done => line.green(),
            StepStatus::Failed => line.red().bold(),
        };
        let _ = writeln!(io::stderr(), "{styled}");
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &RunReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}
