//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use uisnap_harness::result::{CheckpointEntry, CheckpointOutcome};
use uisnap_harness::Flow;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// One line of the checkpoint summary
#[derive(Debug, Serialize)]
pub struct CheckpointRow {
    pub checkpoint: String,
    pub status: &'static str,
    pub detail: String,
}

impl From<&CheckpointEntry> for CheckpointRow {
    fn from(entry: &CheckpointEntry) -> Self {
        let (status, detail) = match &entry.outcome {
            CheckpointOutcome::Captured { path } => ("captured", path.display().to_string()),
            CheckpointOutcome::Failed { reason } => ("failed", reason.clone()),
        };
        Self {
            checkpoint: entry.name.clone(),
            status,
            detail,
        }
    }
}

impl TableDisplay for CheckpointRow {
    fn headers() -> Vec<&'static str> {
        vec!["Checkpoint", "Status", "Detail"]
    }

    fn row(&self) -> Vec<String> {
        let status = match self.status {
            "captured" => self.status.green().to_string(),
            _ => self.status.red().to_string(),
        };
        vec![self.checkpoint.clone(), status, self.detail.clone()]
    }
}

/// One line of the flow listing
#[derive(Debug, Serialize)]
pub struct FlowRow {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub artifacts: Vec<String>,
}

impl From<&Flow> for FlowRow {
    fn from(flow: &Flow) -> Self {
        Self {
            name: flow.name.clone(),
            description: flow.description.clone(),
            tags: flow.tags.clone(),
            artifacts: flow.artifact_names(),
        }
    }
}

impl TableDisplay for FlowRow {
    fn headers() -> Vec<&'static str> {
        vec!["Flow", "Description", "Tags", "Artifacts"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.description.clone(),
            self.tags.join(", "),
            self.artifacts.join("\n"),
        ]
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "!".yellow(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_checkpoint_row_from_outcomes() {
        let captured = CheckpointRow::from(&CheckpointEntry {
            name: "dashboard".to_string(),
            outcome: CheckpointOutcome::Captured { path: PathBuf::from("out/dashboard.png") },
        });
        assert_eq!(captured.status, "captured");
        assert_eq!(captured.detail, "out/dashboard.png");

        let failed = CheckpointRow::from(&CheckpointEntry {
            name: "login".to_string(),
            outcome: CheckpointOutcome::Failed { reason: "WaitTimeoutError: form".to_string() },
        });
        assert_eq!(failed.status, "failed");
        assert_eq!(failed.row()[2], "WaitTimeoutError: form");
    }
}
