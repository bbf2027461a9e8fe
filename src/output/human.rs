// src/output/human.rs
//! Human-readable colored terminal output

use crate::output::{ReportHandler, RunReport, RunStatus};
use crate::stats::RunStats;
use async_trait::async_trait;
use colored::Colorize;
use std::io::{self, Write};
use std::sync::Mutex;

pub struct HumanOutput {
    writer: Mutex<Box<dyn Write + Send>>,
    use_colors: bool,
}

impl HumanOutput {
    pub fn new() -> Self {
        Self {
            writer: Mutex::new(Box::new(io::stdout())),
            use_colors: is_terminal::is_terminal(std::io::stdout()),
        }
    }

    pub fn to_file(file: std::fs::File) -> Self {
        Self::to_writer(Box::new(file))
    }

    /// Plain output into any writer
    pub fn to_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
            use_colors: false,
        }
    }

    fn render(&self, report: &RunReport) -> String {
        let elapsed = RunStats::format_elapsed(report.elapsed_ms / 1000);
        let mut out = String::new();

        let (marker, headline) = match report.status {
            RunStatus::Completed => (
                "[+]",
                format!(
                    "{} completed in {}: {} created, {} updated, {} unchanged",
                    report.domain,
                    elapsed,
                    report.changes.created.len(),
                    report.changes.updated.len(),
                    report.changes.unchanged
                ),
            ),
            RunStatus::Skipped => (
                "[=]",
                format!("{} skipped: inventory already has data", report.domain),
            ),
            RunStatus::Failed => (
                "[!]",
                format!(
                    "{} failed at {}: {}",
                    report.domain,
                    report.stage.as_deref().unwrap_or("unknown"),
                    report.error.as_deref().unwrap_or("unknown error")
                ),
            ),
        };

        let marker = if self.use_colors {
            match report.status {
                RunStatus::Completed => marker.green().bold().to_string(),
                RunStatus::Skipped => marker.yellow().bold().to_string(),
                RunStatus::Failed => marker.red().bold().to_string(),
            }
        } else {
            marker.to_string()
        };
        out.push_str(&format!("{} {}\n", marker, headline));

        for entry in &report.changes.created {
            let name = if self.use_colors {
                entry.value_name.cyan().bold().to_string()
            } else {
                entry.value_name.clone()
            };
            out.push_str(&format!("    new     {} (expires {})\n", name, entry.expiry_date));
        }

        for updated in &report.changes.updated {
            let name = if self.use_colors {
                updated.entry.value_name.cyan().to_string()
            } else {
                updated.entry.value_name.clone()
            };
            out.push_str(&format!(
                "    updated {} ({} -> {})\n",
                name, updated.previous_expiry, updated.entry.expiry_date
            ));
        }

        out
    }
}

impl Default for HumanOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReportHandler for HumanOutput {
    async fn emit_report(&self, report: &RunReport) -> anyhow::Result<()> {
        let text = self.render(report);
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("output writer poisoned"))?;
        writer.write_all(text.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    async fn flush(&self) -> anyhow::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("output writer poisoned"))?;
        writer.flush()?;
        Ok(())
    }
}
