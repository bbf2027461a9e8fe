// src/output/json.rs
//! JSON Lines (JSONL) output handler

use crate::output::{ReportHandler, RunReport};
use async_trait::async_trait;
use std::io::{self, Write};
use std::sync::Mutex;

/// One JSON object per run, one run per line
pub struct JsonOutput {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonOutput {
    pub fn new() -> Self {
        Self::to_writer(Box::new(io::stdout()))
    }

    pub fn to_file(file: std::fs::File) -> Self {
        Self::to_writer(Box::new(file))
    }

    pub fn to_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReportHandler for JsonOutput {
    async fn emit_report(&self, report: &RunReport) -> anyhow::Result<()> {
        let json = serde_json::to_string(report)?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("output writer poisoned"))?;
        writeln!(writer, "{}", json)?;
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
