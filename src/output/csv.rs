// src/output/csv.rs
//! CSV output handler, one row per created or updated entry

use crate::output::{ReportHandler, RunReport};
use async_trait::async_trait;
use std::io::{self, Write};
use std::sync::Mutex;

const HEADER: [&str; 6] = [
    "domain",
    "change",
    "value_name",
    "expiry_date",
    "previous_expiry",
    "discovered_date",
];

pub struct CsvOutput {
    writer: Mutex<csv::Writer<Box<dyn Write + Send>>>,
    header_written: Mutex<bool>,
}

impl CsvOutput {
    pub fn new() -> Self {
        Self::to_writer(Box::new(io::stdout()))
    }

    pub fn to_file(file: std::fs::File) -> Self {
        Self::to_writer(Box::new(file))
    }

    pub fn to_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(csv::Writer::from_writer(writer)),
            header_written: Mutex::new(false),
        }
    }

    fn rows(report: &RunReport) -> Vec<[String; 6]> {
        let created = report.changes.created.iter().map(|e| {
            [
                report.domain.clone(),
                "created".to_string(),
                e.value_name.clone(),
                e.expiry_date.to_string(),
                String::new(),
                e.discovered_date.to_string(),
            ]
        });

        let updated = report.changes.updated.iter().map(|u| {
            [
                report.domain.clone(),
                "updated".to_string(),
                u.entry.value_name.clone(),
                u.entry.expiry_date.to_string(),
                u.previous_expiry.to_string(),
                u.entry.discovered_date.to_string(),
            ]
        });

        created.chain(updated).collect()
    }
}

impl Default for CsvOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReportHandler for CsvOutput {
    async fn emit_report(&self, report: &RunReport) -> anyhow::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("output writer poisoned"))?;
        let mut header_written = self
            .header_written
            .lock()
            .map_err(|_| anyhow::anyhow!("output writer poisoned"))?;

        if !*header_written {
            writer.write_record(HEADER)?;
            *header_written = true;
        }

        for row in Self::rows(report) {
            writer.write_record(&row)?;
        }

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
