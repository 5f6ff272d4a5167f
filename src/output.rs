//! Output formatting for pipeline results.
//!
//! Supports the cleaned CSV, the JSON outlier report, and logging of the
//! summary and each outlier.

use anyhow::Result;
use serde::Serialize;
use std::io::Write;
use tracing::{debug, info};

use crate::pipeline::{PipelineOutput, PipelineSummary};
use crate::record::TripRecord;

/// JSON document written next to the cleaned CSV.
#[derive(Debug, Serialize)]
pub struct OutlierReport<'a> {
    pub summary: &'a PipelineSummary,
    pub outliers: Vec<&'a TripRecord>,
}

impl<'a> OutlierReport<'a> {
    pub fn from_output(output: &'a PipelineOutput) -> Self {
        Self {
            summary: output.summary(),
            outliers: output.outlier_records().collect(),
        }
    }
}

/// Logs the run summary as pretty-printed JSON.
pub fn print_json(summary: &PipelineSummary) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

/// Logs every outlier, numbered from 1 in detection order.
pub fn log_outliers(output: &PipelineOutput) {
    info!(count = output.outliers().len(), "Speed outliers detected");
    for (i, outlier) in output.outlier_records().enumerate() {
        match serde_json::to_string(outlier) {
            Ok(json) => info!("Outlier {}: {}", i + 1, json),
            Err(_) => info!("Outlier {}: {:?}", i + 1, outlier),
        }
    }
}

/// Writes records as CSV with a header row. Missing values are empty cells.
pub fn write_records<W: Write>(writer: W, records: &[TripRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn records_to_csv(records: &[TripRecord]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_records(&mut buf, records)?;
    debug!(rows = records.len(), bytes = buf.len(), "Cleaned records encoded");
    Ok(buf)
}

pub fn report_json(output: &PipelineOutput) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(&OutlierReport::from_output(output))?)
}
