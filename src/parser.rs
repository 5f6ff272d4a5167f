//! Decoding of raw trip batches.
//!
//! A batch is a CSV file, optionally gzip-compressed or wrapped in a zip
//! archive. The format is sniffed from the leading bytes.

use anyhow::{Context, Result, anyhow};
use flate2::read::GzDecoder;
use std::io::{Cursor, Read};
use tracing::debug;

use crate::error::PipelineError;
use crate::fetch::load_bytes;
use crate::record::RawTrip;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];

/// Decodes raw trips from CSV bytes, gzip-compressed CSV, or a zip archive
/// holding a CSV.
///
/// # Errors
///
/// Returns an error if the container is corrupt or a CSV row is
/// structurally malformed. Unparseable cells are not errors.
pub fn parse_trips(bytes: &[u8]) -> Result<Vec<RawTrip>> {
    if bytes.starts_with(ZIP_MAGIC) {
        parse_zip(bytes)
    } else if bytes.starts_with(GZIP_MAGIC) {
        debug!("Decoding gzip-compressed CSV");
        read_csv(GzDecoder::new(bytes))
    } else {
        read_csv(bytes)
    }
}

/// Loads a batch from a local path or URL and decodes it.
#[tracing::instrument(skip_all, fields(source = %source))]
pub async fn load_trips(source: &str) -> crate::error::Result<Vec<RawTrip>> {
    let bytes = load_bytes(source)
        .await
        .map_err(|e| PipelineError::batch_load(source, format!("{e:#}")))?;
    let rows = parse_trips(&bytes).map_err(|e| PipelineError::batch_load(source, format!("{e:#}")))?;
    debug!(rows = rows.len(), "Raw trips decoded");
    Ok(rows)
}

fn parse_zip(bytes: &[u8]) -> Result<Vec<RawTrip>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).context("invalid zip archive")?;

    let is_csv = |name: &str| name.to_ascii_lowercase().ends_with(".csv");
    let mut csv_index = None;
    let mut first_file = None;
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        first_file.get_or_insert(i);
        if is_csv(entry.name()) {
            csv_index = Some(i);
            break;
        }
    }

    let index = csv_index
        .or(first_file)
        .ok_or_else(|| anyhow!("zip archive contains no files"))?;
    let entry = archive.by_index(index)?;
    debug!(entry = entry.name(), "Decoding CSV from zip archive");
    read_csv(entry)
}

fn read_csv<R: Read>(reader: R) -> Result<Vec<RawTrip>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: RawTrip = result?;
        rows.push(row);
    }

    Ok(rows)
}
