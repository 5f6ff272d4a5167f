//! Persistence of pipeline artifacts.
//!
//! [`OutputStore`] is the async trait for writing one named artifact.
//! [`LocalStore`] writes under a directory, [`S3Store`] uploads to a bucket.
//! [`persist`] borrows the [`PipelineOutput`], so a failed attempt can be
//! retried without re-running the pipeline.

use anyhow::{Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::output::{records_to_csv, report_json};
use crate::pipeline::PipelineOutput;

/// Writes a named blob somewhere durable.
#[async_trait::async_trait]
pub trait OutputStore: Send + Sync {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()>;
}

/// Stores artifacts as files below `root`, creating directories as needed.
/// Existing files are overwritten.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl OutputStore for LocalStore {
    async fn put(&self, key: &str, body: Bytes, _content_type: &str) -> Result<()> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("cannot create '{}'", parent.display()))?;
        }
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("cannot write '{}'", path.display()))?;
        debug!(path = %path.display(), bytes = body.len(), "Artifact written");
        Ok(())
    }
}

/// Uploads artifacts to an S3 bucket.
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Store {
    /// Creates a store using the ambient AWS configuration (env vars,
    /// instance profile, etc.) already loaded by `aws_config::load_from_env`.
    pub fn new(config: &aws_config::SdkConfig, bucket: &str) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(config),
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl OutputStore for S3Store {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("S3 PutObject failed for 's3://{}/{key}'", self.bucket))?;
        Ok(())
    }
}

/// Where the two artifacts of a run go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub cleaned_key: String,
    pub report_key: String,
    /// Gzip both artifacts and append `.gz` to their keys.
    pub gzip: bool,
}

impl OutputLayout {
    pub fn new(cleaned_key: &str, report_key: &str) -> Self {
        Self {
            cleaned_key: cleaned_key.to_string(),
            report_key: report_key.to_string(),
            gzip: false,
        }
    }

    pub fn gzipped(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    /// Same file names under `prefix`, e.g. `runs/2025-01-01/clean_trips.csv`.
    pub fn under_prefix(&self, prefix: &str) -> Self {
        let rebase = |key: &str| {
            let name = Path::new(key)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(key);
            let prefix = prefix.trim_end_matches('/');
            if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}/{name}")
            }
        };
        Self {
            cleaned_key: rebase(&self.cleaned_key),
            report_key: rebase(&self.report_key),
            gzip: self.gzip,
        }
    }
}

/// Writes the cleaned CSV and the outlier report to `store`.
#[tracing::instrument(skip(store, output), fields(cleaned = %layout.cleaned_key, report = %layout.report_key, gzip = layout.gzip))]
pub async fn persist<S: OutputStore + ?Sized>(
    store: &S,
    output: &PipelineOutput,
    layout: &OutputLayout,
) -> crate::error::Result<()> {
    let csv = records_to_csv(output.cleaned())
        .map_err(|e| PipelineError::persist(&layout.cleaned_key, format!("{e:#}")))?;
    put_artifact(store, &layout.cleaned_key, csv, "text/csv", layout.gzip).await?;

    let report = report_json(output)
        .map_err(|e| PipelineError::persist(&layout.report_key, format!("{e:#}")))?;
    put_artifact(store, &layout.report_key, report, "application/json", layout.gzip).await?;

    info!(rows = output.cleaned().len(), outliers = output.outliers().len(), "Artifacts persisted");
    Ok(())
}

async fn put_artifact<S: OutputStore + ?Sized>(
    store: &S,
    key: &str,
    body: Vec<u8>,
    content_type: &str,
    gzip: bool,
) -> crate::error::Result<()> {
    let (key, body, content_type) = if gzip {
        let compressed = gzip_bytes(&body).map_err(|e| PipelineError::persist(key, e))?;
        (format!("{key}.gz"), compressed, "application/gzip")
    } else {
        (key.to_string(), body, content_type)
    };

    store
        .put(&key, Bytes::from(body), content_type)
        .await
        .map_err(|e| PipelineError::persist(&key, format!("{e:#}")))
}

fn gzip_bytes(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
