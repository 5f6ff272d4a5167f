//! CLI entry point for the trip pipeline.
//!
//! Provides subcommands for running the full clean/derive/outlier pipeline
//! with persistence, and for scanning a batch without writing anything.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use trip_pipeline::{
    config::{GroupKey, PipelineConfig},
    output::{log_outliers, print_json},
    parser::load_trips,
    pipeline::Pipeline,
    store::{LocalStore, OutputLayout, S3Store, persist},
};

#[derive(Parser)]
#[command(name = "trip_pipeline")]
#[command(about = "Clean raw trip records, derive trip features and flag speed outliers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline and write the cleaned CSV and outlier report
    Process {
        /// Path or URL of a CSV, gzip-compressed CSV or zip archive
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// Where to write the cleaned, enriched trips
        #[arg(short, long, default_value = "data/processed/clean_trips.csv")]
        output: String,

        /// Where to write the JSON summary and outlier report
        #[arg(short, long, default_value = "data/processed/outlier_report.json")]
        report: String,

        #[command(flatten)]
        tunables: Tunables,

        /// Optional: S3 bucket to upload both artifacts to (e.g., "my-bucket")
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Key prefix for uploaded artifacts
        #[arg(long, default_value = "")]
        s3_prefix: String,

        /// Optional: Gzip compress artifacts before uploading to S3
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Run the pipeline and log the summary and outliers only
    Scan {
        /// Path or URL of a CSV, gzip-compressed CSV or zip archive
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        #[command(flatten)]
        tunables: Tunables,
    },
}

#[derive(Args)]
struct Tunables {
    /// JSON config file; flags below override its values
    #[arg(long)]
    config: Option<String>,

    /// Maximum expected speed in km/h (efficiency ceiling and outlier threshold)
    #[arg(long)]
    max_speed: Option<f64>,

    /// Outlier threshold in km/h, when it should differ from --max-speed
    #[arg(long)]
    outlier_threshold: Option<f64>,

    /// Idle-time grouping: "vendor" or "fleet"
    #[arg(long)]
    group_by: Option<GroupKey>,
}

impl Tunables {
    fn resolve(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(kmh) = self.max_speed {
            config = config.with_max_speed(kmh);
        }
        if let Some(kmh) = self.outlier_threshold {
            config = config.with_outlier_threshold(kmh);
        }
        if let Some(group_key) = self.group_by {
            config = config.with_group_key(group_key);
        }
        Ok(config.validate()?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/trip_pipeline.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("trip_pipeline.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            source,
            output,
            report,
            tunables,
            s3_bucket,
            s3_prefix,
            gzip,
        } => {
            let config = tunables.resolve()?;
            info!(?config, "Loading raw trips");
            let raw = load_trips(&source).await?;

            let result = Pipeline::new(config)?.run(raw);
            print_json(result.summary())?;
            log_outliers(&result);

            let layout = OutputLayout::new(&output, &report);
            persist(&LocalStore::new("."), &result, &layout).await?;
            info!(cleaned = %output, report = %report, "Local artifacts written");

            match s3_bucket {
                Some(bucket) if !bucket.is_empty() => {
                    let aws = aws_config::load_from_env().await;
                    let s3 = S3Store::new(&aws, &bucket);
                    let remote = layout.under_prefix(&s3_prefix).gzipped(gzip);
                    info!(bucket = %bucket, gzip, "Uploading artifacts to S3");
                    persist(&s3, &result, &remote).await?;
                }
                _ => info!("S3 bucket not specified, skipping upload"),
            }
        }
        Commands::Scan { source, tunables } => {
            let config = tunables.resolve()?;
            let raw = load_trips(&source).await?;

            let result = Pipeline::new(config)?.run(raw);
            print_json(result.summary())?;
            log_outliers(&result);
        }
    }

    info!("Data processing pipeline complete");
    Ok(())
}
