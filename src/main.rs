use anyhow::Context;
use blobsync::types::{DEFAULT_MAX_ATTEMPTS, DEFAULT_MIN_FILE_SIZE};
use blobsync::{
    CommandConverter, Converter, NoopConverter, Session, SessionConfig, SessionOverrides,
    SyncConfig,
};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "blobsync")]
#[command(about = "Download every object under an S3 prefix and validate the batch", long_about = None)]
#[command(version)]
struct Args {
    /// Object prefix inside the bucket (e.g. "agg/historical/doc.parquet")
    prefix: String,

    /// Bucket name (defaults to $S3_BUCKET)
    #[arg(short, long)]
    bucket: Option<String>,

    /// S3-compatible endpoint (defaults to $S3_ENDPOINT, then AWS)
    #[arg(long)]
    endpoint: Option<String>,

    /// Read from a local mirror whose subdirectories are buckets
    #[arg(long, conflicts_with = "endpoint")]
    local_root: Option<PathBuf>,

    /// Destination root (default: a timestamped directory under the temp dir)
    #[arg(short, long)]
    dest: Option<PathBuf>,

    /// Number of parallel fetch workers (default: CPU count)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Attempts per batch, including the first
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    retries: u32,

    /// Pause between attempts (e.g. "1s", "500ms")
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    retry_delay: Duration,

    /// Give up on a single object after this long (e.g. "5m")
    #[arg(long, value_parser = humantime::parse_duration)]
    object_timeout: Option<Duration>,

    /// Files must be strictly larger than this many bytes
    #[arg(long, default_value_t = DEFAULT_MIN_FILE_SIZE)]
    min_size: u64,

    /// Program run on the validated batch as `<program> [args..] <input> <output>`
    #[arg(long)]
    convert: Option<PathBuf>,

    /// Extra argument passed to the convert program (repeatable)
    #[arg(long = "convert-arg", requires = "convert")]
    convert_args: Vec<String>,

    /// Print the batch report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let log_level = if args.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("blobsync={}", log_level)));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    info!("🚀 blobsync");
    info!("Prefix: {}", args.prefix);

    let mut sync = SyncConfig {
        max_attempts: args.retries,
        retry_delay: args.retry_delay,
        min_file_size: args.min_size,
        object_timeout: args.object_timeout,
        ..SyncConfig::default()
    };
    if let Some(workers) = args.workers {
        sync.workers = workers;
    }

    let overrides = SessionOverrides {
        bucket: args.bucket,
        endpoint: args.endpoint,
        local_root: args.local_root,
        destination_root: args.dest,
        ..SessionOverrides::default()
    };
    let config = SessionConfig::from_env(&args.prefix, overrides, sync)
        .context("invalid configuration")?;

    let converter: Box<dyn Converter> = match args.convert {
        Some(program) => Box::new(CommandConverter::new(
            program,
            args.convert_args,
            config.runtime_home.clone(),
        )?),
        None => Box::new(NoopConverter),
    };

    let session = Session::new(config)?;
    info!("Remote: {}", session.remote().store_uri());

    match session.download_and_convert(converter.as_ref()).await {
        Ok(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            info!(
                "✅ {} file(s) in {}",
                report.files,
                report.destination.display()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}
