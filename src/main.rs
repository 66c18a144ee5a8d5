//! news-capture CLI
//!
//! Captures announcement pages with headless Chrome and extracts
//! structured records with a vision model.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use news_capture::config::api_key_from_env;
use news_capture::pipeline::to_json;
use news_capture::{
    capture, resolve_all, ChromeLauncher, Config, ListingClient, OpenAiAnalyzer, Pipeline,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt as tfmt, EnvFilter};

#[derive(Parser)]
#[command(name = "news-capture")]
#[command(author = "RoyalBit Inc.")]
#[command(version)]
#[command(about = "Capture announcement pages and extract structured records")]
#[command(long_about = "Walks a paginated announcement listing, screenshots every article in a date range with headless Chrome, and extracts title/date/text with a vision model.\n\nCommands:\n  run      Produce news_<start>_to_<end>.json for a date range\n  index    Print the date -> links index as JSON\n  capture  Save the stitched full-page screenshot of one URL")]
struct Cli {
    /// YAML configuration file (defaults are used for missing keys)
    #[arg(long, short, global = true, env = "NEWS_CAPTURE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract records for a date range and write them to a JSON file
    Run(RunArgs),
    /// Resolve listing pages and print the date index
    Index(IndexArgs),
    /// Capture one URL as a stitched PNG
    Capture(CaptureArgs),
}

#[derive(Args)]
struct RunArgs {
    /// First publication date (YYYY-MM-DD, inclusive)
    #[arg(value_parser = parse_date)]
    start_date: NaiveDate,

    /// Last publication date (YYYY-MM-DD, inclusive)
    #[arg(value_parser = parse_date)]
    end_date: NaiveDate,

    /// Folder for the output JSON file (created if missing)
    folder: PathBuf,

    /// Fetch this many listing pages instead of discovering the count
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_pages: Option<u32>,
}

#[derive(Args)]
struct IndexArgs {
    /// Fetch this many listing pages instead of discovering the count
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_pages: Option<u32>,
}

#[derive(Args)]
struct CaptureArgs {
    /// Page to capture
    url: String,

    /// Output PNG path
    output: PathBuf,

    /// Maximum number of viewport screenshots
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_scrolls: Option<u32>,
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got {:?}: {}", s, e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Run(args) => run_pipeline(&config, args).await,
        Commands::Index(args) => run_index(&config, args).await,
        Commands::Capture(args) => run_capture(&config, args).await,
    }
}

async fn run_pipeline(config: &Config, args: RunArgs) -> Result<()> {
    info!(start = %args.start_date, end = %args.end_date, "Starting news pipeline");

    let api_key = api_key_from_env()?;
    let http = reqwest::Client::new();
    let listing = ListingClient::new(http.clone(), config)?;
    let sessions = ChromeLauncher::new(config.viewport, config.navigation_timeout_ms);
    let analyzer = OpenAiAnalyzer::new(http, api_key, config.analysis.clone());

    let pipeline = Pipeline::new(config, &listing, &sessions, &analyzer);
    let json = pipeline
        .run(args.start_date, args.end_date, args.max_pages)
        .await?;

    let path = write_output(&args.folder, args.start_date, args.end_date, &json).await?;
    info!(path = %path.display(), "Output saved");
    Ok(())
}

async fn write_output(
    folder: &Path,
    start: NaiveDate,
    end: NaiveDate,
    json: &str,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(folder)
        .await
        .with_context(|| format!("Failed to create folder: {}", folder.display()))?;

    let path = folder.join(format!(
        "news_{}_to_{}.json",
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    ));
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("Failed to write file: {}", path.display()))?;
    Ok(path)
}

async fn run_index(config: &Config, args: IndexArgs) -> Result<()> {
    let listing = ListingClient::new(reqwest::Client::new(), config)?;
    let index = resolve_all(&listing, config, args.max_pages.or(config.max_pages)).await?;
    println!("{}", to_json(&index)?);
    eprintln!(
        "Done: {} links across {} dates",
        index.link_count(),
        index.date_count()
    );
    Ok(())
}

async fn run_capture(config: &Config, args: CaptureArgs) -> Result<()> {
    let sessions = ChromeLauncher::new(config.viewport, config.navigation_timeout_ms);
    let max_scrolls = args.max_scrolls.unwrap_or(config.max_scrolls);

    let composite = capture(&sessions, &args.url, max_scrolls, config.viewport).await?;
    composite
        .save(&args.output)
        .with_context(|| format!("Failed to write image: {}", args.output.display()))?;

    eprintln!(
        "Saved {}x{} screenshot to {}",
        composite.width(),
        composite.height(),
        args.output.display()
    );
    Ok(())
}
