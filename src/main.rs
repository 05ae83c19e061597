use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::error;

use agenda_scraper::apis::json_feed::JsonFeedSource;
use agenda_scraper::config::Config;
use agenda_scraper::db::SqliteStorage;
use agenda_scraper::error::Result;
use agenda_scraper::images::{FsImageCache, ImageCache};
use agenda_scraper::logging;
use agenda_scraper::pipeline::Pipeline;
use agenda_scraper::storage::{InMemoryStorage, Storage};
use agenda_scraper::types::SourceAdapter;

#[derive(Parser)]
#[command(name = "agenda_scraper")]
#[command(about = "City agenda event aggregator and calendar builder")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest raw records handed over by scraper runs
    Ingest {
        /// Comma-separated list of JSON handoff files
        #[arg(long)]
        feeds: String,
    },
    /// Build the rolling calendar window from stored events
    Calendar {
        /// Days in the window (defaults to the configured value)
        #[arg(long)]
        days: Option<usize>,
    },
    /// Run ingest and calendar build sequentially
    Run {
        #[arg(long)]
        feeds: String,
        #[arg(long)]
        days: Option<usize>,
    },
}

fn open_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    if config.storage.db_path.is_empty() {
        Ok(Arc::new(InMemoryStorage::new()))
    } else {
        Ok(Arc::new(SqliteStorage::open(&config.storage.db_path)?))
    }
}

fn feed_sources(feeds: &str) -> Vec<Box<dyn SourceAdapter>> {
    feeds
        .split(',')
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(|path| Box::new(JsonFeedSource::new(path)) as Box<dyn SourceAdapter>)
        .collect()
}

async fn run_ingest(pipeline: &Pipeline, feeds: &str) -> Result<()> {
    let summary = pipeline.ingest(feed_sources(feeds)).await?;

    println!("\n📊 Ingest results:");
    println!("   Raw records: {}", summary.total_raw);
    println!("   Stored: {}", summary.stored);
    println!("   Already stored: {}", summary.already_stored);
    println!("   Invalid: {}", summary.skipped_invalid);
    println!("   Recently seen: {}", summary.skipped_recent);
    println!("   Errors: {}", summary.errors.len());
    if !summary.errors.is_empty() {
        println!("\n⚠️  Errors encountered:");
        for error in &summary.errors {
            println!("   - {error}");
        }
    }
    Ok(())
}

async fn run_calendar(pipeline: &Pipeline, config: &Config) -> Result<()> {
    let anchor = chrono::Utc::now()
        .with_timezone(&config.calendar.utc_offset())
        .date_naive();
    let (buckets, summary) = pipeline.build_calendar(anchor).await?;

    println!("\n📊 Calendar results:");
    println!("   Days: {}", summary.days);
    println!("   Events: {}", summary.total_events);
    println!("   Output file: {}", summary.output_file);
    for bucket in &buckets {
        println!("   {:<12} {} events", bucket.label, bucket.events.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    logging::init_logging();

    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::load_or_default(&cli.config)?;

    if let Commands::Calendar { days: Some(days) } | Commands::Run { days: Some(days), .. } =
        &cli.command
    {
        config.calendar.num_days = *days;
    }

    let storage = open_storage(&config)?;
    let images: Arc<dyn ImageCache> = Arc::new(FsImageCache::new(&config.images.cache_dir));
    let pipeline = Pipeline::new(config.clone(), storage, images);

    match cli.command {
        Commands::Ingest { feeds } => {
            println!("🔄 Running ingest...");
            run_ingest(&pipeline, &feeds).await?;
        }
        Commands::Calendar { .. } => {
            println!("📅 Building calendar...");
            run_calendar(&pipeline, &config).await?;
        }
        Commands::Run { feeds, .. } => {
            println!("🚀 Running full pipeline (ingest + calendar)...");

            println!("\n📥 Step 1: Running ingest...");
            if let Err(e) = run_ingest(&pipeline, &feeds).await {
                error!("Ingest failed: {}", e);
                println!("❌ Ingest failed: {e}");
            }

            println!("\n📅 Step 2: Building calendar...");
            run_calendar(&pipeline, &config).await?;
        }
    }
    Ok(())
}
