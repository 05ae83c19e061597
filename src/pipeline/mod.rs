pub mod binning;
pub mod dates;
pub mod dedupe;
pub mod image_diff;
pub mod normalize;
pub mod similarity;

use crate::config::Config;
use crate::domain::DayBucket;
use crate::error::Result;
use crate::images::ImageCache;
use crate::pipeline::binning::DayBinner;
use crate::pipeline::dates::day_start;
use crate::pipeline::dedupe::DuplicateClusterer;
use crate::pipeline::normalize::RecordBuilder;
use crate::storage::Storage;
use crate::types::SourceAdapter;
use chrono::{Days, NaiveDate, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Result of one ingest run across all sources.
#[derive(Debug, Default, Serialize)]
pub struct IngestSummary {
    pub total_raw: usize,
    pub stored: usize,
    pub already_stored: usize,
    pub skipped_invalid: usize,
    pub skipped_recent: usize,
    pub errors: Vec<String>,
}

/// Result of one calendar build.
#[derive(Debug, Serialize)]
pub struct CalendarSummary {
    pub days: usize,
    pub total_events: usize,
    pub output_file: String,
}

/// Orchestrates the two halves of the batch: ingesting raw records into
/// storage, and building the rolling calendar window out of it.
pub struct Pipeline {
    config: Config,
    storage: Arc<dyn Storage>,
    images: Arc<dyn ImageCache>,
    builder: RecordBuilder,
}

impl Pipeline {
    pub fn new(config: Config, storage: Arc<dyn Storage>, images: Arc<dyn ImageCache>) -> Self {
        let builder = RecordBuilder::new(&config.normalize, config.calendar.utc_offset());
        Self {
            config,
            storage,
            images,
            builder,
        }
    }

    /// Normalize and persist everything the given sources hand over.
    /// Per-record failures are counted, never fatal to the batch.
    #[instrument(skip(self, sources))]
    pub async fn ingest(&self, sources: Vec<Box<dyn SourceAdapter>>) -> Result<IngestSummary> {
        info!("🚀 Starting ingest for {} sources", sources.len());
        counter!("agenda_ingest_runs_total").increment(1);
        let t_run = std::time::Instant::now();

        let mut summary = IngestSummary::default();

        for source in sources {
            info!("📡 Fetching raw records from {}...", source.name());
            let raw_records = match source.fetch().await {
                Ok(records) => records,
                Err(e) => {
                    error!("Source {} failed: {}", source.name(), e);
                    summary.errors.push(format!("{}: {}", source.name(), e));
                    continue;
                }
            };
            summary.total_raw += raw_records.len();
            histogram!("agenda_raw_records_per_source").record(raw_records.len() as f64);

            let mut batch = Vec::new();
            for (i, raw) in raw_records.iter().enumerate() {
                match self.builder.build(raw) {
                    Err(e) => {
                        warn!("Discarding record {} from {}: {}", i, source.name(), e);
                        summary
                            .errors
                            .push(format!("{} record {}: {}", source.name(), i, e));
                    }
                    Ok(record) if !record.is_valid => {
                        debug!("Discarding invalid record: {}", record.link);
                        summary.skipped_invalid += 1;
                    }
                    Ok(record) => {
                        let fresh = self
                            .storage
                            .recently_stored(&record.link, self.config.ingest.reingest_after_days)
                            .await?;
                        if fresh {
                            debug!("Link already stored recently, skipping: {}", record.link);
                            summary.skipped_recent += 1;
                        } else {
                            batch.push(record);
                        }
                    }
                }
            }

            let outcome = self.storage.append(&batch).await?;
            summary.stored += outcome.inserted;
            summary.already_stored += outcome.skipped;
        }

        counter!("agenda_records_stored_total").increment(summary.stored as u64);
        counter!("agenda_records_invalid_total").increment(summary.skipped_invalid as u64);
        histogram!("agenda_ingest_duration_seconds").record(t_run.elapsed().as_secs_f64());

        info!(
            "✅ Stored {} of {} raw records ({} invalid, {} recent, {} errors)",
            summary.stored,
            summary.total_raw,
            summary.skipped_invalid,
            summary.skipped_recent,
            summary.errors.len()
        );
        Ok(summary)
    }

    /// Build the rolling window anchored at `anchor`: query the stored
    /// events around it, bin them per day, dedupe per bucket, and write
    /// the payload JSON.
    #[instrument(skip(self))]
    pub async fn build_calendar(
        &self,
        anchor: NaiveDate,
    ) -> Result<(Vec<DayBucket>, CalendarSummary)> {
        let num_days = self.config.calendar.num_days;
        let offset = self.config.calendar.utc_offset();
        info!("📅 Building a {}-day calendar from {}", num_days, anchor);
        counter!("agenda_calendar_builds_total").increment(1);
        let t_run = std::time::Instant::now();

        // Query both directions so multi-day events that started before
        // the anchor still land in the forward window.
        let window = Days::new(num_days as u64);
        let start = day_start(anchor - window, offset);
        let end = day_start(anchor + window, offset);
        let records = self.storage.query_range(start, end).await?;
        info!(
            "📦 {} stored events in the ±{}-day query window",
            records.len(),
            num_days
        );

        let clusterer =
            DuplicateClusterer::new(self.config.dedupe.clone(), self.config.trust_scores.clone());
        let binner = DayBinner::new(clusterer, offset);
        let buckets = binner
            .bin(&records, num_days, anchor, self.images.as_ref())
            .await;

        let total_events: usize = buckets.iter().map(|bucket| bucket.events.len()).sum();
        histogram!("agenda_calendar_duration_seconds").record(t_run.elapsed().as_secs_f64());

        let output_file = self.persist_payload(&buckets)?;
        info!(
            "💾 Saved {} events across {} days to {}",
            total_events, num_days, output_file
        );

        Ok((
            buckets,
            CalendarSummary {
                days: num_days,
                total_events,
                output_file,
            },
        ))
    }

    /// Persist the day buckets to a timestamped JSON file.
    fn persist_payload(&self, buckets: &[DayBucket]) -> Result<String> {
        let output_dir = &self.config.calendar.output_dir;
        fs::create_dir_all(output_dir)?;

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let filename = format!("calendar_{timestamp}.json");
        let filepath = Path::new(output_dir).join(&filename);

        let json_content = serde_json::to_string_pretty(buckets)?;
        fs::write(&filepath, json_content)?;

        Ok(filepath.to_string_lossy().to_string())
    }
}
