use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use agenda_scraper::apis::json_feed::JsonFeedSource;
use agenda_scraper::config::Config;
use agenda_scraper::constants::FREE_PRICE_SENTINEL;
use agenda_scraper::images::ImageCache;
use agenda_scraper::pipeline::Pipeline;
use agenda_scraper::storage::{InMemoryStorage, Storage};
use agenda_scraper::types::SourceAdapter;

struct NullImageCache;

#[async_trait]
impl ImageCache for NullImageCache {
    async fn materialize(&self, _remote_url: &str) -> Option<PathBuf> {
        None
    }
}

/// Anchor day for every scenario. The scenarios lean on the built-in
/// trust ranking (aytoCoruna 1 .. ataquilla 5).
fn anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 11, 13).unwrap()
}

fn test_config(output_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.calendar.num_days = 5;
    config.calendar.output_dir = output_dir.path().to_string_lossy().to_string();
    config
}

fn pipeline_with(
    config: Config,
    storage: Arc<dyn Storage>,
) -> Pipeline {
    Pipeline::new(config, storage, Arc::new(NullImageCache))
}

fn feed_file(records: &serde_json::Value) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{records}").unwrap();
    file
}

async fn ingest_feed(pipeline: &Pipeline, records: serde_json::Value) {
    let file = feed_file(&records);
    let sources: Vec<Box<dyn SourceAdapter>> = vec![Box::new(JsonFeedSource::new(file.path()))];
    pipeline.ingest(sources).await.unwrap();
}

#[tokio::test]
async fn case_differing_titles_cluster_and_higher_trust_wins() -> Result<()> {
    let output = TempDir::new()?;
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let pipeline = pipeline_with(test_config(&output), storage);

    ingest_feed(
        &pipeline,
        json!([
            {
                "title": "Concierto de Rock",
                "link": "https://www.coruna.gal/e/1",
                "source": "aytoCoruna",
                "initDate": "2023-11-14 21:00",
                "price": "10"
            },
            {
                "title": "Concierto De Rock",
                "link": "https://entradas.ataquilla.com/e/1",
                "source": "ataquilla",
                "initDate": "2023-11-14 21:30",
                "price": "10"
            }
        ]),
    )
    .await;

    let (buckets, _) = pipeline.build_calendar(anchor()).await?;

    // Both land on Tomorrow; case-sensitive equality misses them but the
    // edit distance of 1 against a ~3.4 threshold claims the pair.
    let tomorrow = &buckets[1];
    assert_eq!(tomorrow.events.len(), 1);
    assert_eq!(tomorrow.events[0].source, "ataquilla");
    Ok(())
}

#[tokio::test]
async fn unparseable_dates_never_reach_storage_or_buckets() -> Result<()> {
    let output = TempDir::new()?;
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let pipeline = pipeline_with(test_config(&output), storage.clone());

    ingest_feed(
        &pipeline,
        json!([
            {
                "title": "Evento fantasma",
                "link": "https://x/ghost",
                "source": "meetup",
                "initDate": "2023-13-45"
            },
            {
                "title": "Evento real",
                "link": "https://x/real",
                "source": "meetup",
                "initDate": "2023-11-13 10:00"
            }
        ]),
    )
    .await;

    let (buckets, summary) = pipeline.build_calendar(anchor()).await?;
    assert_eq!(summary.total_events, 1);
    assert_eq!(buckets[0].events[0].link, "https://x/real");

    let start = chrono::DateTime::parse_from_rfc3339("2023-11-01T00:00:00+01:00")?;
    let end = chrono::DateTime::parse_from_rfc3339("2023-12-01T00:00:00+01:00")?;
    let stored = storage.query_range(start, end).await.unwrap();
    assert_eq!(stored.len(), 1);
    Ok(())
}

#[tokio::test]
async fn zero_price_normalizes_to_the_sentinel() -> Result<()> {
    let output = TempDir::new()?;
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let pipeline = pipeline_with(test_config(&output), storage);

    ingest_feed(
        &pipeline,
        json!([{
            "title": "Paseo guiado",
            "link": "https://x/walk",
            "source": "meetup",
            "initDate": "2023-11-13 10:00",
            "price": "0.00"
        }]),
    )
    .await;

    let (buckets, _) = pipeline.build_calendar(anchor()).await?;
    assert_eq!(buckets[0].events[0].price, FREE_PRICE_SENTINEL);
    Ok(())
}

#[tokio::test]
async fn multi_day_events_appear_in_every_spanned_bucket() -> Result<()> {
    let output = TempDir::new()?;
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let pipeline = pipeline_with(test_config(&output), storage);

    ingest_feed(
        &pipeline,
        json!([{
            "title": "Feria del libro",
            "link": "https://x/feria",
            "source": "aytoCoruna",
            "initDate": "2023-11-14",
            "endDate": "2023-11-16 22:00"
        }]),
    )
    .await;

    let (buckets, _) = pipeline.build_calendar(anchor()).await?;
    let per_day: Vec<usize> = buckets.iter().map(|b| b.events.len()).collect();
    assert_eq!(per_day, vec![0, 1, 1, 1, 0]);
    Ok(())
}

#[tokio::test]
async fn losers_are_dropped_from_output_but_stay_in_storage() -> Result<()> {
    let output = TempDir::new()?;
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let pipeline = pipeline_with(test_config(&output), storage.clone());

    // Trust scores 1, 3, 2: quincemil must survive.
    ingest_feed(
        &pipeline,
        json!([
            {
                "title": "Concerto de Miguel Ríos",
                "link": "https://www.coruna.gal/e/rios",
                "source": "aytoCoruna",
                "initDate": "2023-11-16"
            },
            {
                "title": "Concierto de Miguel Ríos",
                "link": "https://quincemil.com/e/rios",
                "source": "quincemil",
                "initDate": "2023-11-16 21:00"
            },
            {
                "title": "Concierto de Miguel Rios",
                "link": "https://meetup.com/e/rios",
                "source": "meetup",
                "initDate": "2023-11-16 21:00"
            }
        ]),
    )
    .await;

    let (buckets, _) = pipeline.build_calendar(anchor()).await?;
    let thursday = &buckets[3];
    assert_eq!(thursday.events.len(), 1);
    assert_eq!(thursday.events[0].source, "quincemil");

    // The dropped records are an output concern only.
    let start = chrono::DateTime::parse_from_rfc3339("2023-11-01T00:00:00+01:00")?;
    let end = chrono::DateTime::parse_from_rfc3339("2023-12-01T00:00:00+01:00")?;
    let stored = storage.query_range(start, end).await.unwrap();
    assert_eq!(stored.len(), 3);
    Ok(())
}

#[tokio::test]
async fn binning_twice_yields_identical_buckets() -> Result<()> {
    let output = TempDir::new()?;
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let pipeline = pipeline_with(test_config(&output), storage);

    ingest_feed(
        &pipeline,
        json!([
            {
                "title": "Concierto de Rock",
                "link": "https://x/a",
                "source": "aytoCoruna",
                "initDate": "2023-11-14 21:00"
            },
            {
                "title": "Concierto De Rock",
                "link": "https://x/b",
                "source": "ataquilla",
                "initDate": "2023-11-14 21:30"
            },
            {
                "title": "Cine al aire libre",
                "link": "https://x/c",
                "source": "meetup",
                "initDate": "2023-11-13",
                "endDate": "2023-11-15"
            }
        ]),
    )
    .await;

    let (first, _) = pipeline.build_calendar(anchor()).await?;
    let (second, _) = pipeline.build_calendar(anchor()).await?;

    let shape = |buckets: &[agenda_scraper::domain::DayBucket]| -> Vec<(String, Vec<String>)> {
        buckets
            .iter()
            .map(|b| {
                (
                    b.label.clone(),
                    b.events.iter().map(|e| e.link.clone()).collect(),
                )
            })
            .collect()
    };
    assert_eq!(shape(&first), shape(&second));
    Ok(())
}

#[tokio::test]
async fn reingesting_the_same_feed_stores_nothing_new() -> Result<()> {
    let output = TempDir::new()?;
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let pipeline = pipeline_with(test_config(&output), storage);

    let records = json!([{
        "title": "Ruta de pinchos",
        "link": "https://x/pinchos",
        "source": "meetup",
        "initDate": "2023-11-14 20:00"
    }]);

    let file = feed_file(&records);
    let first: Vec<Box<dyn SourceAdapter>> = vec![Box::new(JsonFeedSource::new(file.path()))];
    let summary = pipeline.ingest(first).await.unwrap();
    assert_eq!(summary.stored, 1);

    let again: Vec<Box<dyn SourceAdapter>> = vec![Box::new(JsonFeedSource::new(file.path()))];
    let summary = pipeline.ingest(again).await.unwrap();
    assert_eq!(summary.stored, 0);
    assert_eq!(summary.skipped_recent, 1);
    Ok(())
}

#[tokio::test]
async fn missing_mandatory_fields_are_counted_not_fatal() -> Result<()> {
    let output = TempDir::new()?;
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let pipeline = pipeline_with(test_config(&output), storage);

    let records = json!([
        {"link": "https://x/untitled", "source": "meetup", "initDate": "2023-11-14"},
        {"title": "Con título", "link": "https://x/ok", "source": "meetup", "initDate": "2023-11-14"}
    ]);

    let file = feed_file(&records);
    let sources: Vec<Box<dyn SourceAdapter>> = vec![Box::new(JsonFeedSource::new(file.path()))];
    let summary = pipeline.ingest(sources).await.unwrap();

    assert_eq!(summary.stored, 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].contains("title"));
    Ok(())
}
