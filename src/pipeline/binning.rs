use crate::domain::{DayBucket, EventRecord};
use crate::images::ImageCache;
use crate::pipeline::dates::day_start;
use crate::pipeline::dedupe::DuplicateClusterer;
use chrono::{Datelike, Days, FixedOffset, NaiveDate};
use std::collections::HashSet;
use tracing::debug;

/// Assigns records to one bucket per calendar day of the display window
/// and reduces each bucket to its surviving events.
pub struct DayBinner {
    clusterer: DuplicateClusterer,
    offset: FixedOffset,
}

impl DayBinner {
    pub fn new(clusterer: DuplicateClusterer, offset: FixedOffset) -> Self {
        Self { clusterer, offset }
    }

    /// Full binning pass: overlap assignment, image materialization,
    /// then per-bucket clustering. Clustering never crosses buckets.
    pub async fn bin(
        &self,
        records: &[EventRecord],
        num_days: usize,
        anchor: NaiveDate,
        images: &dyn ImageCache,
    ) -> Vec<DayBucket> {
        let mut buckets = self.assign(records, num_days, anchor);
        self.materialize_images(&mut buckets, images).await;
        for bucket in buckets.iter_mut() {
            let events = std::mem::take(&mut bucket.events);
            bucket.events = self.clusterer.cluster(events);
        }
        buckets
    }

    /// Pure day-overlap assignment, no I/O. A record lands in every day
    /// bucket whose day it overlaps: its end date is not before the start
    /// of the day and its start date is not after the end of the day.
    pub fn assign(
        &self,
        records: &[EventRecord],
        num_days: usize,
        anchor: NaiveDate,
    ) -> Vec<DayBucket> {
        let mut buckets = generate_buckets(num_days, anchor);

        for bucket in buckets.iter_mut() {
            let bucket_start = day_start(bucket.date, self.offset);
            let bucket_end = day_start(bucket.date + Days::new(1), self.offset);
            let mut seen: HashSet<&str> = HashSet::new();

            for record in records {
                if !record.is_valid {
                    continue;
                }
                let (Some(init), Some(end)) =
                    (record.init_date_canonical, record.end_date_canonical)
                else {
                    continue;
                };
                if end >= bucket_start && init < bucket_end && seen.insert(record.link.as_str()) {
                    bucket.events.push(record.clone());
                }
            }
        }

        buckets
    }

    /// Fetch each record's remote image through the cache and attach the
    /// local handle. The cache is keyed by URL, so the same artwork
    /// appearing in several buckets is downloaded once.
    async fn materialize_images(&self, buckets: &mut [DayBucket], images: &dyn ImageCache) {
        for bucket in buckets.iter_mut() {
            for event in bucket.events.iter_mut() {
                if event.image.is_empty() || event.has_local_image() {
                    continue;
                }
                match images.materialize(&event.image).await {
                    Some(path) => event.local_image_path = Some(path),
                    None => debug!("Image not materialized for {}", event.link),
                }
            }
        }
    }
}

fn generate_buckets(num_days: usize, anchor: NaiveDate) -> Vec<DayBucket> {
    (0..num_days)
        .map(|index| {
            let date = anchor + Days::new(index as u64);
            let label = match index {
                0 => "Today".to_string(),
                1 => "Tomorrow".to_string(),
                _ => format!("{} {}", date.format("%A"), date.day()),
            };
            DayBucket {
                index,
                date,
                label,
                events: Vec::new(),
            }
        })
        .collect()
}
