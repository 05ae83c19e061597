use crate::domain::EventRecord;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Counts for one append batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendOutcome {
    pub inserted: usize,
    /// Records whose link was already stored.
    pub skipped: usize,
}

/// Storage port for the persistent event table.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert records, idempotent per link. Individual failures are
    /// logged and skipped; they never abort the batch.
    async fn append(&self, records: &[EventRecord]) -> Result<AppendOutcome>;

    /// All records whose canonical init date falls inside [start, end],
    /// ordered chronologically.
    async fn query_range(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<EventRecord>>;

    /// Whether the link was stored more recently than `max_age_days` ago.
    async fn recently_stored(&self, link: &str, max_age_days: i64) -> Result<bool>;
}

/// In-memory storage implementation for development/testing.
pub struct InMemoryStorage {
    events: Arc<Mutex<HashMap<String, EventRecord>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn append(&self, records: &[EventRecord]) -> Result<AppendOutcome> {
        let mut events = self.events.lock().unwrap();
        let mut outcome = AppendOutcome::default();
        for record in records {
            if events.contains_key(&record.link) {
                outcome.skipped += 1;
                continue;
            }
            events.insert(record.link.clone(), record.clone());
            outcome.inserted += 1;
            debug!("Stored event: {}", record.link);
        }
        Ok(outcome)
    }

    async fn query_range(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<EventRecord>> {
        let events = self.events.lock().unwrap();
        let mut in_range: Vec<EventRecord> = events
            .values()
            .filter(|record| {
                record
                    .init_date_canonical
                    .map(|init| init >= start && init <= end)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        in_range.sort_by_key(|record| record.init_date_canonical);
        Ok(in_range)
    }

    async fn recently_stored(&self, link: &str, max_age_days: i64) -> Result<bool> {
        let events = self.events.lock().unwrap();
        let recent = events
            .get(link)
            .map(|record| {
                let age = Utc::now().fixed_offset() - record.scraped_at;
                age.num_days() < max_age_days
            })
            .unwrap_or(false);
        Ok(recent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DuplicateReason;

    fn record(link: &str, init: &str) -> EventRecord {
        let init: DateTime<FixedOffset> = DateTime::parse_from_rfc3339(init).unwrap();
        EventRecord {
            title: "Event".to_string(),
            link: link.to_string(),
            price: "10 €".to_string(),
            description: String::new(),
            image: String::new(),
            source: "meetup".to_string(),
            init_date: String::new(),
            end_date: String::new(),
            init_date_canonical: Some(init),
            end_date_canonical: Some(init),
            init_date_human: None,
            end_date_human: None,
            scraped_at: Utc::now().fixed_offset(),
            location: None,
            categories: None,
            text_content: None,
            html_content: None,
            is_valid: true,
            is_duplicated: false,
            duplicate_reason: DuplicateReason::None,
            score: 0.0,
            local_image_path: None,
        }
    }

    #[tokio::test]
    async fn append_is_idempotent_on_link() {
        let storage = InMemoryStorage::new();
        let batch = vec![
            record("a", "2023-11-16T21:00:00+01:00"),
            record("a", "2023-11-16T21:00:00+01:00"),
            record("b", "2023-11-17T21:00:00+01:00"),
        ];
        let outcome = storage.append(&batch).await.unwrap();
        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.skipped, 1);

        let outcome = storage.append(&batch).await.unwrap();
        assert_eq!(outcome.inserted, 0);
        assert_eq!(outcome.skipped, 3);
    }

    #[tokio::test]
    async fn query_range_filters_and_sorts_by_init_date() {
        let storage = InMemoryStorage::new();
        storage
            .append(&[
                record("late", "2023-11-18T10:00:00+01:00"),
                record("early", "2023-11-16T10:00:00+01:00"),
                record("outside", "2023-12-24T10:00:00+01:00"),
            ])
            .await
            .unwrap();

        let start = DateTime::parse_from_rfc3339("2023-11-15T00:00:00+01:00").unwrap();
        let end = DateTime::parse_from_rfc3339("2023-11-20T00:00:00+01:00").unwrap();
        let found = storage.query_range(start, end).await.unwrap();
        let links: Vec<&str> = found.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(links, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn recently_stored_respects_the_age_window() {
        let storage = InMemoryStorage::new();
        storage
            .append(&[record("fresh", "2023-11-16T21:00:00+01:00")])
            .await
            .unwrap();

        assert!(storage.recently_stored("fresh", 5).await.unwrap());
        assert!(!storage.recently_stored("fresh", 0).await.unwrap());
        assert!(!storage.recently_stored("unknown", 5).await.unwrap());
    }
}
