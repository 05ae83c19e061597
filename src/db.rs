use crate::domain::{DuplicateReason, EventRecord};
use crate::error::Result;
use crate::storage::{AppendOutcome, Storage};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS events (
    link             TEXT PRIMARY KEY,
    title            TEXT NOT NULL,
    price            TEXT NOT NULL,
    description      TEXT NOT NULL,
    image            TEXT NOT NULL,
    source           TEXT NOT NULL,
    init_date        TEXT NOT NULL,
    end_date         TEXT NOT NULL,
    init_canonical   TEXT NOT NULL,
    end_canonical    TEXT NOT NULL,
    init_epoch       INTEGER NOT NULL,
    init_human       TEXT,
    end_human        TEXT,
    scraped_at       TEXT NOT NULL,
    location         TEXT,
    categories       TEXT,
    text_content     TEXT,
    html_content     TEXT
);
CREATE INDEX IF NOT EXISTS idx_events_init_epoch ON events(init_epoch);
";

/// SQLite-backed event table. Only valid records are ever written, so
/// every stored row carries canonical dates.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<EventRecord> {
        let init_canonical: String = row.get("init_canonical")?;
        let end_canonical: String = row.get("end_canonical")?;
        let scraped_at: String = row.get("scraped_at")?;

        let parse = |text: &str| {
            DateTime::parse_from_rfc3339(text).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
        };

        Ok(EventRecord {
            title: row.get("title")?,
            link: row.get("link")?,
            price: row.get("price")?,
            description: row.get("description")?,
            image: row.get("image")?,
            source: row.get("source")?,
            init_date: row.get("init_date")?,
            end_date: row.get("end_date")?,
            init_date_canonical: Some(parse(&init_canonical)?),
            end_date_canonical: Some(parse(&end_canonical)?),
            init_date_human: row.get("init_human")?,
            end_date_human: row.get("end_human")?,
            scraped_at: parse(&scraped_at)?,
            location: row.get("location")?,
            categories: row.get("categories")?,
            text_content: row.get("text_content")?,
            html_content: row.get("html_content")?,
            is_valid: true,
            is_duplicated: false,
            duplicate_reason: DuplicateReason::None,
            score: 0.0,
            local_image_path: None,
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn append(&self, records: &[EventRecord]) -> Result<AppendOutcome> {
        let conn = self.conn.lock().unwrap();
        let mut outcome = AppendOutcome::default();

        for record in records {
            let (Some(init), Some(end)) =
                (record.init_date_canonical, record.end_date_canonical)
            else {
                warn!("Refusing to store record without canonical dates: {}", record.link);
                outcome.skipped += 1;
                continue;
            };

            let inserted = conn.execute(
                "INSERT OR IGNORE INTO events (
                    link, title, price, description, image, source,
                    init_date, end_date, init_canonical, end_canonical,
                    init_epoch, init_human, end_human, scraped_at,
                    location, categories, text_content, html_content
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                params![
                    record.link,
                    record.title,
                    record.price,
                    record.description,
                    record.image,
                    record.source,
                    record.init_date,
                    record.end_date,
                    init.to_rfc3339(),
                    end.to_rfc3339(),
                    init.timestamp(),
                    record.init_date_human,
                    record.end_date_human,
                    record.scraped_at.to_rfc3339(),
                    record.location,
                    record.categories,
                    record.text_content,
                    record.html_content,
                ],
            );

            match inserted {
                Ok(0) => outcome.skipped += 1,
                Ok(_) => {
                    outcome.inserted += 1;
                    debug!("Stored event: {}", record.link);
                }
                Err(e) => {
                    warn!("Failed to store event {}: {}", record.link, e);
                    outcome.skipped += 1;
                }
            }
        }

        Ok(outcome)
    }

    async fn query_range(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<EventRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM events
             WHERE init_epoch >= ?1 AND init_epoch <= ?2
             ORDER BY init_epoch",
        )?;

        let rows = stmt.query_map(params![start.timestamp(), end.timestamp()], |row| {
            Self::row_to_record(row)
        })?;

        let mut records = Vec::new();
        for row in rows {
            match row {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable event row: {}", e),
            }
        }
        Ok(records)
    }

    async fn recently_stored(&self, link: &str, max_age_days: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let scraped_at: Option<String> = conn
            .query_row(
                "SELECT scraped_at FROM events WHERE link = ?1",
                params![link],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        let Some(scraped_at) = scraped_at else {
            return Ok(false);
        };
        match DateTime::parse_from_rfc3339(&scraped_at) {
            Ok(when) => Ok((Utc::now().fixed_offset() - when).num_days() < max_age_days),
            Err(e) => {
                warn!("Unparseable scraped_at for {}: {}", link, e);
                Ok(false)
            }
        }
    }
}
