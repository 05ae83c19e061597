use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Why a record was claimed into a duplicate cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateReason {
    #[default]
    None,
    SameTitle,
    EditDistance,
    ImageSimilarity,
}

/// Canonical event record after normalization.
///
/// Built once per scrape, persisted once (idempotent on `link`) and
/// re-read fresh on every calendar build. The clustering fields at the
/// bottom are rebuilt from scratch each run and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub title: String,
    /// Stable identity key; unique within a source.
    pub link: String,
    pub price: String,
    pub description: String,
    /// Remote image URL as scraped.
    pub image: String,
    /// Provenance tag, used for trust scoring.
    pub source: String,
    /// Raw date inputs, preserved as handed over.
    pub init_date: String,
    pub end_date: String,
    pub init_date_canonical: Option<DateTime<FixedOffset>>,
    pub end_date_canonical: Option<DateTime<FixedOffset>>,
    pub init_date_human: Option<String>,
    pub end_date_human: Option<String>,
    pub scraped_at: DateTime<FixedOffset>,
    pub location: Option<String>,
    pub categories: Option<String>,
    pub text_content: Option<String>,
    pub html_content: Option<String>,
    /// False when the init date failed every parse pattern. Invalid
    /// records never reach storage or clustering.
    pub is_valid: bool,

    // Transient clustering state.
    #[serde(default)]
    pub is_duplicated: bool,
    #[serde(default)]
    pub duplicate_reason: DuplicateReason,
    #[serde(default)]
    pub score: f64,
    #[serde(skip)]
    pub local_image_path: Option<PathBuf>,
}

impl EventRecord {
    /// Whether this record's image has already been swapped for a cached
    /// local copy in the current run.
    pub fn has_local_image(&self) -> bool {
        self.local_image_path.is_some()
    }
}

/// One calendar day of the display window with its surviving events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayBucket {
    pub index: usize,
    pub date: NaiveDate,
    /// "Today", "Tomorrow", or weekday plus day number ("Tuesday 26").
    pub label: String,
    pub events: Vec<EventRecord>,
}
