use crate::config::NormalizeConfig;
use crate::constants::FREE_PRICE_SENTINEL;
use crate::domain::{DuplicateReason, EventRecord};
use crate::error::{AgendaError, Result};
use crate::pipeline::dates::{DateNormalizer, RawDateValue};
use crate::types::RawEventFields;
use chrono::{FixedOffset, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Strips HTML tags and doubles single quotes so the value embeds safely
/// in a SQL string literal.
pub fn sanitize_text(input: &str) -> String {
    HTML_TAG_RE.replace_all(input, "").replace('\'', "''")
}

/// Canonicalizes free-text prices. A fixed synonym set maps to the
/// "Free or unavailable" sentinel; everything else passes through
/// sanitized.
pub struct PriceNormalizer {
    free_synonyms: Vec<String>,
}

impl PriceNormalizer {
    pub fn new(config: &NormalizeConfig) -> Self {
        Self {
            free_synonyms: config.all_free_synonyms(),
        }
    }

    pub fn normalize(&self, raw: Option<&Value>) -> String {
        let text = match raw {
            None | Some(Value::Null) => return FREE_PRICE_SENTINEL.to_string(),
            Some(Value::Number(n)) => {
                if n.as_f64() == Some(0.0) {
                    return FREE_PRICE_SENTINEL.to_string();
                }
                n.to_string()
            }
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        let sanitized = sanitize_text(&text);
        let needle = sanitized.trim().to_lowercase();
        if self.free_synonyms.iter().any(|s| *s == needle) {
            FREE_PRICE_SENTINEL.to_string()
        } else {
            sanitized
        }
    }
}

/// Builds a canonical EventRecord out of a raw field dictionary.
///
/// Missing mandatory fields are the only hard failure; a date that fails
/// every parse pattern still yields a record, flagged invalid, so the
/// caller can count and discard it.
pub struct RecordBuilder {
    dates: DateNormalizer,
    prices: PriceNormalizer,
    offset: FixedOffset,
}

impl RecordBuilder {
    pub fn new(config: &NormalizeConfig, offset: FixedOffset) -> Self {
        Self {
            dates: DateNormalizer::new(offset),
            prices: PriceNormalizer::new(config),
            offset,
        }
    }

    pub fn build(&self, fields: &RawEventFields) -> Result<EventRecord> {
        let title = required_text(fields, "title")?;
        let link = required_text(fields, "link")?;
        let source = required_text(fields, "source")?;
        if fields.get("initDate").map_or(true, Value::is_null) {
            return Err(AgendaError::MissingField("initDate".to_string()));
        }

        let init_raw = RawDateValue::from_json(fields.get("initDate"));
        let end_raw = RawDateValue::from_json(fields.get("endDate"));

        let init_canonical = self.dates.normalize(&init_raw);
        let is_valid = init_canonical.is_some();
        if !is_valid {
            warn!(
                "Invalid date format for input: {} in {}",
                init_raw.raw_string(),
                link
            );
        }
        // An unparseable end date falls back to the event start.
        let end_canonical = self.dates.normalize(&end_raw).or(init_canonical);

        Ok(EventRecord {
            title: sanitize_text(&title),
            link,
            price: self.prices.normalize(fields.get("price")),
            description: sanitize_text(&optional_text(fields, "description").unwrap_or_default()),
            image: optional_text(fields, "image").unwrap_or_default(),
            source,
            init_date: init_raw.raw_string(),
            end_date: end_raw.raw_string(),
            init_date_canonical: init_canonical,
            end_date_canonical: end_canonical,
            init_date_human: init_canonical.map(|d| self.dates.humanize(&d)),
            end_date_human: end_canonical.map(|d| self.dates.humanize(&d)),
            scraped_at: Utc::now().with_timezone(&self.offset),
            location: optional_text(fields, "location"),
            categories: categories_text(fields.get("categories")),
            text_content: optional_text(fields, "textContent"),
            html_content: optional_text(fields, "htmlContent"),
            is_valid,
            is_duplicated: false,
            duplicate_reason: DuplicateReason::None,
            score: 0.0,
            local_image_path: None,
        })
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn required_text(fields: &RawEventFields, key: &str) -> Result<String> {
    match fields.get(key) {
        Some(value) if !value.is_null() => Ok(value_to_text(value)),
        _ => Err(AgendaError::MissingField(key.to_string())),
    }
}

fn optional_text(fields: &RawEventFields, key: &str) -> Option<String> {
    fields
        .get(key)
        .filter(|value| !value.is_null())
        .map(value_to_text)
}

fn categories_text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .map(value_to_text)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}
