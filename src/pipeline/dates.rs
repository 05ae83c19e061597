use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// A raw date value as found in a source field dictionary.
#[derive(Debug, Clone, PartialEq)]
pub enum RawDateValue {
    /// Unix epoch milliseconds.
    Millis(i64),
    Text(String),
    Missing,
}

impl RawDateValue {
    pub fn from_json(value: Option<&serde_json::Value>) -> Self {
        match value {
            Some(serde_json::Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(RawDateValue::Millis)
                .unwrap_or(RawDateValue::Missing),
            Some(serde_json::Value::String(s)) => RawDateValue::Text(s.clone()),
            _ => RawDateValue::Missing,
        }
    }

    /// Raw textual form, preserved verbatim on the record.
    pub fn raw_string(&self) -> String {
        match self {
            RawDateValue::Millis(ms) => ms.to_string(),
            RawDateValue::Text(s) => s.clone(),
            RawDateValue::Missing => String::new(),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, RawDateValue::Missing)
    }
}

#[derive(Debug, Clone, Copy)]
enum PatternKind {
    DateOnly,
    Naive,
    WithOffset,
}

/// Supported string formats, tried in this order. Some patterns are
/// ambiguous subsets of others, so order matters.
const FORMAT_PATTERNS: &[(&str, PatternKind)] = &[
    ("%Y-%m-%d", PatternKind::DateOnly),
    ("%Y-%m-%d %H:%M:%S", PatternKind::Naive),
    ("%Y-%m-%d %H:%M", PatternKind::Naive),
    ("%d/%m/%Y", PatternKind::DateOnly),
    ("%d/%m/%Y %H:%M:%S", PatternKind::Naive),
    ("%d/%m/%Y %H:%M", PatternKind::Naive),
    // timestamptz format
    ("%Y-%m-%dT%H:%M:%S%.3f%:z", PatternKind::WithOffset),
    // Fractional seconds without zone, as sent by the municipal feed
    ("%Y-%m-%d %H:%M:%S%.f", PatternKind::Naive),
    // Offset but no seconds, as sent by meetup
    ("%Y-%m-%dT%H:%M%:z", PatternKind::WithOffset),
];

/// Converts any supported date representation to a canonical timestamp
/// with an explicit offset. Returns None for unparseable or semantically
/// invalid input; the caller marks the owning record invalid.
pub struct DateNormalizer {
    offset: FixedOffset,
}

impl DateNormalizer {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn normalize(&self, raw: &RawDateValue) -> Option<DateTime<FixedOffset>> {
        match raw {
            RawDateValue::Millis(ms) => Utc
                .timestamp_millis_opt(*ms)
                .single()
                .map(|dt| dt.with_timezone(&self.offset)),
            RawDateValue::Text(text) => self.parse_text(text.trim()),
            RawDateValue::Missing => None,
        }
    }

    fn parse_text(&self, text: &str) -> Option<DateTime<FixedOffset>> {
        for (pattern, kind) in FORMAT_PATTERNS {
            let parsed = match kind {
                PatternKind::DateOnly => NaiveDate::parse_from_str(text, pattern)
                    .ok()
                    .map(|d| self.attach_offset(d.and_time(NaiveTime::MIN))),
                PatternKind::Naive => NaiveDateTime::parse_from_str(text, pattern)
                    .ok()
                    .map(|dt| self.attach_offset(dt)),
                PatternKind::WithOffset => DateTime::parse_from_str(text, pattern).ok(),
            };
            if parsed.is_some() {
                return parsed;
            }
        }
        None
    }

    fn attach_offset(&self, naive: NaiveDateTime) -> DateTime<FixedOffset> {
        DateTime::from_naive_utc_and_offset(naive - self.offset, self.offset)
    }

    /// Locale-formatted weekday/day/hour string, e.g. "Thursday, 16, 21:00".
    pub fn humanize(&self, date: &DateTime<FixedOffset>) -> String {
        date.format("%A, %d, %H:%M").to_string()
    }
}

/// Start of the given calendar day in the given offset.
pub fn day_start(date: NaiveDate, offset: FixedOffset) -> DateTime<FixedOffset> {
    DateTime::from_naive_utc_and_offset(date.and_time(NaiveTime::MIN) - offset, offset)
}
