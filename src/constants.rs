use std::collections::HashMap;

/// Source name constants to ensure consistency across the codebase.
/// These are the provenance tags the adapters stamp on every raw record
/// and the keys of the trust-score table.

pub const AYTO_CORUNA_SOURCE: &str = "aytoCoruna";
pub const MEETUP_SOURCE: &str = "meetup";
pub const QUINCEMIL_SOURCE: &str = "quincemil";
pub const EVENTBRITE_SOURCE: &str = "eventbrite";
pub const ATAQUILLA_SOURCE: &str = "ataquilla";

/// Canonical price for events that are free or have no usable price.
pub const FREE_PRICE_SENTINEL: &str = "Free or unavailable";

/// Built-in price values that mean "free", matched case-insensitively
/// after sanitization. The config file can extend this list.
pub const FREE_PRICE_SYNONYMS: &[&str] = &[
    "",
    "0",
    "0.00",
    "free",
    "gratis",
    "gratuito",
    "gratuita",
    "de balde",
];

/// Trust ranking of the long-standing sources, used whenever config.toml
/// does not provide a `[trust_scores]` table of its own. Higher wins.
pub fn default_trust_scores() -> HashMap<String, f64> {
    HashMap::from([
        (AYTO_CORUNA_SOURCE.to_string(), 1.0),
        (MEETUP_SOURCE.to_string(), 2.0),
        (QUINCEMIL_SOURCE.to_string(), 3.0),
        (EVENTBRITE_SOURCE.to_string(), 4.0),
        (ATAQUILLA_SOURCE.to_string(), 5.0),
    ])
}
