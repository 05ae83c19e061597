use crate::constants;
use crate::error::{AgendaError, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Runtime configuration, loaded once per run from `config.toml`.
///
/// The trust-score table and every dedup threshold live here so the
/// clustering components receive them at construction time instead of
/// reaching into module state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub calendar: CalendarConfig,
    pub normalize: NormalizeConfig,
    pub dedupe: DedupeConfig,
    pub ingest: IngestConfig,
    pub images: ImagesConfig,
    pub storage: StorageConfig,
    pub trust_scores: HashMap<String, f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            calendar: CalendarConfig::default(),
            normalize: NormalizeConfig::default(),
            dedupe: DedupeConfig::default(),
            ingest: IngestConfig::default(),
            images: ImagesConfig::default(),
            storage: StorageConfig::default(),
            trust_scores: constants::default_trust_scores(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Days in the rolling display window.
    pub num_days: usize,
    /// Fixed offset applied to date inputs that carry no zone of their own.
    pub utc_offset_hours: i32,
    pub output_dir: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            num_days: 10,
            utc_offset_hours: 1,
            output_dir: "output".to_string(),
        }
    }
}

impl CalendarConfig {
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Extra price spellings that mean "free", on top of the built-ins.
    pub free_synonyms: Vec<String>,
}

impl NormalizeConfig {
    /// Built-in synonyms plus configured extras, lowercased for matching.
    pub fn all_free_synonyms(&self) -> Vec<String> {
        constants::FREE_PRICE_SYNONYMS
            .iter()
            .map(|s| s.to_string())
            .chain(self.free_synonyms.iter().map(|s| s.to_lowercase()))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupeConfig {
    /// Levenshtein distance accepted as "same event", as a fraction of the
    /// average title length. Empirically tuned, not derived.
    pub edit_distance_ratio: f64,
    /// Perceptual mismatch percentage below which two images count as the
    /// same artwork.
    pub image_mismatch_threshold: f64,
    /// Score used for sources missing from the trust table.
    pub default_trust_score: f64,
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            edit_distance_ratio: 0.2,
            image_mismatch_threshold: 75.0,
            default_trust_score: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// A link already stored fresher than this many days ago is skipped.
    pub reingest_after_days: i64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            reingest_after_days: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub cache_dir: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            cache_dir: "cache/img".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite event table. Empty selects the in-memory store.
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "agenda.sqlite3".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_content = fs::read_to_string(path).map_err(|e| {
            AgendaError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut config: Config = toml::from_str(&config_content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load the given file, or fall back to defaults when it does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_from(path)
        } else {
            info!(
                "No config file at '{}', using built-in defaults",
                path.display()
            );
            let mut config = Config::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(db_path) = std::env::var("AGENDA_DB_PATH") {
            self.storage.db_path = db_path;
        }
        if let Ok(output_dir) = std::env::var("AGENDA_OUTPUT_DIR") {
            self.calendar.output_dir = output_dir;
        }
    }
}
