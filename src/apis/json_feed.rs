use crate::error::Result;
use crate::types::{RawEventFields, SourceAdapter};
use std::path::PathBuf;
use tracing::info;

/// Source adapter over a JSON handoff file: an array of raw field
/// dictionaries dumped by an external scraper run. Each dictionary
/// carries its own `source` tag, so one file may mix sources.
pub struct JsonFeedSource {
    name: String,
    path: PathBuf,
}

impl JsonFeedSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("json_feed")
            .to_string();
        Self { name, path }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for JsonFeedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<RawEventFields>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let records: Vec<RawEventFields> = serde_json::from_str(&content)?;
        info!(
            "Read {} raw records from {}",
            records.len(),
            self.path.display()
        );
        Ok(records)
    }
}
