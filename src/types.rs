use crate::error::Result;

/// Raw event fields as handed over by a source adapter. Adapters are
/// bespoke, disposable scrapers that live outside this crate; the core
/// only sees the field dictionaries they produce.
pub type RawEventFields = serde_json::Value;

/// Core trait every event source must implement to hand records over.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Identifier for this source, used in logs.
    fn name(&self) -> &str;

    /// Fetch all raw field dictionaries currently offered by this source.
    async fn fetch(&self) -> Result<Vec<RawEventFields>>;
}
