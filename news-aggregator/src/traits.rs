use crate::types::{NewsItem, Result};
use async_trait::async_trait;

/// A content source the aggregator can pull news items from
/// (RSS feeds, scraped pages, etc.)
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Unique identifier for this source, e.g. `nhk`
    fn source_id(&self) -> String;

    /// Human-readable name for this source
    fn source_name(&self) -> String;

    /// Fetch up to `limit` items, best-effort relevance order.
    ///
    /// Errors are reported to the caller; a source owes no recovery.
    async fn pull(&self, limit: usize) -> Result<Vec<NewsItem>>;
}
