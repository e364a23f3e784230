use crate::fetcher::Fetcher;
use crate::parser::FeedParser;
use crate::traits::NewsSource;
use crate::types::{NewsItem, Result};
use async_trait::async_trait;
use tracing::info;
use url::Url;

/// Generic RSS / Atom feed source
pub struct RssFeedSource {
    id: String,
    name: String,
    pub url: String,
    fetcher: Fetcher,
}

impl RssFeedSource {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        fetcher: Fetcher,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            fetcher,
        }
    }

    /// Convert feed content into at most `limit` items, feed order preserved.
    pub fn items_from_feed(&self, content: &str, limit: usize) -> Result<Vec<NewsItem>> {
        let base = Url::parse(&self.url).ok();
        let parsed = FeedParser::parse_feed(content, base.as_ref())?;
        Ok(parsed
            .entries
            .into_iter()
            .take(limit)
            .map(|entry| entry.into_news_item(&self.id, &self.name))
            .collect())
    }
}

#[async_trait]
impl NewsSource for RssFeedSource {
    fn source_id(&self) -> String {
        self.id.clone()
    }

    fn source_name(&self) -> String {
        self.name.clone()
    }

    async fn pull(&self, limit: usize) -> Result<Vec<NewsItem>> {
        let content = self.fetcher.fetch_text(&self.url).await?;
        let items = self.items_from_feed(&content, limit)?;
        info!("Pulled {} items from RSS feed {}", items.len(), self.url);
        Ok(items)
    }
}
