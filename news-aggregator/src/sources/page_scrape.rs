use crate::fetcher::Fetcher;
use crate::parser::collapse_whitespace;
use crate::traits::NewsSource;
use crate::types::{AggregatorError, NewsItem, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::info;
use url::Url;

/// Collects article links from an HTML landing page.
///
/// An anchor counts as an article when its resolved URL contains one of the
/// configured path markers. Scraped items never carry a timestamp.
pub struct PageScrapeSource {
    id: String,
    name: String,
    pub page_url: String,
    article_markers: Vec<String>,
    fetcher: Fetcher,
}

impl PageScrapeSource {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        page_url: impl Into<String>,
        article_markers: Vec<String>,
        fetcher: Fetcher,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            page_url: page_url.into(),
            article_markers,
            fetcher,
        }
    }

    pub fn extract_articles(&self, html: &str, limit: usize) -> Result<Vec<NewsItem>> {
        let base = Url::parse(&self.page_url)?;
        let selector = Selector::parse("a[href]")
            .map_err(|e| AggregatorError::Parse(format!("Invalid selector: {}", e)))?;
        let document = Html::parse_document(html);

        let mut items = Vec::new();
        let mut seen = HashSet::new();

        for anchor in document.select(&selector) {
            if items.len() >= limit {
                break;
            }
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Ok(resolved) = base.join(href.trim()) else {
                continue;
            };
            let url = resolved.to_string();
            if !self.article_markers.iter().any(|marker| url.contains(marker.as_str())) {
                continue;
            }

            let title = collapse_whitespace(&anchor.text().collect::<String>());
            if title.is_empty() || !seen.insert(url.clone()) {
                continue;
            }

            items.push(NewsItem::new(title, url, self.id.as_str(), self.name.as_str()));
        }

        Ok(items)
    }
}

#[async_trait]
impl NewsSource for PageScrapeSource {
    fn source_id(&self) -> String {
        self.id.clone()
    }

    fn source_name(&self) -> String {
        self.name.clone()
    }

    async fn pull(&self, limit: usize) -> Result<Vec<NewsItem>> {
        let html = self.fetcher.fetch_text(&self.page_url).await?;
        // Html is not Send; parse fully before returning to the executor
        let items = self.extract_articles(&html, limit)?;
        info!("Scraped {} articles from {}", items.len(), self.page_url);
        Ok(items)
    }
}
