use crate::types::{AggregatorError, NewsItem, Result};
use chrono::{DateTime, Utc};
use feed_rs::parser;
use tracing::{debug, info};
use url::Url;

#[derive(Debug)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub entries: Vec<ParsedEntry>,
}

#[derive(Debug, Clone)]
pub struct ParsedEntry {
    pub url: String,
    pub title: String,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

impl ParsedEntry {
    pub fn into_news_item(self, source_id: &str, source_name: &str) -> NewsItem {
        NewsItem {
            title: self.title,
            url: self.url,
            published_at: self.published_at,
            source_id: source_id.to_string(),
            source_name: source_name.to_string(),
            summary: self.summary,
            image_url: self.image_url,
            category: self.category,
        }
    }
}

/// RSS / Atom parsing on top of feed-rs.
pub struct FeedParser;

impl FeedParser {
    /// Parse `content`, resolving relative entry links against `base`.
    ///
    /// Entries whose link is not an absolute http(s) URL after resolution are
    /// skipped.
    pub fn parse_feed(content: &str, base: Option<&Url>) -> Result<ParsedFeed> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content.as_bytes())
            .map_err(|e| AggregatorError::Parse(format!("Failed to parse feed: {}", e)))?;

        let title = feed.title.map(|t| t.content);
        let description = feed.description.map(|d| d.content);
        let total = feed.entries.len();
        let entries: Vec<ParsedEntry> = feed
            .entries
            .into_iter()
            .filter_map(|entry| Self::parse_entry(entry, base))
            .collect();

        if entries.len() < total {
            debug!("Skipped {} entries without title or usable link", total - entries.len());
        }
        info!("Parsed feed with {} entries", entries.len());

        Ok(ParsedFeed {
            title,
            description,
            entries,
        })
    }

    fn parse_entry(entry: feed_rs::model::Entry, base: Option<&Url>) -> Option<ParsedEntry> {
        let title = entry
            .title
            .map(|t| collapse_whitespace(&t.content))
            .filter(|t| !t.is_empty())?;
        let url = resolve_link(entry.links.first()?.href.trim(), base)?;

        let summary = entry
            .summary
            .map(|s| extract_text_from_html(&s.content))
            .filter(|s| !s.is_empty());

        // Some feeds only carry the update time
        let published_at = entry.published.or(entry.updated);

        let category = entry.categories.into_iter().next().map(|c| c.term);

        let image_url = entry
            .media
            .iter()
            .flat_map(|m| m.thumbnails.iter())
            .map(|t| t.image.uri.clone())
            .next();

        Some(ParsedEntry {
            url,
            title,
            summary,
            published_at,
            category,
            image_url,
        })
    }
}

fn resolve_link(href: &str, base: Option<&Url>) -> Option<String> {
    if href.is_empty() {
        return None;
    }
    let url = match Url::parse(href) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(href).ok()?,
        Err(_) => return None,
    };
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop markup from an HTML fragment and collapse whitespace.
pub(crate) fn extract_text_from_html(html: &str) -> String {
    let text = html
        .chars()
        .fold((String::new(), false), |(mut text, in_tag), c| match c {
            '<' => (text, true),
            '>' => {
                // Keep words on either side of a tag apart
                text.push(' ');
                (text, false)
            }
            _ if !in_tag => {
                text.push(c);
                (text, in_tag)
            }
            _ => (text, in_tag),
        })
        .0;
    collapse_whitespace(&text)
}
