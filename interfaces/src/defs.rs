use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single article pulled from one news source.
///
/// `url` is the identity of the item: an aggregated result never holds two
/// items with the same url.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source_id: String,
    pub source_name: String,
    pub summary: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
}

impl NewsItem {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        source_id: impl Into<String>,
        source_name: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            published_at: None,
            source_id: source_id.into(),
            source_name: source_name.into(),
            summary: None,
            image_url: None,
            category: None,
        }
    }

    pub fn published(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortField {
    #[default]
    PublishedAt,
    SourceId,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::PublishedAt => "published_at",
            SortField::SourceId => "source",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = ParseParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "published_at" => Ok(SortField::PublishedAt),
            "source" | "source_id" => Ok(SortField::SourceId),
            other => Err(ParseParamError { param: "sort_by", value: other.to_owned() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = ParseParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(ParseParamError { param: "sort_order", value: other.to_owned() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseParamError {
    pub param: &'static str,
    pub value: String,
}

impl fmt::Display for ParseParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value for {}: {:?}", self.param, self.value)
    }
}

impl std::error::Error for ParseParamError {}

/// Parameters of one aggregation request.
///
/// `sources == None` selects every registered source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsQuery {
    pub sources: Option<Vec<String>>,
    pub limit: usize,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub keyword: Option<String>,
}

impl NewsQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            sources: None,
            limit,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
            keyword: None,
        }
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    pub fn sorted_by(mut self, sort_by: SortField, sort_order: SortOrder) -> Self {
        self.sort_by = sort_by;
        self.sort_order = sort_order;
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    /// Keyword with surrounding whitespace removed, `None` when blank.
    pub fn effective_keyword(&self) -> Option<&str> {
        self.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    /// Canonical source list: trimmed, lower-cased, sorted, de-duplicated.
    pub fn normalized_sources(&self) -> Option<Vec<String>> {
        self.sources.as_ref().map(|sources| {
            let mut ids: Vec<String> = sources
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
            ids.sort();
            ids.dedup();
            ids
        })
    }

    /// Key under which the result of this query is cached.
    ///
    /// Identical effective requests always map to the same key, independent
    /// of source order, case or duplicated ids.
    pub fn cache_key(&self) -> String {
        let sources = match self.normalized_sources() {
            Some(ids) => ids.join(","),
            None => "all".to_owned(),
        };
        format!(
            "{}:{}:{}:{}:{}",
            sources,
            self.limit,
            self.sort_by,
            self.sort_order,
            self.effective_keyword().unwrap_or("")
        )
    }
}

/// Registry entry as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub id: String,
    pub name: String,
    pub enabled: bool,
}

/// Wire form of a [`NewsItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItemRecord {
    pub title: String,
    pub url: String,
    pub published_at: Option<String>,
    pub source: String,
    pub source_name: String,
    pub summary: Option<String>,
}

impl From<&NewsItem> for NewsItemRecord {
    fn from(item: &NewsItem) -> Self {
        Self {
            title: item.title.clone(),
            url: item.url.clone(),
            published_at: item.published_at.map(|t| t.to_rfc3339()),
            source: item.source_id.clone(),
            source_name: item.source_name.clone(),
            summary: item.summary.clone(),
        }
    }
}
