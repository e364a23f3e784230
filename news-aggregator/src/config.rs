use crate::cache::{CacheConfig, RefreshScope};
use crate::fetcher::Fetcher;
use crate::registry::SourceRegistry;
use crate::sources::{CombinedSource, PageScrapeSource, RssFeedSource};
use crate::traits::NewsSource;
use crate::types::{AggregatorError, FetchConfig, Result};
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use std::time::Duration;

pub const YAHOO_RSS_URL: &str = "https://news.yahoo.co.jp/rss/topics/top-picks.xml";
pub const YAHOO_SCRAPE_URL: &str = "https://news.yahoo.co.jp/";
pub const YAHOO_ARTICLE_MARKER: &str = "news.yahoo.co.jp/articles/";
pub const NHK_RSS_URL: &str = "https://www3.nhk.or.jp/rss/news/cat0.xml";
pub const GOOGLE_RSS_URL: &str = "https://news.google.com/rss?hl=ja&gl=JP&ceid=JP:ja";

/// Request-only ids selecting how Yahoo is acquired.
pub const YAHOO_RSS_MODE: &str = "rss";
pub const YAHOO_SCRAPE_MODE: &str = "scrape";
pub const YAHOO_MIXED_MODE: &str = "mixed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Process configuration, from flags or the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "news-aggregator", version, about = "Multi-source news aggregation service")]
pub struct Config {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Seconds before a cached result counts as stale
    #[arg(long, env = "CACHE_TTL_SECONDS", default_value_t = 300)]
    pub cache_ttl_seconds: u64,

    #[arg(long, env = "MAX_LIMIT", default_value_t = 50)]
    pub max_limit: usize,

    #[arg(long, env = "DEFAULT_LIMIT", default_value_t = 20)]
    pub default_limit: usize,

    #[arg(long, env = "LIMIT_PER_SOURCE", default_value_t = 15)]
    pub limit_per_source: usize,

    #[arg(
        long,
        env = "USER_AGENT",
        default_value = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36"
    )]
    pub user_agent: String,

    #[arg(long, env = "HTTP_TIMEOUT_SECONDS", default_value_t = 10)]
    pub http_timeout_seconds: u64,

    #[arg(long, env = "MAX_FEED_SIZE_MB", default_value_t = 10)]
    pub max_feed_size_mb: usize,

    /// Sources reported as enabled by /api/sources
    #[arg(long, env = "ENABLED_SOURCES", value_delimiter = ',', default_value = "yahoo,nhk,google")]
    pub enabled_sources: Vec<String>,

    /// Source used when a request names no known source
    #[arg(long, env = "DEFAULT_SOURCE", default_value = "yahoo")]
    pub default_source: String,

    /// per-key or global
    #[arg(long, env = "REFRESH_SCOPE", default_value = "per-key")]
    pub refresh_scope: RefreshScope,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.max_limit == 0 {
            return Err(AggregatorError::Config("MAX_LIMIT must be at least 1".to_string()));
        }
        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(AggregatorError::Config(format!(
                "DEFAULT_LIMIT must be within 1..={}",
                self.max_limit
            )));
        }
        if self.max_feed_size_mb == 0 {
            return Err(AggregatorError::Config("MAX_FEED_SIZE_MB must be at least 1".to_string()));
        }
        if self.limit_per_source == 0 {
            return Err(AggregatorError::Config("LIMIT_PER_SOURCE must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            user_agent: self.user_agent.clone(),
            timeout_seconds: self.http_timeout_seconds,
            max_feed_size_mb: self.max_feed_size_mb,
            ..FetchConfig::default()
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(self.cache_ttl_seconds),
            max_limit: self.max_limit,
            limit_per_source: self.limit_per_source,
            refresh_scope: self.refresh_scope,
        }
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.enabled_sources.iter().any(|s| s.trim().eq_ignore_ascii_case(id))
    }

    /// Registry with the built-in sources, in display order, plus the
    /// Yahoo acquisition modes.
    pub fn build_registry(&self, fetcher: &Fetcher) -> SourceRegistry {
        let yahoo_rss: Arc<dyn NewsSource> =
            Arc::new(RssFeedSource::new("yahoo", "Yahoo News", YAHOO_RSS_URL, fetcher.clone()));
        let yahoo_scrape: Arc<dyn NewsSource> = Arc::new(PageScrapeSource::new(
            "yahoo",
            "Yahoo News",
            YAHOO_SCRAPE_URL,
            vec![YAHOO_ARTICLE_MARKER.to_string()],
            fetcher.clone(),
        ));
        let yahoo: Arc<dyn NewsSource> = Arc::new(CombinedSource::new(
            "yahoo",
            "Yahoo News",
            yahoo_rss.clone(),
            yahoo_scrape.clone(),
        ));
        let nhk = RssFeedSource::new("nhk", "NHK News", NHK_RSS_URL, fetcher.clone());
        let google = RssFeedSource::new("google", "Google News", GOOGLE_RSS_URL, fetcher.clone());

        // Mode precedence on a request follows this registration order
        SourceRegistry::new()
            .with_source(yahoo.clone(), self.is_enabled("yahoo"))
            .with_source(Arc::new(nhk), self.is_enabled("nhk"))
            .with_source(Arc::new(google), self.is_enabled("google"))
            .with_mode(YAHOO_RSS_MODE, yahoo_rss)
            .with_mode(YAHOO_SCRAPE_MODE, yahoo_scrape)
            .with_mode(YAHOO_MIXED_MODE, yahoo)
    }
}
