pub mod aggregator;
pub mod cache;
pub mod config;
pub mod fetcher;
pub mod parser;
pub mod registry;
pub mod server;
pub mod sources;
pub mod traits;
pub mod types;

pub use aggregator::{Aggregation, NewsAggregator, SourceOutcome};
pub use cache::{CacheConfig, CacheStatus, CachedNews, NewsCache, RefreshScope};
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use registry::SourceRegistry;
pub use sources::{CombinedSource, PageScrapeSource, RssFeedSource};
pub use traits::NewsSource;
pub use types::*;
