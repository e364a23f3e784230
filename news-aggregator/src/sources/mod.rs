pub mod combined;
pub mod page_scrape;
pub mod rss_feed;

pub use combined::CombinedSource;
pub use page_scrape::PageScrapeSource;
pub use rss_feed::RssFeedSource;
