use crate::types::{AggregatorError, FetchConfig, Result};
use reqwest::Client;
use std::time::Instant;
use tracing::{debug, info};
use url::Url;

/// Shared HTTP client used by every network-backed source.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::limited(config.max_redirects)
        } else {
            reqwest::redirect::Policy::none()
        };

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(redirect)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// GET `url` and return the body as text.
    ///
    /// Non-success statuses and bodies above the configured size are errors.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let parsed = Url::parse(url)?;
        let start_time = Instant::now();

        debug!("Fetching {}", parsed);
        let response = self.client.get(parsed).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(AggregatorError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(content_length) = response.content_length() {
            self.check_size(content_length as usize)?;
        }

        let content = response.text().await?;
        // Chunked responses carry no content length
        self.check_size(content.len())?;

        info!(
            "Fetched {} ({} bytes in {}ms)",
            url,
            content.len(),
            start_time.elapsed().as_millis()
        );
        Ok(content)
    }

    fn check_size(&self, bytes: usize) -> Result<()> {
        if bytes > self.config.max_body_bytes() {
            return Err(AggregatorError::FeedTooLarge {
                size_mb: bytes / (1024 * 1024),
            });
        }
        Ok(())
    }
}
