use crate::traits::NewsSource;
use crate::types::{AggregatorError, NewsItem, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// One source id backed by two adapters, e.g. a site's RSS feed plus a
/// scrape of its front page.
///
/// Primary items come first; a url seen in the primary is dropped from the
/// secondary. Either half may fail on its own.
pub struct CombinedSource {
    id: String,
    name: String,
    primary: Arc<dyn NewsSource>,
    secondary: Arc<dyn NewsSource>,
}

impl CombinedSource {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        primary: Arc<dyn NewsSource>,
        secondary: Arc<dyn NewsSource>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            primary,
            secondary,
        }
    }

    fn merge(
        &self,
        primary: Vec<NewsItem>,
        secondary: Vec<NewsItem>,
        limit: usize,
    ) -> Vec<NewsItem> {
        let mut seen = HashSet::new();
        primary
            .into_iter()
            .chain(secondary)
            .filter(|item| seen.insert(item.url.clone()))
            .take(limit)
            .map(|mut item| {
                item.source_id = self.id.clone();
                item.source_name = self.name.clone();
                item
            })
            .collect()
    }
}

#[async_trait]
impl NewsSource for CombinedSource {
    fn source_id(&self) -> String {
        self.id.clone()
    }

    fn source_name(&self) -> String {
        self.name.clone()
    }

    async fn pull(&self, limit: usize) -> Result<Vec<NewsItem>> {
        let (primary, secondary) =
            futures::join!(self.primary.pull(limit), self.secondary.pull(limit));

        match (primary, secondary) {
            (Ok(p), Ok(s)) => Ok(self.merge(p, s, limit)),
            (Ok(p), Err(e)) => {
                warn!("Secondary half of {} failed: {}", self.id, e);
                Ok(self.merge(p, Vec::new(), limit))
            }
            (Err(e), Ok(s)) => {
                warn!("Primary half of {} failed: {}", self.id, e);
                Ok(self.merge(Vec::new(), s, limit))
            }
            (Err(p), Err(s)) => Err(AggregatorError::Source {
                id: self.id.clone(),
                reason: format!("primary: {}; secondary: {}", p, s),
            }),
        }
    }
}
