use crate::registry::SourceRegistry;
use crate::types::{AggregatorError, NewsItem, NewsQuery, SortField, SortOrder};
use futures::future::join_all;
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of one source's fetch within a fan-out round.
#[derive(Debug)]
pub enum SourceOutcome {
    Fetched(Vec<NewsItem>),
    Failed(AggregatorError),
}

/// Items produced by one aggregation round, plus which sources failed.
#[derive(Debug, Default)]
pub struct Aggregation {
    pub items: Vec<NewsItem>,
    pub attempted: usize,
    pub failed_sources: Vec<String>,
}

impl Aggregation {
    /// True when at least one source was asked and none answered.
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failed_sources.len() == self.attempted
    }
}

/// Fans fetches out to registered sources and combines the results.
#[derive(Clone)]
pub struct NewsAggregator {
    registry: Arc<SourceRegistry>,
}

impl NewsAggregator {
    pub fn new(registry: Arc<SourceRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Fetch from every listed source concurrently.
    ///
    /// Items are concatenated in the order the ids were given, never in
    /// completion order, so first-seen dedup priority follows the request.
    /// A failing source contributes nothing and does not affect the others.
    pub async fn fetch_from_sources<S: AsRef<str>>(
        &self,
        source_ids: &[S],
        limit_per_source: usize,
    ) -> Vec<NewsItem> {
        self.collect(source_ids, limit_per_source).await.items
    }

    /// Like [`fetch_from_sources`](Self::fetch_from_sources) but keeps track
    /// of failed sources.
    pub async fn collect<S: AsRef<str>>(
        &self,
        source_ids: &[S],
        limit_per_source: usize,
    ) -> Aggregation {
        let limit_per_source = limit_per_source.max(1);

        let mut ids = Vec::with_capacity(source_ids.len());
        let mut tasks = Vec::with_capacity(source_ids.len());
        for id in source_ids {
            let id = id.as_ref();
            let Some(source) = self.registry.get(id) else {
                debug!("No source registered for id {}, skipping", id);
                continue;
            };
            ids.push(id.to_string());
            tasks.push(async move {
                // A panicking adapter is a failure like any other
                match AssertUnwindSafe(source.pull(limit_per_source)).catch_unwind().await {
                    Ok(Ok(items)) => SourceOutcome::Fetched(items),
                    Ok(Err(e)) => SourceOutcome::Failed(e),
                    Err(_) => {
                        let panicked = AggregatorError::General("source panicked".to_string());
                        SourceOutcome::Failed(panicked)
                    }
                }
            });
        }

        // join_all yields outputs in input order
        let outcomes = join_all(tasks).await;

        let mut aggregation = Aggregation {
            attempted: ids.len(),
            ..Default::default()
        };
        for (id, outcome) in ids.into_iter().zip(outcomes) {
            match outcome {
                SourceOutcome::Fetched(items) => {
                    debug!("Source {} returned {} items", id, items.len());
                    aggregation.items.extend(items);
                }
                SourceOutcome::Failed(e) => {
                    warn!(source = %id, error = %e, "Error fetching from source");
                    aggregation.failed_sources.push(id);
                }
            }
        }
        aggregation
    }

    /// Remove url duplicates (first occurrence wins), stable-sort, truncate.
    ///
    /// Items without a timestamp count as the oldest possible value: last in
    /// `desc` order, first in `asc` order.
    pub fn merge_and_sort(
        items: Vec<NewsItem>,
        limit: Option<usize>,
        sort_by: SortField,
        sort_order: SortOrder,
    ) -> Vec<NewsItem> {
        let mut seen_urls = HashSet::new();
        let mut unique: Vec<NewsItem> = items
            .into_iter()
            .filter(|item| seen_urls.insert(item.url.clone()))
            .collect();

        // Vec::sort_by is stable, ties keep their input order
        match sort_by {
            SortField::SourceId => {
                unique.sort_by(|a, b| sort_order.apply(a.source_id.cmp(&b.source_id)))
            }
            // Option orders None before any Some
            SortField::PublishedAt => {
                unique.sort_by(|a, b| sort_order.apply(a.published_at.cmp(&b.published_at)))
            }
        }

        if let Some(limit) = limit {
            unique.truncate(limit);
        }
        unique
    }

    /// Case-insensitive substring match on the title. A blank keyword keeps
    /// everything.
    pub fn filter_by_keyword(items: Vec<NewsItem>, keyword: Option<&str>) -> Vec<NewsItem> {
        let Some(keyword) = keyword.map(str::trim).filter(|k| !k.is_empty()) else {
            return items;
        };
        let keyword = keyword.to_lowercase();
        items
            .into_iter()
            .filter(|item| item.title.to_lowercase().contains(&keyword))
            .collect()
    }

    /// fetch -> keyword filter -> dedup/sort/limit, keeping the failure report.
    pub async fn aggregate(&self, query: &NewsQuery, limit_per_source: usize) -> Aggregation {
        // Same id normalization as the cache key, but request order is kept
        let source_ids = match &query.sources {
            Some(ids) => {
                let mut seen = HashSet::new();
                ids.iter()
                    .map(|id| id.trim().to_lowercase())
                    .filter(|id| !id.is_empty() && seen.insert(id.clone()))
                    .collect()
            }
            None => self.registry.ids(),
        };

        let mut aggregation = self.collect(&source_ids, limit_per_source).await;
        let fetched = aggregation.items.len();

        let fetched_items = std::mem::take(&mut aggregation.items);
        let filtered = Self::filter_by_keyword(fetched_items, query.effective_keyword());
        aggregation.items =
            Self::merge_and_sort(filtered, Some(query.limit), query.sort_by, query.sort_order);

        info!(
            "Aggregated {} items ({} fetched) from {} sources, {} failed",
            aggregation.items.len(),
            fetched,
            aggregation.attempted,
            aggregation.failed_sources.len()
        );
        aggregation
    }

    /// Top-level pipeline. No side effects beyond the source fetches.
    pub async fn fetch_and_aggregate(
        &self,
        query: &NewsQuery,
        limit_per_source: usize,
    ) -> Vec<NewsItem> {
        self.aggregate(query, limit_per_source).await.items
    }
}

trait ApplyOrder {
    fn apply(self, ordering: std::cmp::Ordering) -> std::cmp::Ordering;
}

impl ApplyOrder for SortOrder {
    fn apply(self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}
