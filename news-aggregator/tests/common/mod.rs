#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use news_aggregator::{AggregatorError, NewsItem, NewsSource, Result, SourceRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::sync::Semaphore;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// Item whose url is `https://example.com/<slug>`.
pub fn item(slug: &str, source: &str, published: Option<i64>) -> NewsItem {
    let item = NewsItem::new(
        format!("Story {}", slug),
        format!("https://example.com/{}", slug),
        source,
        format!("{} News", source.to_uppercase()),
    );
    match published {
        Some(secs) => item.published(ts(secs)),
        None => item,
    }
}

pub fn titled(title: &str, slug: &str, source: &str) -> NewsItem {
    let mut item = item(slug, source, None);
    item.title = title.to_string();
    item
}

pub fn urls(items: &[NewsItem]) -> Vec<String> {
    items
        .iter()
        .map(|i| i.url.trim_start_matches("https://example.com/").to_string())
        .collect()
}

enum Behaviour {
    Items(Vec<NewsItem>),
    Fail(String),
    Panic,
}

/// Scripted source: fixed items or failure, optional delay and gate, call
/// counting and in-flight tracking.
pub struct MockSource {
    id: String,
    behaviour: Mutex<Behaviour>,
    delay: Mutex<Option<Duration>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    calls: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockSource {
    pub fn new(id: &str, items: Vec<NewsItem>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            behaviour: Mutex::new(Behaviour::Items(items)),
            delay: Mutex::new(None),
            gate: Mutex::new(None),
            calls: AtomicUsize::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn failing(id: &str, reason: &str) -> Arc<Self> {
        let source = Self::new(id, Vec::new());
        source.fail_with(reason);
        source
    }

    pub fn panicking(id: &str) -> Arc<Self> {
        let source = Self::new(id, Vec::new());
        source.panic_on_pull();
        source
    }

    pub fn with_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        *self.delay.lock().unwrap() = Some(delay);
        self
    }

    /// Share in-flight counters with another mock so overlap is measured
    /// across both.
    pub fn sharing_counters_with(id: &str, items: Vec<NewsItem>, other: &MockSource) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            behaviour: Mutex::new(Behaviour::Items(items)),
            delay: Mutex::new(None),
            gate: Mutex::new(None),
            calls: AtomicUsize::new(0),
            in_flight: other.in_flight.clone(),
            max_in_flight: other.max_in_flight.clone(),
        })
    }

    pub fn set_items(&self, items: Vec<NewsItem>) {
        *self.behaviour.lock().unwrap() = Behaviour::Items(items);
    }

    pub fn fail_with(&self, reason: &str) {
        *self.behaviour.lock().unwrap() = Behaviour::Fail(reason.to_string());
    }

    pub fn panic_on_pull(&self) {
        *self.behaviour.lock().unwrap() = Behaviour::Panic;
    }

    /// Block every pull until permits are added to the returned semaphore.
    pub fn close_gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NewsSource for MockSource {
    fn source_id(&self) -> String {
        self.id.clone()
    }

    fn source_name(&self) -> String {
        format!("{} News", self.id.to_uppercase())
    }

    async fn pull(&self, limit: usize) -> Result<Vec<NewsItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let outcome = match &*self.behaviour.lock().unwrap() {
            Behaviour::Items(items) => Some(Ok(items.iter().take(limit).cloned().collect())),
            Behaviour::Fail(reason) => Some(Err(AggregatorError::General(reason.clone()))),
            Behaviour::Panic => None,
        };
        match outcome {
            Some(outcome) => outcome,
            None => panic!("scripted panic from {}", self.id),
        }
    }
}

pub fn registry(sources: &[Arc<MockSource>]) -> Arc<SourceRegistry> {
    let mut registry = SourceRegistry::new();
    for source in sources {
        registry.register(source.clone(), true);
    }
    Arc::new(registry)
}
