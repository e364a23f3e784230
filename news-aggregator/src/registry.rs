use crate::traits::NewsSource;
use crate::types::SourceInfo;
use std::collections::HashSet;
use std::sync::Arc;

struct RegisteredSource {
    id: String,
    source: Arc<dyn NewsSource>,
    enabled: bool,
    // Modes are selectable by id but are not part of "all sources"
    listed: bool,
}

/// Fixed mapping from source id to adapter, built once at startup.
///
/// Registration order is kept and defines what "all sources" means.
/// Acquisition modes (e.g. one half of a combined source) can also be
/// registered; they resolve like any id but are never listed.
#[derive(Default)]
pub struct SourceRegistry {
    sources: Vec<RegisteredSource>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `source` under its own id. Re-registering an id replaces the
    /// adapter in place.
    pub fn register(&mut self, source: Arc<dyn NewsSource>, enabled: bool) {
        let id = source.source_id();
        self.insert(id, source, enabled, true);
    }

    /// Register `source` under `mode`, selectable on request only.
    ///
    /// Items keep the source's own id, so a mode of `yahoo` still reports
    /// `yahoo` as the item source.
    pub fn register_mode(&mut self, mode: impl Into<String>, source: Arc<dyn NewsSource>) {
        self.insert(mode.into(), source, true, false);
    }

    fn insert(&mut self, id: String, source: Arc<dyn NewsSource>, enabled: bool, listed: bool) {
        let id = id.trim().to_lowercase();
        match self.sources.iter_mut().find(|s| s.id == id) {
            Some(existing) => {
                existing.source = source;
                existing.enabled = enabled;
                existing.listed = listed;
            }
            None => self.sources.push(RegisteredSource {
                id,
                source,
                enabled,
                listed,
            }),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn NewsSource>, enabled: bool) -> Self {
        self.register(source, enabled);
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>, source: Arc<dyn NewsSource>) -> Self {
        self.register_mode(mode, source);
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn NewsSource>> {
        self.sources.iter().find(|s| s.id == id).map(|s| s.source.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sources.iter().any(|s| s.id == id)
    }

    /// Listed source ids in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.sources.iter().filter(|s| s.listed).map(|s| s.id.clone()).collect()
    }

    /// Mode ids in registration order.
    pub fn modes(&self) -> Vec<String> {
        self.sources.iter().filter(|s| !s.listed).map(|s| s.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.iter().filter(|s| s.listed).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list_sources(&self) -> Vec<SourceInfo> {
        self.sources
            .iter()
            .filter(|s| s.listed)
            .map(|s| SourceInfo {
                id: s.id.clone(),
                name: s.source.source_name(),
                enabled: s.enabled,
            })
            .collect()
    }

    /// Keep only registered ids, in request order, without repeats.
    pub fn resolve<S: AsRef<str>>(&self, requested: &[S]) -> Vec<String> {
        let mut seen = HashSet::new();
        requested
            .iter()
            .map(|id| id.as_ref().trim().to_lowercase())
            .filter(|id| self.contains(id) && seen.insert(id.clone()))
            .collect()
    }
}
