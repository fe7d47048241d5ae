//! Per-session analysis cache.
//!
//! One entry per session id, last write wins. With a capacity set, the least
//! recently committed session is evicted first. The active session is never
//! held here: the workspace takes its entry out on activation and commits it
//! back when another session takes over.

use std::num::NonZeroUsize;

use indexmap::IndexMap;

use datachat_types::analysis::AnalysisState;

#[derive(Debug, Clone, Default)]
pub struct AnalysisCache {
    /// Ordered from least to most recently used.
    entries: IndexMap<String, AnalysisState>,
    capacity: Option<NonZeroUsize>,
}

impl AnalysisCache {
    /// Unbounded cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache holding at most `capacity` sessions. 0 means unbounded.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            capacity: NonZeroUsize::new(capacity),
        }
    }

    /// Store `state` for `session_id`, replacing any previous entry.
    pub fn commit(&mut self, session_id: &str, state: AnalysisState) {
        self.entries.shift_remove(session_id);
        self.entries.insert(session_id.to_string(), state);
        self.evict();
    }

    /// Entry for `session_id` without touching recency.
    pub fn peek(&self, session_id: &str) -> Option<&AnalysisState> {
        self.entries.get(session_id)
    }

    /// Take the entry for `session_id` out of the cache.
    pub fn remove(&mut self, session_id: &str) -> Option<AnalysisState> {
        self.entries.shift_remove(session_id)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.entries.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict(&mut self) {
        let Some(capacity) = self.capacity else {
            return;
        };
        while self.entries.len() > capacity.get() {
            if let Some((session_id, _)) = self.entries.shift_remove_index(0) {
                tracing::debug!(%session_id, "evicted analysis cache entry");
            }
        }
    }
}
