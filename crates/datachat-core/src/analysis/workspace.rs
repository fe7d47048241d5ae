//! Live analysis fields plus the active session pointer.
//!
//! `AnalysisWorkspace` owns the fields a UI would render for the active
//! session and the cache holding every other session's snapshot. Switching
//! sessions takes the incoming entry out of the cache, commits the outgoing
//! live fields, and installs the incoming entry, all in one critical
//! section, so no reader sees a half-restored state. Taking the entry out
//! first means a full cache can never evict the session being activated.
//!
//! Cloning produces a shared view (backed by `Arc<Mutex<...>>`).

use std::sync::{Arc, Mutex, MutexGuard};

use datachat_types::analysis::{AnalysisState, HISTORY_CHART_TYPE};
use datachat_types::chat::Message;

use super::cache::AnalysisCache;
use crate::turn::machine::AnalysisPatch;

#[derive(Debug, Default)]
struct WorkspaceInner {
    active: Option<String>,
    live: AnalysisState,
    cache: AnalysisCache,
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisWorkspace {
    inner: Arc<Mutex<WorkspaceInner>>,
}

impl AnalysisWorkspace {
    /// Workspace whose cache holds at most `capacity` sessions (0 = unbounded).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(WorkspaceInner {
                active: None,
                live: AnalysisState::default(),
                cache: AnalysisCache::with_capacity(capacity),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WorkspaceInner> {
        self.inner.lock().expect("analysis workspace lock poisoned")
    }

    /// Make `session_id` the active session and return its restored state.
    ///
    /// Activating the already active session changes nothing.
    pub fn activate(&self, session_id: &str) -> AnalysisState {
        let mut inner = self.lock();
        if inner.active.as_deref() == Some(session_id) {
            return inner.live.clone();
        }

        let inner = &mut *inner;
        let incoming = inner.cache.remove(session_id);
        if let Some(previous) = inner.active.take() {
            let outgoing = std::mem::take(&mut inner.live);
            inner.cache.commit(&previous, outgoing);
        }
        inner.live = incoming.unwrap_or_default();
        inner.active = Some(session_id.to_string());

        tracing::debug!(
            %session_id,
            restored = !inner.live.is_default(),
            "activated session"
        );
        inner.live.clone()
    }

    /// Commit the active session and leave no session active.
    pub fn deactivate(&self) {
        let mut inner = self.lock();
        let inner = &mut *inner;
        if let Some(previous) = inner.active.take() {
            inner.cache.commit(&previous, std::mem::take(&mut inner.live));
        }
    }

    /// Forget `session_id`. If it is active, the live fields reset and no
    /// session stays active.
    pub fn clear(&self, session_id: &str) {
        let mut inner = self.lock();
        inner.cache.remove(session_id);
        if inner.active.as_deref() == Some(session_id) {
            inner.active = None;
            inner.live = AnalysisState::default();
        }
    }

    pub fn active_session(&self) -> Option<String> {
        self.lock().active.clone()
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.lock().active.as_deref() == Some(session_id)
    }

    /// Copy of the live fields.
    pub fn snapshot(&self) -> AnalysisState {
        self.lock().live.clone()
    }

    /// State of any session: live fields if active, cached entry otherwise.
    pub fn state_for(&self, session_id: &str) -> AnalysisState {
        let inner = self.lock();
        if inner.active.as_deref() == Some(session_id) {
            return inner.live.clone();
        }
        inner.cache.peek(session_id).cloned().unwrap_or_default()
    }

    /// Number of inactive sessions held in the cache.
    pub fn cached_sessions(&self) -> usize {
        self.lock().cache.len()
    }

    /// Apply a turn's write if `session_id` is still active.
    ///
    /// Returns `false` when the write was dropped.
    pub fn apply(&self, session_id: &str, patch: &AnalysisPatch) -> bool {
        let mut inner = self.lock();
        if inner.active.as_deref() != Some(session_id) {
            tracing::debug!(
                %session_id,
                active = ?inner.active,
                "dropping analysis update for inactive session"
            );
            return false;
        }

        let live = &mut inner.live;
        match patch {
            AnalysisPatch::ResetSql => live.sql.clear(),
            AnalysisPatch::Sql(sql) => live.sql = sql.clone(),
            AnalysisPatch::Result(result) => {
                live.sql_result = Some(result.clone());
                live.panel_visible = true;
            }
            AnalysisPatch::Chart { option, chart_type } => {
                live.chart_option = Some(option.clone());
                live.chart_type = chart_type.clone();
                live.panel_visible = true;
            }
        }
        true
    }

    /// Load a stored message's artifacts into the live fields.
    pub fn show_message(&self, message: &Message) -> AnalysisState {
        let mut inner = self.lock();
        inner.live = AnalysisState {
            chart_option: message.chart_option(),
            chart_type: HISTORY_CHART_TYPE.to_string(),
            sql_result: message.sql_result(),
            sql: message.sql.clone().unwrap_or_default(),
            panel_visible: true,
        };
        inner.live.clone()
    }

    pub fn set_panel_visible(&self, visible: bool) {
        self.lock().live.panel_visible = visible;
    }
}
