//! Analysis artifacts produced by a turn: the generated SQL, its result set,
//! and the chart specification.
//!
//! `AnalysisState` is the per-session snapshot that the analysis workspace
//! commits and restores when the active session changes.

use serde::{Deserialize, Serialize};

/// Opaque, renderer-specific chart description.
///
/// Produced by the server and passed through unmodified.
pub type ChartSpec = serde_json::Value;

/// Chart type used when a session has no cached state.
pub const DEFAULT_CHART_TYPE: &str = "bar";

/// Chart type used when restoring analysis from a stored message.
pub const HISTORY_CHART_TYPE: &str = "table";

/// Tabular result of an executed query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlResult {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<serde_json::Value>,
}

impl SqlResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Live analysis fields for one conversation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisState {
    pub chart_option: Option<ChartSpec>,
    pub chart_type: String,
    pub sql_result: Option<SqlResult>,
    pub sql: String,
    pub panel_visible: bool,
}

impl Default for AnalysisState {
    fn default() -> Self {
        Self {
            chart_option: None,
            chart_type: DEFAULT_CHART_TYPE.to_string(),
            sql_result: None,
            sql: String::new(),
            panel_visible: false,
        }
    }
}

impl AnalysisState {
    /// Whether this state is indistinguishable from a fresh session.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}
