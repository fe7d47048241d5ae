//! In-memory [`MessageStore`] backed by `DashMap`.
//!
//! Used for offline replays and tests. Messages live only as long as the
//! store; ids are UUID v7 so they sort by creation time.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use datachat_core::repository::message::MessageStore;
use datachat_types::chat::{Message, NewMessage};
use datachat_types::error::RepositoryError;

/// Thread-safe message store keyed by session id.
///
/// Cloning produces a shared view (backed by `Arc<DashMap<...>>`).
#[derive(Debug, Clone, Default)]
pub struct InMemoryMessageStore {
    sessions: Arc<DashMap<String, Vec<Message>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored messages across sessions.
    pub fn len(&self) -> usize {
        self.sessions.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MessageStore for InMemoryMessageStore {
    async fn create_message(&self, message: &NewMessage) -> Result<Message, RepositoryError> {
        let stored = Message {
            id: Uuid::now_v7().to_string(),
            session_id: message.session_id.clone(),
            role: message.role,
            content: message.content.clone(),
            sql: message.sql.clone(),
            chart_cfg: message.chart_cfg.clone(),
            thinking: message.thinking.clone(),
            data: message.data.clone(),
            created_at: Utc::now().to_rfc3339(),
        };
        self.sessions
            .entry(message.session_id.clone())
            .or_default()
            .push(stored.clone());
        tracing::debug!(session_id = %stored.session_id, message_id = %stored.id, "stored message in memory");
        Ok(stored)
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>, RepositoryError> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|messages| messages.value().clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datachat_types::chat::MessageRole;

    fn new_message(session_id: &str, content: &str) -> NewMessage {
        NewMessage {
            session_id: session_id.to_string(),
            role: MessageRole::Assistant,
            content: content.to_string(),
            sql: Some("SELECT 1".to_string()),
            chart_cfg: None,
            thinking: None,
            data: Some(r#"{"columns":["x"],"rows":[{"x":1}]}"#.to_string()),
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_timestamp() {
        let store = InMemoryMessageStore::new();
        let stored = store.create_message(&new_message("s1", "hi")).await.unwrap();
        assert!(Uuid::parse_str(&stored.id).is_ok());
        assert!(!stored.created_at.is_empty());
        assert_eq!(stored.sql.as_deref(), Some("SELECT 1"));
        assert_eq!(stored.sql_result().unwrap().row_count(), 1);
    }

    #[tokio::test]
    async fn list_returns_session_messages_in_order() {
        let store = InMemoryMessageStore::new();
        store.create_message(&new_message("s1", "first")).await.unwrap();
        store.create_message(&new_message("s2", "other")).await.unwrap();
        store.create_message(&new_message("s1", "second")).await.unwrap();

        let messages = store.list_messages("s1").await.unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn unknown_session_lists_empty() {
        let store = InMemoryMessageStore::new();
        assert!(store.list_messages("nope").await.unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn clones_share_messages() {
        let store = InMemoryMessageStore::new();
        let view = store.clone();
        store.create_message(&new_message("s1", "a")).await.unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view.list_messages("s1").await.unwrap()[0].content, "a");
    }
}
