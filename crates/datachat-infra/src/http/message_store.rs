//! reqwest implementation of [`MessageStore`] against the backend's
//! `/sessions/{session_id}/messages` endpoints.

use std::sync::Arc;

use serde_json::Value;

use datachat_core::repository::message::MessageStore;
use datachat_types::chat::{Message, NewMessage};
use datachat_types::error::RepositoryError;

use super::ApiClient;

#[derive(Debug, Clone)]
pub struct HttpMessageStore {
    api: Arc<ApiClient>,
}

impl HttpMessageStore {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    fn messages_path(session_id: &str) -> String {
        format!("/sessions/{session_id}/messages")
    }
}

/// Map a non-success response to a repository error.
async fn status_error(response: reqwest::Response) -> RepositoryError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body);
    match status.as_u16() {
        404 => RepositoryError::NotFound,
        409 => RepositoryError::Conflict(detail),
        s if s >= 500 => RepositoryError::Connection(format!("HTTP {status}: {detail}")),
        _ => RepositoryError::Query(format!("HTTP {status}: {detail}")),
    }
}

impl MessageStore for HttpMessageStore {
    async fn create_message(&self, message: &NewMessage) -> Result<Message, RepositoryError> {
        let response = self
            .api
            .request(reqwest::Method::POST, &Self::messages_path(&message.session_id))
            .json(message)
            .send()
            .await
            .map_err(|e| RepositoryError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        response
            .json::<Message>()
            .await
            .map_err(|e| RepositoryError::Query(format!("invalid message response: {e}")))
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>, RepositoryError> {
        let response = self
            .api
            .request(reqwest::Method::GET, &Self::messages_path(session_id))
            .send()
            .await
            .map_err(|e| RepositoryError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        response
            .json::<Vec<Message>>()
            .await
            .map_err(|e| RepositoryError::Query(format!("invalid message list response: {e}")))
    }
}
