//! reqwest implementation of [`StreamTransport`].
//!
//! Sends the chat request as a JSON POST, checks the response status, then
//! hands the raw body chunks to the engine. Framing happens in datachat-core;
//! this adapter never looks inside the body.

use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::header::ACCEPT;

use datachat_core::stream::transport::{ByteStream, StreamTransport};
use datachat_types::chat::ChatRequest;
use datachat_types::error::StreamError;

use super::ApiClient;

#[derive(Debug, Clone)]
pub struct HttpStreamTransport {
    api: Arc<ApiClient>,
    stream_path: String,
}

impl HttpStreamTransport {
    pub fn new(api: Arc<ApiClient>, stream_path: impl Into<String>) -> Self {
        Self {
            api,
            stream_path: stream_path.into(),
        }
    }

    pub fn endpoint(&self) -> String {
        self.api.url(&self.stream_path)
    }
}

impl StreamTransport for HttpStreamTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, StreamError> {
        tracing::debug!(
            url = %self.endpoint(),
            session_id = %request.session_id,
            enable_rag = request.enable_rag,
            "opening chat stream"
        );

        let response = self
            .api
            .request(reqwest::Method::POST, &self.stream_path)
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "chat stream error response");
            return Err(StreamError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| StreamError::Body(e.to_string())));
        Ok(Box::pin(body))
    }
}
