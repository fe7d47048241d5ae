//! Stream transport port and byte-stream helpers.
//!
//! `StreamTransport` is implemented by the infrastructure layer (reqwest in
//! datachat-infra). Dropping the returned `ByteStream` aborts the underlying
//! request, which is how cancellation reaches the network.

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use datachat_types::chat::ChatRequest;
use datachat_types::error::StreamError;

/// Boxed stream of raw response body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send + 'static>>;

/// Opens one streaming turn against the backend.
///
/// A non-success status or connection failure is returned as `Err` before
/// any chunk is delivered. Later failures surface as an `Err` item that ends
/// the stream.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait StreamTransport: Send + Sync {
    fn open(
        &self,
        request: &ChatRequest,
    ) -> impl std::future::Future<Output = Result<ByteStream, StreamError>> + Send;
}

/// Fail the stream if no chunk arrives within `idle`.
///
/// `Duration::ZERO` disables the timeout.
pub fn with_idle_timeout(mut inner: ByteStream, idle: Duration) -> ByteStream {
    if idle.is_zero() {
        return inner;
    }
    Box::pin(async_stream::try_stream! {
        loop {
            match tokio::time::timeout(idle, inner.next()).await {
                Ok(Some(chunk)) => {
                    let chunk = chunk?;
                    yield chunk;
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(idle_secs = idle.as_secs(), "stream idle timeout");
                    Err::<(), _>(StreamError::IdleTimeout(idle.as_secs()))?;
                }
            }
        }
    })
}

/// Transport that replays a captured response body.
///
/// Each `open` yields the same bytes split into `chunk_size` pieces, so the
/// decoder sees arbitrary boundaries exactly as it would from the network.
#[derive(Debug, Clone)]
pub struct ReplayTransport {
    body: Bytes,
    chunk_size: usize,
}

impl ReplayTransport {
    pub fn new(body: impl Into<Bytes>, chunk_size: usize) -> Self {
        Self {
            body: body.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl StreamTransport for ReplayTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, StreamError> {
        tracing::debug!(
            session_id = %request.session_id,
            bytes = self.body.len(),
            chunk_size = self.chunk_size,
            "replaying captured stream"
        );
        Ok(chunked(self.body.clone(), self.chunk_size))
    }
}

/// Split `body` into a stream of `chunk_size` pieces.
pub fn chunked(body: Bytes, chunk_size: usize) -> ByteStream {
    let size = chunk_size.max(1);
    let pieces: Vec<Result<Bytes, StreamError>> = (0..body.len())
        .step_by(size)
        .map(|start| Ok(body.slice(start..(start + size).min(body.len()))))
        .collect();
    Box::pin(futures_util::stream::iter(pieces))
}
