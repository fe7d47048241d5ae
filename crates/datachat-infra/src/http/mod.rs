//! HTTP adapters for the datachat backend.
//!
//! `ApiClient` is shared by the streaming transport and the message store.
//! The bearer token is wrapped in [`secrecy::SecretString`] and is only
//! exposed when building request headers. It never appears in Debug output
//! or tracing logs.

pub mod message_store;
pub mod transport;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use datachat_types::config::{ClientConfig, join_url};

/// Shared reqwest client bound to one backend base URL.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
}

impl ApiClient {
    /// Build a client for `config.base_url`.
    ///
    /// No overall request timeout is set: streaming responses are
    /// long-lived and stalls are detected by the idle timeout instead.
    pub fn new(config: &ClientConfig, token: Option<SecretString>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if config.connect_timeout_secs > 0 {
            builder = builder.connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        }
        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.clone(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// Start a request with the bearer token attached, if any.
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
