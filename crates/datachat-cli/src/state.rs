//! Application state wiring the conversation service to the HTTP adapters.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use datachat_core::chat::service::ConversationService;
use datachat_infra::config::{load_client_config, load_token, resolve_data_dir};
use datachat_infra::http::ApiClient;
use datachat_infra::http::message_store::HttpMessageStore;
use datachat_infra::http::transport::HttpStreamTransport;
use datachat_types::config::ClientConfig;

/// Conversation service pinned to the HTTP transport and message store.
pub type ConcreteConversationService = ConversationService<HttpStreamTransport, HttpMessageStore>;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ConcreteConversationService>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load configuration and wire the service.
    ///
    /// `base_url` and `data_dir` come from the command line and take
    /// precedence over the environment and config.toml.
    pub async fn init(base_url: Option<&str>, data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = data_dir.unwrap_or_else(resolve_data_dir);

        let mut config = load_client_config(&data_dir).await;
        if let Some(base_url) = base_url {
            config.base_url = base_url.to_string();
        }
        config.validate()?;

        let service = build_service(config, &data_dir)?;
        Ok(Self {
            service: Arc::new(service),
            data_dir,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        self.service.config()
    }
}

fn build_service(
    config: ClientConfig,
    data_dir: &std::path::Path,
) -> anyhow::Result<ConcreteConversationService> {
    let token = load_token();
    if token.is_none() {
        tracing::debug!("no bearer token set, sending unauthenticated requests");
    }

    let api = ApiClient::new(&config, token)
        .with_context(|| format!("failed to build HTTP client for {}", config.base_url))?;
    let api = Arc::new(api);

    tracing::debug!(
        base_url = %api.base_url(),
        data_dir = %data_dir.display(),
        "wired conversation service"
    );

    let transport = HttpStreamTransport::new(Arc::clone(&api), config.stream_path.clone());
    let store = HttpMessageStore::new(api);
    Ok(ConversationService::new(transport, store, config))
}
