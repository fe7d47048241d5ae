//! Client configuration loader for datachat.
//!
//! Reads `config.toml` from the data directory (`~/.datachat/` by default)
//! and deserializes it into [`ClientConfig`]. Falls back to defaults when the
//! file is missing, malformed, or holds values the client cannot run with.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use datachat_types::config::ClientConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "DATACHAT_DATA_DIR";

/// Environment variable holding the bearer token.
pub const TOKEN_ENV: &str = "DATACHAT_TOKEN";

/// Load client configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`ClientConfig::default()`].
/// - If the file fails to parse or validate, logs a warning and returns the default.
/// - Otherwise returns the parsed config.
pub async fn load_client_config(data_dir: &Path) -> ClientConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ClientConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ClientConfig::default();
        }
    };

    let config = match toml::from_str::<ClientConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            return ClientConfig::default();
        }
    };

    match config.validate() {
        Ok(()) => config,
        Err(err) => {
            tracing::warn!("Invalid {}: {err}, using defaults", config_path.display());
            ClientConfig::default()
        }
    }
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `DATACHAT_DATA_DIR` environment variable
/// 2. `~/.datachat`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".datachat");
    }

    // Last resort: current directory
    PathBuf::from(".datachat")
}

/// Bearer token from `DATACHAT_TOKEN`, if set and non-empty.
pub fn load_token() -> Option<SecretString> {
    std::env::var(TOKEN_ENV)
        .ok()
        .filter(|token| !token.trim().is_empty())
        .map(SecretString::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use datachat_types::chat::RagEngine;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_client_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_client_config(tmp.path()).await;
        assert_eq!(config, ClientConfig::default());
    }

    #[tokio::test]
    async fn load_client_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
base_url = "https://bi.example.com/api"
idle_timeout_secs = 45
session_cache_capacity = 8
enable_thinking = true
rag_engine = "pro"
"#,
        )
        .await
        .unwrap();

        let config = load_client_config(tmp.path()).await;
        assert_eq!(config.base_url, "https://bi.example.com/api");
        assert_eq!(config.idle_timeout_secs, 45);
        assert_eq!(config.session_cache_capacity, 8);
        assert!(config.enable_thinking);
        assert_eq!(config.rag_engine, RagEngine::Pro);
        assert_eq!(config.stream_path, "/chat/stream");
    }

    #[tokio::test]
    async fn load_client_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_client_config(tmp.path()).await;
        assert_eq!(config, ClientConfig::default());
    }

    #[tokio::test]
    async fn load_client_config_invalid_values_return_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "base_url = \"localhost:8000\"")
            .await
            .unwrap();

        let config = load_client_config(tmp.path()).await;
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_resolve_data_dir_from_env() {
        // SAFETY: This test is the only one touching this variable and restores it immediately.
        unsafe {
            std::env::set_var(DATA_DIR_ENV, "/tmp/test-datachat");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-datachat"));
        unsafe {
            std::env::remove_var(DATA_DIR_ENV);
        }
    }
}
