//! Message store trait definition.
//!
//! The message store is owned by the backend; the engine only creates the
//! finalized assistant message of a turn and lists a session's history.

use datachat_types::chat::{Message, NewMessage};
use datachat_types::error::RepositoryError;

/// Repository trait for chat message persistence.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait MessageStore: Send + Sync {
    /// Store a message and return it with its server-assigned id.
    fn create_message(
        &self,
        message: &NewMessage,
    ) -> impl std::future::Future<Output = Result<Message, RepositoryError>> + Send;

    /// All messages of a session, oldest first.
    fn list_messages(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;
}
