//! ChatRepository trait definition.
//!
//! Provides persistence for chat sessions and their ordered messages.
//! Follows the same RPITIT pattern as UserRepository.

use reverie_types::chat::{ChatMessage, ChatSession};
use reverie_types::error::RepositoryError;
use reverie_types::user::UserId;
use uuid::Uuid;

/// Repository trait for chat session and message persistence.
///
/// Implementations live in reverie-infra (e.g., `SqliteChatRepository`).
pub trait ChatRepository: Send + Sync {
    /// Create a session together with its opening messages in one atomic write.
    ///
    /// Either the session and every message are stored, or nothing is.
    fn create_session_with_messages(
        &self,
        session: &ChatSession,
        messages: &[ChatMessage],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_session(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ChatSession>, RepositoryError>> + Send;

    /// Get all messages of a session in creation order.
    fn get_messages(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// Append a message to an existing session.
    fn save_message(
        &self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List a user's sessions, newest first.
    fn list_sessions(
        &self,
        user_id: &UserId,
        limit: u32,
        offset: u64,
    ) -> impl std::future::Future<Output = Result<Vec<ChatSession>, RepositoryError>> + Send;

    fn count_sessions(
        &self,
        user_id: &UserId,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Opening user prompts of the user's most recent sessions, newest first.
    fn recent_opening_prompts(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RepositoryError>> + Send;

    /// Delete a session and, by cascade, its messages.
    ///
    /// Returns `RepositoryError::NotFound` if the session does not exist.
    fn delete_session(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
