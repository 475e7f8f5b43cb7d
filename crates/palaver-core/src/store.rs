//! The `ChatStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `palaver-store-sqlite`).
//! Higher layers (`palaver-server`) depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  conversation::Conversation,
  cursor::Cursor,
  message::{Message, NewMessage},
  user::{AuthSession, User, UserCredentials},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Sort direction over the `(created_at, id)` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
  Ascending,
  Descending,
}

/// Parameters for [`ChatStore::range_messages`].
///
/// With an `anchor`, `Ascending` selects rows strictly after it and
/// `Descending` selects rows strictly before it. Without one, the scan starts
/// at the oldest (ascending) or newest (descending) message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRange {
  pub anchor: Option<Cursor>,
  pub order:  SortOrder,
  pub limit:  usize,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// The error type of a [`ChatStore`] backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// The write collided with an existing row, such as a taken username.
  fn is_conflict(&self) -> bool { false }
}

/// Abstraction over a Palaver store backend.
///
/// Every method is a single, individually-atomic operation; callers never
/// compose them into a larger critical section.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ChatStore: Send + Sync {
  type Error: StoreError;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Create a user. Fails if `username` is already taken.
  fn create_user(
    &self,
    username: String,
    password_hash: String,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Look up a user and their password hash for sign-in.
  fn find_user_by_username(
    &self,
    username: String,
  ) -> impl Future<Output = Result<Option<UserCredentials>, Self::Error>> + Send + '_;

  // ── Auth sessions ─────────────────────────────────────────────────────

  /// Persist a session for `user_id` keyed by the digest of its bearer token.
  fn create_auth_session(
    &self,
    token_hash: String,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Resolve a token digest to its session. Expired sessions resolve to
  /// `None`.
  fn find_auth_session(
    &self,
    token_hash: String,
  ) -> impl Future<Output = Result<Option<AuthSession>, Self::Error>> + Send + '_;

  /// Remove a session. Returns `false` if it did not exist.
  fn delete_auth_session(
    &self,
    token_hash: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Conversations ─────────────────────────────────────────────────────

  fn create_conversation(
    &self,
    user_id: Option<Uuid>,
    title: String,
  ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + '_;

  /// Retrieve a conversation by id. Returns `None` if not found.
  fn get_conversation(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Conversation>, Self::Error>> + Send + '_;

  /// List a user's conversations, most recently updated first.
  fn list_conversations(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Conversation>, Self::Error>> + Send + '_;

  /// Replace a conversation's title. Returns `None` if not found.
  fn rename_conversation(
    &self,
    id: Uuid,
    title: String,
  ) -> impl Future<Output = Result<Option<Conversation>, Self::Error>> + Send + '_;

  /// Delete a conversation and, by cascade, its messages.
  fn delete_conversation(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Messages ──────────────────────────────────────────────────────────

  /// Append a message. `id` and `created_at` are assigned by the store.
  fn insert_message(
    &self,
    input: NewMessage,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  fn get_message(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Message>, Self::Error>> + Send + '_;

  /// Delete a single message. Returns `false` if it did not exist.
  fn delete_message(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Keyset range scan over one conversation's messages.
  fn range_messages(
    &self,
    conversation_id: Uuid,
    range: MessageRange,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + '_;
}
