//! Axum handlers, one module per resource.

pub mod accounts;
pub mod conversations;
pub mod messages;

use palaver_core::{conversation::Conversation, store::ChatStore};
use uuid::Uuid;

use crate::error::ApiError;

/// Load a conversation the caller owns. Someone else's conversation is
/// reported exactly like a missing one.
pub(crate) async fn owned_conversation<S: ChatStore>(
  store: &S,
  id: Uuid,
  user_id: Uuid,
) -> Result<Conversation, ApiError> {
  store
    .get_conversation(id)
    .await
    .map_err(ApiError::store)?
    .filter(|c| c.is_owned_by(user_id))
    .ok_or_else(|| ApiError::NotFound(format!("conversation {id} not found")))
}
