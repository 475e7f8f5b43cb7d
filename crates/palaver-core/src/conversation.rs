//! Conversation — the envelope that owns an ordered log of messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Title given to conversations created without one.
pub const DEFAULT_TITLE: &str = "New Conversation";

/// Upper bound on conversation titles, counted in Unicode scalar values.
pub const MAX_TITLE_CHARS: usize = 200;

/// A conversation and its denormalised counters.
///
/// `message_count` and `updated_at` are maintained by the store whenever a
/// message is inserted or deleted; callers read them but never write them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
  pub id:            Uuid,
  /// `None` only for conversations created without an identity.
  pub user_id:       Option<Uuid>,
  pub title:         String,
  pub message_count: u64,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

impl Conversation {
  /// Whether `user_id` may see and modify this conversation.
  pub fn is_owned_by(&self, user_id: Uuid) -> bool {
    self.user_id == Some(user_id)
  }
}

/// Trim `title` and check it is non-empty and at most [`MAX_TITLE_CHARS`].
pub fn normalize_title(title: &str) -> Result<String> {
  let title = title.trim();
  if title.is_empty() {
    return Err(Error::InvalidInput("title must not be empty".into()));
  }
  if title.chars().count() > MAX_TITLE_CHARS {
    return Err(Error::InvalidInput(format!(
      "title exceeds {MAX_TITLE_CHARS} characters"
    )));
  }
  Ok(title.to_owned())
}
