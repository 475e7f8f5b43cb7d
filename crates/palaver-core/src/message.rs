//! Message types — the append-only turns of a conversation.
//!
//! A message is never updated once written. It disappears only when deleted
//! individually or when its conversation is deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, cursor::Cursor};

/// Upper bound on message content, counted in Unicode scalar values.
pub const MAX_CONTENT_CHARS: usize = 10_000;

// ─── Role ────────────────────────────────────────────────────────────────────

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  User,
  Assistant,
  System,
}

impl Role {
  /// The discriminant stored in the `role` column.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::User => "user",
      Self::Assistant => "assistant",
      Self::System => "system",
    }
  }

  /// Label used when a turn is rendered into a generation prompt.
  pub fn label(&self) -> &'static str {
    match self {
      Self::User => "User",
      Self::Assistant => "Assistant",
      Self::System => "System",
    }
  }
}

impl std::str::FromStr for Role {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "user" => Ok(Self::User),
      "assistant" => Ok(Self::Assistant),
      "system" => Ok(Self::System),
      other => Err(Error::UnknownRole(other.to_owned())),
    }
  }
}

// ─── Message ─────────────────────────────────────────────────────────────────

/// A persisted conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  pub id:              Uuid,
  pub conversation_id: Uuid,
  pub role:            Role,
  pub content:         String,
  /// Server-assigned; microsecond precision.
  pub created_at:      DateTime<Utc>,
}

impl Message {
  /// The keyset position of this message.
  pub fn cursor(&self) -> Cursor {
    Cursor { created_at: self.created_at, id: self.id }
  }
}

/// Input to [`crate::store::ChatStore::insert_message`]. The store assigns
/// `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewMessage {
  pub conversation_id: Uuid,
  pub role:            Role,
  pub content:         String,
}

impl NewMessage {
  pub fn new(conversation_id: Uuid, role: Role, content: impl Into<String>) -> Self {
    Self { conversation_id, role, content: content.into() }
  }
}

/// Check that `content` is non-blank and at most [`MAX_CONTENT_CHARS`] long.
pub fn validate_content(content: &str) -> Result<()> {
  if content.trim().is_empty() {
    return Err(Error::InvalidInput("content must not be empty".into()));
  }
  if content.chars().count() > MAX_CONTENT_CHARS {
    return Err(Error::InvalidInput(format!(
      "content exceeds {MAX_CONTENT_CHARS} characters"
    )));
  }
  Ok(())
}
