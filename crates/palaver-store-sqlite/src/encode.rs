//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-precision RFC 3339 strings so that SQL
//! string comparison agrees with chronological order. UUIDs are stored as
//! hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use palaver_core::{
  conversation::Conversation,
  cursor::encode_timestamp,
  message::{Message, Role},
  user::{User, UserCredentials},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { encode_timestamp(dt) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `messages` row.
pub struct RawMessage {
  pub message_id:      String,
  pub conversation_id: String,
  pub role:            String,
  pub content:         String,
  pub created_at:      String,
}

impl RawMessage {
  pub const COLUMNS: &'static str =
    "message_id, conversation_id, role, content, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      message_id:      row.get(0)?,
      conversation_id: row.get(1)?,
      role:            row.get(2)?,
      content:         row.get(3)?,
      created_at:      row.get(4)?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      id:              decode_uuid(&self.message_id)?,
      conversation_id: decode_uuid(&self.conversation_id)?,
      role:            self.role.parse::<Role>()?,
      content:         self.content,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `conversations` row.
pub struct RawConversation {
  pub conversation_id: String,
  pub user_id:         Option<String>,
  pub title:           String,
  pub message_count:   i64,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawConversation {
  pub const COLUMNS: &'static str =
    "conversation_id, user_id, title, message_count, created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      conversation_id: row.get(0)?,
      user_id:         row.get(1)?,
      title:           row.get(2)?,
      message_count:   row.get(3)?,
      created_at:      row.get(4)?,
      updated_at:      row.get(5)?,
    })
  }

  pub fn into_conversation(self) -> Result<Conversation> {
    Ok(Conversation {
      id:            decode_uuid(&self.conversation_id)?,
      user_id:       self.user_id.as_deref().map(decode_uuid).transpose()?,
      title:         self.title,
      // The CHECK constraint keeps this non-negative.
      message_count: self.message_count.max(0) as u64,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:       String,
  pub username:      String,
  pub password_hash: String,
  pub created_at:    String,
}

impl RawUser {
  pub fn into_credentials(self) -> Result<UserCredentials> {
    Ok(UserCredentials {
      user:          User {
        id:         decode_uuid(&self.user_id)?,
        username:   self.username,
        created_at: decode_dt(&self.created_at)?,
      },
      password_hash: self.password_hash,
    })
  }
}
