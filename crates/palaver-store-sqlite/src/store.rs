//! [`SqliteStore`] — the SQLite implementation of [`ChatStore`].

use std::path::Path;

use chrono::{DateTime, SubsecRound as _, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use palaver_core::{
  conversation::Conversation,
  message::{Message, NewMessage},
  store::{ChatStore, MessageRange, SortOrder},
  user::{AuthSession, User, UserCredentials},
};

use crate::{
  Error, Result,
  encode::{RawConversation, RawMessage, RawUser, decode_dt, decode_uuid, encode_dt, encode_uuid},
  schema::SCHEMA,
};

/// Current time at the precision timestamps are stored with.
fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Palaver store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Append a message with a caller-supplied timestamp.
  ///
  /// [`ChatStore::insert_message`] delegates here with the current time;
  /// imports and tests use it directly to reproduce colliding timestamps.
  pub async fn insert_message_at(
    &self,
    input: NewMessage,
    created_at: DateTime<Utc>,
  ) -> Result<Message> {
    let message = Message {
      id:              Uuid::now_v7(),
      conversation_id: input.conversation_id,
      role:            input.role,
      content:         input.content,
      created_at:      created_at.trunc_subsecs(6),
    };

    let id_str      = encode_uuid(message.id);
    let conv_id_str = encode_uuid(message.conversation_id);
    let role_str    = message.role.as_str().to_owned();
    let content     = message.content.clone();
    let at_str      = encode_dt(message.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO messages (message_id, conversation_id, role, content, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, conv_id_str, role_str, content, at_str],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::from);

    match inserted {
      Ok(()) => Ok(message),
      Err(e) if e.is_constraint_violation() => {
        Err(Error::ConversationNotFound(message.conversation_id))
      }
      Err(e) => Err(e),
    }
  }

  async fn fetch_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawConversation> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {} FROM conversations WHERE conversation_id = ?1",
              RawConversation::COLUMNS
            ),
            rusqlite::params![id_str],
            RawConversation::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawConversation::into_conversation).transpose()
  }
}

// ─── ChatStore impl ──────────────────────────────────────────────────────────

impl ChatStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, username: String, password_hash: String) -> Result<User> {
    let user = User {
      id:         Uuid::new_v4(),
      username:   username.clone(),
      created_at: now(),
    };

    let id_str = encode_uuid(user.id);
    let at_str = encode_dt(user.created_at);
    let name   = username.clone();

    let inserted = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, username, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, name, password_hash, at_str],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::from);

    match inserted {
      Ok(()) => Ok(user),
      Err(e) if e.is_constraint_violation() => Err(Error::UsernameTaken(username)),
      Err(e) => Err(e),
    }
  }

  async fn find_user_by_username(&self, username: String) -> Result<Option<UserCredentials>> {
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT user_id, username, password_hash, created_at
             FROM users WHERE username = ?1",
            rusqlite::params![username],
            |row| {
              Ok(RawUser {
                user_id:       row.get(0)?,
                username:      row.get(1)?,
                password_hash: row.get(2)?,
                created_at:    row.get(3)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawUser::into_credentials).transpose()
  }

  // ── Auth sessions ─────────────────────────────────────────────────────────

  async fn create_auth_session(
    &self,
    token_hash: String,
    user_id:    Uuid,
    expires_at: DateTime<Utc>,
  ) -> Result<()> {
    let user_id_str = encode_uuid(user_id);
    let created_str = encode_dt(now());
    let expires_str = encode_dt(expires_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO auth_sessions (token_hash, user_id, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![token_hash, user_id_str, created_str, expires_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn find_auth_session(&self, token_hash: String) -> Result<Option<AuthSession>> {
    let now_str = encode_dt(now());

    let row: Option<(String, String, String, String)> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT token_hash, user_id, created_at, expires_at FROM auth_sessions
             WHERE token_hash = ?1 AND expires_at > ?2",
            rusqlite::params![token_hash, now_str],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
          )
          .optional()?)
      })
      .await?;

    row
      .map(|(token_hash, user_id, created_at, expires_at)| -> Result<AuthSession> {
        Ok(AuthSession {
          token_hash,
          user_id:    decode_uuid(&user_id)?,
          created_at: decode_dt(&created_at)?,
          expires_at: decode_dt(&expires_at)?,
        })
      })
      .transpose()
  }

  async fn delete_auth_session(&self, token_hash: String) -> Result<bool> {
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM auth_sessions WHERE token_hash = ?1",
          rusqlite::params![token_hash],
        )?)
      })
      .await?;
    Ok(removed > 0)
  }

  // ── Conversations ─────────────────────────────────────────────────────────

  async fn create_conversation(
    &self,
    user_id: Option<Uuid>,
    title:   String,
  ) -> Result<Conversation> {
    let created_at = now();
    let conversation = Conversation {
      id: Uuid::new_v4(),
      user_id,
      title,
      message_count: 0,
      created_at,
      updated_at: created_at,
    };

    let id_str      = encode_uuid(conversation.id);
    let user_id_str = user_id.map(encode_uuid);
    let title       = conversation.title.clone();
    let at_str      = encode_dt(created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO conversations
             (conversation_id, user_id, title, message_count, created_at, updated_at)
           VALUES (?1, ?2, ?3, 0, ?4, ?4)",
          rusqlite::params![id_str, user_id_str, title, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(conversation)
  }

  async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
    self.fetch_conversation(id).await
  }

  async fn list_conversations(&self, user_id: Uuid) -> Result<Vec<Conversation>> {
    let user_id_str = encode_uuid(user_id);

    let raws: Vec<RawConversation> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM conversations
           WHERE user_id = ?1
           ORDER BY updated_at DESC, conversation_id DESC",
          RawConversation::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_id_str], RawConversation::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawConversation::into_conversation).collect()
  }

  async fn rename_conversation(&self, id: Uuid, title: String) -> Result<Option<Conversation>> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(now());

    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE conversations SET title = ?2, updated_at = ?3
           WHERE conversation_id = ?1",
          rusqlite::params![id_str, title, at_str],
        )?)
      })
      .await?;

    if updated == 0 {
      return Ok(None);
    }
    self.fetch_conversation(id).await
  }

  async fn delete_conversation(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM conversations WHERE conversation_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(removed > 0)
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  async fn insert_message(&self, input: NewMessage) -> Result<Message> {
    self.insert_message_at(input, now()).await
  }

  async fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawMessage> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {} FROM messages WHERE message_id = ?1", RawMessage::COLUMNS),
            rusqlite::params![id_str],
            RawMessage::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawMessage::into_message).transpose()
  }

  async fn delete_message(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM messages WHERE message_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(removed > 0)
  }

  async fn range_messages(
    &self,
    conversation_id: Uuid,
    range:           MessageRange,
  ) -> Result<Vec<Message>> {
    let conv_id_str = encode_uuid(conversation_id);
    let anchor      = range.anchor.map(|c| (encode_dt(c.created_at), encode_uuid(c.id)));
    let limit_val   = range.limit as i64;

    let (cmp, dir) = match range.order {
      SortOrder::Ascending => (">", "ASC"),
      SortOrder::Descending => ("<", "DESC"),
    };

    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        // The row-value comparison keeps `message_id` as the tiebreak for
        // rows sharing a `created_at`.
        let keyset = if anchor.is_some() {
          format!("AND (created_at, message_id) {cmp} (?2, ?3)")
        } else {
          String::new()
        };

        let sql = format!(
          "SELECT {columns} FROM messages
           WHERE conversation_id = ?1 {keyset}
           ORDER BY created_at {dir}, message_id {dir}
           LIMIT ?4",
          columns = RawMessage::COLUMNS,
        );

        let (anchor_at, anchor_id) = anchor.unzip();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![conv_id_str, anchor_at, anchor_id, limit_val],
            RawMessage::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessage::into_message).collect()
  }
}
