//! Keyset pagination over a conversation's message log.
//!
//! Pages are addressed by [`Cursor`]s rather than offsets, so concurrent
//! appends never shift a page boundary and no message is skipped or repeated
//! between adjacent pages, even when several messages share a timestamp.

use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

use crate::{
  Error,
  cursor::Cursor,
  message::Message,
  store::{ChatStore, MessageRange, SortOrder},
};

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 100;

// ─── Request ─────────────────────────────────────────────────────────────────

/// Which side of the cursor to read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
  /// Newer than the cursor, oldest first.
  #[default]
  After,
  /// Older than the cursor, newest first.
  Before,
}

impl FromStr for Direction {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Error> {
    match s {
      "after" => Ok(Self::After),
      "before" => Ok(Self::Before),
      other => Err(Error::InvalidDirection(other.to_owned())),
    }
  }
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
  pub cursor:    Option<Cursor>,
  pub direction: Direction,
  pub limit:     usize,
}

impl Default for PageRequest {
  fn default() -> Self {
    Self { cursor: None, direction: Direction::After, limit: DEFAULT_LIMIT }
  }
}

impl PageRequest {
  /// Build a request from raw query-string values.
  ///
  /// A missing, non-numeric, or non-positive `limit` falls back to
  /// [`DEFAULT_LIMIT`]; larger values are clamped to [`MAX_LIMIT`]. An empty
  /// `cursor` is treated as absent.
  pub fn from_params(
    limit: Option<&str>,
    cursor: Option<&str>,
    direction: Option<&str>,
  ) -> Result<Self, Error> {
    let cursor = cursor
      .filter(|c| !c.is_empty())
      .map(Cursor::decode)
      .transpose()?;
    let direction = direction.map(str::parse).transpose()?.unwrap_or_default();

    Ok(Self { cursor, direction, limit: parse_limit(limit) })
  }
}

/// Resolve a raw `limit` parameter; never fails.
pub fn parse_limit(raw: Option<&str>) -> usize {
  match raw.and_then(|s| s.trim().parse::<i64>().ok()) {
    Some(n) if n > 0 => (n as u64).min(MAX_LIMIT as u64) as usize,
    _ => DEFAULT_LIMIT,
  }
}

// ─── Result ──────────────────────────────────────────────────────────────────

/// One page of messages plus the cursors needed to continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
  /// Newest-first for an initial or `before` page, oldest-first for `after`.
  pub messages:    Vec<Message>,
  pub limit:       usize,
  /// Set only when the page is full.
  pub next_cursor: Option<String>,
  /// Set only when the request carried a cursor.
  pub prev_cursor: Option<String>,
  /// Full-page heuristic; an exactly-full final page reports `true` once.
  pub has_more:    bool,
}

#[derive(Debug, Error)]
pub enum PageError<E> {
  #[error("conversation not found: {0}")]
  ConversationNotFound(Uuid),

  #[error("store error: {0}")]
  Store(#[source] E),
}

// ─── Paginator ───────────────────────────────────────────────────────────────

/// Read one page of `conversation_id`'s messages.
///
/// When `owner` is set the conversation must belong to that user; otherwise
/// it is reported as not found, indistinguishable from a missing one.
pub async fn paginate<S>(
  store: &S,
  conversation_id: Uuid,
  owner: Option<Uuid>,
  request: &PageRequest,
) -> Result<Page, PageError<S::Error>>
where
  S: ChatStore,
{
  let conversation = store
    .get_conversation(conversation_id)
    .await
    .map_err(PageError::Store)?
    .filter(|c| owner.is_none_or(|user_id| c.is_owned_by(user_id)))
    .ok_or(PageError::ConversationNotFound(conversation_id))?;

  let order = match (request.cursor, request.direction) {
    (None, _) | (Some(_), Direction::Before) => SortOrder::Descending,
    (Some(_), Direction::After) => SortOrder::Ascending,
  };

  let messages = store
    .range_messages(conversation.id, MessageRange {
      anchor: request.cursor,
      order,
      limit: request.limit,
    })
    .await
    .map_err(PageError::Store)?;

  let has_more = messages.len() == request.limit;
  let next_cursor = has_more
    .then(|| messages.last().map(|m| m.cursor().encode()))
    .flatten();
  let prev_cursor = request
    .cursor
    .and_then(|_| messages.first().map(|m| m.cursor().encode()));

  Ok(Page {
    messages,
    limit: request.limit,
    next_cursor,
    prev_cursor,
    has_more,
  })
}
