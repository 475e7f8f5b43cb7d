//! Error types for `palaver-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("conversation not found: {0}")]
  ConversationNotFound(Uuid),

  #[error("message not found: {0}")]
  MessageNotFound(Uuid),

  #[error("malformed cursor: {0:?}")]
  MalformedCursor(String),

  #[error("invalid direction {0:?}; expected \"after\" or \"before\"")]
  InvalidDirection(String),

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("unknown role discriminant: {0:?}")]
  UnknownRole(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
