//! Error type for `palaver-store-sqlite`.

use palaver_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] palaver_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("username already taken: {0}")]
  UsernameTaken(String),

  #[error("conversation not found: {0}")]
  ConversationNotFound(uuid::Uuid),
}

impl Error {
  /// Whether the underlying failure is a SQLite constraint violation.
  pub(crate) fn is_constraint_violation(&self) -> bool {
    matches!(
      self,
      Error::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _)))
        if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
  }
}

impl StoreError for Error {
  fn is_conflict(&self) -> bool { matches!(self, Error::UsernameTaken(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
