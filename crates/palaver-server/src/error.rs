//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use palaver_core::{page::PageError, store::StoreError};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler before any event stream is opened.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("internal error: {0}")]
  Internal(String),
}

impl ApiError {
  /// Wrap a store failure. Conflicts surface as 409, everything else as 500.
  pub fn store<E: StoreError>(e: E) -> Self {
    if e.is_conflict() {
      ApiError::Conflict(e.to_string())
    } else {
      ApiError::Store(Box::new(e))
    }
  }
}

impl From<palaver_core::Error> for ApiError {
  fn from(e: palaver_core::Error) -> Self {
    use palaver_core::Error as E;
    match e {
      E::ConversationNotFound(_) | E::MessageNotFound(_) => ApiError::NotFound(e.to_string()),
      E::MalformedCursor(_) | E::InvalidDirection(_) | E::InvalidInput(_) => {
        ApiError::BadRequest(e.to_string())
      }
      E::UnknownRole(_) => ApiError::Internal(e.to_string()),
    }
  }
}

impl<E: StoreError> From<PageError<E>> for ApiError {
  fn from(e: PageError<E>) -> Self {
    match e {
      PageError::ConversationNotFound(id) => {
        ApiError::NotFound(format!("conversation {id} not found"))
      }
      PageError::Store(e) => ApiError::store(e),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Store(_) | ApiError::Internal(_) => {
        tracing::error!(error = %self, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
      }
    };

    let mut res = (status, Json(json!({ "error": message }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Bearer realm=\"palaver\""),
      );
    }
    res
  }
}
