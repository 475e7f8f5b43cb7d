//! Bearer-token authentication: password hashing, token issue, and the
//! [`Identity`] extractor.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use palaver_core::{generation::GenerationProvider, store::ChatStore, user::AuthSession};
use rand_core::{OsRng, RngCore as _};
use sha2::{Digest as _, Sha256};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct Identity {
  pub user_id:    Uuid,
  /// Digest of the presented token, so the session can be revoked.
  pub token_hash: String,
  pub expires_at: DateTime<Utc>,
}

impl From<AuthSession> for Identity {
  fn from(session: AuthSession) -> Self {
    Self {
      user_id:    session.user_id,
      token_hash: session.token_hash,
      expires_at: session.expires_at,
    }
  }
}

/// Pull the token out of an `Authorization: Bearer …` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .ok_or(ApiError::Unauthorized)
}

/// A fresh random session token: 32 bytes, base64url without padding.
pub fn generate_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  URL_SAFE_NO_PAD.encode(bytes)
}

/// The form in which a token is stored: lowercase hex SHA-256.
pub fn hash_token(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }

/// Produce an argon2id PHC string for `password` on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, ApiError> {
  tokio::task::spawn_blocking(move || {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map(|h| h.to_string())
      .map_err(|e| ApiError::Internal(format!("argon2 error: {e}")))
  })
  .await
  .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))?
}

/// Check `password` against a stored PHC string on the blocking pool.
pub async fn verify_password(password: String, phc: String) -> Result<bool, ApiError> {
  tokio::task::spawn_blocking(move || {
    let parsed = PasswordHash::new(&phc)
      .map_err(|e| ApiError::Internal(format!("stored hash is invalid: {e}")))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
  })
  .await
  .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))?
}

impl<S, P> FromRequestParts<AppState<S, P>> for Identity
where
  S: ChatStore + 'static,
  P: GenerationProvider + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, P>,
  ) -> Result<Self, Self::Rejection> {
    let token_hash = hash_token(bearer_token(&parts.headers)?);
    let session = state
      .store
      .find_auth_session(token_hash)
      .await
      .map_err(ApiError::store)?
      .ok_or(ApiError::Unauthorized)?;

    tracing::debug!(user_id = %session.user_id, expires_at = %session.expires_at, "authenticated");
    Ok(Identity::from(session))
  }
}

#[cfg(test)]
mod tests {
  use axum::http::{HeaderValue, Request};
  use chrono::{Duration, SubsecRound as _};

  use super::*;
  use crate::tests::test_state;

  async fn extract(
    req: Request<axum::body::Body>,
    state: &crate::tests::TestState,
  ) -> Result<Identity, ApiError> {
    let (mut parts, _) = req.into_parts();
    Identity::from_request_parts(&mut parts, state).await
  }

  fn with_token(token: &str) -> Request<axum::body::Body> {
    Request::builder()
      .header(header::AUTHORIZATION, format!("Bearer {token}"))
      .body(axum::body::Body::empty())
      .unwrap()
  }

  #[test]
  fn tokens_are_random_and_url_safe() {
    let a = generate_token();
    let b = generate_token();
    assert_ne!(a, b);
    assert_eq!(a.len(), 43);
    assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    assert_eq!(hash_token(&a).len(), 64);
    assert_eq!(hash_token(&a), hash_token(&a));
  }

  #[test]
  fn bearer_header_parsing() {
    let mut headers = HeaderMap::new();
    assert!(bearer_token(&headers).is_err());

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
    assert!(bearer_token(&headers).is_err());

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
    assert!(bearer_token(&headers).is_err());

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
    assert_eq!(bearer_token(&headers).unwrap(), "abc");
  }

  #[tokio::test]
  async fn password_round_trip() {
    let phc = hash_password("correct horse".into()).await.unwrap();
    assert!(phc.starts_with("$argon2id$"));
    assert!(verify_password("correct horse".into(), phc.clone()).await.unwrap());
    assert!(!verify_password("wrong horse".into(), phc).await.unwrap());
  }

  #[tokio::test]
  async fn valid_session_resolves_identity() {
    let state = test_state().await;
    let user = state.store.create_user("alice".into(), "h".into()).await.unwrap();
    let token = generate_token();
    let expires_at = (Utc::now() + Duration::hours(1)).trunc_subsecs(6);
    state
      .store
      .create_auth_session(hash_token(&token), user.id, expires_at)
      .await
      .unwrap();

    let identity = extract(with_token(&token), &state).await.unwrap();
    assert_eq!(identity.user_id, user.id);
    assert_eq!(identity.token_hash, hash_token(&token));
    assert_eq!(identity.expires_at, expires_at);
  }

  #[tokio::test]
  async fn unknown_or_missing_token_is_unauthorized() {
    let state = test_state().await;
    assert!(matches!(
      extract(with_token("nope"), &state).await,
      Err(ApiError::Unauthorized)
    ));

    let bare = Request::builder().body(axum::body::Body::empty()).unwrap();
    assert!(matches!(extract(bare, &state).await, Err(ApiError::Unauthorized)));
  }
}
