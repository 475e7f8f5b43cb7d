//! `POST /auth/signup`, `POST /auth/signin` and `POST /auth/signout`.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Duration, Utc};
use palaver_core::{generation::GenerationProvider, store::ChatStore, user::User};
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  auth::{Identity, generate_token, hash_password, hash_token, verify_password},
  error::ApiError,
};

const MIN_USERNAME_CHARS: usize = 3;
const MAX_USERNAME_CHARS: usize = 64;
const MIN_PASSWORD_CHARS: usize = 8;

#[derive(Debug, Deserialize)]
pub struct Credentials {
  pub username: String,
  pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
  pub user:       User,
  pub token:      String,
  pub expires_at: DateTime<Utc>,
}

fn validate(credentials: &Credentials) -> Result<String, ApiError> {
  let username = credentials.username.trim();
  let len = username.chars().count();
  if !(MIN_USERNAME_CHARS..=MAX_USERNAME_CHARS).contains(&len) {
    return Err(ApiError::BadRequest(format!(
      "username must be {MIN_USERNAME_CHARS}-{MAX_USERNAME_CHARS} characters"
    )));
  }
  if credentials.password.chars().count() < MIN_PASSWORD_CHARS {
    return Err(ApiError::BadRequest(format!(
      "password must be at least {MIN_PASSWORD_CHARS} characters"
    )));
  }
  Ok(username.to_owned())
}

async fn issue_session<S, P>(state: &AppState<S, P>, user: User) -> Result<SessionResponse, ApiError>
where
  S: ChatStore + 'static,
  P: GenerationProvider + 'static,
{
  let token = generate_token();
  let expires_at = Utc::now() + Duration::hours(state.config.session_ttl_hours);
  state
    .store
    .create_auth_session(hash_token(&token), user.id, expires_at)
    .await
    .map_err(ApiError::store)?;
  Ok(SessionResponse { user, token, expires_at })
}

pub async fn signup<S, P>(
  State(state): State<AppState<S, P>>,
  Json(body): Json<Credentials>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError>
where
  S: ChatStore + 'static,
  P: GenerationProvider + 'static,
{
  let username = validate(&body)?;

  let existing = state
    .store
    .find_user_by_username(username.clone())
    .await
    .map_err(ApiError::store)?;
  if existing.is_some() {
    return Err(ApiError::Conflict(format!("username {username:?} is taken")));
  }

  let password_hash = hash_password(body.password).await?;
  let user = state
    .store
    .create_user(username, password_hash)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(user_id = %user.id, "account created");

  Ok((StatusCode::CREATED, Json(issue_session(&state, user).await?)))
}

pub async fn signin<S, P>(
  State(state): State<AppState<S, P>>,
  Json(body): Json<Credentials>,
) -> Result<Json<SessionResponse>, ApiError>
where
  S: ChatStore + 'static,
  P: GenerationProvider + 'static,
{
  let credentials = state
    .store
    .find_user_by_username(body.username.trim().to_owned())
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::Unauthorized)?;

  if !verify_password(body.password, credentials.password_hash).await? {
    return Err(ApiError::Unauthorized);
  }

  Ok(Json(issue_session(&state, credentials.user).await?))
}

pub async fn signout<S, P>(
  State(state): State<AppState<S, P>>,
  identity: Identity,
) -> Result<StatusCode, ApiError>
where
  S: ChatStore + 'static,
  P: GenerationProvider + 'static,
{
  state
    .store
    .delete_auth_session(identity.token_hash)
    .await
    .map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}
