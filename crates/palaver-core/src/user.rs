//! User accounts and bearer-token sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user. The password hash never leaves the store boundary
/// except inside [`UserCredentials`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:         Uuid,
  pub username:   String,
  pub created_at: DateTime<Utc>,
}

/// A user bundled with the PHC-format password hash used for sign-in.
#[derive(Debug, Clone)]
pub struct UserCredentials {
  pub user:          User,
  pub password_hash: String,
}

/// A persisted bearer-token session. Only the SHA-256 hex digest of the token
/// is stored.
#[derive(Debug, Clone)]
pub struct AuthSession {
  pub token_hash: String,
  pub user_id:    Uuid,
  pub created_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}
