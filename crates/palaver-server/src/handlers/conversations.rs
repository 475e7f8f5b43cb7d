//! Conversation CRUD scoped to the authenticated user.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use palaver_core::{
  conversation::{Conversation, DEFAULT_TITLE, normalize_title},
  generation::GenerationProvider,
  store::ChatStore,
};
use serde::Deserialize;
use uuid::Uuid;

use super::owned_conversation;
use crate::{AppState, auth::Identity, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct CreateConversation {
  pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameConversation {
  pub title: String,
}

pub async fn list<S, P>(
  State(state): State<AppState<S, P>>,
  identity: Identity,
) -> Result<Json<Vec<Conversation>>, ApiError>
where
  S: ChatStore + 'static,
  P: GenerationProvider + 'static,
{
  let conversations = state
    .store
    .list_conversations(identity.user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(conversations))
}

/// The body is optional; a missing or blank title becomes the default.
pub async fn create<S, P>(
  State(state): State<AppState<S, P>>,
  identity: Identity,
  body: Option<Json<CreateConversation>>,
) -> Result<(StatusCode, Json<Conversation>), ApiError>
where
  S: ChatStore + 'static,
  P: GenerationProvider + 'static,
{
  let title = match body.and_then(|Json(b)| b.title).filter(|t| !t.trim().is_empty()) {
    Some(title) => normalize_title(&title)?,
    None => DEFAULT_TITLE.to_owned(),
  };

  let conversation = state
    .store
    .create_conversation(Some(identity.user_id), title)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(conversation_id = %conversation.id, "conversation created");
  Ok((StatusCode::CREATED, Json(conversation)))
}

pub async fn get_one<S, P>(
  State(state): State<AppState<S, P>>,
  identity: Identity,
  Path(id): Path<Uuid>,
) -> Result<Json<Conversation>, ApiError>
where
  S: ChatStore + 'static,
  P: GenerationProvider + 'static,
{
  Ok(Json(owned_conversation(state.store.as_ref(), id, identity.user_id).await?))
}

pub async fn rename<S, P>(
  State(state): State<AppState<S, P>>,
  identity: Identity,
  Path(id): Path<Uuid>,
  Json(body): Json<RenameConversation>,
) -> Result<Json<Conversation>, ApiError>
where
  S: ChatStore + 'static,
  P: GenerationProvider + 'static,
{
  let title = normalize_title(&body.title)?;
  owned_conversation(state.store.as_ref(), id, identity.user_id).await?;

  let renamed = state
    .store
    .rename_conversation(id, title)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("conversation {id} not found")))?;
  Ok(Json(renamed))
}

pub async fn delete_one<S, P>(
  State(state): State<AppState<S, P>>,
  identity: Identity,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: ChatStore + 'static,
  P: GenerationProvider + 'static,
{
  owned_conversation(state.store.as_ref(), id, identity.user_id).await?;
  state.store.delete_conversation(id).await.map_err(ApiError::store)?;
  tracing::info!(conversation_id = %id, "conversation deleted");
  Ok(StatusCode::NO_CONTENT)
}
