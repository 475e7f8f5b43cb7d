//! Message history, deletion, and the streamed-reply endpoint.

use axum::{
  Json,
  extract::{Path, Query, State, rejection::JsonRejection},
  http::StatusCode,
  response::Response,
};
use palaver_core::{
  generation::GenerationProvider,
  message::Message,
  page::{Page, PageRequest, paginate},
  store::ChatStore,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::owned_conversation;
use crate::{
  AppState,
  auth::Identity,
  error::ApiError,
  stream::{
    ChannelTransport, EventEmitter, FRAME_BUFFER, Generator, StreamSession,
    event_stream_response,
    session::{Rejection, admit},
  },
};

// ─── History ─────────────────────────────────────────────────────────────────

/// Raw query parameters; `limit` stays a string so a malformed value falls
/// back to the default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub limit:     Option<String>,
  pub cursor:    Option<String>,
  pub direction: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Pagination {
  pub limit:       usize,
  pub next_cursor: Option<String>,
  pub prev_cursor: Option<String>,
  pub has_more:    bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
  pub messages:   Vec<Message>,
  pub pagination: Pagination,
}

impl From<Page> for MessagesResponse {
  fn from(page: Page) -> Self {
    Self {
      messages:   page.messages,
      pagination: Pagination {
        limit:       page.limit,
        next_cursor: page.next_cursor,
        prev_cursor: page.prev_cursor,
        has_more:    page.has_more,
      },
    }
  }
}

pub async fn list<S, P>(
  State(state): State<AppState<S, P>>,
  identity: Identity,
  Path(id): Path<Uuid>,
  Query(params): Query<ListParams>,
) -> Result<Json<MessagesResponse>, ApiError>
where
  S: ChatStore + 'static,
  P: GenerationProvider + 'static,
{
  let request = PageRequest::from_params(
    params.limit.as_deref(),
    params.cursor.as_deref(),
    params.direction.as_deref(),
  )?;
  let page = paginate(state.store.as_ref(), id, Some(identity.user_id), &request).await?;
  Ok(Json(page.into()))
}

pub async fn delete_one<S, P>(
  State(state): State<AppState<S, P>>,
  identity: Identity,
  Path((id, message_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError>
where
  S: ChatStore + 'static,
  P: GenerationProvider + 'static,
{
  owned_conversation(state.store.as_ref(), id, identity.user_id).await?;

  let belongs = state
    .store
    .get_message(message_id)
    .await
    .map_err(ApiError::store)?
    .is_some_and(|m| m.conversation_id == id);
  if !belongs {
    return Err(palaver_core::Error::MessageNotFound(message_id).into());
  }

  state.store.delete_message(message_id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Streamed reply ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StreamRequest {
  pub content: String,
}

/// Accept a user message and stream the assistant's reply as SSE.
///
/// Authentication, validation and the conversation lookup happen before the
/// stream opens and fail as plain HTTP errors. Everything after that is
/// reported in-band by the spawned session.
pub async fn stream<S, P>(
  State(state): State<AppState<S, P>>,
  identity: Identity,
  Path(id): Path<Uuid>,
  body: Result<Json<StreamRequest>, JsonRejection>,
) -> Result<Response, ApiError>
where
  S: ChatStore + 'static,
  P: GenerationProvider + 'static,
{
  let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

  let conversation = admit(state.store.as_ref(), id, Some(identity.user_id), &body.content)
    .await
    .map_err(|e| match e {
      Rejection::InvalidInput(e) => ApiError::from(e),
      Rejection::NotFound(id) => ApiError::NotFound(format!("conversation {id} not found")),
      Rejection::Store(e) => ApiError::store(e),
    })?;

  let cancel = CancellationToken::new();
  let (mut transport, frames) = ChannelTransport::channel(FRAME_BUFFER);
  transport.cancel_on_disconnect(cancel.clone());

  let session = StreamSession::new(
    state.store.clone(),
    Generator::new(state.provider.clone()),
    EventEmitter::new(transport),
    conversation.id,
    body.content,
    cancel,
  )
  .with_history_limit(state.config.history_limit);
  tokio::spawn(session.run());

  Ok(event_stream_response(frames))
}
