//! One streamed reply, from the user's message to the persisted answer.
//!
//! A request is first *admitted* ([`admit`]): the content is validated and the
//! conversation checked, and any failure there becomes an ordinary HTTP error.
//! Once admitted, the event stream is open and every later outcome is
//! reported in-band by a [`StreamSession`]:
//!
//! ```text
//! PersistUserMessage ─▶ Streaming ─▶ PersistAssistantMessage ─▶ Done
//!         │                 │                  │
//!         └──────▶ Failed ◀─┴──────────────────┘
//!                           └─▶ Aborted (client gone)
//! ```

use std::sync::Arc;

use palaver_core::{
  conversation::Conversation,
  generation::GenerationProvider,
  message::{Message, NewMessage, Role, validate_content},
  page::{Direction, PageRequest, paginate},
  store::ChatStore,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
  emitter::{EmitError, EventEmitter},
  event::StreamEvent,
  generate::{GenerateError, Generator},
  transport::Transport,
};

pub const SAVE_MESSAGE_FAILED: &str = "Failed to save message";
pub const SAVE_RESPONSE_FAILED: &str = "Failed to save AI response";
pub const INTERNAL_ERROR: &str = "Internal server error";

/// Prior turns included in the prompt when none is configured.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

// ─── Admission ───────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum Rejection<E> {
  #[error(transparent)]
  InvalidInput(palaver_core::Error),

  #[error("conversation not found: {0}")]
  NotFound(Uuid),

  #[error("store error: {0}")]
  Store(#[source] E),
}

/// Validate `content` and resolve the target conversation.
///
/// With `owner` set, a conversation belonging to someone else is reported
/// exactly like a missing one.
pub async fn admit<S: ChatStore>(
  store: &S,
  conversation_id: Uuid,
  owner: Option<Uuid>,
  content: &str,
) -> Result<Conversation, Rejection<S::Error>> {
  validate_content(content).map_err(Rejection::InvalidInput)?;

  store
    .get_conversation(conversation_id)
    .await
    .map_err(Rejection::Store)?
    .filter(|c| owner.is_none_or(|user_id| c.is_owned_by(user_id)))
    .ok_or(Rejection::NotFound(conversation_id))
}

// ─── Session ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  PersistUserMessage,
  Streaming,
  PersistAssistantMessage,
  Done,
  Failed,
  Aborted,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  Completed { user_message_id: Uuid, assistant_message_id: Uuid },
  /// An error event carrying this text was the last thing emitted.
  Failed(String),
  /// The client went away or stopped reading; nothing further was emitted.
  Cancelled,
}

pub struct StreamSession<S, P, T> {
  store:           Arc<S>,
  generator:       Generator<P>,
  emitter:         EventEmitter<T>,
  conversation_id: Uuid,
  content:         String,
  cancel:          CancellationToken,
  history_limit:   usize,
  phase:           Phase,
}

impl<S, P, T> StreamSession<S, P, T>
where
  S: ChatStore,
  P: GenerationProvider,
  T: Transport,
{
  pub fn new(
    store: Arc<S>,
    generator: Generator<P>,
    emitter: EventEmitter<T>,
    conversation_id: Uuid,
    content: String,
    cancel: CancellationToken,
  ) -> Self {
    Self {
      store,
      generator,
      emitter,
      conversation_id,
      content,
      cancel,
      history_limit: DEFAULT_HISTORY_LIMIT,
      phase: Phase::PersistUserMessage,
    }
  }

  pub fn with_history_limit(mut self, history_limit: usize) -> Self {
    self.history_limit = history_limit;
    self
  }

  /// Drive the session to completion. The stream is closed when this returns.
  pub async fn run(mut self) -> Outcome {
    info!(conversation_id = %self.conversation_id, "reply stream opened");

    let outcome = match self.drive().await {
      Ok(outcome) => outcome,
      Err(e) if self.cancel.is_cancelled() || e == EmitError::StreamClosed => {
        debug!(conversation_id = %self.conversation_id, phase = ?self.phase, "client went away");
        self.enter(Phase::Aborted);
        Outcome::Cancelled
      }
      Err(EmitError::WriteTimeout) => {
        warn!(conversation_id = %self.conversation_id, phase = ?self.phase, "client stopped reading; reply abandoned");
        self.enter(Phase::Aborted);
        Outcome::Cancelled
      }
      Err(e) => {
        error!(
          conversation_id = %self.conversation_id,
          phase = ?self.phase,
          error = %e,
          "reply stream failed"
        );
        self.enter(Phase::Failed);
        if let Err(e) = self.emitter.emit(&StreamEvent::error(INTERNAL_ERROR)).await {
          debug!(error = %e, "could not report failure to client");
        }
        Outcome::Failed(INTERNAL_ERROR.to_string())
      }
    };

    self.cancel.cancel();
    info!(conversation_id = %self.conversation_id, phase = ?self.phase, "reply stream closed");
    outcome
  }

  fn enter(&mut self, phase: Phase) {
    debug!(conversation_id = %self.conversation_id, from = ?self.phase, to = ?phase, "phase");
    self.phase = phase;
  }

  async fn drive(&mut self) -> Result<Outcome, EmitError> {
    let user_message = match self
      .store
      .insert_message(NewMessage::new(self.conversation_id, Role::User, self.content.clone()))
      .await
    {
      Ok(m) => m,
      Err(e) => {
        error!(conversation_id = %self.conversation_id, error = %e, "failed to persist user message");
        return self.fail(SAVE_MESSAGE_FAILED).await;
      }
    };
    self.emitter.emit(&StreamEvent::done(user_message.id)).await?;

    let history = self.load_history(&user_message).await;

    self.enter(Phase::Streaming);
    let reply = self
      .generator
      .generate(&self.content, &history, &self.cancel, &mut self.emitter)
      .await;
    let text = match reply {
      Ok(text) => text,
      Err(GenerateError::AlreadyCancelled | GenerateError::Cancelled) => {
        self.enter(Phase::Aborted);
        return Ok(Outcome::Cancelled);
      }
      Err(GenerateError::Provider(e)) => {
        warn!(conversation_id = %self.conversation_id, kind = ?e.kind, error = %e.message, "generation failed");
        return self.fail(e.user_message()).await;
      }
      Err(GenerateError::Emit(e)) => return Err(e),
    };

    self.enter(Phase::PersistAssistantMessage);
    let assistant_message = match self
      .store
      .insert_message(NewMessage::new(self.conversation_id, Role::Assistant, text))
      .await
    {
      Ok(m) => m,
      Err(e) => {
        error!(conversation_id = %self.conversation_id, error = %e, "failed to persist reply");
        return self.fail(SAVE_RESPONSE_FAILED).await;
      }
    };
    self.emitter.emit(&StreamEvent::done(assistant_message.id)).await?;

    self.enter(Phase::Done);
    Ok(Outcome::Completed {
      user_message_id:      user_message.id,
      assistant_message_id: assistant_message.id,
    })
  }

  /// Earlier turns of the conversation, oldest first. A failed read only
  /// costs the reply its context.
  async fn load_history(&self, user_message: &Message) -> Vec<Message> {
    if self.history_limit == 0 {
      return Vec::new();
    }

    let request = PageRequest {
      cursor:    Some(user_message.cursor()),
      direction: Direction::Before,
      limit:     self.history_limit,
    };
    match paginate(self.store.as_ref(), self.conversation_id, None, &request).await {
      Ok(page) => {
        let mut messages = page.messages;
        messages.reverse();
        messages
      }
      Err(e) => {
        warn!(conversation_id = %self.conversation_id, error = %e, "history unavailable; continuing without it");
        Vec::new()
      }
    }
  }

  async fn fail(&mut self, message: &str) -> Result<Outcome, EmitError> {
    self.enter(Phase::Failed);
    self.emitter.emit(&StreamEvent::error(message)).await?;
    Ok(Outcome::Failed(message.to_string()))
  }
}
