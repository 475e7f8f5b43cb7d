//! Bridges a [`GenerationProvider`] token stream onto an event stream.

use std::sync::Arc;

use futures::StreamExt as _;
use palaver_core::{
  generation::{GenerationProvider, ProviderError, build_prompt},
  message::Message,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::{
  emitter::{EmitError, EventEmitter},
  event::StreamEvent,
  transport::Transport,
};

#[derive(Debug, Error)]
pub enum GenerateError {
  #[error(transparent)]
  Provider(#[from] ProviderError),

  #[error("cancelled before generation started")]
  AlreadyCancelled,

  #[error("cancelled during generation")]
  Cancelled,

  #[error(transparent)]
  Emit(#[from] EmitError),
}

pub struct Generator<P> {
  provider: Arc<P>,
}

impl<P> Clone for Generator<P> {
  fn clone(&self) -> Self { Self { provider: self.provider.clone() } }
}

impl<P: GenerationProvider> Generator<P> {
  pub fn new(provider: Arc<P>) -> Self { Self { provider } }

  /// Generate a reply to `prompt` given prior turns `history` (oldest first),
  /// emitting one token event per increment and returning the full text.
  ///
  /// Cancellation is checked before the request and before each increment;
  /// nothing is emitted once it is observed.
  pub async fn generate<T: Transport>(
    &self,
    prompt: &str,
    history: &[Message],
    cancel: &CancellationToken,
    emitter: &mut EventEmitter<T>,
  ) -> Result<String, GenerateError> {
    if !self.provider.is_configured() {
      return Err(ProviderError::not_configured().into());
    }

    let prompt = build_prompt(history, prompt);
    if cancel.is_cancelled() {
      return Err(GenerateError::AlreadyCancelled);
    }

    let mut tokens = tokio::select! {
      biased;
      () = cancel.cancelled() => return Err(GenerateError::Cancelled),
      opened = self.provider.open_stream(prompt) => opened?,
    };

    let mut text = String::new();
    loop {
      let next = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(GenerateError::Cancelled),
        next = tokens.next() => next,
      };
      let Some(token) = next else { break };
      let token = token?;

      if cancel.is_cancelled() {
        return Err(GenerateError::Cancelled);
      }
      text.push_str(&token);
      emitter.emit(&StreamEvent::token(token)).await?;
    }

    Ok(text)
  }
}

#[cfg(test)]
mod tests {
  use palaver_core::generation::ProviderErrorKind;

  use super::*;
  use crate::{
    stream::transport::ChannelTransport,
    testing::{ScriptedProvider, parse_frames},
  };

  async fn collect(mut rx: tokio::sync::mpsc::Receiver<bytes::Bytes>) -> Vec<StreamEvent> {
    let mut body = String::new();
    while let Some(frame) = rx.recv().await {
      body.push_str(std::str::from_utf8(&frame).unwrap());
    }
    parse_frames(&body)
  }

  #[tokio::test]
  async fn accumulates_and_emits_each_increment() {
    let provider = Arc::new(ScriptedProvider::tokens(&["Hel", "lo", "!"]));
    let (t, rx) = ChannelTransport::channel(8);
    let mut emitter = EventEmitter::new(t);

    let text = Generator::new(provider.clone())
      .generate("hi", &[], &CancellationToken::new(), &mut emitter)
      .await
      .unwrap();
    drop(emitter);

    assert_eq!(text, "Hello!");
    assert_eq!(collect(rx).await, vec![
      StreamEvent::token("Hel"),
      StreamEvent::token("lo"),
      StreamEvent::token("!"),
    ]);
    assert_eq!(provider.prompts(), vec!["User: hi".to_string()]);
  }

  #[tokio::test]
  async fn unconfigured_provider_is_never_called() {
    let provider = Arc::new(ScriptedProvider::unconfigured());
    let (t, _rx) = ChannelTransport::channel(8);
    let mut emitter = EventEmitter::new(t);

    let err = Generator::new(provider.clone())
      .generate("hi", &[], &CancellationToken::new(), &mut emitter)
      .await
      .unwrap_err();
    assert!(matches!(err, GenerateError::Provider(e) if e.kind == ProviderErrorKind::NotConfigured));
    assert!(provider.prompts().is_empty());
  }

  #[tokio::test]
  async fn pre_cancelled_token_skips_request() {
    let provider = Arc::new(ScriptedProvider::tokens(&["a"]));
    let (t, _rx) = ChannelTransport::channel(8);
    let mut emitter = EventEmitter::new(t);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = Generator::new(provider.clone())
      .generate("hi", &[], &cancel, &mut emitter)
      .await
      .unwrap_err();
    assert!(matches!(err, GenerateError::AlreadyCancelled));
    assert!(provider.prompts().is_empty());
  }

  #[tokio::test]
  async fn mid_stream_failure_is_a_provider_error() {
    let provider =
      Arc::new(ScriptedProvider::failing_after(&["partial"], ProviderErrorKind::Connection));
    let (t, rx) = ChannelTransport::channel(8);
    let mut emitter = EventEmitter::new(t);

    let err = Generator::new(provider)
      .generate("hi", &[], &CancellationToken::new(), &mut emitter)
      .await
      .unwrap_err();
    drop(emitter);

    assert!(matches!(err, GenerateError::Provider(e) if e.kind == ProviderErrorKind::Connection));
    assert_eq!(collect(rx).await, vec![StreamEvent::token("partial")]);
  }
}
