//! Test doubles shared by the unit and router tests.

use std::sync::{Arc, Mutex};

use futures::{Stream, StreamExt as _, stream};
use palaver_core::generation::{
  GenerationProvider, ProviderError, ProviderErrorKind, TokenStream,
};
use tokio::sync::Notify;

use crate::stream::StreamEvent;

enum Script {
  Tokens(Vec<String>),
  Fail(ProviderErrorKind),
  FailAfter(Vec<String>, ProviderErrorKind),
  /// Yield `before`, wait for the gate, then yield `after`.
  Gated { before: Vec<String>, gate: Arc<Notify>, after: Vec<String> },
}

/// A [`GenerationProvider`] that replays a fixed script and records the
/// prompts it was asked to complete.
pub struct ScriptedProvider {
  configured: bool,
  script:     Script,
  prompts:    Mutex<Vec<String>>,
}

fn owned(tokens: &[&str]) -> Vec<String> { tokens.iter().map(|t| t.to_string()).collect() }

fn replay(tokens: &[String]) -> impl Stream<Item = Result<String, ProviderError>> + Send + 'static {
  stream::iter(tokens.to_vec().into_iter().map(Ok))
}

impl ScriptedProvider {
  fn new(configured: bool, script: Script) -> Self {
    Self { configured, script, prompts: Mutex::new(Vec::new()) }
  }

  pub fn tokens(tokens: &[&str]) -> Self { Self::new(true, Script::Tokens(owned(tokens))) }

  pub fn failing(kind: ProviderErrorKind) -> Self { Self::new(true, Script::Fail(kind)) }

  pub fn failing_after(tokens: &[&str], kind: ProviderErrorKind) -> Self {
    Self::new(true, Script::FailAfter(owned(tokens), kind))
  }

  pub fn gated(before: &[&str], gate: Arc<Notify>, after: &[&str]) -> Self {
    Self::new(true, Script::Gated { before: owned(before), gate, after: owned(after) })
  }

  pub fn unconfigured() -> Self { Self::new(false, Script::Tokens(Vec::new())) }

  pub fn prompts(&self) -> Vec<String> { self.prompts.lock().unwrap().clone() }
}

impl GenerationProvider for ScriptedProvider {
  fn is_configured(&self) -> bool { self.configured }

  async fn open_stream(&self, prompt: String) -> Result<TokenStream, ProviderError> {
    self.prompts.lock().unwrap().push(prompt);

    match &self.script {
      Script::Tokens(tokens) => Ok(replay(tokens).boxed()),
      Script::Fail(kind) => Err(ProviderError::new(*kind, "scripted failure")),
      Script::FailAfter(tokens, kind) => {
        let failure = stream::once(futures::future::ready(Err(ProviderError::new(
          *kind,
          "scripted failure",
        ))));
        Ok(replay(tokens).chain(failure).boxed())
      }
      Script::Gated { before, gate, after } => {
        let gate = gate.clone();
        let after = replay(after);
        let rest = stream::once(async move {
          gate.notified().await;
          after
        })
        .flatten();
        Ok(replay(before).chain(rest).boxed())
      }
    }
  }
}

/// Split an SSE body into its events. Frames that are not `data:` lines or
/// that fail to parse are skipped.
pub fn parse_frames(body: &str) -> Vec<StreamEvent> {
  body
    .split("\n\n")
    .filter_map(|frame| frame.trim().strip_prefix("data:"))
    .filter_map(|data| serde_json::from_str(data.trim()).ok())
    .collect()
}
