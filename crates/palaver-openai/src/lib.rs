//! OpenAI-compatible streaming chat-completions provider for Palaver.
//!
//! Implements [`GenerationProvider`] against any endpoint speaking the
//! `/v1/chat/completions` protocol with `stream: true`.

use std::{io, time::Duration};

use futures::{StreamExt as _, TryStreamExt as _};
use palaver_core::generation::{
  GenerationProvider, ProviderError, ProviderErrorKind, TokenStream,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, Lines};
use tokio_util::io::StreamReader;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
  /// Base URL without the `/v1/...` suffix, e.g. `https://api.openai.com`.
  pub endpoint: String,
  pub model:    String,
  /// Bearer credential. `None` or empty leaves the provider unconfigured.
  pub api_key:  Option<String>,
  /// Whole-request timeout, including the streamed body.
  pub timeout:  Option<Duration>,
}

// ─── Provider ─────────────────────────────────────────────────────────────────

/// Streaming chat-completions client.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct OpenAiProvider {
  client: reqwest::Client,
  config: ProviderConfig,
}

impl OpenAiProvider {
  pub fn new(config: ProviderConfig) -> Self {
    Self { client: reqwest::Client::new(), config }
  }

  fn api_key(&self) -> Option<&str> {
    self.config.api_key.as_deref().filter(|k| !k.is_empty())
  }

  fn completions_url(&self) -> String {
    format!("{}/v1/chat/completions", self.config.endpoint.trim_end_matches('/'))
  }
}

impl GenerationProvider for OpenAiProvider {
  fn is_configured(&self) -> bool { self.api_key().is_some() }

  async fn open_stream(&self, prompt: String) -> Result<TokenStream, ProviderError> {
    let api_key = self.api_key().ok_or_else(ProviderError::not_configured)?;

    let body = CompletionRequest {
      model:    &self.config.model,
      messages: vec![MessageRequest { role: "user", content: prompt }],
      stream:   true,
    };

    let mut req = self
      .client
      .post(self.completions_url())
      .bearer_auth(api_key)
      .json(&body);
    if let Some(timeout) = self.config.timeout {
      req = req.timeout(timeout);
    }

    tracing::debug!(model = %self.config.model, "opening completion stream");
    let res = req.send().await.map_err(classify_transport)?;

    let status = res.status();
    if !status.is_success() {
      let text = res.text().await.unwrap_or_default();
      let message = serde_json::from_str::<ErrorResponse>(&text)
        .map(|e| e.error.message)
        .unwrap_or(text);
      tracing::warn!(status = status.as_u16(), %message, "provider rejected completion request");
      return Err(ProviderError::from_status(status.as_u16(), message));
    }

    let bytes = Box::pin(res.bytes_stream().map_err(io::Error::other));
    let lines = StreamReader::new(bytes).lines();

    Ok(futures::stream::try_unfold(lines, next_token).boxed())
  }
}

/// Classify a failure to send the request or read the response body.
fn classify_transport(e: reqwest::Error) -> ProviderError {
  let kind = if e.is_connect() || e.is_timeout() {
    ProviderErrorKind::Connection
  } else {
    ProviderErrorKind::Unknown
  };
  ProviderError::new(kind, e.to_string())
}

/// Read `data:` lines until one carries content, `[DONE]` arrives, or the
/// body ends.
async fn next_token<R>(mut lines: Lines<R>) -> Result<Option<(String, Lines<R>)>, ProviderError>
where
  R: AsyncBufRead + Unpin,
{
  while let Some(line) = lines
    .next_line()
    .await
    .map_err(|e| ProviderError::new(ProviderErrorKind::Connection, e.to_string()))?
  {
    let Some(data) = line.trim().strip_prefix("data:") else {
      continue;
    };
    let data = data.trim();
    if data == "[DONE]" {
      return Ok(None);
    }

    let chunk: CompletionChunk = serde_json::from_str(data).map_err(|e| {
      ProviderError::new(ProviderErrorKind::Unknown, format!("malformed stream chunk: {e}"))
    })?;

    let content = chunk
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.delta.content)
      .filter(|c| !c.is_empty());
    if let Some(content) = content {
      return Ok(Some((content, lines)));
    }
  }
  Ok(None)
}

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
  model:    &'a str,
  messages: Vec<MessageRequest>,
  stream:   bool,
}

#[derive(Debug, Serialize)]
struct MessageRequest {
  role:    &'static str,
  content: String,
}

#[derive(Debug, Default, Deserialize)]
struct CompletionChunk {
  #[serde(default)]
  choices: Vec<ChunkChoice>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkChoice {
  #[serde(default)]
  delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
  content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
  error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
  message: String,
}
