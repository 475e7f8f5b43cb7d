//! The `GenerationProvider` trait — an upstream text generator that yields its
//! reply incrementally.

use std::future::Future;

use futures::stream::BoxStream;
use thiserror::Error;

use crate::message::Message;

/// Incremental text produced by a provider, in generation order.
pub type TokenStream = BoxStream<'static, Result<String, ProviderError>>;

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Coarse classification of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
  /// No credentials configured; no request was made.
  NotConfigured,
  /// The provider refused the request for exceeding a rate limit.
  RateLimited,
  /// The provider answered with a server-side (5xx) failure.
  Unavailable,
  /// The provider could not be reached.
  Connection,
  Unknown,
}

#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct ProviderError {
  pub kind:    ProviderErrorKind,
  pub message: String,
}

impl ProviderError {
  pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
    Self { kind, message: message.into() }
  }

  pub fn not_configured() -> Self {
    Self::new(ProviderErrorKind::NotConfigured, "provider credentials are not configured")
  }

  /// Classify an HTTP status returned by a provider.
  pub fn from_status(status: u16, message: impl Into<String>) -> Self {
    let kind = match status {
      429 => ProviderErrorKind::RateLimited,
      500.. => ProviderErrorKind::Unavailable,
      _ => ProviderErrorKind::Unknown,
    };
    Self::new(kind, message)
  }

  /// The description shown to an end user.
  pub fn user_message(&self) -> &'static str {
    match self.kind {
      ProviderErrorKind::NotConfigured => "AI service not configured",
      ProviderErrorKind::Connection => "Cannot connect to AI service",
      ProviderErrorKind::RateLimited => "AI service rate limit exceeded",
      ProviderErrorKind::Unavailable => "AI service temporarily unavailable",
      ProviderErrorKind::Unknown => "AI service unavailable",
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a streaming text-generation backend.
pub trait GenerationProvider: Send + Sync {
  /// Whether credentials are present. Checked before any request is made.
  fn is_configured(&self) -> bool;

  /// Start generating a reply to `prompt`.
  fn open_stream(
    &self,
    prompt: String,
  ) -> impl Future<Output = Result<TokenStream, ProviderError>> + Send + '_;
}

// ─── Prompt assembly ─────────────────────────────────────────────────────────

/// Render prior turns (oldest first) and the new user prompt into the single
/// effective prompt sent to a provider.
pub fn build_prompt(history: &[Message], prompt: &str) -> String {
  let mut out = String::new();
  for turn in history {
    out.push_str(turn.role.label());
    out.push_str(": ");
    out.push_str(&turn.content);
    out.push_str("\n\n");
  }
  out.push_str("User: ");
  out.push_str(prompt);
  out
}
