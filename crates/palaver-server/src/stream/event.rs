//! Events carried on a reply stream and their Server-Sent Events framing.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One event on a reply stream.
///
/// Serialises to `{"type":"token","content":…}`, `{"type":"done","messageId":…}`
/// or `{"type":"error","error":…}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
  Token {
    content: String,
  },
  Done {
    #[serde(rename = "messageId")]
    message_id: String,
  },
  Error {
    error: String,
  },
}

impl StreamEvent {
  pub fn token(content: impl Into<String>) -> Self {
    Self::Token { content: content.into() }
  }

  pub fn done(message_id: Uuid) -> Self {
    Self::Done { message_id: message_id.to_string() }
  }

  pub fn error(error: impl Into<String>) -> Self {
    Self::Error { error: error.into() }
  }

  /// Encode as a single SSE frame: `data: <json>\n\n`.
  pub fn to_frame(&self) -> Bytes {
    // Serialising a tagged enum of strings cannot fail.
    let json = serde_json::to_string(self).unwrap_or_default();
    Bytes::from(format!("data: {json}\n\n"))
  }
}
