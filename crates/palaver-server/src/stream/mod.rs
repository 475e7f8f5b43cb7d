//! Streamed replies over Server-Sent Events.
//!
//! [`session::StreamSession`] owns the reply lifecycle; it talks to the client
//! through an [`emitter::EventEmitter`] over a bounded
//! [`transport::ChannelTransport`] whose receiving half becomes the response
//! body built by [`event_stream_response`].

pub mod emitter;
pub mod event;
pub mod generate;
pub mod session;
pub mod transport;

use std::convert::Infallible;

use axum::{
  body::Body,
  http::{HeaderName, HeaderValue, header},
  response::Response,
};
use bytes::Bytes;
use futures::StreamExt as _;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub use emitter::{EmitError, EventEmitter};
pub use event::StreamEvent;
pub use generate::Generator;
pub use session::{Outcome, StreamSession};
pub use transport::{ChannelTransport, Transport};

/// Frames buffered between the session and the client before the emitter
/// starts waiting.
pub const FRAME_BUFFER: usize = 32;

/// Wrap the receiving half of a [`ChannelTransport`] as an SSE response.
pub fn event_stream_response(frames: mpsc::Receiver<Bytes>) -> Response {
  let body = Body::from_stream(ReceiverStream::new(frames).map(Ok::<_, Infallible>));

  let mut res = Response::new(body);
  let headers = res.headers_mut();
  headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
  headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
  headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
  headers.insert(HeaderName::from_static("x-accel-buffering"), HeaderValue::from_static("no"));
  res
}
