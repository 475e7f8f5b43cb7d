//! Backpressure-aware event writer.

use std::time::Duration;

use thiserror::Error;

use super::{event::StreamEvent, transport::{Flush, Transport}};

/// How long a buffered frame may wait for the client before the stream is
/// abandoned.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
  #[error("stream closed by client")]
  StreamClosed,

  #[error("client did not drain the stream in time")]
  WriteTimeout,

  #[error("stream write failed: {0}")]
  WriteFailed(String),
}

/// Writes [`StreamEvent`]s to a [`Transport`] one at a time, waiting for the
/// client to catch up whenever the transport is full.
pub struct EventEmitter<T> {
  transport:     T,
  write_timeout: Duration,
}

impl<T: Transport> EventEmitter<T> {
  pub fn new(transport: T) -> Self {
    Self { transport, write_timeout: DEFAULT_WRITE_TIMEOUT }
  }

  pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
    self.write_timeout = write_timeout;
    self
  }

  pub fn is_closed(&self) -> bool { self.transport.is_closed() }

  /// Frame and write `event`. Returns only once the frame is accepted by the
  /// transport, so events are delivered in call order.
  pub async fn emit(&mut self, event: &StreamEvent) -> Result<(), EmitError> {
    if self.transport.is_closed() {
      return Err(EmitError::StreamClosed);
    }

    match self.transport.write(event.to_frame())? {
      Flush::Flushed => Ok(()),
      Flush::Buffered => tokio::time::timeout(self.write_timeout, self.transport.drained())
        .await
        .map_err(|_| EmitError::WriteTimeout)?,
    }
  }
}
