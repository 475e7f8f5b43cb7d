//! The byte sink underneath an [`EventEmitter`](super::EventEmitter).

use std::future::Future;

use bytes::Bytes;
use tokio::{
  sync::mpsc::{self, error::TrySendError},
  task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use super::emitter::EmitError;

/// Whether a written frame reached the sink or is waiting for buffer space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flush {
  Flushed,
  Buffered,
}

/// A bounded, writable byte stream to one client.
pub trait Transport: Send {
  /// The client has gone away; nothing written from now on will arrive.
  fn is_closed(&self) -> bool;

  /// Write a frame without waiting. A [`Flush::Buffered`] frame is held until
  /// [`drained`](Transport::drained) resolves; writing again before that fails.
  fn write(&mut self, frame: Bytes) -> Result<Flush, EmitError>;

  /// Resolve once any buffered frame has been handed to the client.
  fn drained(&mut self) -> impl Future<Output = Result<(), EmitError>> + Send + '_;
}

/// A [`Transport`] backed by a bounded tokio channel whose receiver is the
/// HTTP response body.
///
/// Dropping the transport closes the body.
pub struct ChannelTransport {
  tx:      mpsc::Sender<Bytes>,
  pending: Option<Bytes>,
  watcher: Option<JoinHandle<()>>,
}

impl ChannelTransport {
  /// Create a transport holding at most `capacity` undelivered frames.
  pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
    let (tx, rx) = mpsc::channel(capacity);
    (Self { tx, pending: None, watcher: None }, rx)
  }

  /// Cancel `token` as soon as the receiving side is dropped.
  pub fn cancel_on_disconnect(&mut self, token: CancellationToken) {
    let tx = self.tx.clone();
    if let Some(old) = self.watcher.replace(tokio::spawn(async move {
      tx.closed().await;
      tracing::debug!("client disconnected");
      token.cancel();
    })) {
      old.abort();
    }
  }
}

impl Transport for ChannelTransport {
  fn is_closed(&self) -> bool { self.tx.is_closed() }

  fn write(&mut self, frame: Bytes) -> Result<Flush, EmitError> {
    if self.pending.is_some() {
      return Err(EmitError::WriteFailed("a previous frame is still buffered".into()));
    }
    match self.tx.try_send(frame) {
      Ok(()) => Ok(Flush::Flushed),
      Err(TrySendError::Full(frame)) => {
        self.pending = Some(frame);
        Ok(Flush::Buffered)
      }
      Err(TrySendError::Closed(_)) => Err(EmitError::StreamClosed),
    }
  }

  async fn drained(&mut self) -> Result<(), EmitError> {
    if self.pending.is_none() {
      return Ok(());
    }
    // Reserve first so a cancelled wait leaves the frame in `pending`.
    let permit = self.tx.reserve().await.map_err(|_| EmitError::StreamClosed)?;
    if let Some(frame) = self.pending.take() {
      permit.send(frame);
    }
    Ok(())
  }
}

impl Drop for ChannelTransport {
  fn drop(&mut self) {
    if let Some(watcher) = self.watcher.take() {
      watcher.abort();
    }
  }
}
