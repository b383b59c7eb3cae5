//! The streaming response handle.
//!
//! A [`StreamingResponse`] takes exclusive ownership of a live HTTP response
//! whose body is still arriving and exposes it as a single-pass, cancellable
//! sequence of typed items. The connection is released exactly once: as soon
//! as iteration ends (exhausted, cancelled or failed), on [`close`], or when
//! the handle is dropped, whichever comes first.
//!
//! ```text
//! Created ──▶ Iterating ──▶ Exhausted | Cancelled | Faulted
//!    │            │                    │
//!    └────────────┴─────── close() ────┴──▶ Disposed
//! ```
//!
//! [`close`]: StreamingResponse::close

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::trace;

use crate::client::ClientError;

type ItemStream<T> = Pin<Box<dyn Stream<Item = Result<T, ClientError>> + Send>>;

/// Lifecycle of a [`StreamingResponse`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StreamState {
    /// Headers received, nothing read yet.
    Created,
    /// At least one item has been yielded.
    Iterating,
    /// The server ended the body.
    Exhausted,
    /// The cancellation token fired.
    Cancelled,
    /// A line failed to decode or the body failed to read.
    Faulted,
    /// `close()` was called. Terminal.
    Disposed,
}

impl StreamState {
    /// Whether the body has been released.
    pub fn is_released(self) -> bool {
        !matches!(self, StreamState::Created | StreamState::Iterating)
    }
}

/// A lazily-decoded, cancellable sequence of `T` backed by one HTTP response.
///
/// Use it as a [`Stream`], or through the inherent [`next`](Self::next) and
/// [`close`](Self::close). It is a forward-only cursor: it cannot be
/// restarted, and it is not meant to be shared between consumers.
///
/// # Example
/// ```no_run
/// use ollama_core::{ChatMessage, ChatCompletionOptions, OllamaClient};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() -> Result<(), ollama_core::ClientError> {
/// let client = OllamaClient::new("http://localhost:11434")?;
/// let options = ChatCompletionOptions::new("llama3", ChatMessage::user("Why is the sky blue?"));
///
/// let mut stream = client.chat_stream(&options, CancellationToken::new()).await?;
/// while let Some(chunk) = stream.next().await {
///     let chunk = chunk?;
///     if let Some(message) = &chunk.message {
///         print!("{}", message.content);
///     }
/// }
/// stream.close();
/// # Ok(())
/// # }
/// ```
pub struct StreamingResponse<T> {
    body: Option<ItemStream<T>>,
    state: StreamState,
    status: Option<StatusCode>,
    cancel: CancellationToken,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl<T> StreamingResponse<T> {
    /// Wrap a live HTTP response.
    ///
    /// `processor` receives the response and turns it into the item
    /// sequence; it is called once, immediately, and the body is only read
    /// as the caller iterates.
    pub fn from_response<F, S>(response: reqwest::Response, cancel: CancellationToken, processor: F) -> Self
    where
        F: FnOnce(reqwest::Response) -> S,
        S: Stream<Item = Result<T, ClientError>> + Send + 'static,
    {
        let status = response.status();
        let mut this = Self::from_stream(processor(response), cancel);
        this.status = Some(status);
        this
    }

    /// Wrap an already-decoded item stream.
    pub fn from_stream<S>(stream: S, cancel: CancellationToken) -> Self
    where
        S: Stream<Item = Result<T, ClientError>> + Send + 'static,
    {
        Self {
            body: Some(Box::pin(stream)),
            state: StreamState::Created,
            status: None,
            cancelled: Box::pin(cancel.clone().cancelled_owned()),
            cancel,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// HTTP status of the wrapped response, if built from one.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// A handle on the token that cancels this stream.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the next item.
    ///
    /// Returns `None` once the stream is exhausted, cancelled or faulted.
    /// After [`close`](Self::close) every call fails with
    /// [`ClientError::StreamClosed`].
    pub async fn next(&mut self) -> Option<Result<T, ClientError>> {
        StreamExt::next(self).await
    }

    /// Release the HTTP response. Safe to call any number of times.
    pub fn close(&mut self) {
        if self.state == StreamState::Disposed {
            return;
        }
        self.release(StreamState::Disposed);
    }

    fn release(&mut self, state: StreamState) {
        if self.body.take().is_some() {
            trace!(?state, "releasing streaming response body");
        }
        self.state = state;
    }
}

impl<T> Stream for StreamingResponse<T> {
    type Item = Result<T, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match this.state {
            StreamState::Disposed => return Poll::Ready(Some(Err(ClientError::StreamClosed))),
            StreamState::Exhausted | StreamState::Cancelled | StreamState::Faulted => {
                return Poll::Ready(None)
            }
            StreamState::Created | StreamState::Iterating => {}
        }

        // Cancellation wins over a line that is ready at the same time.
        if this.cancelled.as_mut().poll(cx).is_ready() {
            this.release(StreamState::Cancelled);
            return Poll::Ready(Some(Err(ClientError::Cancelled)));
        }

        let Some(body) = this.body.as_mut() else {
            this.release(StreamState::Exhausted);
            return Poll::Ready(None);
        };

        match body.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(item))) => {
                this.state = StreamState::Iterating;
                Poll::Ready(Some(Ok(item)))
            }
            Poll::Ready(Some(Err(e))) => {
                let state = if e.is_cancelled() {
                    StreamState::Cancelled
                } else {
                    StreamState::Faulted
                };
                this.release(state);
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.release(StreamState::Exhausted);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for StreamingResponse<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> fmt::Debug for StreamingResponse<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("state", &self.state)
            .field("status", &self.status)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
