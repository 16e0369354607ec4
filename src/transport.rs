//! Contract with the raw SSE transport.  The transport owns the socket, the
//! keep-alive timer, and envelope decoding; this crate only reacts to the
//! statuses it reports and the envelopes it delivers.

use crate::event::RawEvent;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Lifecycle of the streaming connection, reported on the status channel
/// handed to [`EventSource::connect_streaming`].  The first value after a
/// connect attempt tells the manager whether the attempt succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    /// Connected; events are flowing.
    Ok,
    /// The connect attempt hit a 5xx; trying again later may work.
    RetryableError,
    /// No data (not even a keep-alive ping) within the transport's window.
    ErrorKeepAlive,
    /// The event stream ended or broke mid-read.
    ErrorReadingStream,
    /// The transport failed internally.
    ErrorInternal,
    /// Catch-all for faults that will not go away by reconnecting.
    NonRetryableError,
}

/// Receives one decoded envelope per SSE event.  Implemented by the
/// `EventHandler`; mocks implement it in tests.
pub trait EventSink: Send + Sync {
    fn handle_incoming_message(&self, event: RawEvent);
}

#[async_trait]
pub trait EventSource: Send + Sync {
    /// Begin streaming.  Returns once the attempt is underway; the outcome
    /// arrives on `status` and decoded envelopes are pushed into `sink`.
    async fn connect_streaming(
        &self,
        token: &str,
        channels: &[String],
        status: mpsc::Sender<TransportStatus>,
        sink: Arc<dyn EventSink>,
    );

    fn is_running(&self) -> bool;

    /// Close the connection.  `flush` asks the transport to drain any events
    /// it has already read before shutting down.
    async fn stop_streaming(&self, flush: bool);
}
