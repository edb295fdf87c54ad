//! Caller-facing sinks
//!
//! - [`RequestSink`]: future resolving to exactly one result
//! - [`PollSink`]: stream of results; dropping it stops the poll

use crate::error::ExchangeError;
use crate::types::ExchangeId;
use futures::Stream;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{ready, Context, Poll};
use tokio::sync::{mpsc, oneshot};

/// What a sink yields for each delivered message
pub type ExchangeResult = Result<Value, ExchangeError>;

/// Stops a poll on behalf of a dropped sink
pub(crate) trait PollStopper: Send + Sync {
    fn stop(&self, id: ExchangeId);
}

/// Sink for a one-shot request
///
/// Resolves to the single delivered result. Resolves to
/// `ExchangeError::Abandoned` if the multiplexer forgot the exchange (for
/// example on `destroy`) before a response arrived.
///
/// The result is handed out once. After [`RequestSink::try_take`] returns it,
/// `try_take` yields `None` and awaiting the sink never completes.
#[derive(Debug)]
#[must_use = "a request sink does nothing unless awaited"]
pub struct RequestSink {
    id: ExchangeId,
    rx: Option<oneshot::Receiver<ExchangeResult>>,
}

impl RequestSink {
    pub(crate) fn new(id: ExchangeId, rx: oneshot::Receiver<ExchangeResult>) -> Self {
        Self { id, rx: Some(rx) }
    }

    /// Exchange id
    #[inline]
    pub fn id(&self) -> ExchangeId {
        self.id
    }

    /// Take the result without waiting, if it has arrived
    pub fn try_take(&mut self) -> Option<ExchangeResult> {
        let result = match self.rx.as_mut()?.try_recv() {
            Ok(result) => result,
            Err(oneshot::error::TryRecvError::Empty) => return None,
            Err(oneshot::error::TryRecvError::Closed) => Err(ExchangeError::Abandoned),
        };
        self.rx = None;
        Some(result)
    }

    /// Check if the result has already been handed out
    #[inline]
    #[must_use]
    pub fn is_taken(&self) -> bool {
        self.rx.is_none()
    }
}

impl Future for RequestSink {
    type Output = ExchangeResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(rx) = this.rx.as_mut() else {
            return Poll::Pending;
        };
        let result = ready!(Pin::new(rx).poll(cx)).unwrap_or(Err(ExchangeError::Abandoned));
        this.rx = None;
        Poll::Ready(result)
    }
}

/// Sink for a poll
///
/// Yields every delivered result in arrival order. The stream ends once the
/// poll is stopped. Dropping the sink (or calling [`PollSink::cancel`]) stops
/// the poll exactly as `Multiplexer::stop_poll` does.
#[must_use = "dropping a poll sink stops the poll"]
pub struct PollSink {
    id: ExchangeId,
    rx: mpsc::UnboundedReceiver<ExchangeResult>,
    stopper: Weak<dyn PollStopper>,
}

impl PollSink {
    pub(crate) fn new(
        id: ExchangeId,
        rx: mpsc::UnboundedReceiver<ExchangeResult>,
        stopper: Weak<dyn PollStopper>,
    ) -> Self {
        Self { id, rx, stopper }
    }

    /// Exchange id
    #[inline]
    #[must_use]
    pub fn id(&self) -> ExchangeId {
        self.id
    }

    /// Next buffered result, without waiting
    pub fn try_next(&mut self) -> Option<ExchangeResult> {
        self.rx.try_recv().ok()
    }

    /// Check if the poll has been stopped and every buffered result consumed
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.rx.is_closed() && self.rx.is_empty()
    }

    /// Stop the poll
    pub fn cancel(self) {
        drop(self);
    }
}

impl std::fmt::Debug for PollSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollSink").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Stream for PollSink {
    type Item = ExchangeResult;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for PollSink {
    fn drop(&mut self) {
        if let Some(stopper) = self.stopper.upgrade() {
            stopper.stop(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingStopper {
        stopped: Mutex<Vec<ExchangeId>>,
    }

    impl PollStopper for RecordingStopper {
        fn stop(&self, id: ExchangeId) {
            self.stopped.lock().push(id);
        }
    }

    #[tokio::test]
    async fn request_sink_resolves_with_value() {
        let (tx, rx) = oneshot::channel();
        let sink = RequestSink::new(ExchangeId::new(), rx);
        tx.send(Ok(json!("hello"))).unwrap();
        assert_eq!(sink.await, Ok(json!("hello")));
    }

    #[tokio::test]
    async fn request_sink_abandoned_when_sender_dropped() {
        let (tx, rx) = oneshot::channel::<ExchangeResult>();
        let sink = RequestSink::new(ExchangeId::new(), rx);
        drop(tx);
        assert_eq!(sink.await, Err(ExchangeError::Abandoned));
    }

    #[test]
    fn request_sink_try_take() {
        let (tx, rx) = oneshot::channel();
        let mut sink = RequestSink::new(ExchangeId::new(), rx);
        assert!(sink.try_take().is_none());
        tx.send(Ok(json!(1))).unwrap();
        assert_eq!(sink.try_take(), Some(Ok(json!(1))));
        assert!(sink.is_taken());
    }

    #[test]
    fn request_sink_hands_out_one_result() {
        let (tx, rx) = oneshot::channel();
        let mut sink = RequestSink::new(ExchangeId::new(), rx);
        tx.send(Ok(json!(1))).unwrap();
        assert_eq!(sink.try_take(), Some(Ok(json!(1))));
        assert_eq!(sink.try_take(), None);
    }

    #[tokio::test]
    async fn awaiting_after_take_stays_pending() {
        let (tx, rx) = oneshot::channel();
        let mut sink = RequestSink::new(ExchangeId::new(), rx);
        tx.send(Ok(json!(1))).unwrap();
        assert_eq!(sink.try_take(), Some(Ok(json!(1))));

        let waited = tokio::time::timeout(std::time::Duration::from_millis(20), sink).await;
        assert!(waited.is_err());
    }

    #[test]
    fn abandoned_is_reported_once() {
        let (tx, rx) = oneshot::channel::<ExchangeResult>();
        let mut sink = RequestSink::new(ExchangeId::new(), rx);
        drop(tx);
        assert_eq!(sink.try_take(), Some(Err(ExchangeError::Abandoned)));
        assert_eq!(sink.try_take(), None);
    }

    #[tokio::test]
    async fn poll_sink_streams_until_sender_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let stopper: Arc<dyn PollStopper> = Arc::new(RecordingStopper::default());
        let mut sink = PollSink::new(ExchangeId::new(), rx, Arc::downgrade(&stopper));

        tx.send(Ok(json!(1))).unwrap();
        tx.send(Ok(json!(2))).unwrap();
        drop(tx);

        assert_eq!(sink.next().await, Some(Ok(json!(1))));
        assert_eq!(sink.next().await, Some(Ok(json!(2))));
        assert_eq!(sink.next().await, None);
        assert!(sink.is_terminated());
    }

    #[test]
    fn dropping_poll_sink_stops_poll() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let stopper = Arc::new(RecordingStopper::default());
        let weak: Weak<dyn PollStopper> = Arc::downgrade(&stopper) as Weak<dyn PollStopper>;
        let id = ExchangeId::new();

        PollSink::new(id, rx, weak).cancel();
        assert_eq!(*stopper.stopped.lock(), vec![id]);
    }

    #[test]
    fn dropping_poll_sink_after_owner_gone_is_noop() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let stopper: Arc<dyn PollStopper> = Arc::new(RecordingStopper::default());
        let weak = Arc::downgrade(&stopper);
        drop(stopper);
        drop(PollSink::new(ExchangeId::new(), rx, weak));
    }
}
