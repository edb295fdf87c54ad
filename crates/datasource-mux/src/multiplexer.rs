//! The multiplexer: many logical exchanges over one transport
//!
//! One pump task per multiplexer reads the transport's inbound stream and
//! dispatches each message to the exchange named by its id. Callers issue
//! exchanges synchronously and receive results through their sinks.

use crate::config::MuxConfig;
use crate::error::{MuxError, TransportError};
use crate::handler::ResponseHandler;
use crate::registry::{ChannelRegistry, Exchange, ExchangeInfo};
use crate::resource::{RequestDescriptor, ResourceSpec};
use crate::sink::{PollSink, PollStopper, RequestSink};
use crate::transport::{InboundStream, Transport};
use crate::types::{ExchangeId, ExchangeKind};
use crate::wire::{InboundMessage, OutboundMessage};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// What happened to one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// No live exchange had this id; the message was dropped
    Orphaned,
    /// Delivered to a live exchange's sink
    Delivered {
        /// Kind of the receiving exchange
        kind: ExchangeKind,
        /// Whether the sink received an error
        error: bool,
    },
    /// The exchange was live but its sink was already gone
    Discarded,
}

/// Identifies the poll to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTarget(pub ExchangeId);

impl From<ExchangeId> for PollTarget {
    fn from(id: ExchangeId) -> Self {
        Self(id)
    }
}

impl From<&RequestDescriptor> for PollTarget {
    fn from(descriptor: &RequestDescriptor) -> Self {
        Self(descriptor.id)
    }
}

impl From<&PollSink> for PollTarget {
    fn from(sink: &PollSink) -> Self {
        Self(sink.id())
    }
}

impl From<&ExchangeInfo> for PollTarget {
    fn from(info: &ExchangeInfo) -> Self {
        Self(info.id)
    }
}

/// State shared by the multiplexer, its pump task and its poll sinks
struct Shared {
    registry: ChannelRegistry,
    transport: Arc<dyn Transport>,
    config: MuxConfig,
    handlers: Vec<Arc<dyn ResponseHandler>>,
    destroyed: AtomicBool,
}

impl Shared {
    fn ensure_live(&self) -> Result<(), MuxError> {
        if self.destroyed.load(Ordering::Acquire) {
            Err(MuxError::Destroyed)
        } else {
            Ok(())
        }
    }

    /// Send the opening message; forget the exchange if the transport refuses
    fn open(&self, message: OutboundMessage) -> Result<(), TransportError> {
        let id = message.id();
        self.transport.send(message).map_err(|err| {
            tracing::warn!(%id, error = %err, "send failed, exchange dropped");
            self.registry.remove(id);
            err
        })
    }

    fn stop_poll(&self, id: ExchangeId) -> bool {
        // Only the caller that removes the entry sends poll-stop
        let Some(exchange) = self.registry.remove_kind(id, ExchangeKind::Poll) else {
            return false;
        };
        let descriptor = exchange.descriptor().clone();
        drop(exchange);

        if let Err(err) = self.transport.send(OutboundMessage::PollStop(descriptor)) {
            tracing::warn!(%id, error = %err, "poll-stop not sent");
        }
        tracing::debug!(%id, "poll stopped");
        true
    }

    fn dispatch(&self, message: &InboundMessage) -> Dispatch {
        let id = message.id();
        let Some(kind) = self.registry.kind_of(id) else {
            tracing::trace!(%id, "orphaned inbound message dropped");
            return Dispatch::Orphaned;
        };

        for handler in &self.handlers {
            handler.on_response(message);
        }

        let result = message.classify();
        let error = result.is_err();
        let delivered = match kind {
            ExchangeKind::OneShot => self.registry.complete(id, result),
            ExchangeKind::Poll => self.registry.deliver(id, result),
        };

        tracing::debug!(%id, %kind, error, delivered, "dispatched");
        if delivered {
            Dispatch::Delivered { kind, error }
        } else {
            Dispatch::Discarded
        }
    }
}

impl PollStopper for Shared {
    fn stop(&self, id: ExchangeId) {
        self.stop_poll(id);
    }
}

/// Builder for [`Multiplexer`]
#[derive(Default)]
#[must_use]
pub struct MultiplexerBuilder {
    config: MuxConfig,
    handlers: Vec<Arc<dyn ResponseHandler>>,
}

impl MultiplexerBuilder {
    /// Create new builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// With configuration
    #[inline]
    pub fn with_config(mut self, config: MuxConfig) -> Self {
        self.config = config;
        self
    }

    /// With a response handler, run after previously added ones
    #[inline]
    pub fn with_handler(mut self, handler: impl ResponseHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// With a response handler the caller keeps a reference to
    #[inline]
    pub fn with_shared_handler(mut self, handler: Arc<dyn ResponseHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Build the multiplexer and start its inbound pump
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime
    pub fn build(self, transport: Arc<dyn Transport>) -> Multiplexer {
        let shared = Arc::new(Shared {
            registry: ChannelRegistry::new(),
            transport,
            config: self.config,
            handlers: self.handlers,
            destroyed: AtomicBool::new(false),
        });

        // Subscribe before spawning so nothing sent after build is missed
        let inbound = shared.transport.subscribe();
        let pump = tokio::spawn(pump(Arc::downgrade(&shared), inbound));

        tracing::debug!(
            handlers = shared.handlers.len(),
            base_url = %shared.config.router.base_url(),
            "multiplexer started"
        );
        Multiplexer {
            shared,
            pump: Mutex::new(Some(pump)),
        }
    }
}

async fn pump(shared: Weak<Shared>, mut inbound: InboundStream) {
    while let Some(message) = inbound.next().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.dispatch(&message);
    }
    tracing::debug!("inbound pump finished");
}

/// Request/poll multiplexer over a single shared transport
///
/// Dropping the multiplexer destroys it.
pub struct Multiplexer {
    shared: Arc<Shared>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Multiplexer {
    /// Create a multiplexer with no response handlers
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: MuxConfig) -> Self {
        MultiplexerBuilder::new().with_config(config).build(transport)
    }

    /// Start building a multiplexer
    #[inline]
    pub fn builder() -> MultiplexerBuilder {
        MultiplexerBuilder::new()
    }

    /// Issue a one-shot request
    ///
    /// The returned sink resolves to exactly one result.
    ///
    /// # Errors
    /// - `MuxError::Construction` if the resource cannot be resolved to a URL
    /// - `MuxError::Transport` if the request could not be sent
    /// - `MuxError::Destroyed` after [`Multiplexer::destroy`]
    pub fn request(&self, spec: ResourceSpec) -> Result<RequestSink, MuxError> {
        self.shared.ensure_live()?;
        let id = ExchangeId::new();
        let descriptor =
            RequestDescriptor::resolve(id, ExchangeKind::OneShot, spec, &self.shared.config)?;

        let (tx, rx) = oneshot::channel();
        tracing::debug!(%id, url = %descriptor.url, method = %descriptor.method, "request");
        self.shared
            .registry
            .register(Exchange::one_shot(descriptor.clone(), tx));
        self.shared.open(OutboundMessage::Request(descriptor))?;

        Ok(RequestSink::new(id, rx))
    }

    /// Start a repeating poll
    ///
    /// The returned sink yields every response until the poll is stopped.
    /// Dropping the sink stops the poll.
    ///
    /// # Errors
    /// Same as [`Multiplexer::request`]
    pub fn poll(&self, spec: ResourceSpec) -> Result<PollSink, MuxError> {
        self.shared.ensure_live()?;
        let id = ExchangeId::new();
        let descriptor =
            RequestDescriptor::resolve(id, ExchangeKind::Poll, spec, &self.shared.config)?;

        let (tx, rx) = mpsc::unbounded_channel();
        tracing::debug!(%id, url = %descriptor.url, interval = ?descriptor.interval, "poll");
        self.shared
            .registry
            .register(Exchange::poll(descriptor.clone(), tx));
        self.shared.open(OutboundMessage::PollStart(descriptor))?;

        let stopper: Weak<dyn PollStopper> = Arc::downgrade(&self.shared) as Weak<dyn PollStopper>;
        Ok(PollSink::new(id, rx, stopper))
    }

    /// Stop a poll
    ///
    /// Sends `poll-stop` and ends the poll's stream. Returns false if no poll
    /// with that id is live.
    pub fn stop_poll(&self, target: impl Into<PollTarget>) -> bool {
        self.shared.stop_poll(target.into().0)
    }

    /// Dispatch one inbound message
    ///
    /// The pump calls this for every message the transport yields.
    pub fn dispatch(&self, message: &InboundMessage) -> Dispatch {
        self.shared.dispatch(message)
    }

    /// Tear down: stop the pump, stop every poll, forget every exchange
    ///
    /// Idempotent. Pending one-shot sinks resolve to
    /// `ExchangeError::Abandoned`.
    pub fn destroy(&self) {
        if self.shared.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }

        let stopped = self
            .shared
            .registry
            .all_of_kind(ExchangeKind::Poll)
            .into_iter()
            .filter(|id| self.shared.stop_poll(*id))
            .count();
        let abandoned = self.shared.registry.len();
        self.shared.registry.clear();

        tracing::info!(stopped, abandoned, "multiplexer destroyed");
    }

    /// Check if [`Multiplexer::destroy`] has run
    #[inline]
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.load(Ordering::Acquire)
    }

    /// Number of live exchanges
    #[inline]
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Check if an exchange is live
    #[inline]
    #[must_use]
    pub fn is_live(&self, id: ExchangeId) -> bool {
        self.shared.registry.contains(id)
    }

    /// Snapshot of a live exchange
    #[must_use]
    pub fn lookup(&self, id: ExchangeId) -> Option<ExchangeInfo> {
        self.shared.registry.lookup(id)
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MuxConfig {
        &self.shared.config
    }

    /// Live exchange registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ChannelRegistry {
        &self.shared.registry
    }
}

impl std::fmt::Debug for Multiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multiplexer")
            .field("live", &self.live_count())
            .field("handlers", &self.shared.handlers.len())
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

impl Drop for Multiplexer {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExchangeError;
    use crate::transport::{channel_transport, GatewayHandle};
    use serde_json::json;

    fn setup() -> (Multiplexer, GatewayHandle) {
        let (transport, gateway) = channel_transport(64);
        (Multiplexer::new(Arc::new(transport), MuxConfig::default()), gateway)
    }

    #[tokio::test]
    async fn request_registers_then_sends() {
        let (mux, mut gateway) = setup();
        let sink = mux.request(ResourceSpec::url("/x")).unwrap();

        assert!(mux.is_live(sink.id()));
        let sent = gateway.try_recv().unwrap();
        assert_eq!(sent.action(), "request");
        assert_eq!(sent.id(), sink.id());
    }

    #[tokio::test]
    async fn dispatch_orphan_is_noop() {
        let (mux, _gateway) = setup();
        let outcome = mux.dispatch(&InboundMessage::ok(ExchangeId::new(), json!(1)));
        assert_eq!(outcome, Dispatch::Orphaned);
        assert_eq!(mux.live_count(), 0);
    }

    #[tokio::test]
    async fn dispatch_completes_one_shot() {
        let (mux, _gateway) = setup();
        let sink = mux.request(ResourceSpec::url("/x")).unwrap();
        let id = sink.id();

        let outcome = mux.dispatch(&InboundMessage::with_status(id, 404, json!("missing")));
        assert_eq!(
            outcome,
            Dispatch::Delivered {
                kind: ExchangeKind::OneShot,
                error: true
            }
        );
        assert!(!mux.is_live(id));
        assert_eq!(sink.await.unwrap_err().status_code(), Some(404));

        assert_eq!(
            mux.dispatch(&InboundMessage::ok(id, json!(1))),
            Dispatch::Orphaned
        );
    }

    #[tokio::test]
    async fn dispatch_to_dropped_request_sink_is_discarded() {
        let (mux, _gateway) = setup();
        let id = mux.request(ResourceSpec::url("/x")).unwrap().id();
        assert_eq!(
            mux.dispatch(&InboundMessage::ok(id, json!(1))),
            Dispatch::Discarded
        );
        assert!(!mux.is_live(id));
    }

    #[tokio::test]
    async fn construction_error_registers_nothing() {
        let (mux, mut gateway) = setup();
        let err = mux.request(ResourceSpec::default()).unwrap_err();
        assert!(err.is_construction());
        assert_eq!(mux.live_count(), 0);
        assert!(gateway.try_recv().is_none());
    }

    #[tokio::test]
    async fn send_failure_forgets_exchange() {
        let (mux, gateway) = setup();
        drop(gateway);
        let err = mux.poll(ResourceSpec::url("/x")).unwrap_err();
        assert!(matches!(err, MuxError::Transport(TransportError::Closed)));
        assert_eq!(mux.live_count(), 0);
    }

    #[tokio::test]
    async fn stop_poll_ignores_one_shots() {
        let (mux, _gateway) = setup();
        let sink = mux.request(ResourceSpec::url("/x")).unwrap();
        assert!(!mux.stop_poll(sink.id()));
        assert!(mux.is_live(sink.id()));
    }

    #[tokio::test]
    async fn destroy_abandons_pending_requests() {
        let (mux, _gateway) = setup();
        let sink = mux.request(ResourceSpec::url("/x")).unwrap();
        mux.destroy();
        assert_eq!(sink.await, Err(ExchangeError::Abandoned));
        assert!(matches!(
            mux.request(ResourceSpec::url("/x")),
            Err(MuxError::Destroyed)
        ));
    }
}
