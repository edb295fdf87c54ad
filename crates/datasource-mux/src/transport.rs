//! Transport contract and an in-memory channel transport
//!
//! The transport is the single shared connection to the gateway. The
//! multiplexer only needs to send outbound messages and read one inbound
//! stream; connection management stays on the transport's side.

use crate::error::TransportError;
use crate::wire::{InboundMessage, OutboundMessage};
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::{broadcast, mpsc};

/// Inbound message stream handed to a subscriber
pub type InboundStream = BoxStream<'static, InboundMessage>;

/// Inbound buffer per subscriber suitable for typical console workloads
pub const DEFAULT_INBOUND_CAPACITY: usize = 1024;

/// Shared bidirectional connection to the gateway
///
/// `send` must not block. Every call to `subscribe` yields an independent
/// stream carrying every inbound message, so several multiplexers can share
/// one transport.
pub trait Transport: Send + Sync + 'static {
    /// Queue an outbound message
    ///
    /// # Errors
    /// Returns `TransportError::Closed` if the connection is gone
    fn send(&self, message: OutboundMessage) -> Result<(), TransportError>;

    /// Subscribe to inbound messages
    fn subscribe(&self) -> InboundStream;
}

/// In-memory transport backed by Tokio channels
///
/// Outbound messages land on the paired [`GatewayHandle`]; inbound messages
/// delivered through the handle are broadcast to every subscriber.
///
/// # Buffering
/// Each subscriber buffers at most `inbound_capacity` undelivered messages.
/// A subscriber that falls further behind loses the oldest ones and the loss
/// is only logged, so size the capacity for the burst of responses the
/// gateway can produce: at least the number of live exchanges times the
/// responses each may have in flight.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<OutboundMessage>,
    inbound: broadcast::Sender<InboundMessage>,
}

/// Gateway side of a [`ChannelTransport`]
#[derive(Debug)]
pub struct GatewayHandle {
    outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    inbound: broadcast::Sender<InboundMessage>,
}

/// Create a connected transport/gateway pair
///
/// See [`ChannelTransport`] for how `inbound_capacity` bounds each subscriber.
#[must_use]
pub fn channel_transport(inbound_capacity: usize) -> (ChannelTransport, GatewayHandle) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, _) = broadcast::channel(inbound_capacity.max(1));
    (
        ChannelTransport {
            outbound: out_tx,
            inbound: in_tx.clone(),
        },
        GatewayHandle {
            outbound: out_rx,
            inbound: in_tx,
        },
    )
}

impl Transport for ChannelTransport {
    fn send(&self, message: OutboundMessage) -> Result<(), TransportError> {
        tracing::trace!(action = message.action(), id = %message.id(), "outbound");
        self.outbound
            .send(message)
            .map_err(|_| TransportError::Closed)
    }

    fn subscribe(&self) -> InboundStream {
        let rx = self.inbound.subscribe();
        stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(message) => return Some((message, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "inbound subscriber lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

impl GatewayHandle {
    /// Wait for the next outbound message
    ///
    /// Returns `None` once every transport clone is dropped.
    pub async fn recv(&mut self) -> Option<OutboundMessage> {
        self.outbound.recv().await
    }

    /// Take the next outbound message if one is queued
    pub fn try_recv(&mut self) -> Option<OutboundMessage> {
        self.outbound.try_recv().ok()
    }

    /// Take every queued outbound message
    pub fn drain(&mut self) -> Vec<OutboundMessage> {
        let mut messages = Vec::new();
        while let Some(message) = self.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Broadcast an inbound message to all subscribers
    ///
    /// Returns the number of subscribers that will see it.
    pub fn deliver(&self, message: InboundMessage) -> usize {
        self.inbound.send(message).unwrap_or(0)
    }

    /// Number of live inbound subscribers
    #[inline]
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inbound.receiver_count()
    }
}
