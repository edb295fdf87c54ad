//! Channel registry: live exchanges keyed by id
//!
//! Removal is atomic per entry, so whichever caller removes an exchange owns
//! its cleanup. That is what makes one-shot completion and `poll-stop`
//! happen exactly once even when callers race the inbound pump.

use crate::resource::RequestDescriptor;
use crate::sink::ExchangeResult;
use crate::types::{ExchangeId, ExchangeKind};
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};

/// Sending half paired with a caller's sink
#[derive(Debug)]
pub(crate) enum SinkSender {
    OneShot(oneshot::Sender<ExchangeResult>),
    Poll(mpsc::UnboundedSender<ExchangeResult>),
}

/// One live request or poll
#[derive(Debug)]
pub struct Exchange {
    descriptor: RequestDescriptor,
    sink: SinkSender,
}

impl Exchange {
    pub(crate) fn one_shot(
        descriptor: RequestDescriptor,
        sender: oneshot::Sender<ExchangeResult>,
    ) -> Self {
        Self {
            descriptor,
            sink: SinkSender::OneShot(sender),
        }
    }

    pub(crate) fn poll(
        descriptor: RequestDescriptor,
        sender: mpsc::UnboundedSender<ExchangeResult>,
    ) -> Self {
        Self {
            descriptor,
            sink: SinkSender::Poll(sender),
        }
    }

    /// Exchange id
    #[inline]
    #[must_use]
    pub fn id(&self) -> ExchangeId {
        self.descriptor.id
    }

    /// Exchange kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ExchangeKind {
        match self.sink {
            SinkSender::OneShot(_) => ExchangeKind::OneShot,
            SinkSender::Poll(_) => ExchangeKind::Poll,
        }
    }

    /// Resolved wire request
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }
}

/// Snapshot of a live exchange
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeInfo {
    pub id: ExchangeId,
    pub kind: ExchangeKind,
    pub descriptor: RequestDescriptor,
}

/// Identifier-keyed storage of live exchanges
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    entries: DashMap<ExchangeId, Exchange>,
}

impl ChannelRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Store an exchange under its id
    pub fn register(&self, exchange: Exchange) -> ExchangeId {
        let id = exchange.id();
        let previous = self.entries.insert(id, exchange);
        debug_assert!(previous.is_none(), "exchange id {id} reused while live");
        id
    }

    /// Look up a live exchange
    ///
    /// `None` is a normal outcome: the exchange may have completed or been
    /// stopped already.
    #[must_use]
    pub fn lookup(&self, id: ExchangeId) -> Option<ExchangeInfo> {
        self.entries.get(&id).map(|entry| ExchangeInfo {
            id,
            kind: entry.kind(),
            descriptor: entry.descriptor.clone(),
        })
    }

    /// Kind of a live exchange
    #[inline]
    #[must_use]
    pub fn kind_of(&self, id: ExchangeId) -> Option<ExchangeKind> {
        self.entries.get(&id).map(|entry| entry.kind())
    }

    /// Remove an exchange; no-op if absent
    pub fn remove(&self, id: ExchangeId) -> Option<Exchange> {
        self.entries.remove(&id).map(|(_, exchange)| exchange)
    }

    /// Remove an exchange only if it has the given kind
    pub fn remove_kind(&self, id: ExchangeId, kind: ExchangeKind) -> Option<Exchange> {
        self.entries
            .remove_if(&id, |_, exchange| exchange.kind() == kind)
            .map(|(_, exchange)| exchange)
    }

    /// Ids of every live exchange of `kind`
    #[must_use]
    pub fn all_of_kind(&self, kind: ExchangeKind) -> Vec<ExchangeId> {
        self.entries
            .iter()
            .filter(|entry| entry.kind() == kind)
            .map(|entry| *entry.key())
            .collect()
    }

    /// Push a value to a live poll
    ///
    /// Returns false if the id is not a live poll or its sink is gone.
    pub(crate) fn deliver(&self, id: ExchangeId, result: ExchangeResult) -> bool {
        match self.entries.get(&id).as_deref() {
            Some(Exchange {
                sink: SinkSender::Poll(tx),
                ..
            }) => tx.send(result).is_ok(),
            _ => false,
        }
    }

    /// Remove a one-shot and hand it its single result
    ///
    /// Returns false if the id is not a live one-shot or its sink is gone;
    /// the exchange is removed either way.
    pub(crate) fn complete(&self, id: ExchangeId, result: ExchangeResult) -> bool {
        match self.remove_kind(id, ExchangeKind::OneShot) {
            Some(Exchange {
                sink: SinkSender::OneShot(tx),
                ..
            }) => tx.send(result).is_ok(),
            _ => false,
        }
    }

    /// Check if an id is live
    #[inline]
    #[must_use]
    pub fn contains(&self, id: ExchangeId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of live exchanges
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no exchange is live
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every exchange; their sinks observe closure
    pub fn clear(&self) {
        self.entries.clear();
    }
}
