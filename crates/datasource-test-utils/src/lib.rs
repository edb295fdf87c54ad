//! Testing utilities for the datasource workspace
//!
//! Shared fixtures: a multiplexer wired to an in-memory gateway, inbound
//! message builders, and helpers for reading what the gateway was sent.

#![allow(missing_docs)]

use datasource_mux::{
    channel_transport, ExchangeId, GatewayHandle, InboundMessage, Multiplexer, MuxConfig,
    OutboundMessage,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_INBOUND_CAPACITY: usize = 256;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

pub fn setup_mux() -> (Multiplexer, GatewayHandle) {
    setup_mux_with(MuxConfig::default())
}

pub fn setup_mux_with(config: MuxConfig) -> (Multiplexer, GatewayHandle) {
    let (transport, gateway) = channel_transport(TEST_INBOUND_CAPACITY);
    (Multiplexer::new(Arc::new(transport), config), gateway)
}

pub fn ok(id: ExchangeId, response: Value) -> InboundMessage {
    InboundMessage::ok(id, response)
}

pub fn status(id: ExchangeId, status_code: u16, response: Value) -> InboundMessage {
    InboundMessage::with_status(id, status_code, response)
}

pub fn warning(id: ExchangeId, response: Value) -> InboundMessage {
    let mut message = InboundMessage::ok(id, response);
    message.warning = Some(Value::Bool(true));
    message
}

/// Wait for the next outbound message, failing the test after a timeout
pub async fn next_sent(gateway: &mut GatewayHandle) -> OutboundMessage {
    tokio::time::timeout(RECV_TIMEOUT, gateway.recv())
        .await
        .expect("timed out waiting for outbound message")
        .expect("transport dropped")
}

/// Every `poll-stop` sent so far, draining the gateway
pub fn drain_poll_stops(gateway: &mut GatewayHandle) -> Vec<ExchangeId> {
    gateway
        .drain()
        .into_iter()
        .filter_map(|message| match message {
            OutboundMessage::PollStop(resource) => Some(resource.id),
            _ => None,
        })
        .collect()
}

/// Let the multiplexer's pump catch up with delivered messages
///
/// Intended for the current-thread runtime `#[tokio::test]` uses by default.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
