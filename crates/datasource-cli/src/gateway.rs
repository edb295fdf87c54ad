//! Loopback gateway
//!
//! Answers every `request` immediately and pushes one value to every running
//! poll on each tick. Every message crosses the loopback as JSON text, the
//! way a socket gateway would see it. Counts what it saw so a simulation can
//! check the multiplexer's bookkeeping afterwards.

use datasource_mux::{ExchangeId, GatewayHandle, InboundMessage, OutboundMessage, TransportError};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// What the gateway observed over its lifetime
#[derive(Debug, Clone, Default, Serialize)]
pub struct GatewayStats {
    /// `request` messages answered
    pub requests: usize,
    /// `poll-start` messages seen
    pub poll_starts: usize,
    /// `poll-stop` messages seen
    pub poll_stops: usize,
    /// Poll values pushed
    pub ticks_delivered: usize,
    /// Messages that failed to encode or decode
    pub wire_errors: usize,
    /// `poll-stop` count per poll id
    #[serde(skip)]
    pub stops_by_id: HashMap<ExchangeId, usize>,
}

impl GatewayStats {
    /// Poll ids whose stop count is not exactly one
    #[must_use]
    pub fn irregular_stops(&self, started: &[ExchangeId]) -> BTreeMap<ExchangeId, usize> {
        started
            .iter()
            .map(|id| (*id, self.stops_by_id.get(id).copied().unwrap_or(0)))
            .filter(|(_, count)| *count != 1)
            .collect()
    }
}

/// Spawn the gateway loop
///
/// The loop ends once every transport clone has been dropped and returns
/// its statistics.
pub fn spawn(mut handle: GatewayHandle, tick: Duration) -> JoinHandle<GatewayStats> {
    tokio::spawn(async move {
        let mut stats = GatewayStats::default();
        let mut polls: BTreeMap<ExchangeId, u64> = BTreeMap::new();
        let mut ticker = tokio::time::interval(tick.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = handle.recv() => {
                    let Some(message) = message else { break };
                    match over_wire(&message) {
                        Ok(message) => handle_outbound(&handle, message, &mut polls, &mut stats),
                        Err(err) => {
                            tracing::warn!(error = %err, "undecodable outbound message");
                            stats.wire_errors += 1;
                        }
                    }
                }
                _ = ticker.tick() => {
                    for (id, n) in &mut polls {
                        *n += 1;
                        reply(&handle, *id, json!({ "tick": *n }), &mut stats);
                        stats.ticks_delivered += 1;
                    }
                }
            }
        }

        tracing::debug!(?stats, "gateway finished");
        stats
    })
}

/// Encode and decode an outbound message as a socket gateway would
fn over_wire(message: &OutboundMessage) -> Result<OutboundMessage, TransportError> {
    OutboundMessage::from_json(&message.to_json()?)
}

fn reply(handle: &GatewayHandle, id: ExchangeId, response: Value, stats: &mut GatewayStats) {
    let text = json!({ "resource": { "id": id }, "statusCode": 200, "response": response });
    match InboundMessage::from_json(&text.to_string()) {
        Ok(message) => {
            handle.deliver(message);
        }
        Err(err) => {
            tracing::warn!(%id, error = %err, "undecodable inbound message");
            stats.wire_errors += 1;
        }
    }
}

fn handle_outbound(
    handle: &GatewayHandle,
    message: OutboundMessage,
    polls: &mut BTreeMap<ExchangeId, u64>,
    stats: &mut GatewayStats,
) {
    match message {
        OutboundMessage::Request(resource) => {
            stats.requests += 1;
            reply(
                handle,
                resource.id,
                json!({ "url": resource.url, "method": resource.method }),
                stats,
            );
        }
        OutboundMessage::PollStart(resource) => {
            stats.poll_starts += 1;
            polls.insert(resource.id, 0);
        }
        OutboundMessage::PollStop(resource) => {
            stats.poll_stops += 1;
            *stats.stops_by_id.entry(resource.id).or_default() += 1;
            polls.remove(&resource.id);
        }
    }
}
