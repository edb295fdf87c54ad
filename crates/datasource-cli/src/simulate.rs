//! Multiplexer simulation against the loopback gateway
//!
//! Starts a set of polls and one request per poll, reads a fixed number of
//! values from each poll, stops half of them explicitly and the rest through
//! `destroy`, then checks the bookkeeping:
//! - every request answered exactly once
//! - every poll received its values
//! - every poll sent exactly one `poll-stop`
//! - nothing left live after `destroy`

use crate::gateway::{self, GatewayStats};
use anyhow::{anyhow, Context, Result};
use datasource_mux::{
    channel_transport, ExchangeId, InboundMessage, Multiplexer, MuxConfig, PollSink, ResourceSpec,
    DEFAULT_INBOUND_CAPACITY,
};
use futures::StreamExt;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Simulation parameters
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Concurrent polls (and requests)
    pub polls: usize,
    /// Values to read from each poll before stopping it
    pub ticks: usize,
    /// Gateway tick and poll interval in milliseconds
    pub interval_ms: u64,
    /// Multiplexer configuration
    pub mux: MuxConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            polls: 4,
            ticks: 3,
            interval_ms: 10,
            mux: MuxConfig::default(),
        }
    }
}

impl SimulationConfig {
    fn wait_limit(&self) -> Duration {
        let ticks = u64::try_from(self.ticks).unwrap_or(u64::MAX);
        Duration::from_millis(self.interval_ms.saturating_mul(ticks).saturating_mul(4))
            .max(Duration::from_secs(5))
    }
}

/// Outcome of a simulation run
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub polls: usize,
    pub ticks: usize,
    pub interval_ms: u64,
    pub requests_answered: usize,
    pub request_errors: usize,
    pub values_received: usize,
    pub responses_seen: usize,
    pub stopped_explicitly: usize,
    pub stopped_by_destroy: usize,
    pub live_after_destroy: usize,
    pub gateway: GatewayStats,
    pub violations: Vec<String>,
}

impl SimulationReport {
    /// Check if every invariant held
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Human-readable report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut lines = vec![
            "=== Datasource Simulation Report ===".to_string(),
            String::new(),
            format!("Polls: {}", self.polls),
            format!("Ticks per poll: {}", self.ticks),
            format!("Interval: {}ms", self.interval_ms),
            format!("Requests answered: {}", self.requests_answered),
            format!("Request errors: {}", self.request_errors),
            format!("Poll values received: {}", self.values_received),
            format!("Responses seen by handlers: {}", self.responses_seen),
            format!("Stopped explicitly: {}", self.stopped_explicitly),
            format!("Stopped by destroy: {}", self.stopped_by_destroy),
            format!("Gateway poll-start: {}", self.gateway.poll_starts),
            format!("Gateway poll-stop: {}", self.gateway.poll_stops),
            format!("Wire errors: {}", self.gateway.wire_errors),
            format!("Live after destroy: {}", self.live_after_destroy),
        ];

        if !self.violations.is_empty() {
            lines.push(String::new());
            lines.push("=== Violations ===".to_string());
            for (i, v) in self.violations.iter().enumerate() {
                lines.push(format!("{}. {v}", i + 1));
            }
        }

        lines.push(String::new());
        lines.push(format!(
            "=== Result: {} ===",
            if self.passed() { "PASS" } else { "FAIL" }
        ));
        lines.join("\n")
    }
}

/// Run one simulation
///
/// # Errors
/// Returns an error if issuing an exchange fails or the run stalls
pub async fn run_simulation(config: SimulationConfig) -> Result<SimulationReport> {
    let limit = config.wait_limit();
    let (transport, handle) = channel_transport(
        config
            .polls
            .saturating_mul(config.ticks.max(1))
            .max(DEFAULT_INBOUND_CAPACITY),
    );
    let gateway = gateway::spawn(handle, Duration::from_millis(config.interval_ms));

    let responses = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&responses);
    let mux = Multiplexer::builder()
        .with_config(config.mux.clone())
        .with_handler(move |_: &InboundMessage| {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .build(Arc::new(transport));

    let mut sinks = Vec::with_capacity(config.polls);
    let mut requests = Vec::with_capacity(config.polls);
    for n in 0..config.polls {
        let spec =
            ResourceSpec::path(format!("/simulate/polls/{n}")).with_interval(config.interval_ms);
        sinks.push(mux.poll(spec).context("starting poll")?);
        requests.push(
            mux.request(ResourceSpec::path(format!("/simulate/requests/{n}")))
                .context("issuing request")?,
        );
    }
    let poll_ids: Vec<ExchangeId> = sinks.iter().map(PollSink::id).collect();
    tracing::info!(polls = config.polls, "exchanges issued");

    let results = tokio::time::timeout(limit, futures::future::join_all(requests))
        .await
        .map_err(|_| anyhow!("requests not answered within {limit:?}"))?;
    let request_errors = results.iter().filter(|r| r.is_err()).count();

    let mut values_received = 0;
    for sink in &mut sinks {
        for _ in 0..config.ticks {
            match tokio::time::timeout(limit, sink.next()).await {
                Ok(Some(Ok(_))) => values_received += 1,
                Ok(Some(Err(err))) => tracing::warn!(id = %sink.id(), error = %err, "poll error"),
                Ok(None) => break,
                Err(_) => return Err(anyhow!("poll {} stalled", sink.id())),
            }
        }
    }

    let mut stopped_explicitly = 0;
    for sink in sinks.iter().step_by(2) {
        if mux.stop_poll(sink) {
            stopped_explicitly += 1;
        }
    }
    let live_before_destroy = mux.live_count();
    mux.destroy();
    let live_after_destroy = mux.live_count();

    let mut unterminated = 0;
    for sink in &mut sinks {
        let drained = tokio::time::timeout(limit, sink.by_ref().for_each(|_| async {})).await;
        if drained.is_err() {
            unterminated += 1;
        }
    }

    drop(sinks);
    drop(mux);
    let gateway = tokio::time::timeout(limit, gateway)
        .await
        .map_err(|_| anyhow!("gateway did not shut down"))?
        .context("gateway task failed")?;

    let mut violations = Vec::new();
    if results.len() - request_errors != config.polls {
        violations.push(format!(
            "{} of {} requests answered successfully",
            results.len() - request_errors,
            config.polls
        ));
    }
    if gateway.requests != config.polls {
        violations.push(format!("gateway saw {} requests", gateway.requests));
    }
    let expected_values = config.polls * config.ticks;
    if values_received != expected_values {
        violations.push(format!(
            "received {values_received} poll values, expected {expected_values}"
        ));
    }
    for (id, count) in gateway.irregular_stops(&poll_ids) {
        violations.push(format!("poll {id} sent {count} poll-stop messages"));
    }
    if live_after_destroy != 0 {
        violations.push(format!("{live_after_destroy} exchanges live after destroy"));
    }
    if gateway.wire_errors != 0 {
        violations.push(format!("{} messages failed to cross the wire", gateway.wire_errors));
    }
    if unterminated != 0 {
        violations.push(format!("{unterminated} poll streams did not end"));
    }

    Ok(SimulationReport {
        polls: config.polls,
        ticks: config.ticks,
        interval_ms: config.interval_ms,
        requests_answered: results.len() - request_errors,
        request_errors,
        values_received,
        responses_seen: responses.load(Ordering::Relaxed),
        stopped_explicitly,
        stopped_by_destroy: live_before_destroy,
        live_after_destroy,
        gateway,
        violations,
    })
}
