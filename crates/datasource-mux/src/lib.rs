//! Datasource multiplexer
//!
//! Many logical request and poll streams sharing one bidirectional transport
//! to a gateway. Every exchange carries a unique id; the gateway echoes it on
//! each inbound message and the multiplexer routes the message to the
//! caller's sink.
//!
//! # Core Concepts
//!
//! - [`Multiplexer`]: issues requests and polls, demultiplexes responses
//! - [`ChannelRegistry`]: id-keyed storage of live exchanges
//! - [`RequestSink`]: future resolving to a one-shot request's single result
//! - [`PollSink`]: stream of poll results; dropping it stops the poll
//! - [`Transport`]: the shared connection, injected at construction
//!
//! # Example
//!
//! ```rust,ignore
//! use datasource_mux::{
//!     channel_transport, Multiplexer, MuxConfig, ResourceSpec, DEFAULT_INBOUND_CAPACITY,
//! };
//! use futures::StreamExt;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (transport, _gateway) = channel_transport(DEFAULT_INBOUND_CAPACITY);
//! let mux = Multiplexer::new(Arc::new(transport), MuxConfig::default());
//!
//! let status = mux.request(ResourceSpec::path("/namespaces"))?.await?;
//!
//! let mut runs = mux.poll(ResourceSpec::path("/runs").with_interval(2000))?;
//! while let Some(update) = runs.next().await {
//!     println!("{:?}", update?);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod handler;
pub mod multiplexer;
pub mod registry;
pub mod resource;
pub mod sink;
pub mod transport;
pub mod types;
pub mod wire;

pub use config::{MuxConfig, RouterConfig, DEFAULT_POLL_INTERVAL_MS};
pub use error::{ConfigError, ConstructionError, ExchangeError, MuxError, TransportError};
pub use handler::{AuthExpiryDetector, ResponseHandler};
pub use multiplexer::{Dispatch, Multiplexer, MultiplexerBuilder, PollTarget};
pub use registry::{ChannelRegistry, Exchange, ExchangeInfo};
pub use resource::{Headers, RequestDescriptor, ResourceSpec};
pub use sink::{ExchangeResult, PollSink, RequestSink};
pub use transport::{
    channel_transport, ChannelTransport, GatewayHandle, InboundStream, Transport,
    DEFAULT_INBOUND_CAPACITY,
};
pub use types::{ExchangeId, ExchangeKind, Method};
pub use wire::{InboundMessage, OutboundMessage};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for issuing requests and polls
    pub use crate::{
        ExchangeError, ExchangeId, Method, Multiplexer, MuxConfig, MuxError, PollSink,
        RequestSink, ResourceSpec, Transport,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
