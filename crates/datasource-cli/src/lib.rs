//! Command-line tools for the datasource multiplexer
//!
//! - `url`: print the URL a base and query parameters resolve to
//! - `simulate`: drive a multiplexer against a loopback gateway and check
//!   its bookkeeping

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod gateway;
pub mod params;
pub mod simulate;

pub use gateway::GatewayStats;
pub use params::{collect_params, parse_param};
pub use simulate::{run_simulation, SimulationConfig, SimulationReport};
