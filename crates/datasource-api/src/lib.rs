//! Datasource API
//!
//! Typed endpoint tables issued through a [`datasource_mux::Multiplexer`].
//!
//! # Example
//!
//! ```rust,ignore
//! use datasource_api::{EntityRef, MetadataApi};
//!
//! # async fn example(mux: &datasource_mux::Multiplexer) -> Result<(), Box<dyn std::error::Error>> {
//! let api = MetadataApi::new()?;
//! let entity = EntityRef::new("default", "apps", "PurchaseHistory");
//! let tags = api.get_tags.call(mux, &entity.params(), None)?.await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod dataprep;
pub mod endpoint;
pub mod metadata;

pub use dataprep::{DataPrepApi, PING_INTERVAL_MS};
pub use endpoint::{params, EndpointOptions, PollEndpoint, RequestEndpoint};
pub use metadata::{EntityRef, MetadataApi};
