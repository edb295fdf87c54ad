//! Datasource URL construction
//!
//! Pure helpers used when turning a caller's resource description into the
//! concrete URL carried on the wire.
//!
//! # Core Concepts
//!
//! - [`build_url`]: Append a sorted, encoded query string to a base URL
//! - [`QueryValue`]: Typed query parameter values (scalars, lists, objects, date/times)
//! - [`PathTemplate`]: `:name` placeholder paths such as `/namespaces/:namespace/apps`
//!
//! # Example
//!
//! ```rust
//! use datasource_url::{build_url, QueryParams, QueryValue};
//!
//! let mut params = QueryParams::new();
//! params.insert("b".into(), QueryValue::from(2));
//! params.insert("a".into(), QueryValue::from(1));
//!
//! assert_eq!(build_url("/x", Some(&params)), "/x?a=1&b=2");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod path;
mod query;

pub use error::UrlError;
pub use path::{PathTemplate, Segment};
pub use query::{build_url, build_url_with, encode_uri_query, QueryEncoding, QueryParams, QueryValue};
