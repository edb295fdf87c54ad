//! Multiplexer configuration
//!
//! Router location (for resolving symbolic paths) and poll defaults. Can be
//! loaded from the console's runtime config JSON:
//!
//! ```json
//! {
//!   "sslEnabled": false,
//!   "cdap": {
//!     "routerServerUrl": "127.0.0.1",
//!     "routerServerPort": "11015",
//!     "routerSSLServerPort": "10443"
//!   }
//! }
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Default poll interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// Default plain-text router port
pub const DEFAULT_ROUTER_PORT: u16 = 11015;

/// Default TLS router port
pub const DEFAULT_ROUTER_SSL_PORT: u16 = 10443;

/// Multiplexer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuxConfig {
    /// Router used to resolve symbolic paths
    pub router: RouterConfig,
    /// Poll interval applied when a poll does not set one
    pub default_poll_interval_ms: u64,
}

impl MuxConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With router
    #[inline]
    #[must_use]
    pub fn with_router(mut self, router: RouterConfig) -> Self {
        self.router = router;
        self
    }

    /// With default poll interval
    #[inline]
    #[must_use]
    pub fn with_default_poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.default_poll_interval_ms = interval_ms;
        self
    }

    /// Parse the console runtime config shape
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` if the JSON does not match
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let console: ConsoleConfig = serde_json::from_str(json)?;
        Ok(console.into())
    }

    /// Load the console runtime config from a file
    ///
    /// # Errors
    /// Returns `ConfigError::Io` if the file cannot be read and
    /// `ConfigError::Parse` if its contents do not match
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            router: RouterConfig::default(),
            default_poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// Location of the backend router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Use `https` and the TLS port
    pub ssl_enabled: bool,
    /// Router host name or address
    pub host: String,
    /// Plain-text port
    pub port: u16,
    /// TLS port
    pub ssl_port: u16,
    /// API version prefix, without slashes
    pub api_version: String,
}

impl RouterConfig {
    /// Create router config for a host with default ports
    #[inline]
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// With TLS enabled
    #[inline]
    #[must_use]
    pub fn with_ssl(mut self, enabled: bool) -> Self {
        self.ssl_enabled = enabled;
        self
    }

    /// With plain-text port
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// With TLS port
    #[inline]
    #[must_use]
    pub fn with_ssl_port(mut self, port: u16) -> Self {
        self.ssl_port = port;
        self
    }

    /// Absolute base URL, e.g. `http://localhost:11015/v3`
    #[must_use]
    pub fn base_url(&self) -> String {
        let (scheme, port) = if self.ssl_enabled {
            ("https", self.ssl_port)
        } else {
            ("http", self.port)
        };
        format!("{scheme}://{}:{port}/{}", self.host, self.api_version)
    }

    /// Resolve a symbolic path against the base URL
    #[must_use]
    pub fn resolve(&self, symbolic_path: &str) -> String {
        let base = self.base_url();
        if symbolic_path.starts_with('/') {
            format!("{base}{symbolic_path}")
        } else {
            format!("{base}/{symbolic_path}")
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            ssl_enabled: false,
            host: "localhost".to_string(),
            port: DEFAULT_ROUTER_PORT,
            ssl_port: DEFAULT_ROUTER_SSL_PORT,
            api_version: "v3".to_string(),
        }
    }
}

/// Console runtime config as served to the browser
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsoleConfig {
    #[serde(default)]
    ssl_enabled: bool,
    cdap: ConsoleRouter,
    #[serde(default)]
    poll_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsoleRouter {
    router_server_url: String,
    #[serde(default, deserialize_with = "port_opt")]
    router_server_port: Option<u16>,
    #[serde(rename = "routerSSLServerPort", default, deserialize_with = "port_opt")]
    router_ssl_server_port: Option<u16>,
}

impl From<ConsoleConfig> for MuxConfig {
    fn from(console: ConsoleConfig) -> Self {
        let router = RouterConfig {
            ssl_enabled: console.ssl_enabled,
            host: console.cdap.router_server_url,
            port: console.cdap.router_server_port.unwrap_or(DEFAULT_ROUTER_PORT),
            ssl_port: console
                .cdap
                .router_ssl_server_port
                .unwrap_or(DEFAULT_ROUTER_SSL_PORT),
            ..RouterConfig::default()
        };
        Self {
            router,
            default_poll_interval_ms: console
                .poll_interval_ms
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// Ports arrive as numbers or numeric strings
fn port_opt<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Option::<Port>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Port::Number(n)) => Ok(Some(n)),
        Some(Port::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
